//! rehastim CLI - Command-line tool for the Rehastim 2 stimulator.
//!
//! ## Features
//!
//! - Decode captured ScienceMode 2 traffic offline
//! - Print the device status code tables
//! - Stream MOTOmed telemetry from a connected stimulator
//! - Shell completion generation
//! - Environment variable support

use anyhow::{Result, bail};
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use env_logger::Env;
use log::debug;
use std::env;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod config;

use config::Config;

/// Set once Ctrl-C was received.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Whether the user asked to stop.
pub(crate) fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// rehastim - Talk to a Rehastim 2 stimulator and its MOTOmed trainer.
///
/// Environment variables:
///   REHASTIM_PORT      - Default serial port
#[derive(Parser)]
#[command(name = "rehastim")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port the stimulator is connected to.
    #[arg(short, long, global = true, env = "REHASTIM_PORT")]
    port: Option<String>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Decode a hex dump of captured traffic.
    Decode {
        /// Hex bytes, e.g. "F0 81 ... 0F".
        hex: String,

        /// Output packets as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Print the device status code tables.
    Errors {
        /// Output the tables as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Stream MOTOmed telemetry until Ctrl-C.
    Monitor {
        /// Stop after this many samples.
        #[arg(short = 'n', long)]
        count: Option<u64>,

        /// Print samples as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Get the serial port from CLI args or the configuration.
pub(crate) fn get_port(cli: &Cli, config: &Config) -> Result<String> {
    if let Some(port) = cli
        .port
        .clone()
        .or_else(|| {
            config
                .connection
                .serial
                .clone()
        })
    {
        return Ok(port);
    }
    bail!("No serial port given. Use --port, REHASTIM_PORT or [connection] serial in rehastim.toml")
}

fn main() -> Result<()> {
    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();

    // Setup logging based on verbosity
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();

    debug!(
        "rehastim v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    // Load configuration
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    match &cli.command {
        Commands::Decode { hex, json } => {
            commands::decode::cmd_decode(hex, *json)?;
        },
        Commands::Errors { json } => {
            commands::errors::cmd_errors(*json)?;
        },
        Commands::Monitor { count, json } => {
            ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::Relaxed))?;
            rehastim::set_interrupt_checker(was_interrupted);
            commands::monitor::cmd_monitor(&cli, &config, *count, *json)?;
        },
        Commands::Completions { shell } => {
            commands::completions::cmd_completions(*shell);
        },
    }

    Ok(())
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_command_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parse_decode() {
        let cli = Cli::try_parse_from(["rehastim", "decode", "F0 0F", "--json"]).unwrap();
        if let Commands::Decode { hex, json } = cli.command {
            assert_eq!(hex, "F0 0F");
            assert!(json);
        } else {
            panic!("Expected Decode command");
        }
    }

    #[test]
    fn test_cli_parse_monitor_with_port() {
        let cli = Cli::try_parse_from([
            "rehastim",
            "--port",
            "/dev/ttyUSB0",
            "monitor",
            "-n",
            "10",
        ])
        .unwrap();
        assert_eq!(cli.port.as_deref(), Some("/dev/ttyUSB0"));
        assert!(matches!(
            cli.command,
            Commands::Monitor {
                count: Some(10),
                json: false
            }
        ));
    }

    #[test]
    fn test_cli_verbose_count() {
        let cli = Cli::try_parse_from(["rehastim", "-vv", "errors"]).unwrap();
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn test_cli_rejects_unknown_shell() {
        assert!(Cli::try_parse_from(["rehastim", "completions", "cmd"]).is_err());
    }

    #[test]
    fn test_get_port_prefers_flag() {
        let cli = Cli::try_parse_from(["rehastim", "--port", "COM7", "errors"]).unwrap();
        let mut config = Config::default();
        config.connection.serial = Some("COM3".into());
        assert_eq!(get_port(&cli, &config).unwrap(), "COM7");
    }

    #[test]
    fn test_get_port_falls_back_to_config() {
        let cli = Cli::try_parse_from(["rehastim", "errors"]).unwrap();
        let mut config = Config::default();
        config.connection.serial = Some("COM3".into());
        assert_eq!(get_port(&cli, &config).unwrap(), "COM3");
    }
}
