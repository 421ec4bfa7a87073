//! Telemetry monitor command implementation.
//!
//! Connects to the stimulator with a MOTOmed attached and streams
//! `ActualValues` samples and phase results until Ctrl-C.

use anyhow::{Context, Result};
use console::style;
use rehastim::{ActualValuesSample, Session};
use std::thread;
use std::time::Duration;

use crate::config::Config;
use crate::{Cli, get_port, was_interrupted};

/// How often the display polls the session.
const REFRESH: Duration = Duration::from_millis(50);

fn print_sample(sample: &ActualValuesSample, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(sample)?);
    } else {
        println!(
            "angle {:>5}  speed {:>4} rpm  torque {:>4} Nm",
            sample.angle, sample.speed, sample.torque
        );
    }
    Ok(())
}

/// Run the telemetry monitor.
pub(crate) fn cmd_monitor(
    cli: &Cli,
    config: &Config,
    count: Option<u64>,
    json: bool,
) -> Result<()> {
    let port = get_port(cli, config)?;
    let session_config = config
        .session_config()
        .with_motomed(true);

    if !cli.quiet {
        eprintln!(
            "{} Connecting to {} on {}",
            style("📡").cyan(),
            session_config.device,
            style(&port).green()
        );
        eprintln!("{}", style("Press Ctrl-C to stop").dim());
    }

    let mut session = Session::open(&port, session_config)
        .with_context(|| format!("Failed to connect on {port}"))?;
    if !cli.quiet {
        eprintln!("{} Connected", style("✓").green());
    }

    let mut printed = 0u64;
    let mut seen = session.samples_received();
    let result = loop {
        if was_interrupted() {
            break Ok(());
        }
        if let Some(fault) = session.fault() {
            break Err(anyhow::anyhow!("{fault}"));
        }
        if !session.is_connected() {
            break Err(anyhow::anyhow!("Connection to {port} lost"));
        }

        let received = session.samples_received();
        if received != seen {
            seen = received;
            if let Some(sample) = session.try_latest_sample() {
                print_sample(&sample, json)?;
                printed += 1;
            }
        }
        if let Some(phase) = session.take_phase_result() {
            if json {
                println!("{}", serde_json::to_string(&phase)?);
            } else {
                eprintln!(
                    "{} Phase {} finished: {} s, {} J, {}% success",
                    style("ℹ").blue(),
                    phase.phase_number,
                    phase.phase_duration,
                    phase.phase_work,
                    phase.success_value
                );
            }
        }
        if count.is_some_and(|n| printed >= n) {
            break Ok(());
        }
        thread::sleep(REFRESH);
    };

    session
        .disconnect()
        .context("Failed to close the session")?;
    if !cli.quiet {
        eprintln!("{} {printed} samples", style("✓").green());
    }
    result
}
