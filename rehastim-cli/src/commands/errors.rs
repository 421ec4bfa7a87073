//! Device status code tables.

use anyhow::Result;
use console::style;
use rehastim::protocol::status::{self, Severity};
use rehastim::Classification;
use serde_json::json;

const STIMULATION_CODES: [i8; 3] = [-1, -2, -3];
const MOTOMED_CODES: [i8; 7] = [0, -1, -2, -3, -4, -5, -6];

fn severity_str(severity: Severity) -> &'static str {
    match severity {
        Severity::Ok => "ok",
        Severity::Advisory => "advisory",
        Severity::Error => "error",
        Severity::Fatal => "fatal",
    }
}

fn styled_severity(severity: Severity) -> String {
    let text = format!("{:<9}", severity_str(severity));
    match severity {
        Severity::Ok => style(text).green().to_string(),
        Severity::Advisory => style(text).yellow().to_string(),
        Severity::Error | Severity::Fatal => style(text).red().bold().to_string(),
    }
}

fn tables() -> [(&'static str, Vec<Classification>); 2] {
    [
        (
            "StimulationError",
            STIMULATION_CODES
                .iter()
                .map(|&c| status::stimulation_error(c))
                .collect(),
        ),
        (
            "MotomedError",
            MOTOMED_CODES
                .iter()
                .map(|&c| status::motomed_error(c))
                .collect(),
        ),
    ]
}

/// Errors command implementation.
pub(crate) fn cmd_errors(json_output: bool) -> Result<()> {
    if json_output {
        let value: serde_json::Map<String, serde_json::Value> = tables()
            .into_iter()
            .map(|(name, rows)| {
                let rows = rows
                    .iter()
                    .map(|c| {
                        json!({
                            "code": c.code,
                            "message": c.message,
                            "severity": severity_str(c.severity),
                        })
                    })
                    .collect();
                (name.to_string(), serde_json::Value::Array(rows))
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    for (name, rows) in tables() {
        println!("{}", style(name).bold().underlined());
        for c in rows {
            println!("  {:>3}  {}  {}", c.code, styled_severity(c.severity), c.message);
        }
        println!();
    }
    Ok(())
}
