use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use roverlink_rover::Pose;
use serde::Serialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
pub struct BatteryOutput {
    pub battery_percent: u8,
}

#[derive(Serialize)]
pub struct NameOutput<'a> {
    pub name: &'a str,
}

#[derive(Serialize)]
pub struct PositionOutput {
    pub x: f64,
    pub y: f64,
    pub heading: f64,
    pub north: f64,
    pub timestamp: String,
}

impl From<Pose> for PositionOutput {
    fn from(pose: Pose) -> Self {
        Self {
            x: pose.x,
            y: pose.y,
            heading: pose.heading,
            north: pose.north,
            timestamp: now_unix_millis(),
        }
    }
}

/// Print a flat record: one JSON object per line, a one-row table, or `key=value` pairs.
pub fn print_record<T: Serialize>(record: &T, format: OutputFormat) {
    let fields = match serde_json::to_value(record) {
        Ok(Value::Object(fields)) => fields,
        Ok(other) => {
            println!("{other}");
            return;
        }
        Err(err) => {
            eprintln!("error: failed to serialize output: {err}");
            return;
        }
    };

    match format {
        OutputFormat::Json => println!("{}", Value::Object(fields)),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(fields.keys().map(|key| key.to_uppercase()))
                .add_row(fields.values().map(cell));
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{}", pretty_line(&fields)),
    }
}

fn pretty_line(fields: &Map<String, Value>) -> String {
    fields
        .iter()
        .map(|(key, value)| format!("{key}={}", cell(value)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn cell(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() => format!("{f:.2}"),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

fn now_unix_millis() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pretty_line_formats_fields() {
        let value = serde_json::to_value(BatteryOutput {
            battery_percent: 87,
        })
        .unwrap();
        let Value::Object(fields) = value else {
            panic!("expected object");
        };
        assert_eq!(pretty_line(&fields), "battery_percent=87");
    }

    #[test]
    fn floats_render_with_two_decimals() {
        assert_eq!(cell(&serde_json::json!(5.0)), "5.00");
        assert_eq!(cell(&serde_json::json!(-8000.127)), "-8000.13");
        assert_eq!(cell(&serde_json::json!(12)), "12");
        assert_eq!(cell(&serde_json::json!("RVR01")), "RVR01");
    }
}
