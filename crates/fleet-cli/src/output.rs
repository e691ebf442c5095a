//! Output formatting for fleet-cli (table, json, csv)

use clap::ValueEnum;
use colored::Colorize;
use fleet_client::{Device, DeviceClass, Firmware, RolloutReport};
use serde::Serialize;
use tabled::{Table, Tabled};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// ASCII table format (default)
    Table,
    /// JSON format
    Json,
    /// CSV format
    Csv,
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::Table
    }
}

/// Context for output rendering
pub struct OutputContext {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl OutputContext {
    pub fn new(format: OutputFormat, no_color: bool, quiet: bool) -> Self {
        if no_color {
            colored::control::set_override(false);
        }
        Self { format, quiet }
    }

    /// Print a success message (unless in quiet mode)
    pub fn success(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg.green());
        }
    }

    /// Print an info message (unless in quiet mode)
    pub fn info(&self, msg: &str) {
        if !self.quiet {
            println!("{}", msg);
        }
    }

    /// Print a progress message to stderr (unless in quiet mode)
    ///
    /// For commands whose stdout is a single value meant for capture.
    pub fn progress(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg);
        }
    }

    /// Print a success message to stderr (unless in quiet mode)
    pub fn done(&self, msg: &str) {
        if !self.quiet {
            eprintln!("{}", msg.green());
        }
    }

    /// Print a warning message
    pub fn warn(&self, msg: &str) {
        eprintln!("{}", msg.yellow());
    }

    /// Print data in the configured format
    pub fn print<T: Tabled + Serialize>(&self, data: &[T]) {
        match self.format {
            OutputFormat::Table => {
                if data.is_empty() {
                    if !self.quiet {
                        println!("No data");
                    }
                } else {
                    let table = Table::new(data).to_string();
                    println!("{}", table);
                }
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "[]".to_string())
                );
            }
            OutputFormat::Csv => {
                print_csv(data);
            }
        }
    }

    /// Print a single item in the configured format
    pub fn print_one<T: Tabled + Serialize>(&self, data: &T) {
        match self.format {
            OutputFormat::Table => {
                let table = Table::new([data]).to_string();
                println!("{}", table);
            }
            OutputFormat::Json => {
                println!(
                    "{}",
                    serde_json::to_string_pretty(data).unwrap_or_else(|_| "{}".to_string())
                );
            }
            OutputFormat::Csv => {
                print_csv(&[data]);
            }
        }
    }
}

/// Print data as CSV
fn print_csv<T: Serialize>(data: &[T]) {
    if data.is_empty() {
        return;
    }

    // Get field names from the first item
    let first = serde_json::to_value(&data[0]).unwrap_or_default();
    if let serde_json::Value::Object(map) = &first {
        // Print header
        let headers: Vec<&str> = map.keys().map(|s| s.as_str()).collect();
        println!("{}", headers.join(","));

        // Print rows
        for item in data {
            if let Ok(serde_json::Value::Object(row)) = serde_json::to_value(item) {
                let values: Vec<String> = headers
                    .iter()
                    .map(|h| {
                        row.get(*h)
                            .map(|v| match v {
                                serde_json::Value::String(s) => escape_csv(s),
                                other => escape_csv(&other.to_string()),
                            })
                            .unwrap_or_default()
                    })
                    .collect();
                println!("{}", values.join(","));
            }
        }
    }
}

/// Escape a value for CSV output
fn escape_csv(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// =============================================================================
// Display types for various commands
// =============================================================================

/// Device class display for classes and create_class
#[derive(Debug, Tabled, Serialize)]
pub struct ClassRow {
    #[tabled(rename = "ID")]
    pub class_id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Description")]
    pub description: String,
    #[tabled(rename = "Firmware")]
    pub firmware_id: String,
    #[tabled(rename = "Beta")]
    pub beta_firmware_id: String,
    #[tabled(rename = "Concurrent")]
    pub concurrent: u32,
    #[tabled(rename = "Max fails")]
    pub maxfails: u32,
}

impl From<DeviceClass> for ClassRow {
    fn from(class: DeviceClass) -> Self {
        Self {
            class_id: class.class_id,
            name: class.name,
            description: class.description.unwrap_or_default(),
            firmware_id: class.firmware_id.unwrap_or_default(),
            beta_firmware_id: class.beta_firmware_id.unwrap_or_default(),
            concurrent: class.concurrent,
            maxfails: class.maxfails,
        }
    }
}

/// Firmware display for list_fw
#[derive(Debug, Tabled, Serialize)]
pub struct FirmwareRow {
    #[tabled(rename = "ID")]
    pub firmware_id: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Version")]
    pub version: String,
}

impl From<Firmware> for FirmwareRow {
    fn from(firmware: Firmware) -> Self {
        Self {
            firmware_id: firmware.firmware_id,
            name: firmware.name.unwrap_or_default(),
            version: firmware.version,
        }
    }
}

/// Created device display for create_device
#[derive(Debug, Tabled, Serialize)]
pub struct DeviceRow {
    #[tabled(rename = "ID")]
    pub device_id: String,
    #[tabled(rename = "Serial")]
    pub serialnumber: String,
    #[tabled(rename = "Username")]
    pub username: String,
    #[tabled(rename = "Password")]
    pub password: String,
    #[tabled(rename = "Class")]
    pub class_id: String,
}

impl From<Device> for DeviceRow {
    fn from(device: Device) -> Self {
        Self {
            serialnumber: device.padded_serial(),
            device_id: device.device_id,
            username: device.username,
            password: device.password,
            class_id: device.class_id.unwrap_or_default(),
        }
    }
}

/// Rollout result display for rollout and rollout_id
#[derive(Debug, Tabled, Serialize)]
pub struct RolloutRow {
    #[tabled(rename = "Class ID")]
    pub class_id: String,
    #[tabled(rename = "Class")]
    pub class: String,
    #[tabled(rename = "Previous firmware")]
    pub previous_firmware_id: String,
    #[tabled(rename = "Firmware")]
    pub firmware_id: String,
}

impl From<RolloutReport> for RolloutRow {
    fn from(report: RolloutReport) -> Self {
        Self {
            class_id: report.class.class_id,
            class: report.class.name,
            previous_firmware_id: report.class.firmware_id.unwrap_or_default(),
            firmware_id: report.firmware_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_csv() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_device_row_pads_serial() {
        let row = DeviceRow::from(Device {
            device_id: "d-9".into(),
            serialnumber: 7,
            username: "u9".into(),
            password: "p9".into(),
            device_type: None,
            class_id: Some("c1".into()),
        });
        assert_eq!(row.serialnumber, "000007");
        assert_eq!(row.class_id, "c1");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(
            OutputFormat::from_str("JSON", true).unwrap(),
            OutputFormat::Json
        );
    }
}
