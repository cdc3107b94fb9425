use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use halflink_transport::PortInfo;
use serde::Serialize;

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
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

/// Which way a printed packet travelled.
#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PacketKind {
    Reply,
    Push,
}

impl PacketKind {
    fn as_str(self) -> &'static str {
        match self {
            Self::Reply => "reply",
            Self::Push => "push",
        }
    }
}

#[derive(Serialize)]
struct PacketOutput<'a> {
    kind: PacketKind,
    device: &'a str,
    key: u8,
    payload_size: usize,
    payload_hex: String,
    timestamp: String,
}

pub fn print_packet(kind: PacketKind, device: &str, key: u8, payload: &[u8], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = PacketOutput {
                kind,
                device,
                key,
                payload_size: payload.len(),
                payload_hex: hex::encode(payload),
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["KIND", "KEY", "SIZE", "DEVICE", "PAYLOAD"])
                .add_row(vec![
                    kind.as_str().to_string(),
                    format!("0x{key:02X}"),
                    payload.len().to_string(),
                    device.to_string(),
                    hex::encode(payload),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!(
                "{} key=0x{key:02X} size={} device={} payload={}",
                kind.as_str(),
                payload.len(),
                device,
                hex::encode(payload)
            );
        }
        OutputFormat::Raw => print_raw(payload),
    }
}

pub fn print_ports(ports: &[PortInfo], format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(ports).unwrap_or_else(|_| "[]".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["PORT", "DESCRIPTION", "VID:PID", "SERIAL"]);
            for port in ports {
                table.add_row(vec![
                    port.port_name.clone(),
                    port.description.clone(),
                    usb_id(port),
                    port.serial_number.clone().unwrap_or_default(),
                ]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty | OutputFormat::Raw => {
            for port in ports {
                println!("{}\t{}\t{}", port.port_name, port.description, usb_id(port));
            }
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn usb_id(port: &PortInfo) -> String {
    match (port.vid, port.pid) {
        (Some(vid), Some(pid)) => format!("{vid:04x}:{pid:04x}"),
        _ => "-".to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
