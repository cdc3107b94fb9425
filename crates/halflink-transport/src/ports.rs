use serde::Serialize;

use crate::error::{Result, TransportError};

/// Information about an available serial port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortInfo {
    /// Port name (e.g. "/dev/ttyACM0", "COM3").
    pub port_name: String,
    /// Human-readable description.
    pub description: String,
    /// USB vendor ID if applicable.
    pub vid: Option<u16>,
    /// USB product ID if applicable.
    pub pid: Option<u16>,
    /// Serial number if available.
    pub serial_number: Option<String>,
}

/// List serial ports present on the system.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(|err| {
        tracing::error!(error = %err, "failed to enumerate serial ports");
        TransportError::Enumerate(err)
    })?;

    Ok(ports.iter().map(port_info).collect())
}

fn port_info(port: &serialport::SerialPortInfo) -> PortInfo {
    match &port.port_type {
        serialport::SerialPortType::UsbPort(usb) => PortInfo {
            port_name: port.port_name.clone(),
            description: format!(
                "USB {} {}",
                usb.manufacturer.as_deref().unwrap_or("Device"),
                usb.product.as_deref().unwrap_or("Serial Port")
            ),
            vid: Some(usb.vid),
            pid: Some(usb.pid),
            serial_number: usb.serial_number.clone(),
        },
        other => PortInfo {
            port_name: port.port_name.clone(),
            description: match other {
                serialport::SerialPortType::BluetoothPort => "Bluetooth Serial",
                serialport::SerialPortType::PciPort => "PCI Serial",
                _ => "Serial Port",
            }
            .to_string(),
            vid: None,
            pid: None,
            serial_number: None,
        },
    }
}
