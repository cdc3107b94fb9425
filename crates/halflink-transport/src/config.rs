use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// Line speed expected by the remote device.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Read timeout that keeps the receive loop responsive.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Parity setting for the serial line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Serial line configuration.
///
/// The defaults are the parameters the device firmware is built for; only the
/// timeouts are meant to be tuned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    /// Baud rate. Default: 115200.
    pub baud_rate: u32,
    /// Data bits per character (5-8). Default: 8.
    pub data_bits: u8,
    /// Parity. Default: none.
    pub parity: Parity,
    /// Stop bits (1 or 2). Default: 1.
    pub stop_bits: u8,
    /// Read timeout in milliseconds. Default: 500.
    pub read_timeout_ms: u64,
    /// Write timeout in milliseconds. `None` uses the read timeout.
    pub write_timeout_ms: Option<u64>,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            data_bits: 8,
            parity: Parity::None,
            stop_bits: 1,
            read_timeout_ms: DEFAULT_READ_TIMEOUT.as_millis() as u64,
            write_timeout_ms: None,
        }
    }
}

impl SerialConfig {
    /// Read timeout as a `Duration`.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Write timeout as a `Duration`.
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms.unwrap_or(self.read_timeout_ms))
    }

    /// Override the read timeout.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Check the configuration before opening a device.
    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(TransportError::InvalidConfig(
                "baud rate must be greater than zero".to_string(),
            ));
        }
        if !(5..=8).contains(&self.data_bits) {
            return Err(TransportError::InvalidConfig(format!(
                "invalid data bits: {}",
                self.data_bits
            )));
        }
        if !(1..=2).contains(&self.stop_bits) {
            return Err(TransportError::InvalidConfig(format!(
                "invalid stop bits: {}",
                self.stop_bits
            )));
        }
        if self.read_timeout_ms == 0 {
            return Err(TransportError::InvalidConfig(
                "read timeout must be greater than zero".to_string(),
            ));
        }
        if self.write_timeout_ms == Some(0) {
            return Err(TransportError::InvalidConfig(
                "write timeout must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn serialport_data_bits(&self) -> serialport::DataBits {
        match self.data_bits {
            5 => serialport::DataBits::Five,
            6 => serialport::DataBits::Six,
            7 => serialport::DataBits::Seven,
            _ => serialport::DataBits::Eight,
        }
    }

    pub(crate) fn serialport_stop_bits(&self) -> serialport::StopBits {
        match self.stop_bits {
            2 => serialport::StopBits::Two,
            _ => serialport::StopBits::One,
        }
    }

    pub(crate) fn serialport_parity(&self) -> serialport::Parity {
        match self.parity {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }
}
