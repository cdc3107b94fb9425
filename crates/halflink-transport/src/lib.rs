//! Serial device transport for halflink.
//!
//! This is the lowest layer of halflink. It opens the device with the fixed
//! line parameters the remote side expects (115200 baud, 8 data bits, no
//! parity, 1 stop bit) and a short read timeout, and hands back a
//! [`SerialStream`] that implements `Read + Write`.
//!
//! On Unix a [`SerialStream`] can also wrap one end of a `UnixStream` pair,
//! which is how loopback devices and test doubles are attached.

pub mod config;
pub mod error;
pub mod ports;
pub mod traits;

pub use config::{Parity, SerialConfig, DEFAULT_BAUD_RATE, DEFAULT_READ_TIMEOUT};
pub use error::{Result, TransportError};
pub use ports::{list_ports, PortInfo};
pub use traits::SerialStream;
