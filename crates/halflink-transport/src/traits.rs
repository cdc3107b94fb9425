use std::io::{Read, Write};
use std::path::PathBuf;
use std::time::Duration;

use tracing::{debug, info};

use crate::config::SerialConfig;
use crate::error::{Result, TransportError};

/// A connected serial device stream; implements Read + Write.
///
/// Reads return `ErrorKind::TimedOut` (serial devices) or
/// `ErrorKind::WouldBlock` (Unix streams) once the read timeout elapses
/// without data.
pub struct SerialStream {
    inner: SerialStreamInner,
    name: String,
}

enum SerialStreamInner {
    Serial(Box<dyn serialport::SerialPort>),
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
}

impl Read for SerialStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Serial(port) => port.read(buf),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for SerialStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            SerialStreamInner::Serial(port) => port.write(buf),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            SerialStreamInner::Serial(port) => port.flush(),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => stream.flush(),
        }
    }
}

impl SerialStream {
    /// Open a serial device (e.g. `/dev/ttyACM0`, `COM3`).
    pub fn open(path: &str, config: &SerialConfig) -> Result<Self> {
        config.validate()?;

        let port = serialport::new(path, config.baud_rate)
            .data_bits(config.serialport_data_bits())
            .parity(config.serialport_parity())
            .stop_bits(config.serialport_stop_bits())
            .flow_control(serialport::FlowControl::None)
            .timeout(config.read_timeout())
            .open()
            .map_err(|source| TransportError::Open {
                path: PathBuf::from(path),
                source,
            })?;

        info!(
            path,
            baud_rate = config.baud_rate,
            read_timeout_ms = config.read_timeout_ms,
            "opened serial device"
        );

        Ok(Self {
            inner: SerialStreamInner::Serial(port),
            name: path.to_string(),
        })
    }

    /// Wrap one end of a Unix stream as a device stream.
    ///
    /// The read timeout from `config` is applied so the stream behaves like a
    /// serial device with respect to idle reads.
    #[cfg(unix)]
    pub fn from_unix(
        stream: std::os::unix::net::UnixStream,
        name: impl Into<String>,
        config: &SerialConfig,
    ) -> Result<Self> {
        config.validate()?;
        stream.set_read_timeout(Some(config.read_timeout()))?;
        stream.set_write_timeout(Some(config.write_timeout()))?;
        let name = name.into();
        debug!(name = %name, "attached unix stream as serial device");
        Ok(Self {
            inner: SerialStreamInner::Unix(stream),
            name,
        })
    }

    /// Create a connected pair of loopback device streams.
    #[cfg(unix)]
    pub fn loopback_pair(config: &SerialConfig) -> Result<(Self, Self)> {
        let (host, device) = std::os::unix::net::UnixStream::pair()?;
        Ok((
            Self::from_unix(host, "loopback-host", config)?,
            Self::from_unix(device, "loopback-device", config)?,
        ))
    }

    /// Set the read timeout on the underlying device.
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        if timeout.is_zero() {
            return Err(TransportError::InvalidConfig(
                "read timeout must be greater than zero".to_string(),
            ));
        }
        match &mut self.inner {
            SerialStreamInner::Serial(port) => port.set_timeout(timeout).map_err(Into::into),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => {
                stream.set_read_timeout(Some(timeout)).map_err(Into::into)
            }
        }
    }

    /// Try to clone this stream (a second handle on the same device).
    ///
    /// The receive and transmit loops each own one handle.
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            SerialStreamInner::Serial(port) => SerialStreamInner::Serial(port.try_clone()?),
            #[cfg(unix)]
            SerialStreamInner::Unix(stream) => SerialStreamInner::Unix(stream.try_clone()?),
        };
        Ok(Self {
            inner,
            name: self.name.clone(),
        })
    }

    /// Device name this stream was opened with.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for SerialStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            SerialStreamInner::Serial(_) => "serial",
            #[cfg(unix)]
            SerialStreamInner::Unix(_) => "unix",
        };
        f.debug_struct("SerialStream")
            .field("type", &kind)
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::io::ErrorKind;

    use super::*;

    fn fast_config() -> SerialConfig {
        SerialConfig::default().with_read_timeout(Duration::from_millis(20))
    }

    #[test]
    fn loopback_pair_carries_bytes_both_ways() {
        let (mut host, mut device) = SerialStream::loopback_pair(&fast_config()).unwrap();

        host.write_all(b"ping").unwrap();
        let mut buf = [0u8; 4];
        device.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"ping");

        device.write_all(b"pong").unwrap();
        host.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"pong");
    }

    #[test]
    fn idle_read_times_out() {
        let (mut host, _device) = SerialStream::loopback_pair(&fast_config()).unwrap();
        let mut buf = [0u8; 1];
        let err = host.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::WouldBlock | ErrorKind::TimedOut
        ));
    }

    #[test]
    fn clone_shares_the_device() {
        let (host, mut device) = SerialStream::loopback_pair(&fast_config()).unwrap();
        let mut writer = host.try_clone().unwrap();
        assert_eq!(writer.name(), "loopback-host");

        writer.write_all(&[0xFF]).unwrap();
        let mut buf = [0u8; 1];
        device.read_exact(&mut buf).unwrap();
        assert_eq!(buf, [0xFF]);
        drop(host);
    }

    #[test]
    fn zero_read_timeout_is_rejected() {
        let (mut host, _device) = SerialStream::loopback_pair(&fast_config()).unwrap();
        assert!(matches!(
            host.set_read_timeout(Duration::ZERO),
            Err(TransportError::InvalidConfig(_))
        ));
    }

    #[test]
    fn open_missing_device_reports_path() {
        let err = SerialStream::open("/dev/halflink-does-not-exist", &SerialConfig::default())
            .unwrap_err();
        match err {
            TransportError::Open { path, .. } => {
                assert_eq!(path, PathBuf::from("/dev/halflink-does-not-exist"))
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
