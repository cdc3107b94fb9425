use std::path::PathBuf;

/// Errors that can occur in serial transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to open the serial device.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: serialport::Error,
    },

    /// Failed to enumerate serial devices.
    #[error("failed to enumerate serial ports: {0}")]
    Enumerate(serialport::Error),

    /// The line configuration is not usable.
    #[error("invalid serial configuration: {0}")]
    InvalidConfig(String),

    /// An I/O error occurred on the device stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serialport::Error> for TransportError {
    fn from(err: serialport::Error) -> Self {
        TransportError::Io(err.into())
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
