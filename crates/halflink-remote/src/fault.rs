use std::io;

use halflink_frame::FrameError;
use serde::{Deserialize, Serialize};

/// A link-wide failure reported by the worker.
///
/// Once a [`Remote`](crate::Remote) receives a fault it keeps it: every
/// pending and every later call fails with a clone of the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(tag = "fault", rename_all = "snake_case")]
pub enum LinkFault {
    /// Reading from or writing to the device failed.
    #[error("device I/O failed ({kind}): {message}")]
    Io { kind: String, message: String },

    /// The codec dropped a packet following a header.
    #[error("corrupted packet received from device")]
    CorruptedPacket,

    /// The device stream or the worker went away.
    #[error("link disconnected")]
    Disconnected,

    /// The device answered with its error key.
    #[error("device reported an error ({} bytes)", .payload.len())]
    Device { payload: Vec<u8> },

    /// A worker loop panicked.
    #[error("worker panicked: {message}")]
    WorkerPanicked { message: String },
}

impl LinkFault {
    /// Whether the fault came from the device side rather than the host.
    pub fn is_device_error(&self) -> bool {
        matches!(self, Self::Device { .. })
    }
}

impl From<io::Error> for LinkFault {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted => Self::Disconnected,
            kind => Self::Io {
                kind: kind.to_string(),
                message: err.to_string(),
            },
        }
    }
}

impl From<FrameError> for LinkFault {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::CorruptedPacket => Self::CorruptedPacket,
            FrameError::ConnectionClosed => Self::Disconnected,
            FrameError::Io(err) => err.into(),
            other => Self::Io {
                kind: "other".to_string(),
                message: other.to_string(),
            },
        }
    }
}
