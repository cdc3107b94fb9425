/// Errors that can occur while framing or dispatching packets.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The dispatcher rejected the packet following a header.
    #[error("corrupted packet received")]
    CorruptedPacket,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The dispatcher has no packet declared under this key.
    #[error("unknown packet key {0}")]
    UnknownKey(u8),

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The device stream reached end of file.
    #[error("connection closed")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
