/// Errors that can occur while encoding or decoding keyed packets.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyringError {
    /// The reply is shorter than the value it should carry.
    #[error("reply for key {key} too short ({actual} bytes, expected {expected})")]
    ReplyTooShort {
        key: u8,
        expected: usize,
        actual: usize,
    },

    /// The reply carries a value that does not fit the declared return type.
    #[error("reply for key {key} does not fit a {width}-byte value")]
    OutOfRange { key: u8, width: usize },
}

pub type Result<T> = std::result::Result<T, KeyringError>;
