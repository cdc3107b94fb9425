use crate::fault::LinkFault;

/// Errors that can occur in remote link operations.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Opening or configuring the device failed.
    #[error("transport error: {0}")]
    Transport(#[from] halflink_transport::TransportError),

    /// The codec rejected a setup request.
    #[error("frame error: {0}")]
    Frame(#[from] halflink_frame::FrameError),

    /// The link is poisoned by this fault.
    #[error("link fault: {0}")]
    Link(#[from] LinkFault),

    /// Construction needs a Tokio runtime to deliver replies on.
    #[error("no tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// The key is reserved for replies addressed to the host.
    #[error("key {0} is reserved for host replies")]
    ReservedKey(u8),

    /// The worker thread could not be started.
    #[error("failed to spawn worker: {0}")]
    WorkerSpawn(#[source] std::io::Error),
}

impl RemoteError {
    /// The link fault behind this error, if any.
    pub fn fault(&self) -> Option<&LinkFault> {
        match self {
            Self::Link(fault) => Some(fault),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, RemoteError>;
