//! Single-slot rendezvous that keeps at most one request on the wire.
//!
//! The transmitter holds [`TurnWait`] and blocks on it after every frame it
//! writes. The reply path holds [`TurnSignal`] and releases the turn when the
//! device has answered.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{trace, warn};

/// Create a connected signal/wait pair with capacity one.
pub(crate) fn turn() -> (TurnSignal, TurnWait) {
    let (tx, rx) = mpsc::sync_channel(1);
    (TurnSignal { tx }, TurnWait { rx })
}

#[derive(Clone)]
pub(crate) struct TurnSignal {
    tx: SyncSender<()>,
}

impl TurnSignal {
    /// Mark the device free for the next request.
    pub(crate) fn release(&self) {
        match self.tx.try_send(()) {
            Ok(()) => trace!("turn released"),
            Err(TrySendError::Full(())) => trace!("turn already released"),
            Err(TrySendError::Disconnected(())) => {}
        }
    }
}

/// How a wait for the turn ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TurnOutcome {
    Released,
    Cancelled,
    /// Every signal handle is gone.
    Abandoned,
}

pub(crate) struct TurnWait {
    rx: Receiver<()>,
}

impl TurnWait {
    /// Forget releases that arrived while no request was on the wire.
    pub(crate) fn begin(&self) {
        while self.rx.try_recv().is_ok() {
            warn!("device replied with no request outstanding");
        }
    }

    /// Block until the turn is released or `cancel` fires, checking the token
    /// every `interval`.
    pub(crate) fn wait(&self, cancel: &CancellationToken, interval: Duration) -> TurnOutcome {
        loop {
            if cancel.is_cancelled() {
                return TurnOutcome::Cancelled;
            }
            match self.rx.recv_timeout(interval) {
                Ok(()) => return TurnOutcome::Released,
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => return TurnOutcome::Abandoned,
            }
        }
    }
}
