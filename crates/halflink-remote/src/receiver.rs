use std::io::Read;
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, PoisonError};

use halflink_frame::{Dispatcher, FrameReader, ReadOutcome, ReplyCallback};
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::fault::LinkFault;

/// A reply callback to install on the codec from the receive loop.
pub(crate) struct Registration {
    pub key: u8,
    pub callback: ReplyCallback,
    pub ack: oneshot::Sender<halflink_frame::Result<()>>,
}

/// Fault raised from inside a codec callback, picked up after the drain that
/// produced it.
#[derive(Clone, Default)]
pub(crate) struct FaultSlot(Arc<Mutex<Option<LinkFault>>>);

impl FaultSlot {
    pub(crate) fn raise(&self, fault: LinkFault) {
        let mut slot = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        slot.get_or_insert(fault);
    }

    pub(crate) fn is_raised(&self) -> bool {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    pub(crate) fn take(&self) -> Option<LinkFault> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner).take()
    }
}

/// Drain the device through the frame parser into the codec until cancelled.
///
/// Returns the fault when the device stream fails, the codec drops a packet,
/// or a codec callback raised one.
pub(crate) fn run<R: Read, D: Dispatcher + ?Sized>(
    reader: &mut FrameReader<R>,
    dispatcher: &mut D,
    registrations: &Receiver<Registration>,
    raised: &FaultSlot,
    cancel: &CancellationToken,
) -> Result<(), LinkFault> {
    while !cancel.is_cancelled() {
        for registration in registrations.try_iter() {
            let result = dispatcher.register_reply_callback(registration.key, registration.callback);
            debug!(key = registration.key, ok = result.is_ok(), "reply callback registered");
            let _ = registration.ack.send(result);
        }

        match reader.pump(&mut *dispatcher)? {
            ReadOutcome::Idle => trace!("device idle"),
            ReadOutcome::Consumed { bytes, resolved } => {
                trace!(bytes, resolved, "device bytes consumed");
            }
        }

        if let Some(fault) = raised.take() {
            return Err(fault);
        }
    }
    Ok(())
}
