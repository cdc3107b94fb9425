use std::io::Write;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use halflink_frame::FrameWriter;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::fault::LinkFault;
use crate::message::Request;
use crate::turn::{TurnOutcome, TurnWait};

/// Write queued requests to the device, one turn at a time.
///
/// Returns `Ok(())` when the host side of the queue is gone or the loop is
/// cancelled, and the fault when a write fails.
pub(crate) fn run<W: Write>(
    writer: &mut FrameWriter<W>,
    outbound: &Receiver<Request>,
    turn: &TurnWait,
    cancel: &CancellationToken,
    interval: Duration,
) -> Result<(), LinkFault> {
    while !cancel.is_cancelled() {
        let request = match outbound.recv_timeout(interval) {
            Ok(request) => request,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => {
                debug!("request queue closed");
                return Ok(());
            }
        };

        turn.begin();
        writer.send(&request.payload)?;
        debug!(id = request.id, size = request.payload.len(), "request written");

        match turn.wait(cancel, interval) {
            TurnOutcome::Released => trace!(id = request.id, "turn finished"),
            TurnOutcome::Cancelled => break,
            TurnOutcome::Abandoned => {
                debug!(id = request.id, "reply path closed");
                break;
            }
        }
    }
    Ok(())
}
