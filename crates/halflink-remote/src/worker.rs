use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use halflink_frame::{Dispatcher, FrameReader, FrameWriter, ReplyCallback};
use halflink_transport::SerialStream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::RemoteConfig;
use crate::error::{RemoteError, Result};
use crate::fault::LinkFault;
use crate::message::{LinkMessage, Request};
use crate::receiver::{self, FaultSlot, Registration};
use crate::transmitter;
use crate::turn::{turn, TurnSignal, TurnWait};

/// Lifecycle of the worker that owns the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerState {
    /// Set up, loops not yet running.
    Starting,
    /// Both loops are alive.
    Running,
    /// A loop failed; the fault is being relayed.
    Faulted,
    /// Both loops have stopped.
    Terminated,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Starting,
            1 => Self::Running,
            2 => Self::Faulted,
            _ => Self::Terminated,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Self::Terminated
    }
}

impl fmt::Display for WorkerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Faulted => "faulted",
            Self::Terminated => "terminated",
        };
        f.write_str(name)
    }
}

/// Worker state shared between the supervisor and the host.
#[derive(Debug, Clone)]
pub(crate) struct StateCell(Arc<AtomicU8>);

impl StateCell {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(WorkerState::Starting as u8)))
    }

    pub(crate) fn get(&self) -> WorkerState {
        WorkerState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, state: WorkerState) {
        let previous = WorkerState::from_u8(self.0.swap(state as u8, Ordering::AcqRel));
        if previous != state {
            debug!(from = %previous, to = %state, "worker state changed");
        }
    }
}

/// Host-side view of a running worker.
pub(crate) struct WorkerHandle {
    pub thread: Option<JoinHandle<()>>,
    pub state: StateCell,
    pub cancel: CancellationToken,
}

/// Channel endpoints the worker owns.
pub(crate) struct WorkerChannels {
    pub outbound: Receiver<Request>,
    pub inbound: UnboundedSender<LinkMessage>,
    pub registrations: Receiver<Registration>,
}

#[derive(Debug, Clone, Copy)]
enum Side {
    Transmitter,
    Receiver,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Transmitter => "transmitter",
            Self::Receiver => "receiver",
        })
    }
}

/// Everything the supervisor thread takes ownership of.
struct Parts<D> {
    reader: FrameReader<SerialStream>,
    writer: FrameWriter<SerialStream>,
    dispatcher: D,
    turn: TurnWait,
    raised: FaultSlot,
    channels: WorkerChannels,
    interval: Duration,
}

/// Install the host callbacks on the codec and start the supervisor thread.
pub(crate) fn spawn<D>(
    stream: SerialStream,
    mut dispatcher: D,
    config: &RemoteConfig,
    channels: WorkerChannels,
) -> Result<WorkerHandle>
where
    D: Dispatcher + 'static,
{
    let (signal, wait) = turn();
    let raised = FaultSlot::default();

    dispatcher.register_reply_callback(
        config.reply_key,
        reply_callback(channels.inbound.clone(), signal, raised.clone()),
    )?;
    if let Some(error_key) = config.error_key {
        dispatcher.register_reply_callback(error_key, error_callback(raised.clone()))?;
    }

    let writer_stream = stream.try_clone()?;
    let device = stream.name().to_string();
    let parts = Parts {
        reader: FrameReader::with_config(stream, config.frame.clone()),
        writer: FrameWriter::with_config(writer_stream, config.frame.clone()),
        dispatcher,
        turn: wait,
        raised,
        channels,
        interval: config.poll_interval(),
    };

    let state = StateCell::new();
    let cancel = CancellationToken::new();
    let thread = {
        let state = state.clone();
        let cancel = cancel.clone();
        thread::Builder::new()
            .name(format!("halflink-worker:{device}"))
            .spawn(move || supervise(parts, &state, &cancel))
            .map_err(RemoteError::WorkerSpawn)?
    };

    Ok(WorkerHandle {
        thread: Some(thread),
        state,
        cancel,
    })
}

/// Forwards host replies and frees the turn. Replies resolved after a device
/// error in the same read are dropped; the link is already failing.
fn reply_callback(
    inbound: UnboundedSender<LinkMessage>,
    signal: TurnSignal,
    raised: FaultSlot,
) -> ReplyCallback {
    Box::new(move |payload| {
        if raised.is_raised() {
            debug!(size = payload.len(), "reply after device error dropped");
            return;
        }
        debug!(size = payload.len(), "reply received");
        let _ = inbound.send(LinkMessage::Reply(payload));
        signal.release();
    })
}

/// Raises the device's error report. The turn stays held: the supervisor's
/// cancellation is what stops the transmitter.
fn error_callback(raised: FaultSlot) -> ReplyCallback {
    Box::new(move |payload| {
        error!(size = payload.len(), "device reported an error");
        raised.raise(LinkFault::Device {
            payload: payload.to_vec(),
        });
    })
}

/// Run both loops; the first one to stop takes the other down with it.
fn supervise<D: Dispatcher>(parts: Parts<D>, state: &StateCell, cancel: &CancellationToken) {
    let Parts {
        mut reader,
        mut writer,
        mut dispatcher,
        turn,
        raised,
        channels,
        interval,
    } = parts;
    let WorkerChannels {
        outbound,
        inbound,
        registrations,
    } = channels;

    state.set(WorkerState::Running);
    info!("worker running");

    let (exit_tx, exit_rx) = mpsc::channel::<(Side, std::result::Result<(), LinkFault>)>();

    let fault = thread::scope(|scope| {
        {
            let exit_tx = exit_tx.clone();
            scope.spawn(move || {
                let result = guarded(|| {
                    transmitter::run(&mut writer, &outbound, &turn, cancel, interval)
                });
                let _ = exit_tx.send((Side::Transmitter, result));
            });
        }
        {
            let exit_tx = exit_tx.clone();
            scope.spawn(move || {
                let result = guarded(|| {
                    receiver::run(&mut reader, &mut dispatcher, &registrations, &raised, cancel)
                });
                // Drop the codec (and the callbacks holding the turn signal)
                // before reporting.
                drop(dispatcher);
                let _ = exit_tx.send((Side::Receiver, result));
            });
        }
        drop(exit_tx);

        let mut fault = None;
        for (side, result) in exit_rx.iter() {
            cancel.cancel();
            match result {
                Ok(()) => debug!(side = %side, "loop stopped"),
                Err(err) if fault.is_none() => {
                    error!(side = %side, fault = %err, "loop failed");
                    state.set(WorkerState::Faulted);
                    fault = Some(err);
                }
                Err(err) => debug!(side = %side, fault = %err, "loop failed after link fault"),
            }
        }
        fault
    });

    if let Some(fault) = fault {
        if inbound.send(LinkMessage::Fault(fault)).is_err() {
            debug!("host gone before fault relay");
        }
    }

    state.set(WorkerState::Terminated);
    info!("worker terminated");
}

fn guarded<F>(f: F) -> std::result::Result<(), LinkFault>
where
    F: FnOnce() -> std::result::Result<(), LinkFault>,
{
    panic::catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|panic| {
        Err(LinkFault::WorkerPanicked {
            message: panic_message(panic.as_ref()),
        })
    })
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
