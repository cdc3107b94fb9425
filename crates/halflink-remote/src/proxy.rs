use std::collections::BTreeMap;
use std::future::Future;
use std::mem;
use std::pin::Pin;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};

use bytes::{BufMut, Bytes, BytesMut};
use halflink_frame::{Dispatcher, FrameError};
use halflink_transport::SerialStream;
use tokio::runtime::Handle;
use tokio::sync::{mpsc as async_mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::RemoteConfig;
use crate::error::{RemoteError, Result};
use crate::fault::LinkFault;
use crate::message::{LinkMessage, Request};
use crate::receiver::Registration;
use crate::worker::{self, WorkerChannels, WorkerHandle, WorkerState};

type Slot = oneshot::Sender<std::result::Result<Bytes, LinkFault>>;

/// Host-side handle on a device link.
///
/// Calls are numbered in issuance order and resolved strictly in that order.
/// The first fault reported by the worker poisons the link: every pending
/// call and every later call fails with that fault.
///
/// A `Remote` must be created inside a Tokio runtime; replies are delivered
/// by a task spawned on it. Dropping the `Remote` stops the worker.
pub struct Remote {
    shared: Arc<Shared>,
    outbound: mpsc::Sender<Request>,
    registrations: mpsc::Sender<Registration>,
    worker: WorkerHandle,
    config: RemoteConfig,
    device: String,
}

impl Remote {
    /// Open the serial device at `path` and start the worker.
    pub fn open<D>(path: &str, dispatcher: D, config: RemoteConfig) -> Result<Self>
    where
        D: Dispatcher + 'static,
    {
        let stream = SerialStream::open(path, &config.serial)?;
        Self::with_stream(stream, dispatcher, config)
    }

    /// Start the worker on an already opened device stream.
    pub fn with_stream<D>(stream: SerialStream, dispatcher: D, config: RemoteConfig) -> Result<Self>
    where
        D: Dispatcher + 'static,
    {
        let runtime = Handle::try_current()?;
        let device = stream.name().to_string();

        let (outbound_tx, outbound_rx) = mpsc::channel();
        let (registration_tx, registration_rx) = mpsc::channel();
        let (inbound_tx, inbound_rx) = async_mpsc::unbounded_channel();

        let worker = worker::spawn(
            stream,
            dispatcher,
            &config,
            WorkerChannels {
                outbound: outbound_rx,
                inbound: inbound_tx,
                registrations: registration_rx,
            },
        )?;

        let shared = Arc::new(Shared::new());
        runtime.spawn(deliver(Arc::clone(&shared), inbound_rx));

        info!(
            device = %device,
            reply_key = config.reply_key,
            error_key = ?config.error_key,
            "remote link started"
        );

        Ok(Self {
            shared,
            outbound: outbound_tx,
            registrations: registration_tx,
            worker,
            config,
            device,
        })
    }

    /// Send `key` followed by `payload` to the device.
    ///
    /// The request is queued immediately; the returned [`PendingCall`]
    /// resolves with the reply payload once every earlier call has resolved.
    pub fn call(&self, key: u8, payload: &[u8]) -> PendingCall {
        let mut buf = BytesMut::with_capacity(1 + payload.len());
        buf.put_u8(key);
        buf.put_slice(payload);
        let payload = buf.freeze();

        let mut table = self.shared.lock();
        if let Some(fault) = &table.poison {
            return PendingCall::failed(fault.clone());
        }

        let max = self.config.frame.max_payload_size;
        if payload.len() > max {
            warn!(key, size = payload.len(), max, "request rejected before sending");
            return PendingCall::rejected(RemoteError::Frame(FrameError::PayloadTooLarge {
                size: payload.len(),
                max,
            }));
        }

        let id = table.next_id;
        table.next_id += 1;

        let (slot, rx) = oneshot::channel();
        table.pending.insert(id, slot);

        let size = payload.len();
        if self.outbound.send(Request { id, payload }).is_err() {
            // The worker is gone; the delivery task fails the slot with the
            // fault it relays, or with `Disconnected` once the channel closes.
            debug!(id, key, "worker stopped before request was queued");
        } else {
            debug!(id, key, size, "request queued");
        }

        PendingCall::waiting(id, rx)
    }

    /// Route device packets carrying `key` to `callback`.
    ///
    /// The callback is installed on the codec by the worker and runs on the
    /// worker's receive thread.
    pub async fn register_reply_callback<F>(&self, key: u8, callback: F) -> Result<()>
    where
        F: FnMut(Bytes) + Send + 'static,
    {
        if self.config.is_reserved(key) {
            return Err(RemoteError::ReservedKey(key));
        }
        if let Some(fault) = self.fault() {
            return Err(fault.into());
        }

        let (ack, done) = oneshot::channel();
        let registration = Registration {
            key,
            callback: Box::new(callback),
            ack,
        };
        if self.registrations.send(registration).is_err() {
            return Err(self.fault().unwrap_or(LinkFault::Disconnected).into());
        }

        match done.await {
            Ok(result) => result.map_err(RemoteError::from),
            Err(_) => Err(self.fault().unwrap_or(LinkFault::Disconnected).into()),
        }
    }

    /// Wait until the link is poisoned and return the fault.
    pub async fn closed(&self) -> LinkFault {
        let mut poisoned = self.shared.poisoned.subscribe();
        let fault = match poisoned.wait_for(Option::is_some).await {
            Ok(current) => Option::clone(&current),
            Err(_) => None,
        };
        fault.unwrap_or(LinkFault::Disconnected)
    }

    /// The fault that poisoned this link, if any.
    pub fn fault(&self) -> Option<LinkFault> {
        self.shared.lock().poison.clone()
    }

    pub fn is_poisoned(&self) -> bool {
        self.shared.lock().poison.is_some()
    }

    /// Calls issued but not yet resolved.
    pub fn pending(&self) -> usize {
        self.shared.lock().pending.len()
    }

    pub fn worker_state(&self) -> WorkerState {
        self.worker.state.get()
    }

    /// Device name the link was opened on.
    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    /// Stop the worker and wait for it to finish.
    ///
    /// Calls still pending fail with [`LinkFault::Disconnected`].
    pub async fn shutdown(mut self) -> WorkerState {
        self.worker.cancel.cancel();
        if let Some(thread) = self.worker.thread.take() {
            match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => warn!("worker thread panicked"),
                Err(err) => warn!(error = %err, "failed to join worker thread"),
            }
        }
        let mut table = self.shared.lock();
        self.shared.poison(&mut table, LinkFault::Disconnected);
        drop(table);
        let state = self.worker.state.get();
        info!(device = %self.device, state = %state, "remote link shut down");
        state
    }
}

impl Drop for Remote {
    fn drop(&mut self) {
        self.worker.cancel.cancel();
    }
}

impl std::fmt::Debug for Remote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Remote")
            .field("device", &self.device)
            .field("reply_key", &self.config.reply_key)
            .field("worker_state", &self.worker_state())
            .field("poisoned", &self.is_poisoned())
            .finish()
    }
}

/// A call waiting for its reply.
///
/// Resolves with the reply payload, or with [`RemoteError::Link`] once the
/// link is poisoned. Handles may be awaited in any order.
#[derive(Debug)]
#[must_use = "the reply is lost unless the call is awaited"]
pub struct PendingCall {
    id: Option<u64>,
    rx: oneshot::Receiver<std::result::Result<Bytes, LinkFault>>,
    rejected: Option<RemoteError>,
}

impl PendingCall {
    fn waiting(id: u64, rx: oneshot::Receiver<std::result::Result<Bytes, LinkFault>>) -> Self {
        Self {
            id: Some(id),
            rx,
            rejected: None,
        }
    }

    fn failed(fault: LinkFault) -> Self {
        let (slot, rx) = oneshot::channel();
        let _ = slot.send(Err(fault));
        Self {
            id: None,
            rx,
            rejected: None,
        }
    }

    /// A call refused on the host without touching the link.
    fn rejected(err: RemoteError) -> Self {
        let (_, rx) = oneshot::channel();
        Self {
            id: None,
            rx,
            rejected: Some(err),
        }
    }

    /// Request id, or `None` if the call failed before it was issued.
    pub fn id(&self) -> Option<u64> {
        self.id
    }
}

impl Future for PendingCall {
    type Output = Result<Bytes>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(err) = self.rejected.take() {
            return Poll::Ready(Err(err));
        }
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(Ok(payload))) => Poll::Ready(Ok(payload)),
            Poll::Ready(Ok(Err(fault))) => Poll::Ready(Err(RemoteError::Link(fault))),
            Poll::Ready(Err(_)) => Poll::Ready(Err(RemoteError::Link(LinkFault::Disconnected))),
            Poll::Pending => Poll::Pending,
        }
    }
}

struct Shared {
    table: Mutex<CallTable>,
    poisoned: watch::Sender<Option<LinkFault>>,
}

impl Shared {
    fn new() -> Self {
        let (poisoned, _) = watch::channel(None);
        Self {
            table: Mutex::new(CallTable::default()),
            poisoned,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CallTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Poison the table and wake anyone waiting in [`Remote::closed`].
    fn poison(&self, table: &mut CallTable, fault: LinkFault) {
        let fault = table.poison_with(fault);
        self.poisoned.send_if_modified(|current| {
            if current.is_none() {
                *current = Some(fault);
                true
            } else {
                false
            }
        });
    }
}

#[derive(Default)]
struct CallTable {
    next_id: u64,
    pending: BTreeMap<u64, Slot>,
    poison: Option<LinkFault>,
}

impl CallTable {
    /// Hand `payload` to the oldest pending call.
    fn resolve_oldest(&mut self, payload: Bytes) {
        match self.pending.pop_first() {
            Some((id, slot)) => {
                debug!(id, size = payload.len(), "reply delivered");
                if slot.send(Ok(payload)).is_err() {
                    debug!(id, "caller dropped pending call");
                }
            }
            None => warn!(size = payload.len(), "reply with no pending call discarded"),
        }
    }

    /// Poison the link (keeping an earlier fault) and fail every pending call.
    ///
    /// Returns the fault the link is poisoned with.
    fn poison_with(&mut self, fault: LinkFault) -> LinkFault {
        let fault = match &self.poison {
            Some(existing) => existing.clone(),
            None => {
                warn!(fault = %fault, pending = self.pending.len(), "link poisoned");
                self.poison = Some(fault.clone());
                fault
            }
        };
        for (id, slot) in mem::take(&mut self.pending) {
            debug!(id, "pending call failed");
            let _ = slot.send(Err(fault.clone()));
        }
        fault
    }
}

/// Apply worker messages to the call table until the worker is gone.
async fn deliver(shared: Arc<Shared>, mut inbound: async_mpsc::UnboundedReceiver<LinkMessage>) {
    while let Some(message) = inbound.recv().await {
        let mut table = shared.lock();
        match message {
            LinkMessage::Reply(payload) => table.resolve_oldest(payload),
            LinkMessage::Fault(fault) => shared.poison(&mut table, fault),
        }
    }
    let mut table = shared.lock();
    shared.poison(&mut table, LinkFault::Disconnected);
    drop(table);
    debug!("reply delivery finished");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with_pending(n: u64) -> (CallTable, Vec<PendingCall>) {
        let mut table = CallTable::default();
        let calls = (0..n)
            .map(|_| {
                let id = table.next_id;
                table.next_id += 1;
                let (slot, rx) = oneshot::channel();
                table.pending.insert(id, slot);
                PendingCall::waiting(id, rx)
            })
            .collect();
        (table, calls)
    }

    #[tokio::test]
    async fn replies_go_to_oldest_call() {
        let (mut table, mut calls) = table_with_pending(2);
        table.resolve_oldest(Bytes::from_static(b"first"));
        table.resolve_oldest(Bytes::from_static(b"second"));

        let second = calls.pop().unwrap();
        let first = calls.pop().unwrap();
        assert_eq!(second.await.unwrap().as_ref(), b"second");
        assert_eq!(first.await.unwrap().as_ref(), b"first");
    }

    #[tokio::test]
    async fn poison_fails_pending_and_keeps_first_fault() {
        let (mut table, calls) = table_with_pending(2);
        table.poison_with(LinkFault::CorruptedPacket);
        table.poison_with(LinkFault::Disconnected);

        assert_eq!(table.poison, Some(LinkFault::CorruptedPacket));
        assert!(table.pending.is_empty());
        for call in calls {
            let err = call.await.unwrap_err();
            assert_eq!(err.fault(), Some(&LinkFault::CorruptedPacket));
        }
    }

    #[test]
    fn stray_reply_is_discarded() {
        let mut table = CallTable::default();
        table.resolve_oldest(Bytes::from_static(b"late"));
        assert!(table.pending.is_empty());
        assert!(table.poison.is_none());
    }

    #[tokio::test]
    async fn failed_call_has_no_id() {
        let call = PendingCall::failed(LinkFault::Disconnected);
        assert_eq!(call.id(), None);
        assert!(matches!(
            call.await,
            Err(RemoteError::Link(LinkFault::Disconnected))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn construction_requires_runtime() {
        let config = halflink_transport::SerialConfig::default();
        let (host, _device) = SerialStream::loopback_pair(&config).unwrap();
        let dispatcher = halflink_keyring::KeyringDispatcher::new(
            halflink_keyring::Keyring::new().with(0, "reply", 8),
        );
        let err = Remote::with_stream(host, dispatcher, RemoteConfig::default()).unwrap_err();
        assert!(matches!(err, RemoteError::NoRuntime(_)));
    }
}
