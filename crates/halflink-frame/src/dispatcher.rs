use bytes::Bytes;

use crate::error::Result;

/// Callback invoked with the payload of a resolved packet.
pub type ReplyCallback = Box<dyn FnMut(Bytes) + Send + 'static>;

/// Outcome of feeding one byte to a [`Dispatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketStatus {
    /// The packet is incomplete.
    Loading,
    /// A packet completed on this byte and its handler ran.
    Resolved,
    /// The packet is malformed and was thrown away.
    Dropped,
}

/// Incremental packet decoder fed one byte at a time.
///
/// Implementations own the application payload format. Handlers registered
/// with [`register_reply_callback`](Dispatcher::register_reply_callback) run
/// from inside [`put`](Dispatcher::put) when their packet resolves.
pub trait Dispatcher: Send {
    /// Feed one byte of packet data.
    fn put(&mut self, byte: u8) -> PacketStatus;

    /// Whether the last resolved packet left output waiting to be read.
    fn is_loaded(&self) -> bool;

    /// Drop any output left by the last resolved packet.
    fn discard_pending(&mut self);

    /// Route packets carrying `key` to `callback`, replacing any handler.
    fn register_reply_callback(&mut self, key: u8, callback: ReplyCallback) -> Result<()>;
}

impl<D: Dispatcher + ?Sized> Dispatcher for Box<D> {
    fn put(&mut self, byte: u8) -> PacketStatus {
        (**self).put(byte)
    }

    fn is_loaded(&self) -> bool {
        (**self).is_loaded()
    }

    fn discard_pending(&mut self) {
        (**self).discard_pending()
    }

    fn register_reply_callback(&mut self, key: u8, callback: ReplyCallback) -> Result<()> {
        (**self).register_reply_callback(key, callback)
    }
}
