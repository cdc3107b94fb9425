use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use halflink_frame::{Dispatcher, FrameError, PacketStatus, ReplyCallback};
use tracing::{debug, trace};

use crate::keyring::Keyring;

/// Handler run when a packet resolves; the returned bytes are its response.
pub type ActionHandler = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send + 'static>;

/// Incremental decoder for keyed fixed-width packets.
///
/// The first byte of a packet selects a [`Slot`](crate::Slot); an undeclared
/// key drops the packet. Once the declared argument bytes have arrived the
/// packet resolves and the key's handler runs. A non-empty handler result is
/// kept as pending output until read with [`take_pending`](Self::take_pending)
/// or discarded.
pub struct KeyringDispatcher {
    keyring: Keyring,
    handlers: HashMap<u8, ActionHandler>,
    key: Option<u8>,
    args: BytesMut,
    output: BytesMut,
}

impl KeyringDispatcher {
    pub fn new(keyring: Keyring) -> Self {
        Self {
            keyring,
            handlers: HashMap::new(),
            key: None,
            args: BytesMut::new(),
            output: BytesMut::new(),
        }
    }

    /// Install a handler that produces a response for `key`.
    pub fn with_action(mut self, key: u8, handler: ActionHandler) -> Self {
        if let Err(err) = self.set_action(key, handler) {
            debug!(key, error = %err, "action ignored");
        }
        self
    }

    /// Install a handler that produces a response for `key`.
    pub fn set_action(&mut self, key: u8, handler: ActionHandler) -> halflink_frame::Result<()> {
        if !self.keyring.contains(key) {
            return Err(FrameError::UnknownKey(key));
        }
        self.handlers.insert(key, handler);
        Ok(())
    }

    /// Take the response left by the last resolved packet, if any.
    pub fn take_pending(&mut self) -> Option<Bytes> {
        if self.output.is_empty() {
            None
        } else {
            Some(self.output.split().freeze())
        }
    }

    pub fn keyring(&self) -> &Keyring {
        &self.keyring
    }

    fn resolve(&mut self, key: u8) -> PacketStatus {
        self.key = None;
        self.output.clear();
        let args = self.args.split().freeze();

        match self.handlers.get_mut(&key) {
            Some(handler) => {
                let response = handler(&args[..]);
                self.output.extend_from_slice(&response);
            }
            None => trace!(key, "no handler for resolved packet"),
        }
        PacketStatus::Resolved
    }
}

impl Dispatcher for KeyringDispatcher {
    fn put(&mut self, byte: u8) -> PacketStatus {
        let key = match self.key {
            Some(key) => {
                self.args.extend_from_slice(&[byte]);
                key
            }
            None => {
                if !self.keyring.contains(byte) {
                    debug!(key = byte, "undeclared packet key");
                    return PacketStatus::Dropped;
                }
                self.key = Some(byte);
                self.args.clear();
                byte
            }
        };

        let arg_size = self.keyring.get(key).map_or(0, |slot| slot.arg_size);
        if self.args.len() >= arg_size {
            self.resolve(key)
        } else {
            PacketStatus::Loading
        }
    }

    fn is_loaded(&self) -> bool {
        !self.output.is_empty()
    }

    fn discard_pending(&mut self) {
        self.output.clear();
    }

    fn register_reply_callback(
        &mut self,
        key: u8,
        mut callback: ReplyCallback,
    ) -> halflink_frame::Result<()> {
        self.set_action(
            key,
            Box::new(move |args: &[u8]| {
                callback(Bytes::copy_from_slice(args));
                Vec::new()
            }),
        )
    }
}

impl std::fmt::Debug for KeyringDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyringDispatcher")
            .field("keyring", &self.keyring)
            .field("handlers", &self.handlers.len())
            .field("key", &self.key)
            .field("pending_output", &self.output.len())
            .finish()
    }
}
