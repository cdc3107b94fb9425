use std::marker::PhantomData;

use bytes::{Bytes, BytesMut};

use crate::dispatcher::ActionHandler;
use crate::error::{KeyringError, Result};
use crate::wire::WireValue;

/// A typed remote procedure: one argument of type `A`, a result of type `R`.
///
/// The request payload is the encoded argument (the key is sent separately
/// by the caller). The reply carries the result widened to the reply slot's
/// width.
pub struct Procedure<A, R> {
    key: u8,
    name: &'static str,
    _marker: PhantomData<fn(A) -> R>,
}

impl<A, R> Clone for Procedure<A, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A, R> Copy for Procedure<A, R> {}

impl<A, R> std::fmt::Debug for Procedure<A, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Procedure")
            .field("key", &self.key)
            .field("name", &self.name)
            .finish()
    }
}

impl<A: WireValue, R: WireValue> Procedure<A, R> {
    pub const fn new(key: u8, name: &'static str) -> Self {
        Self {
            key,
            name,
            _marker: PhantomData,
        }
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Argument bytes that follow the key.
    pub fn arg_size(&self) -> usize {
        A::SIZE
    }

    /// Encode the request payload for `arg`.
    pub fn encode(&self, arg: A) -> Bytes {
        let mut buf = BytesMut::with_capacity(A::SIZE);
        arg.put(&mut buf);
        buf.freeze()
    }

    /// Decode the result from a reply payload.
    ///
    /// Bytes beyond `R::SIZE` must be the sign or zero extension of the value.
    pub fn decode(&self, reply: &[u8]) -> Result<R> {
        let value = R::get(reply).ok_or(KeyringError::ReplyTooShort {
            key: self.key,
            expected: R::SIZE,
            actual: reply.len(),
        })?;

        let fill = if value.is_negative() { 0xFF } else { 0x00 };
        if reply[R::SIZE..].iter().any(|&b| b != fill) {
            return Err(KeyringError::OutOfRange {
                key: self.key,
                width: R::SIZE,
            });
        }
        Ok(value)
    }

    /// Device-side handler: decode the argument, run `f`, and encode its
    /// result widened to `reply_width` bytes.
    pub fn action<F>(&self, reply_width: usize, mut f: F) -> ActionHandler
    where
        F: FnMut(A) -> R + Send + 'static,
    {
        Box::new(move |args: &[u8]| match A::get(args) {
            Some(arg) => {
                let mut out = BytesMut::with_capacity(reply_width.max(R::SIZE));
                f(arg).put_extended(reply_width, &mut out);
                out.to_vec()
            }
            None => Vec::new(),
        })
    }
}
