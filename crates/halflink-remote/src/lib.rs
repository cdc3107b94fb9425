//! Request/reply link to a half-duplex serial device.
//!
//! A [`Remote`] is the host-side proxy. It numbers every call, queues the
//! request for a worker thread that owns the device, and resolves calls in
//! the order they were issued.
//!
//! The worker runs two loops over the same device. The transmitter writes
//! one framed request at a time and waits for its turn to be released. The
//! receiver drains the device through the frame parser into the codec, whose
//! host-reply callback forwards the reply and releases the turn. The first
//! loop to fail stops the other, and its [`LinkFault`] poisons the
//! [`Remote`] for good.

pub mod config;
pub mod error;
pub mod fault;
pub mod message;
pub mod proxy;
mod receiver;
mod transmitter;
mod turn;
pub mod worker;

pub use config::{RemoteConfig, DEFAULT_POLL_INTERVAL};
pub use error::{RemoteError, Result};
pub use fault::LinkFault;
pub use message::{LinkMessage, Request};
pub use proxy::{PendingCall, Remote};
pub use worker::WorkerState;
