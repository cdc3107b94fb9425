//! Keyed fixed-width packet codec for halflink devices.
//!
//! A packet is a one-byte key followed by the argument bytes declared for
//! that key in a [`Keyring`]. Integers travel little-endian in two's
//! complement. [`KeyringDispatcher`] implements the
//! [`Dispatcher`](halflink_frame::Dispatcher) contract over a keyring, and
//! [`Procedure`] encodes typed calls and decodes their replies.
//!
//! This crate is optional: any [`Dispatcher`](halflink_frame::Dispatcher)
//! implementation can be plugged into a halflink remote instead.

pub mod dispatcher;
pub mod error;
pub mod keyring;
pub mod procedure;
pub mod wire;

pub use dispatcher::{ActionHandler, KeyringDispatcher};
pub use error::{KeyringError, Result};
pub use keyring::{Keyring, Slot};
pub use procedure::Procedure;
pub use wire::WireValue;
