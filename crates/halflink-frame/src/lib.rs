//! Sentinel-header framing for the halflink serial wire.
//!
//! Every frame on the wire is:
//! - A 4-byte header `FF FF FF FF`
//! - Codec-owned payload bytes, with no length field at this layer
//!
//! The packet boundary is decided by the [`Dispatcher`] the bytes are fed to:
//! it reports each byte as loading, resolving or dropping a packet. The
//! [`FrameParser`] re-synchronizes on the header after every packet and on
//! every mismatching header byte.

pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod parser;
pub mod reader;
pub mod writer;

pub use codec::{encode_frame, FrameConfig, DEFAULT_MAX_PAYLOAD, HEADER, HEADER_SIZE};
pub use dispatcher::{Dispatcher, PacketStatus, ReplyCallback};
pub use error::{FrameError, Result};
pub use parser::{FrameParser, ParseEvent};
pub use reader::{FrameReader, ReadOutcome};
pub use writer::FrameWriter;
