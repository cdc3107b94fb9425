use bytes::Bytes;

use crate::fault::LinkFault;

/// A request on its way to the worker.
#[derive(Debug, Clone)]
pub struct Request {
    /// Issuance order; strictly increasing per link, starting at 0.
    pub id: u64,
    /// Codec-owned packet bytes (key first) written after the header.
    pub payload: Bytes,
}

/// What the worker sends back to the host.
///
/// Success and failure are distinguished by variant, never by payload shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkMessage {
    /// A reply addressed to the host.
    Reply(Bytes),
    /// The link failed; no further messages follow.
    Fault(LinkFault),
}
