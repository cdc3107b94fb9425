use tracing::{trace, warn};

use crate::codec::{HEADER, HEADER_SIZE};
use crate::dispatcher::{Dispatcher, PacketStatus};
use crate::error::{FrameError, Result};

/// What a single byte did to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseEvent {
    /// The byte was consumed while matching the header.
    Header,
    /// The byte was handed to the dispatcher; the packet is incomplete.
    Loading,
    /// A packet resolved on this byte.
    Resolved,
    /// A packet resolved but left output behind, which was discarded.
    ResolvedDiscarded,
}

/// Locates packets in a raw byte stream.
///
/// Header matching is a countdown: each byte matching the next header byte
/// decrements it, any mismatch resets it to the full header length. Once the
/// countdown reaches zero every byte goes to the dispatcher until it reports
/// the packet resolved or dropped, after which the header is awaited again.
#[derive(Debug, Clone)]
pub struct FrameParser {
    remaining: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    pub fn new() -> Self {
        Self {
            remaining: HEADER_SIZE,
        }
    }

    /// True once a full header has been matched and packet bytes are expected.
    pub fn is_synchronized(&self) -> bool {
        self.remaining == 0
    }

    /// Header bytes still to be matched.
    pub fn header_remaining(&self) -> usize {
        self.remaining
    }

    /// Forget any partial header or packet position.
    pub fn reset(&mut self) {
        self.remaining = HEADER_SIZE;
    }

    /// Feed one byte from the device.
    ///
    /// Returns [`FrameError::CorruptedPacket`] when the dispatcher drops the
    /// packet. Output left behind by a resolved packet is an unsolicited
    /// request this layer cannot answer; it is discarded with a warning.
    pub fn feed<D: Dispatcher + ?Sized>(
        &mut self,
        byte: u8,
        dispatcher: &mut D,
    ) -> Result<ParseEvent> {
        if self.remaining > 0 {
            let expected = HEADER[HEADER_SIZE - self.remaining];
            if byte == expected {
                self.remaining -= 1;
            } else {
                self.remaining = HEADER_SIZE;
            }
            return Ok(ParseEvent::Header);
        }

        match dispatcher.put(byte) {
            PacketStatus::Loading => Ok(ParseEvent::Loading),
            PacketStatus::Resolved => {
                self.reset();
                if dispatcher.is_loaded() {
                    warn!("device request would produce a non-empty response, which is not supported; discarding it");
                    dispatcher.discard_pending();
                    return Ok(ParseEvent::ResolvedDiscarded);
                }
                trace!("packet resolved");
                Ok(ParseEvent::Resolved)
            }
            PacketStatus::Dropped => {
                self.reset();
                Err(FrameError::CorruptedPacket)
            }
        }
    }
}
