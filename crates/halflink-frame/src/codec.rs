use bytes::{BufMut, BytesMut};
use serde::{Deserialize, Serialize};

/// Frame header length in bytes.
pub const HEADER_SIZE: usize = 4;

/// Sentinel header that precedes every packet on the wire.
pub const HEADER: [u8; HEADER_SIZE] = [0xFF; HEADER_SIZE];

/// Default maximum payload size: 64 KiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024;

/// Default number of bytes drained from the device per read.
pub const DEFAULT_READ_CHUNK: usize = 256;

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────────────────┬──────────────────────────────┐
/// │ Header (4B)         │ Payload                      │
/// │ 0xFF 0xFF 0xFF 0xFF │ (codec-owned, no length)     │
/// └─────────────────────┴──────────────────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE + payload.len());
    dst.put_slice(&HEADER);
    dst.put_slice(payload);
}

/// Configuration for frame reading and writing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameConfig {
    /// Maximum outbound payload size in bytes. Default: 64 KiB.
    pub max_payload_size: usize,
    /// Bytes drained from the device per read. Default: 256.
    pub read_chunk_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_chunk_size: DEFAULT_READ_CHUNK,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_prepends_header() {
        let mut buf = BytesMut::new();
        encode_frame(&[0x02, 0x10, 0x00, 0x00, 0x00], &mut buf);

        assert_eq!(buf.len(), HEADER_SIZE + 5);
        assert_eq!(&buf[..HEADER_SIZE], &HEADER);
        assert_eq!(&buf[HEADER_SIZE..], &[0x02, 0x10, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn empty_payload_is_header_only() {
        let mut buf = BytesMut::new();
        encode_frame(b"", &mut buf);
        assert_eq!(buf.as_ref(), &HEADER);
    }

    #[test]
    fn frames_concatenate() {
        let mut buf = BytesMut::new();
        encode_frame(b"a", &mut buf);
        encode_frame(b"b", &mut buf);
        assert_eq!(
            buf.as_ref(),
            &[0xFF, 0xFF, 0xFF, 0xFF, b'a', 0xFF, 0xFF, 0xFF, 0xFF, b'b']
        );
    }
}
