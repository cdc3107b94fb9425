use std::io::{ErrorKind, Read};

use crate::codec::FrameConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{FrameError, Result};
use crate::parser::{FrameParser, ParseEvent};

/// Result of one drain of the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// The read timed out without data.
    Idle,
    /// Bytes were read and fed through the parser.
    Consumed {
        /// Bytes read from the device.
        bytes: usize,
        /// Packets resolved by those bytes.
        resolved: usize,
    },
}

/// Drains a device stream into a [`FrameParser`] and a [`Dispatcher`].
///
/// Read timeouts are reported as [`ReadOutcome::Idle`] so the caller can
/// check for cancellation between reads.
pub struct FrameReader<T> {
    inner: T,
    parser: FrameParser,
    chunk: Vec<u8>,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            parser: FrameParser::new(),
            chunk: vec![0u8; config.read_chunk_size.max(1)],
        }
    }

    /// Read whatever the device has (blocking up to its read timeout) and feed
    /// every byte through the parser.
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached and
    /// `Err(FrameError::CorruptedPacket)` when the dispatcher drops a packet.
    pub fn pump<D: Dispatcher + ?Sized>(&mut self, dispatcher: &mut D) -> Result<ReadOutcome> {
        let read = loop {
            match self.inner.read(&mut self.chunk) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => break n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Ok(ReadOutcome::Idle)
                }
                Err(err) => return Err(FrameError::Io(err)),
            }
        };

        let mut resolved = 0usize;
        for &byte in &self.chunk[..read] {
            match self.parser.feed(byte, &mut *dispatcher)? {
                ParseEvent::Resolved | ParseEvent::ResolvedDiscarded => resolved += 1,
                ParseEvent::Header | ParseEvent::Loading => {}
            }
        }

        Ok(ReadOutcome::Consumed {
            bytes: read,
            resolved,
        })
    }

    /// The parser's current header-matching state.
    pub fn parser(&self) -> &FrameParser {
        &self.parser
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::HEADER;
    use crate::dispatcher::mock::{FixedLength, BAD_KEY};

    fn wire(frames: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        for payload in frames {
            out.extend_from_slice(&HEADER);
            out.extend_from_slice(payload);
        }
        out
    }

    #[test]
    fn pump_resolves_packets_in_one_read() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[b"\x01ab", b"\x02cd"])));
        let mut dispatcher = FixedLength::new(3);

        let outcome = reader.pump(&mut dispatcher).unwrap();

        assert_eq!(
            outcome,
            ReadOutcome::Consumed {
                bytes: 14,
                resolved: 2
            }
        );
        assert_eq!(
            dispatcher.packets,
            vec![b"\x01ab".to_vec(), b"\x02cd".to_vec()]
        );
    }

    #[test]
    fn packet_split_across_reads() {
        let bytes = wire(&[b"\x05xyz"]);
        let config = FrameConfig {
            read_chunk_size: 3,
            ..FrameConfig::default()
        };
        let mut reader = FrameReader::with_config(Cursor::new(bytes), config);
        let mut dispatcher = FixedLength::new(4);

        assert_eq!(
            reader.pump(&mut dispatcher).unwrap(),
            ReadOutcome::Consumed {
                bytes: 3,
                resolved: 0
            }
        );
        assert_eq!(reader.parser().header_remaining(), 1);

        let mut resolved = 0;
        while let Ok(ReadOutcome::Consumed { resolved: n, .. }) = reader.pump(&mut dispatcher) {
            resolved += n;
        }

        assert_eq!(resolved, 1);
        assert_eq!(dispatcher.packets, vec![b"\x05xyz".to_vec()]);
    }

    #[test]
    fn eof_is_connection_closed() {
        let mut reader = FrameReader::new(Cursor::new(Vec::<u8>::new()));
        let mut dispatcher = FixedLength::new(1);
        let err = reader.pump(&mut dispatcher).unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed));
    }

    #[test]
    fn corrupted_packet_propagates() {
        let mut reader = FrameReader::new(Cursor::new(wire(&[&[BAD_KEY, 0x00]])));
        let mut dispatcher = FixedLength::new(2);
        let err = reader.pump(&mut dispatcher).unwrap_err();
        assert!(matches!(err, FrameError::CorruptedPacket));
    }

    #[test]
    fn timeouts_are_idle() {
        let mut reader = FrameReader::new(ErrorThenData {
            errors: vec![ErrorKind::Interrupted, ErrorKind::TimedOut],
            bytes: wire(&[b"\x01"]),
        });
        let mut dispatcher = FixedLength::new(1);

        assert_eq!(reader.pump(&mut dispatcher).unwrap(), ReadOutcome::Idle);
        assert_eq!(
            reader.pump(&mut dispatcher).unwrap(),
            ReadOutcome::Consumed {
                bytes: 5,
                resolved: 1
            }
        );
    }

    #[test]
    fn other_io_errors_propagate() {
        let mut reader = FrameReader::new(ErrorThenData {
            errors: vec![ErrorKind::BrokenPipe],
            bytes: Vec::new(),
        });
        let mut dispatcher = FixedLength::new(1);
        let err = reader.pump(&mut dispatcher).unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    #[cfg(unix)]
    fn pump_over_loopback_device() {
        use std::io::Write;

        let config = halflink_transport::SerialConfig::default()
            .with_read_timeout(std::time::Duration::from_millis(20));
        let (host, mut device) = halflink_transport::SerialStream::loopback_pair(&config).unwrap();
        let mut reader = FrameReader::new(host);
        let mut dispatcher = FixedLength::new(2);

        assert_eq!(reader.pump(&mut dispatcher).unwrap(), ReadOutcome::Idle);

        device.write_all(&wire(&[b"\x01\x02"])).unwrap();
        let mut resolved = 0;
        while resolved == 0 {
            if let ReadOutcome::Consumed { resolved: n, .. } = reader.pump(&mut dispatcher).unwrap()
            {
                resolved += n;
            }
        }
        assert_eq!(dispatcher.packets, vec![vec![0x01, 0x02]]);
    }

    /// Returns each queued error once, then the bytes, then EOF.
    struct ErrorThenData {
        errors: Vec<ErrorKind>,
        bytes: Vec<u8>,
    }

    impl Read for ErrorThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if !self.errors.is_empty() {
                return Err(std::io::Error::from(self.errors.remove(0)));
            }
            let n = self.bytes.len().min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[..n]);
            self.bytes.drain(..n);
            Ok(n)
        }
    }
}
