#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use halflink_frame::{
    Dispatcher, FrameError, FrameReader, FrameWriter, PacketStatus, ReplyCallback,
};
use halflink_keyring::{Keyring, KeyringDispatcher, Procedure, WireValue};
use halflink_remote::RemoteConfig;
use halflink_transport::{SerialConfig, SerialStream};

/// Host codec keys.
pub const REPLY: u8 = 0x00;
pub const PUSH: u8 = 0x03;
pub const CHATTER: u8 = 0x05;
pub const DEVICE_ERROR: u8 = 0x06;
/// Width of the host reply slot.
pub const REPLY_WIDTH: usize = 8;

/// Device procedures.
pub const DOUBLE_U32: Procedure<u32, u64> = Procedure::new(0x02, "double_u32");
pub const ECHO_U8: Procedure<u8, u8> = Procedure::new(0x11, "echo_u8");
pub const ECHO_U16: Procedure<u16, u16> = Procedure::new(0x12, "echo_u16");
pub const ECHO_U32: Procedure<u32, u32> = Procedure::new(0x13, "echo_u32");
pub const ECHO_U64: Procedure<u64, u64> = Procedure::new(0x14, "echo_u64");
pub const ECHO_I8: Procedure<i8, i8> = Procedure::new(0x15, "echo_i8");
pub const ECHO_I16: Procedure<i16, i16> = Procedure::new(0x16, "echo_i16");
pub const ECHO_I32: Procedure<i32, i32> = Procedure::new(0x17, "echo_i32");
pub const ECHO_I64: Procedure<i64, i64> = Procedure::new(0x18, "echo_i64");
/// Pushes an unsolicited packet before replying.
pub const PUSH_THEN_ECHO: Procedure<u32, u32> = Procedure::new(0x0C, "push_then_echo");

/// Device keys with scripted, non-procedure behaviour.
pub const CORRUPT: u8 = 0x09;
pub const SILENT: u8 = 0x0A;
pub const FAIL: u8 = 0x0B;
pub const CHATTY: u8 = 0x0D;
/// Reports an error and then answers anyway.
pub const FAIL_THEN_REPLY: u8 = 0x0E;

pub const PUSHED: [u8; 4] = [0xDE, 0xAD, 0xBE, 0xEF];
pub const DEVICE_ERROR_CODE: u8 = 0x2A;

pub const WAIT: Duration = Duration::from_secs(5);

pub fn fast_serial() -> SerialConfig {
    SerialConfig::default().with_read_timeout(Duration::from_millis(20))
}

pub fn remote_config() -> RemoteConfig {
    RemoteConfig::new(REPLY)
        .with_error_key(DEVICE_ERROR)
        .with_serial(fast_serial())
        .with_poll_interval(Duration::from_millis(5))
}

/// Codec the host side of the link decodes device packets with.
pub fn host_codec() -> KeyringDispatcher {
    KeyringDispatcher::new(
        Keyring::new()
            .with(REPLY, "reply", REPLY_WIDTH)
            .with(PUSH, "push", PUSHED.len())
            .with(CHATTER, "chatter", 0)
            .with(DEVICE_ERROR, "device_error", 1),
    )
    // Leaves output behind that the host never reads.
    .with_action(CHATTER, Box::new(|_: &[u8]| vec![0xC0]))
}

fn declare<A: WireValue, R: WireValue>(keyring: Keyring, procedure: &Procedure<A, R>) -> Keyring {
    keyring.with(procedure.key(), procedure.name(), procedure.arg_size())
}

/// Codec the stub device decodes host requests with.
pub fn device_codec() -> KeyringDispatcher {
    let mut keyring = Keyring::new()
        .with(CORRUPT, "corrupt", 0)
        .with(SILENT, "silent", 0)
        .with(FAIL, "fail", 0)
        .with(CHATTY, "chatty", 0)
        .with(FAIL_THEN_REPLY, "fail_then_reply", 0);
    keyring = declare(keyring, &DOUBLE_U32);
    keyring = declare(keyring, &ECHO_U8);
    keyring = declare(keyring, &ECHO_U16);
    keyring = declare(keyring, &ECHO_U32);
    keyring = declare(keyring, &ECHO_U64);
    keyring = declare(keyring, &ECHO_I8);
    keyring = declare(keyring, &ECHO_I16);
    keyring = declare(keyring, &ECHO_I32);
    keyring = declare(keyring, &ECHO_I64);
    keyring = declare(keyring, &PUSH_THEN_ECHO);

    KeyringDispatcher::new(keyring)
        .with_action(DOUBLE_U32.key(), DOUBLE_U32.action(REPLY_WIDTH, |x| 2 * u64::from(x)))
        .with_action(ECHO_U8.key(), ECHO_U8.action(REPLY_WIDTH, |x| x))
        .with_action(ECHO_U16.key(), ECHO_U16.action(REPLY_WIDTH, |x| x))
        .with_action(ECHO_U32.key(), ECHO_U32.action(REPLY_WIDTH, |x| x))
        .with_action(ECHO_U64.key(), ECHO_U64.action(REPLY_WIDTH, |x| x))
        .with_action(ECHO_I8.key(), ECHO_I8.action(REPLY_WIDTH, |x| x))
        .with_action(ECHO_I16.key(), ECHO_I16.action(REPLY_WIDTH, |x| x))
        .with_action(ECHO_I32.key(), ECHO_I32.action(REPLY_WIDTH, |x| x))
        .with_action(ECHO_I64.key(), ECHO_I64.action(REPLY_WIDTH, |x| x))
        .with_action(
            PUSH_THEN_ECHO.key(),
            PUSH_THEN_ECHO.action(REPLY_WIDTH, |x| x),
        )
}

fn packet(key: u8, body: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(1 + body.len());
    packet.push(key);
    packet.extend_from_slice(body);
    packet
}

/// Frames the stub device sends after resolving a request.
fn respond(key: u8, output: Bytes) -> Vec<Vec<u8>> {
    match key {
        CORRUPT => vec![vec![0xEE, 0x00]],
        SILENT => Vec::new(),
        FAIL => vec![packet(DEVICE_ERROR, &[DEVICE_ERROR_CODE])],
        CHATTY => vec![packet(CHATTER, &[]), packet(REPLY, &[0; REPLY_WIDTH])],
        FAIL_THEN_REPLY => vec![
            packet(DEVICE_ERROR, &[DEVICE_ERROR_CODE]),
            packet(REPLY, &[0; REPLY_WIDTH]),
        ],
        k if k == PUSH_THEN_ECHO.key() => vec![packet(PUSH, &PUSHED), packet(REPLY, &output)],
        _ if output.is_empty() => Vec::new(),
        _ => vec![packet(REPLY, &output)],
    }
}

/// Collects each resolved request's key and handler output.
struct Firmware {
    codec: KeyringDispatcher,
    key: Option<u8>,
    resolved: Vec<(u8, Bytes)>,
}

impl Dispatcher for Firmware {
    fn put(&mut self, byte: u8) -> PacketStatus {
        let key = *self.key.get_or_insert(byte);
        let status = self.codec.put(byte);
        match status {
            PacketStatus::Resolved => {
                let output = self.codec.take_pending().unwrap_or_default();
                self.resolved.push((key, output));
                self.key = None;
            }
            PacketStatus::Dropped => self.key = None,
            PacketStatus::Loading => {}
        }
        status
    }

    fn is_loaded(&self) -> bool {
        self.codec.is_loaded()
    }

    fn discard_pending(&mut self) {
        self.codec.discard_pending();
    }

    fn register_reply_callback(
        &mut self,
        key: u8,
        callback: ReplyCallback,
    ) -> halflink_frame::Result<()> {
        self.codec.register_reply_callback(key, callback)
    }
}

/// A scripted device on the far end of a loopback link.
pub struct StubDevice {
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
    seen: Arc<Mutex<Vec<u8>>>,
}

impl StubDevice {
    pub fn start(stream: SerialStream) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let thread = {
            let stop = Arc::clone(&stop);
            let seen = Arc::clone(&seen);
            thread::spawn(move || serve(stream, &stop, &seen))
        };

        Self {
            stop,
            thread: Some(thread),
            seen,
        }
    }

    /// Request keys the device has resolved, in arrival order.
    pub fn seen(&self) -> Vec<u8> {
        self.seen.lock().unwrap().clone()
    }

    /// Stop serving and hang up the device end.
    pub fn hang_up(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            thread.join().expect("stub device thread should not panic");
        }
    }
}

impl Drop for StubDevice {
    fn drop(&mut self) {
        self.halt();
    }
}

fn serve(stream: SerialStream, stop: &AtomicBool, seen: &Mutex<Vec<u8>>) {
    let writer_stream = stream.try_clone().expect("device stream should clone");
    let mut reader = FrameReader::new(stream);
    let mut writer = FrameWriter::new(writer_stream);
    let mut firmware = Firmware {
        codec: device_codec(),
        key: None,
        resolved: Vec::new(),
    };

    while !stop.load(Ordering::SeqCst) {
        match reader.pump(&mut firmware) {
            Ok(_) | Err(FrameError::CorruptedPacket) => {}
            Err(_) => return,
        }

        for (key, output) in std::mem::take(&mut firmware.resolved) {
            seen.lock().unwrap().push(key);
            for frame in respond(key, output) {
                if writer.send(&frame).is_err() {
                    return;
                }
            }
        }
    }
}

/// A host stream with a stub device serving its other end.
pub fn loopback() -> (SerialStream, StubDevice) {
    let (host, device) =
        SerialStream::loopback_pair(&fast_serial()).expect("loopback pair should open");
    (host, StubDevice::start(device))
}
