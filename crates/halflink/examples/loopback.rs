//! Host and simulated device on the two ends of an in-process loopback link.
//!
//! Run with:
//!   cargo run --example loopback
//!
//! The device thread answers `double` requests; the host issues a few calls
//! concurrently and prints the replies in issuance order.

#[cfg(unix)]
mod demo {
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    use halflink::frame::{FrameError, FrameReader, FrameWriter};
    use halflink::keyring::{Keyring, KeyringDispatcher, Procedure};
    use halflink::remote::{Remote, RemoteConfig};
    use halflink::transport::{SerialConfig, SerialStream};

    const REPLY: u8 = 0x00;
    const DOUBLE: Procedure<u32, u64> = Procedure::new(0x02, "double");

    type BoxError = Box<dyn std::error::Error + Send + Sync>;

    fn device(stream: SerialStream) -> Result<(), BoxError> {
        let mut writer = FrameWriter::new(stream.try_clone()?);
        let mut reader = FrameReader::new(stream);

        let (replies, pending) = mpsc::channel::<Vec<u8>>();
        let mut codec = KeyringDispatcher::new(Keyring::new().with(
            DOUBLE.key(),
            DOUBLE.name(),
            DOUBLE.arg_size(),
        ))
        .with_action(
            DOUBLE.key(),
            Box::new(move |args: &[u8]| {
                let x = u32::from_le_bytes(<[u8; 4]>::try_from(args).unwrap_or_default());
                let mut reply = vec![REPLY];
                reply.extend_from_slice(&(2 * u64::from(x)).to_le_bytes());
                let _ = replies.send(reply);
                Vec::new()
            }),
        );

        loop {
            match reader.pump(&mut codec) {
                Ok(_) => {}
                Err(FrameError::ConnectionClosed) => return Ok(()),
                Err(err) => return Err(err.into()),
            }
            while let Ok(reply) = pending.try_recv() {
                writer.send(&reply)?;
            }
        }
    }

    pub async fn run() -> Result<(), BoxError> {
        let serial = SerialConfig::default().with_read_timeout(Duration::from_millis(50));
        let (host, far_end) = SerialStream::loopback_pair(&serial)?;

        let firmware = thread::spawn(move || device(far_end));

        let codec = KeyringDispatcher::new(Keyring::new().with(REPLY, "reply", 8));
        let remote = Remote::with_stream(host, codec, RemoteConfig::new(REPLY).with_serial(serial))?;

        let calls: Vec<_> = [1u32, 21, u32::MAX]
            .into_iter()
            .map(|x| (x, remote.call(DOUBLE.key(), &DOUBLE.encode(x))))
            .collect();

        for (x, call) in calls {
            let id = call.id();
            let reply = call.await?;
            println!("call {id:?}: double({x}) = {}", DOUBLE.decode(&reply)?);
        }

        let state = remote.shutdown().await;
        eprintln!("worker {state}");

        match firmware.join() {
            Ok(result) => result,
            Err(_) => Err("device thread panicked".into()),
        }
    }
}

#[cfg(unix)]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    demo::run().await
}

#[cfg(not(unix))]
fn main() {
    eprintln!("the loopback example needs unix domain sockets");
}
