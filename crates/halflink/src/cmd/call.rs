use std::path::Path;

use halflink_remote::Remote;
use tracing::debug;

use crate::cmd::link::{host_codec, load_config, runtime};
use crate::cmd::CallArgs;
use crate::exit::{remote_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_packet, OutputFormat, PacketKind};

pub fn run(args: CallArgs, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    let payload = decode_hex(&args.hex)?;
    let config = load_config(config, &args.link)?;
    let codec = host_codec(&config, &args.link, &[])?;
    let reply_key = config.reply_key;

    runtime()?.block_on(async move {
        let remote = Remote::open(&args.link.port, codec, config)
            .map_err(|err| remote_error("open failed", err))?;

        let pending = remote.call(args.key, &payload);
        debug!(id = ?pending.id(), key = args.key, size = payload.len(), "request queued");
        let outcome = tokio::time::timeout(args.timeout, pending).await;

        let device = remote.device().to_string();
        let state = remote.shutdown().await;
        debug!(%state, "link closed");

        match outcome {
            Ok(Ok(reply)) => {
                print_packet(PacketKind::Reply, &device, reply_key, &reply, format);
                Ok(SUCCESS)
            }
            Ok(Err(err)) => Err(remote_error("call failed", err)),
            Err(_) => Err(CliError::new(
                TIMEOUT,
                format!("no reply within {:?}", args.timeout),
            )),
        }
    })
}

fn decode_hex(input: &str) -> CliResult<Vec<u8>> {
    let cleaned: String = input.split_whitespace().collect();
    hex::decode(&cleaned).map_err(|err| CliError::new(USAGE, format!("invalid --hex: {err}")))
}
