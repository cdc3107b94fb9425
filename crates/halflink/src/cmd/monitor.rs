use std::path::Path;

use halflink_remote::Remote;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cmd::link::{host_codec, load_config, runtime};
use crate::cmd::MonitorArgs;
use crate::exit::{link_fault, remote_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_packet, OutputFormat, PacketKind};

pub fn run(args: MonitorArgs, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    let config = load_config(config, &args.link)?;
    let codec = host_codec(&config, &args.link, &args.pushes)?;

    let cancel = CancellationToken::new();
    install_ctrlc_handler(cancel.clone())?;

    runtime()?.block_on(async move {
        let remote = Remote::open(&args.link.port, codec, config)
            .map_err(|err| remote_error("open failed", err))?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        for push in &args.pushes {
            let tx = tx.clone();
            let key = push.key;
            remote
                .register_reply_callback(key, move |payload| {
                    let _ = tx.send((key, payload));
                })
                .await
                .map_err(|err| remote_error("register failed", err))?;
        }
        drop(tx);

        info!(device = remote.device(), keys = args.pushes.len(), "monitoring");

        let mut printed = 0usize;
        let result = loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break Ok(SUCCESS),
                packet = rx.recv() => match packet {
                    Some((key, payload)) => {
                        print_packet(PacketKind::Push, remote.device(), key, &payload, format);
                        printed = printed.saturating_add(1);
                        if args.count.is_some_and(|count| printed >= count) {
                            break Ok(SUCCESS);
                        }
                    }
                    None => {
                        let fault = remote.closed().await;
                        break Err(link_fault("link failed", &fault));
                    }
                },
                fault = remote.closed() => break Err(link_fault("link failed", &fault)),
            }
        };

        let state = remote.shutdown().await;
        debug!(%state, printed, "link closed");
        result
    })
}

fn install_ctrlc_handler(cancel: CancellationToken) -> CliResult<()> {
    ctrlc::set_handler(move || cancel.cancel())
        .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
