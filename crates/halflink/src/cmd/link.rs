use std::path::Path;

use halflink_keyring::{Keyring, KeyringDispatcher};
use halflink_remote::RemoteConfig;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::cmd::{LinkArgs, PushKey};
use crate::exit::{io_error, CliError, CliResult, DATA_INVALID, USAGE};

/// Link configuration from the optional JSON file, with flags applied on top.
pub fn load_config(path: Option<&Path>, args: &LinkArgs) -> CliResult<RemoteConfig> {
    let mut config = match path {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|err| io_error(&format!("read {}", path.display()), err))?;
            serde_json::from_str(&text).map_err(|err| {
                CliError::new(
                    DATA_INVALID,
                    format!("invalid config {}: {err}", path.display()),
                )
            })?
        }
        None => RemoteConfig::default(),
    };

    if let Some(key) = args.reply_key {
        config.reply_key = key;
    }
    if let Some(key) = args.error_key {
        config.error_key = Some(key);
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    if let Some(timeout) = args.read_timeout {
        config.serial = config.serial.with_read_timeout(timeout);
    }

    debug!(
        reply_key = config.reply_key,
        error_key = ?config.error_key,
        baud = config.serial.baud_rate,
        "link configured"
    );
    Ok(config)
}

/// Codec for packets the device sends to the host.
pub fn host_codec(
    config: &RemoteConfig,
    args: &LinkArgs,
    pushes: &[PushKey],
) -> CliResult<KeyringDispatcher> {
    let mut keyring = Keyring::new().with(config.reply_key, "reply", args.reply_size);
    if let Some(key) = config.error_key {
        claim(&mut keyring, key, "device_error", args.error_size)?;
    }
    for push in pushes {
        claim(&mut keyring, push.key, "push", push.size)?;
    }
    Ok(KeyringDispatcher::new(keyring))
}

fn claim(keyring: &mut Keyring, key: u8, name: &str, size: usize) -> CliResult<()> {
    if let Some(slot) = keyring.get(key) {
        return Err(CliError::new(
            USAGE,
            format!("key 0x{key:02X} used for both {} and {name}", slot.name),
        ));
    }
    keyring.insert(key, name, size);
    Ok(())
}

pub fn runtime() -> CliResult<Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| io_error("runtime setup failed", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link_args() -> LinkArgs {
        LinkArgs {
            port: "/dev/null".to_string(),
            reply_key: None,
            reply_size: 8,
            error_key: None,
            error_size: 1,
            baud: None,
            read_timeout: None,
        }
    }

    #[test]
    fn flags_override_defaults() {
        let mut args = link_args();
        args.reply_key = Some(0x10);
        args.error_key = Some(0x11);
        args.baud = Some(9600);

        let config = load_config(None, &args).unwrap();
        assert_eq!(config.reply_key, 0x10);
        assert_eq!(config.error_key, Some(0x11));
        assert_eq!(config.serial.baud_rate, 9600);
    }

    #[test]
    fn missing_config_file_fails() {
        let err = load_config(Some(Path::new("/nonexistent/halflink.json")), &link_args())
            .unwrap_err();
        assert_ne!(err.code, crate::exit::SUCCESS);
    }

    #[test]
    fn push_keys_cannot_shadow_link_keys() {
        let args = link_args();
        let config = RemoteConfig::new(0).with_error_key(1);

        let codec = host_codec(&config, &args, &[PushKey { key: 3, size: 4 }]).unwrap();
        assert_eq!(codec.keyring().len(), 3);

        let err = host_codec(&config, &args, &[PushKey { key: 1, size: 4 }]).unwrap_err();
        assert_eq!(err.code, USAGE);
    }
}
