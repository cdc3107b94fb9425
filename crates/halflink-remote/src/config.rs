use std::time::Duration;

use halflink_frame::FrameConfig;
use halflink_transport::SerialConfig;
use serde::{Deserialize, Serialize};

/// Default cadence at which the worker loops check for cancellation.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Configuration of a remote link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Codec key of replies addressed to the host.
    pub reply_key: u8,
    /// Codec key the device uses to report an error, if any.
    pub error_key: Option<u8>,
    /// Idle wait of the transmitter between queue and turn checks.
    pub poll_interval_ms: u64,
    pub serial: SerialConfig,
    pub frame: FrameConfig,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            reply_key: 0,
            error_key: None,
            poll_interval_ms: DEFAULT_POLL_INTERVAL.as_millis() as u64,
            serial: SerialConfig::default(),
            frame: FrameConfig::default(),
        }
    }
}

impl RemoteConfig {
    pub fn new(reply_key: u8) -> Self {
        Self {
            reply_key,
            ..Self::default()
        }
    }

    pub fn with_error_key(mut self, key: u8) -> Self {
        self.error_key = Some(key);
        self
    }

    pub fn with_serial(mut self, serial: SerialConfig) -> Self {
        self.serial = serial;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis().max(1) as u64;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Whether `key` is claimed by the link itself.
    pub fn is_reserved(&self, key: u8) -> bool {
        key == self.reply_key || self.error_key == Some(key)
    }
}
