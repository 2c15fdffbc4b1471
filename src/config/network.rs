use std::time::Duration;

use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Timeouts for talking to the remote configuration service
///
/// The notification endpoint holds requests open for up to 60 seconds when
/// nothing changes, so `poll_timeout_in_ms` must stay above that hold time
/// while `request_timeout_in_ms` bounds ordinary namespace fetches.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NetworkConfig {
    /// TCP connect timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_in_ms: u64,

    /// Namespace fetch completion timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_in_ms: u64,

    /// Long-poll timeout in milliseconds
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_in_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            connect_timeout_in_ms: default_connect_timeout(),
            request_timeout_in_ms: default_request_timeout(),
            poll_timeout_in_ms: default_poll_timeout(),
        }
    }
}

impl NetworkConfig {
    pub fn validate(&self) -> Result<()> {
        if self.connect_timeout_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "network connect timeout must be > 0".into(),
            )));
        }

        if self.request_timeout_in_ms <= self.connect_timeout_in_ms {
            return Err(Error::Config(ConfigError::Message(format!(
                "network request timeout {}ms must exceed connect timeout {}ms",
                self.request_timeout_in_ms, self.connect_timeout_in_ms
            ))));
        }

        if self.poll_timeout_in_ms == 0 {
            return Err(Error::Config(ConfigError::Message(
                "network poll timeout must be > 0".into(),
            )));
        }

        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_in_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_in_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_in_ms)
    }
}

fn default_connect_timeout() -> u64 {
    1_000
}
fn default_request_timeout() -> u64 {
    5_000
}
fn default_poll_timeout() -> u64 {
    90_000
}
