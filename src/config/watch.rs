use config::ConfigError;
use serde::Deserialize;
use serde::Serialize;

use crate::Error;
use crate::Result;

/// Buffers of the change notification fan-out
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct WatchConfig {
    /// Buffer size for each subscription channel
    ///
    /// A subscriber that falls this many events behind starts losing events;
    /// the synchronizer never waits for it.
    ///
    /// **Default**: 64
    #[serde(default = "default_subscriber_buffer_size")]
    pub subscriber_buffer_size: usize,

    /// Buffer size of the error stream returned by `start()`
    ///
    /// **Default**: 128
    #[serde(default = "default_error_buffer_size")]
    pub error_buffer_size: usize,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            subscriber_buffer_size: default_subscriber_buffer_size(),
            error_buffer_size: default_error_buffer_size(),
        }
    }
}

impl WatchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.subscriber_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch subscriber_buffer_size must be > 0".into(),
            )));
        }
        if self.error_buffer_size == 0 {
            return Err(Error::Config(ConfigError::Message(
                "watch error_buffer_size must be > 0".into(),
            )));
        }
        Ok(())
    }
}

fn default_subscriber_buffer_size() -> usize {
    64
}
fn default_error_buffer_size() -> usize {
    128
}
