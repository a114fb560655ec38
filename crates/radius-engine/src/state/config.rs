//! Session tracker configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// `access_request.session` settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Seconds a challenge stays resumable (default: 15)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Maximum number of live sessions (default: 4096)
    #[serde(default = "default_max")]
    pub max: usize,

    /// Byte written into every State token so cooperating servers can
    /// tell whose token it is
    #[serde(default)]
    pub state_server_id: u8,
}

fn default_timeout() -> u64 {
    15
}

fn default_max() -> usize {
    4096
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            timeout: default_timeout(),
            max: default_max(),
            state_server_id: 0,
        }
    }
}

impl SessionConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}
