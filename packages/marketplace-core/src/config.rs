//! Service configuration.

use serde::Deserialize;
use std::time::Duration;

/// Configuration for the marketplace core service.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "defaults::ledger_url")]
    pub ledger_url: String,

    #[serde(default = "defaults::fallback_ledger_url")]
    pub fallback_ledger_url: String,

    #[serde(default = "defaults::bind_address")]
    pub bind_address: String,

    /// How long a submitted transaction may stay unconfirmed before the
    /// listing is invalidated and the asset released.
    #[serde(default = "defaults::confirm_deadline_secs")]
    pub confirm_deadline_secs: u64,

    #[serde(default = "defaults::poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Upper bound on concurrent confirmation-poll tasks, so a burst of
    /// listings cannot exhaust ledger-client connections.
    #[serde(default = "defaults::max_confirm_tasks")]
    pub max_confirm_tasks: usize,

    #[serde(default = "defaults::request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn confirm_deadline(&self) -> Duration {
        Duration::from_secs(self.confirm_deadline_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger_url: defaults::ledger_url(),
            fallback_ledger_url: defaults::fallback_ledger_url(),
            bind_address: defaults::bind_address(),
            confirm_deadline_secs: defaults::confirm_deadline_secs(),
            poll_interval_ms: defaults::poll_interval_ms(),
            max_confirm_tasks: defaults::max_confirm_tasks(),
            request_timeout_secs: defaults::request_timeout_secs(),
        }
    }
}

mod defaults {
    pub fn ledger_url() -> String {
        "https://s.altnet.rippletest.net:51234".into()
    }

    pub fn fallback_ledger_url() -> String {
        "https://testnet.xrpl-labs.com".into()
    }

    pub fn bind_address() -> String {
        "0.0.0.0:3080".into()
    }

    pub fn confirm_deadline_secs() -> u64 {
        90
    }

    pub fn poll_interval_ms() -> u64 {
        2_000
    }

    pub fn max_confirm_tasks() -> usize {
        32
    }

    pub fn request_timeout_secs() -> u64 {
        30
    }
}
