#![expect(
    clippy::module_name_repetitions,
    reason = "Configuration types intentionally mirror the module name for clarity"
)]

use std::time::Duration;

use backoff::{ExponentialBackoff, ExponentialBackoffBuilder};

const DEFAULT_CONNECT_ATTEMPTS: u32 = 3;
const DEFAULT_INITIAL_BACKOFF_DURATION: Duration = Duration::from_secs(1);
const DEFAULT_MAX_BACKOFF_DURATION: Duration = Duration::from_secs(30);
const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Configuration for the WebSocket transport.
#[non_exhaustive]
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Retry strategy for opening the socket
    pub connect: ConnectConfig,
}

/// Retry behavior for establishing the socket.
///
/// Only the initial connection is retried. A protocol session cannot be resumed on a new
/// socket, so once an established connection is lost the transport stays closed.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Maximum number of connection attempts before giving up.
    /// `None` means infinite retries.
    pub max_attempts: Option<u32>,
    /// Initial backoff duration after the first failed attempt
    pub initial_backoff: Duration,
    /// Maximum backoff duration
    pub max_backoff: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: Some(DEFAULT_CONNECT_ATTEMPTS),
            initial_backoff: DEFAULT_INITIAL_BACKOFF_DURATION,
            max_backoff: DEFAULT_MAX_BACKOFF_DURATION,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl From<ConnectConfig> for ExponentialBackoff {
    fn from(config: ConnectConfig) -> Self {
        ExponentialBackoffBuilder::default()
            .with_initial_interval(config.initial_backoff)
            .with_max_interval(config.max_backoff)
            .with_multiplier(config.backoff_multiplier)
            .with_max_elapsed_time(None) // We handle max attempts separately
            .build()
    }
}

#[cfg(test)]
mod tests {
    use backoff::backoff::Backoff as _;

    use super::*;

    #[test]
    fn backoff_sequence() {
        let config = ConnectConfig::default();
        let mut backoff: ExponentialBackoff = config.into();

        // First backoff should be around initial_backoff (with some jitter)
        let first = backoff.next_backoff().unwrap();
        assert!(
            first >= Duration::from_millis(500) && first <= Duration::from_millis(1500),
            "first backoff was {first:?}"
        );
    }

    #[test]
    fn backoff_respects_max() {
        let config = ConnectConfig {
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(2),
            backoff_multiplier: 3.0,
            max_attempts: None,
        };
        let mut backoff: ExponentialBackoff = config.into();

        for _ in 0..10 {
            let _next = backoff.next_backoff();
        }

        // Should still return values capped at max (plus jitter)
        let duration = backoff.next_backoff().unwrap();
        assert!(duration <= Duration::from_secs(3), "backoff was {duration:?}");
    }

    #[test]
    fn default_connect_attempts_is_three() {
        let config = Config::default();
        assert_eq!(config.connect.max_attempts, Some(3));
    }
}
