//! Exponential-backoff reconnection for the push channel.
//!
//! When the connection to the print server drops, the transport calls
//! [`reconnect_loop`] to keep retrying with increasing delays until the
//! connection is restored or the [`CancellationToken`] is triggered.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::client::{SocketClient, SocketConnection};

/// Tunable parameters for the exponential-backoff strategy.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Next backoff delay, clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Reconnect to the print server with exponential backoff.
///
/// Waits `initial_delay` before the first attempt. Returns
/// `Some(connection)` once a connection succeeds, or `None` if `cancel`
/// fires first.
pub async fn reconnect_loop(
    client: &SocketClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<SocketConnection> {
    let endpoint = client.endpoint();
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(%endpoint, "Reconnect cancelled");
                return None;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        attempt += 1;
        tracing::info!(
            %endpoint,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "Reconnecting to print server",
        );

        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!(%endpoint, "Reconnect cancelled");
                return None;
            }
            result = client.connect() => match result {
                Ok(conn) => {
                    tracing::info!(%endpoint, attempt, "Reconnected to print server");
                    return Some(conn);
                }
                Err(e) => {
                    tracing::warn!(%endpoint, error = %e, "Reconnect attempt {attempt} failed");
                }
            }
        }

        delay = next_delay(delay, config);
    }
}

#[cfg(test)]
mod tests {
    use printdeck_core::endpoint::Endpoint;

    use super::*;

    #[test]
    fn next_delay_doubles() {
        let config = ReconnectConfig::default();
        assert_eq!(next_delay(Duration::from_secs(1), &config), Duration::from_secs(2));
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let config = ReconnectConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(next_delay(Duration::from_secs(8), &config), Duration::from_secs(10));
    }

    #[test]
    fn sub_second_delays_grow() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_millis(250),
            ..Default::default()
        };
        let d = next_delay(config.initial_delay, &config);
        assert_eq!(d, Duration::from_millis(500));
    }

    #[test]
    fn full_backoff_sequence() {
        let config = ReconnectConfig::default();
        let mut delay = config.initial_delay;
        let expected = [1, 2, 4, 8, 16, 30, 30, 30];

        for &expected_secs in &expected {
            assert_eq!(delay.as_secs(), expected_secs);
            delay = next_delay(delay, &config);
        }
    }

    #[tokio::test]
    async fn cancellation_token_stops_reconnect() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let client = SocketClient::new(Endpoint::default().with_port("9").unwrap());
        let result = reconnect_loop(&client, &ReconnectConfig::default(), &cancel).await;
        assert!(result.is_none());
    }
}
