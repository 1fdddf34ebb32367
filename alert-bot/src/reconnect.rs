//! Reconnect delay policy for the messaging channel.

use std::time::Duration;

/// Decides how long to wait before reconnect attempt `attempt` (1-based).
///
/// Policies never give up; the lifecycle manager retries forever.
pub trait ReconnectPolicy: Send + Sync {
    fn next_delay(&self, attempt: u32) -> Duration;
}

/// Same delay before every attempt, no backoff.
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay(pub Duration);

impl ReconnectPolicy for FixedDelay {
    fn next_delay(&self, _attempt: u32) -> Duration {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_delay_never_grows() {
        let policy = FixedDelay(Duration::from_secs(30));
        for attempt in [1, 2, 10, 1_000, u32::MAX] {
            assert_eq!(policy.next_delay(attempt), Duration::from_secs(30));
        }
    }
}
