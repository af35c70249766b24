use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

/// Result of a bounded poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Polled<T> {
    /// Last value the probe produced.
    pub value: T,
    /// Whether the probe reported done before the deadline.
    pub settled: bool,
    pub attempts: u32,
}

/// Probe immediately, then every `interval`, until the probe reports done
/// or `deadline` passes. Always probes at least once, so several polls can
/// share one deadline.
pub async fn poll_until<T, F, Fut>(deadline: Instant, interval: Duration, mut probe: F) -> Polled<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = (bool, T)>,
{
    let mut attempts = 0;

    loop {
        attempts += 1;
        let (done, value) = probe().await;
        let now = Instant::now();
        if done || now >= deadline {
            return Polled {
                value,
                settled: done,
                attempts,
            };
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}
