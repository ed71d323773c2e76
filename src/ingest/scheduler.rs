use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::pipeline::Ingestor;

/// Bounded retry ladder applied after a failed run: attempt `n` waits
/// `base_delay * n`, up to `max_attempts`, then the scheduler reverts to
/// the normal interval.
#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(60),
            max_attempts: 3,
        }
    }
}

/// Spawn the periodic ingestion task.
///
/// The first run fires immediately, then every `interval`. A run where no
/// source produced items triggers the retry ladder; a run that produced
/// anything (even partial, even the offline placeholders' underlying
/// errors) just waits for the next tick. Dropping the handle does not
/// stop the task — abort it for shutdown.
///
/// The ingestor tolerates being invoked more often than feeds actually
/// change: repeated upserts of unchanged items are harmless no-ops, so a
/// manual refresh racing this schedule is safe.
pub fn spawn(ingestor: Arc<Ingestor>, interval: Duration, retry: RetryPolicy) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            run_with_retry(&ingestor, retry).await;
        }
    })
}

async fn run_with_retry(ingestor: &Ingestor, retry: RetryPolicy) {
    let mut attempt: u32 = 0;
    loop {
        let summary = ingestor.run().await;

        if !summary.total_failure() {
            if !summary.errors.is_empty() {
                tracing::warn!(
                    errors = summary.errors.len(),
                    "Ingestion run completed with partial failures"
                );
            }
            return;
        }

        attempt += 1;
        if attempt > retry.max_attempts {
            tracing::warn!(
                max_attempts = retry.max_attempts,
                "Maximum retries reached, giving up until next scheduled run"
            );
            return;
        }

        let delay = retry.base_delay * attempt;
        tracing::info!(
            attempt = attempt,
            max_attempts = retry.max_attempts,
            delay_secs = delay.as_secs(),
            "Ingestion run failed, scheduling retry"
        );
        tokio::time::sleep(delay).await;
    }
}
