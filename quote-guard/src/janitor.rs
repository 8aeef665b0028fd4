use crate::freshness::OfferFreshnessTracker;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Periodically drop offers past their retention period
///
/// Runs until `cancel` fires. The first sweep happens one `period` after start.
pub fn spawn_offer_sweeper(
    tracker: Arc<OfferFreshnessTracker>,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::debug!("Offer sweeper stopped");
                    break;
                }
                _ = interval.tick() => {
                    let purged = tracker.purge_stale();
                    log::debug!("Offer sweep done, {} purged, {} tracked", purged, tracker.tracked_count());
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_stops_on_cancel() {
        let tracker = Arc::new(OfferFreshnessTracker::default());
        let cancel = CancellationToken::new();
        let handle = spawn_offer_sweeper(tracker, Duration::from_secs(60), cancel.clone());

        tokio::time::sleep(Duration::from_secs(150)).await;
        assert!(!handle.is_finished());

        cancel.cancel();
        handle.await.unwrap();
    }
}
