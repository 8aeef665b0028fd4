use chrono::{Duration as ChronoDuration, NaiveDate, Utc};
use futures::future::join_all;
use quote_guard::{OfferFreshnessTracker, RequestDeduplicator, SearchParameters};
use std::io;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::init();

    let deduplicator = RequestDeduplicator::<Vec<String>>::default();
    let tracker = OfferFreshnessTracker::default();
    let search = SearchParameters::new(
        "JFK".to_string(),
        "LAX".to_string(),
        NaiveDate::from_ymd_opt(2025, 12, 20).ok_or("invalid date")?,
        1,
    );

    println!("=== Ten users search the same route ===");
    let start = std::time::Instant::now();
    let calls = (0..10).map(|_| {
        deduplicator.deduplicate(&search, || async {
            // Stand-in for the provider round trip
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok::<_, io::Error>(vec!["off_1".to_string(), "off_2".to_string()])
        })
    });
    let results = join_all(calls).await;
    println!("All searches answered in {:?}", start.elapsed());
    println!("Stats: {:?}", deduplicator.stats());

    let first = results.into_iter().next().ok_or("no results")??;
    for offer_id in &first.data {
        tracker.register_offer(offer_id, search.clone(), None);
    }

    println!("\n=== Offer freshness ===");
    let status = tracker.get_offer_status("off_1", None);
    println!(
        "off_1: valid={} remaining={}m refresh={}",
        status.is_valid, status.remaining_minutes, status.should_refresh
    );

    tracker.register_offer(
        "off_old",
        search.clone(),
        Some(Utc::now() - ChronoDuration::minutes(23)),
    );
    let status = tracker.get_offer_status("off_old", None);
    println!(
        "off_old: valid={} warning={} refresh={} re-search at {}",
        status.is_valid,
        status.is_warning,
        status.should_refresh,
        status.refresh_url.unwrap_or_default()
    );

    Ok(())
}
