// Request deduplication and offer freshness tracking for provider searches

pub mod deduplication;
mod error;
pub mod freshness;
pub mod janitor;
pub mod key;
mod search_parameters;


pub use deduplication::{
    Deduplicated, DeduplicationConfig, DeduplicationStats, RequestDeduplicator,
    SharedRequestDeduplicator,
};
pub use error::{Error, Result, SharedFailure};
pub use freshness::{
    CreationSource, FreshnessConfig, OfferFreshnessTracker, OfferRecord, OfferStatus,
    SharedOfferFreshnessTracker,
};
pub use janitor::spawn_offer_sweeper;
pub use key::DedupKey;
pub use search_parameters::{CabinClass, SearchParameters};
