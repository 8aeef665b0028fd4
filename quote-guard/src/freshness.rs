use crate::search_parameters::SearchParameters;
use chrono::{DateTime, Duration, TimeZone, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use getset::Getters;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

#[cfg(feature = "graphql")]
use async_graphql::{Enum, SimpleObject};

/// Payload fields providers use for the offer's issue time
const PAYLOAD_TIMESTAMP_FIELDS: [&str; 3] = ["created_at", "createdAt", "_createdAt"];

/// Offer freshness policy
///
/// The provider expires offers after 30 minutes; the validity window stops
/// short of that.
#[derive(Clone, Debug)]
pub struct FreshnessConfig {
    /// How long an offer is usable after it was issued
    pub validity_window: Duration,
    /// Age from which callers should warn that the offer is aging
    pub warning_after: Duration,
    /// Age from which callers should fetch a replacement in the background
    pub refresh_after: Duration,
    /// Age after which a tracked record is dropped
    pub retention: Duration,
}

impl Default for FreshnessConfig {
    fn default() -> Self {
        Self {
            validity_window: Duration::minutes(25),
            warning_after: Duration::minutes(20),
            refresh_after: Duration::minutes(22),
            retention: Duration::hours(1),
        }
    }
}

/// A tracked offer
#[derive(Clone, Debug, Getters)]
#[getset(get = "pub")]
pub struct OfferRecord {
    offer_id: String,
    created_at: DateTime<Utc>,
    search_parameters: SearchParameters,
}

/// Where the creation time of an offer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "snake_case")]
pub enum CreationSource {
    /// Read from the provider's own offer payload
    Payload,
    /// Recorded when the offer was registered
    Registered,
    /// Nothing was known, the offer is treated as just issued
    Assumed,
}

/// Freshness of one offer at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject))]
pub struct OfferStatus {
    pub offer_id: String,
    pub is_valid: bool,
    pub is_warning: bool,
    pub should_refresh: bool,
    pub age_ms: i64,
    pub remaining_ms: i64,
    pub remaining_seconds: i64,
    pub remaining_minutes: i64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub source: CreationSource,
    pub search_parameters: Option<SearchParameters>,
    /// Results page that repeats the original search, if it is known
    pub refresh_url: Option<String>,
}

/// Tracks the age of provider-issued offers
///
/// Pure timestamp arithmetic; nothing here performs I/O or fails. An offer
/// the tracker knows nothing about is reported as fresh.
pub struct OfferFreshnessTracker {
    offers: DashMap<String, OfferRecord>,
    config: FreshnessConfig,
}

impl Default for OfferFreshnessTracker {
    fn default() -> Self {
        Self::new(FreshnessConfig::default())
    }
}

impl OfferFreshnessTracker {
    pub fn new(config: FreshnessConfig) -> Self {
        Self {
            offers: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &FreshnessConfig {
        &self.config
    }

    /// Start tracking an offer
    ///
    /// `created_at` defaults to now. An offer that is already tracked keeps its
    /// original creation time. Records past retention are purged first.
    pub fn register_offer(
        &self,
        offer_id: &str,
        search_parameters: SearchParameters,
        created_at: Option<DateTime<Utc>>,
    ) {
        self.purge_stale();

        match self.offers.entry(offer_id.to_string()) {
            Entry::Occupied(_) => {
                log::debug!("Offer {} already tracked, keeping its creation time", offer_id);
            }
            Entry::Vacant(entry) => {
                let created_at = created_at.unwrap_or_else(Utc::now);
                log::debug!("Tracking offer {} created at {}", offer_id, created_at);
                entry.insert(OfferRecord {
                    offer_id: offer_id.to_string(),
                    created_at,
                    search_parameters,
                });
            }
        }
    }

    /// Freshness of an offer right now
    ///
    /// A timestamp inside `raw_payload` wins over the registered one.
    pub fn get_offer_status(&self, offer_id: &str, raw_payload: Option<&Value>) -> OfferStatus {
        self.status_at(offer_id, raw_payload, Utc::now())
    }

    /// Freshness of an offer as seen at `now`
    pub fn status_at(
        &self,
        offer_id: &str,
        raw_payload: Option<&Value>,
        now: DateTime<Utc>,
    ) -> OfferStatus {
        let record = self.offers.get(offer_id).map(|r| r.value().clone());

        let (created_at, source) = match raw_payload.and_then(payload_created_at) {
            Some(created_at) => (created_at, CreationSource::Payload),
            None => match &record {
                Some(record) => (record.created_at, CreationSource::Registered),
                None => (now, CreationSource::Assumed),
            },
        };

        // A creation time in the future counts as "just issued"
        let age_ms = (now - created_at).num_milliseconds().max(0);
        let window_ms = self.config.validity_window.num_milliseconds();
        let remaining_ms = (window_ms - age_ms).max(0);

        let search_parameters = record.map(|r| r.search_parameters);
        OfferStatus {
            offer_id: offer_id.to_string(),
            is_valid: remaining_ms > 0,
            is_warning: age_ms >= self.config.warning_after.num_milliseconds(),
            should_refresh: age_ms >= self.config.refresh_after.num_milliseconds(),
            age_ms,
            remaining_ms,
            remaining_seconds: remaining_ms / 1000,
            remaining_minutes: remaining_ms / 60_000,
            created_at,
            expires_at: created_at
                .checked_add_signed(self.config.validity_window)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
            source,
            refresh_url: search_parameters.as_ref().map(SearchParameters::refresh_url),
            search_parameters,
        }
    }

    pub fn is_offer_expired(&self, offer_id: &str) -> bool {
        !self.get_offer_status(offer_id, None).is_valid
    }

    pub fn should_refresh_offer(&self, offer_id: &str) -> bool {
        self.get_offer_status(offer_id, None).should_refresh
    }

    /// Stop tracking an offer, e.g. once it has been booked
    pub fn remove_offer(&self, offer_id: &str) -> Option<OfferRecord> {
        let removed = self.offers.remove(offer_id).map(|(_, record)| record);
        if removed.is_some() {
            log::debug!("Stopped tracking offer {}", offer_id);
        }
        removed
    }

    /// Drop records older than the retention period
    pub fn purge_stale(&self) -> usize {
        self.purge_stale_at(Utc::now())
    }

    pub fn purge_stale_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.offers.len();
        let retention = self.config.retention;
        self.offers
            .retain(|_, record| now - record.created_at <= retention);

        let purged = before.saturating_sub(self.offers.len());
        if purged > 0 {
            log::debug!("Purged {} stale offers", purged);
        }
        purged
    }

    /// Number of offers currently tracked
    pub fn tracked_count(&self) -> usize {
        self.offers.len()
    }
}

/// Issue time embedded in a provider payload, as RFC 3339 text or epoch millis
fn payload_created_at(payload: &Value) -> Option<DateTime<Utc>> {
    PAYLOAD_TIMESTAMP_FIELDS
        .iter()
        .filter_map(|field| payload.get(field))
        .find_map(|value| match value {
            Value::String(text) => DateTime::parse_from_rfc3339(text)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            Value::Number(number) => number
                .as_i64()
                .and_then(|millis| Utc.timestamp_millis_opt(millis).single()),
            _ => None,
        })
}

/// Thread-safe wrapper for the tracker
pub type SharedOfferFreshnessTracker = Arc<OfferFreshnessTracker>;
