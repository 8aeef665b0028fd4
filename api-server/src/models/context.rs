use getset::Getters;
use log::info;
use quote_guard::{
    spawn_offer_sweeper, Deduplicated, DeduplicationConfig, OfferFreshnessTracker,
    RequestDeduplicator, SharedOfferFreshnessTracker, SharedRequestDeduplicator,
};
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::config::Config;

/// Failure of an upstream search issued through [`Context::search`]
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Upstream search timed out after {0:?}")]
    TimedOut(Duration),
    #[error("Upstream search failed: {0}")]
    Upstream(Box<dyn std::error::Error + Send + Sync + 'static>),
}

#[derive(Getters)]
#[get = "pub"]
pub struct Context {
    deduplicator: SharedRequestDeduplicator<Value>,
    offer_tracker: SharedOfferFreshnessTracker,
    config: Config,
    #[getset(skip)]
    background: CancellationToken,
}

impl Context {
    pub fn new(config: Config) -> Self {
        let deduplicator = RequestDeduplicator::new(DeduplicationConfig {
            grace_period: config.grace_period(),
            enabled: config.deduplication.enabled,
        });

        info!(
            "Initialized request deduplication (enabled: {}, grace period: {:?})",
            config.deduplication.enabled,
            config.grace_period()
        );

        Self {
            deduplicator: Arc::new(deduplicator),
            offer_tracker: Arc::new(OfferFreshnessTracker::default()),
            config,
            background: CancellationToken::new(),
        }
    }

    /// Spawn the periodic offer sweep; it stops on [`Context::shutdown`]
    pub fn start_background_tasks(&self) -> JoinHandle<()> {
        info!(
            "Sweeping stale offers every {:?}",
            self.config.sweep_interval()
        );
        spawn_offer_sweeper(
            self.offer_tracker.clone(),
            self.config.sweep_interval(),
            self.background.child_token(),
        )
    }

    /// Run an upstream search through the deduplicator
    ///
    /// The deduplicator itself never times out, so the configured search
    /// timeout is applied around `executor` here.
    pub async fn search<P, F, Fut, E>(
        &self,
        params: &P,
        executor: F,
    ) -> quote_guard::Result<Deduplicated<Value>>
    where
        P: Serialize + ?Sized,
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<Value, E>> + Send + 'static,
        E: std::error::Error + Send + Sync + 'static,
    {
        let timeout = self.config.search_timeout();
        self.deduplicator
            .deduplicate(params, move || async move {
                match tokio::time::timeout(timeout, executor()).await {
                    Ok(Ok(value)) => Ok(value),
                    Ok(Err(err)) => Err(SearchError::Upstream(Box::new(err))),
                    Err(_) => Err(SearchError::TimedOut(timeout)),
                }
            })
            .await
    }

    pub fn shutdown(&self) {
        info!("Stopping background tasks");
        self.background.cancel();
        self.deduplicator.shutdown();
    }
}

pub type ContextPointer = Arc<Context>;
