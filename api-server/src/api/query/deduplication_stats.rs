use super::super::get_context;
use async_graphql::{Context, Object, SimpleObject};
use quote_guard::DeduplicationStats;
use serde::Serialize;

#[derive(Default)]
pub struct DeduplicationStatsQuery;

#[derive(SimpleObject, Serialize)]
pub struct DeduplicationStatsResponse {
    pub stats: DeduplicationStats,
    pub deduplication_enabled: bool,
    pub grace_period_secs: u64,
}

#[Object]
impl DeduplicationStatsQuery {
    /// Get current request deduplication statistics
    async fn deduplication_stats<'ctx>(&self, context: &Context<'ctx>) -> DeduplicationStatsResponse {
        let ctx = get_context(context);
        let config = ctx.deduplicator().config();

        DeduplicationStatsResponse {
            stats: ctx.deduplicator().stats(),
            deduplication_enabled: config.enabled,
            grace_period_secs: config.grace_period.as_secs(),
        }
    }
}
