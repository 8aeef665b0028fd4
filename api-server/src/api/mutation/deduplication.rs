use super::super::get_context;
use async_graphql::{Context, Object};
use quote_guard::DeduplicationStats;

#[derive(Default)]
pub struct DeduplicationMutation;

#[Object]
impl DeduplicationMutation {
    /// Reset the deduplication counters (pending requests are kept)
    async fn reset_deduplication_stats<'ctx>(&self, context: &Context<'ctx>) -> DeduplicationStats {
        let ctx = get_context(context);
        ctx.deduplicator().reset_stats();
        ctx.deduplicator().stats()
    }
}
