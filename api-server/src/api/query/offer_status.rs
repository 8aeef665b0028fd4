use super::super::get_context;
use async_graphql::{Context, Json, Object};
use quote_guard::OfferStatus;
use serde_json::Value;

#[derive(Default)]
pub struct OfferStatusQuery;

#[Object]
impl OfferStatusQuery {
    /// Freshness of an offer. Pass the provider's raw offer as `payload` to
    /// use the issue time it carries.
    async fn offer_status<'ctx>(
        &self,
        context: &Context<'ctx>,
        offer_id: String,
        payload: Option<Json<Value>>,
    ) -> OfferStatus {
        let ctx = get_context(context);
        ctx.offer_tracker()
            .get_offer_status(&offer_id, payload.as_ref().map(|p| &p.0))
    }

    /// Number of offers currently tracked
    async fn tracked_offers<'ctx>(&self, context: &Context<'ctx>) -> usize {
        get_context(context).offer_tracker().tracked_count()
    }
}
