use super::super::get_context;
use async_graphql::{Context, Object};
use chrono::{DateTime, Utc};
use log::info;
use quote_guard::{OfferStatus, SearchParameters};

#[derive(Default)]
pub struct OfferMutation;

#[Object]
impl OfferMutation {
    /// Start tracking an offer returned by a search
    async fn register_offer<'ctx>(
        &self,
        context: &Context<'ctx>,
        offer_id: String,
        search_parameters: SearchParameters,
        created_at: Option<DateTime<Utc>>,
    ) -> OfferStatus {
        let tracker = get_context(context).offer_tracker();
        tracker.register_offer(&offer_id, search_parameters, created_at);
        tracker.get_offer_status(&offer_id, None)
    }

    /// Stop tracking an offer, e.g. after it was booked
    async fn remove_offer<'ctx>(&self, context: &Context<'ctx>, offer_id: String) -> bool {
        let removed = get_context(context)
            .offer_tracker()
            .remove_offer(&offer_id)
            .is_some();
        if removed {
            info!("Offer {} released", offer_id);
        }
        removed
    }
}
