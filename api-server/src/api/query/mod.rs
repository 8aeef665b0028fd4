mod deduplication_stats;
mod offer_status;

use async_graphql::MergedObject;
use deduplication_stats::DeduplicationStatsQuery;
use offer_status::OfferStatusQuery;

#[derive(MergedObject, Default)]
pub struct Query(DeduplicationStatsQuery, OfferStatusQuery);
