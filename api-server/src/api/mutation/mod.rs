mod deduplication;
mod offer;

use async_graphql::MergedObject;
use deduplication::DeduplicationMutation;
use offer::OfferMutation;

#[derive(MergedObject, Default)]
pub struct Mutation(DeduplicationMutation, OfferMutation);
