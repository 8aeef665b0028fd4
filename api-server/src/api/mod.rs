pub mod mutation;
pub mod query;

use crate::models::context::ContextPointer;
use async_graphql::http::GraphiQLSource;
use async_graphql::{Context, EmptySubscription, Schema};
use async_graphql_rocket::{GraphQLQuery, GraphQLRequest, GraphQLResponse};
use mutation::Mutation;
use query::Query;
use rocket::response::content;
use rocket::{Route, State};

pub type ApiSchema = Schema<Query, Mutation, EmptySubscription>;

pub fn build_schema(context: ContextPointer) -> ApiSchema {
    Schema::build(Query::default(), Mutation::default(), EmptySubscription)
        .data(context)
        .finish()
}

pub fn get_context<'ctx>(context: &Context<'ctx>) -> &'ctx ContextPointer {
    context.data_unchecked::<ContextPointer>()
}

#[rocket::get("/")]
fn graphiql() -> content::RawHtml<String> {
    content::RawHtml(GraphiQLSource::build().endpoint("/graphql").finish())
}

#[rocket::get("/graphql?<query..>")]
async fn graphql_query(schema: &State<ApiSchema>, query: GraphQLQuery) -> GraphQLResponse {
    query.execute(schema.inner()).await
}

#[rocket::post("/graphql", data = "<request>", format = "application/json")]
async fn graphql_request(schema: &State<ApiSchema>, request: GraphQLRequest) -> GraphQLResponse {
    request.execute(schema.inner()).await
}

pub fn routes() -> Vec<Route> {
    rocket::routes![graphiql, graphql_query, graphql_request]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::Config;
    use crate::models::context::Context as AppContext;
    use serde_json::json;
    use std::sync::Arc;

    fn schema() -> ApiSchema {
        build_schema(Arc::new(AppContext::new(Config::default())))
    }

    async fn run(schema: &ApiSchema, query: &str) -> serde_json::Value {
        let response = schema.execute(query).await;
        assert!(response.errors.is_empty(), "{:?}", response.errors);
        response.data.into_json().unwrap()
    }

    #[tokio::test]
    async fn test_register_then_query_offer() {
        let schema = schema();

        let registered = run(
            &schema,
            r#"mutation {
                registerOffer(
                    offerId: "off_1",
                    searchParameters: {
                        origin: "JFK", destination: "LAX", departureDate: "2025-03-01",
                        adults: 1, children: 0, infants: 0, cabinClass: BUSINESS
                    }
                ) { isValid source }
            }"#,
        )
        .await;
        assert_eq!(
            registered,
            json!({"registerOffer": {"isValid": true, "source": "REGISTERED"}})
        );

        let status = run(
            &schema,
            r#"{
                offerStatus(offerId: "off_1") {
                    isValid shouldRefresh refreshUrl
                    searchParameters { origin destination cabinClass }
                }
                trackedOffers
            }"#,
        )
        .await;
        assert_eq!(status["offerStatus"]["isValid"], json!(true));
        assert_eq!(status["offerStatus"]["shouldRefresh"], json!(false));
        assert_eq!(
            status["offerStatus"]["refreshUrl"],
            json!("/flights/results?from=JFK&to=LAX&departure=2025-03-01&adults=1&children=0&infants=0&class=business")
        );
        assert_eq!(
            status["offerStatus"]["searchParameters"],
            json!({"origin": "JFK", "destination": "LAX", "cabinClass": "BUSINESS"})
        );
        assert_eq!(status["trackedOffers"], json!(1));

        let removed = run(&schema, r#"mutation { removeOffer(offerId: "off_1") }"#).await;
        assert_eq!(removed, json!({"removeOffer": true}));
    }

    #[tokio::test]
    async fn test_unknown_offer_with_expired_payload() {
        let schema = schema();

        let status = run(
            &schema,
            r#"{
                offerStatus(offerId: "off_x", payload: {created_at: "2020-01-01T00:00:00Z"}) {
                    isValid remainingMs source searchParameters { origin }
                }
            }"#,
        )
        .await;

        assert_eq!(
            status,
            json!({"offerStatus": {
                "isValid": false,
                "remainingMs": 0,
                "source": "PAYLOAD",
                "searchParameters": null
            }})
        );
    }

    #[tokio::test]
    async fn test_deduplication_stats_and_reset() {
        let schema = schema();

        let stats = run(
            &schema,
            "{ deduplicationStats { deduplicationEnabled gracePeriodSecs stats { totalRequests savingsRate pendingRequests } } }",
        )
        .await;
        assert_eq!(
            stats,
            json!({"deduplicationStats": {
                "deduplicationEnabled": true,
                "gracePeriodSecs": 5,
                "stats": {"totalRequests": 0, "savingsRate": 0, "pendingRequests": 0}
            }})
        );

        let reset = run(&schema, "mutation { resetDeduplicationStats { totalRequests } }").await;
        assert_eq!(reset, json!({"resetDeduplicationStats": {"totalRequests": 0}}));
    }
}
