use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};

#[cfg(feature = "graphql")]
use async_graphql::{Enum, InputObject, SimpleObject};

const RESULTS_PATH: &str = "/flights/results";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[cfg_attr(feature = "graphql", derive(Enum))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum CabinClass {
    #[default]
    Economy,
    PremiumEconomy,
    Business,
    First,
}

/// Criteria of the search that produced an offer
///
/// Kept alongside a tracked offer so an expired offer can be replaced by
/// running the same search again.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "graphql", derive(SimpleObject, InputObject))]
#[cfg_attr(feature = "graphql", graphql(input_name = "SearchParametersInput"))]
#[serde(rename_all = "camelCase")]
pub struct SearchParameters {
    pub origin: String,
    pub destination: String,
    pub departure_date: NaiveDate,
    #[serde(default)]
    pub return_date: Option<NaiveDate>,
    pub adults: u32,
    #[serde(default)]
    pub children: u32,
    #[serde(default)]
    pub infants: u32,
    #[serde(default)]
    pub cabin_class: Option<CabinClass>,
}

impl SearchParameters {
    pub fn new(origin: String, destination: String, departure_date: NaiveDate, adults: u32) -> Self {
        Self {
            origin,
            destination,
            departure_date,
            return_date: None,
            adults,
            children: 0,
            infants: 0,
            cabin_class: None,
        }
    }

    pub fn with_return_date(mut self, return_date: NaiveDate) -> Self {
        self.return_date = Some(return_date);
        self
    }

    pub fn with_children(mut self, children: u32) -> Self {
        self.children = children;
        self
    }

    pub fn with_infants(mut self, infants: u32) -> Self {
        self.infants = infants;
        self
    }

    pub fn with_cabin_class(mut self, cabin_class: CabinClass) -> Self {
        self.cabin_class = Some(cabin_class);
        self
    }

    pub fn passengers(&self) -> u32 {
        self.adults + self.children + self.infants
    }

    /// Relative URL of the results page that runs this search again
    pub fn refresh_url(&self) -> String {
        let mut query = vec![
            ("from", self.origin.clone()),
            ("to", self.destination.clone()),
            ("departure", self.departure_date.format("%Y-%m-%d").to_string()),
        ];
        if let Some(return_date) = self.return_date {
            query.push(("return", return_date.format("%Y-%m-%d").to_string()));
        }
        query.push(("adults", self.adults.to_string()));
        query.push(("children", self.children.to_string()));
        query.push(("infants", self.infants.to_string()));
        if let Some(cabin_class) = self.cabin_class {
            query.push(("class", cabin_class.to_string().to_lowercase()));
        }

        let query = query
            .iter()
            .map(|(name, value)| format!("{}={}", name, urlencoding::encode(value)))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}?{}", RESULTS_PATH, query)
    }
}
