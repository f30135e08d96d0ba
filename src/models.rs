// Data structures shared by the sources, the pipeline and the routes

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::ranking::SortMode;

// Search parameters received from the form / JSON API
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    pub query: String,
    pub limit: Option<u32>,
    #[serde(default)]
    pub sort: SortMode,
    #[serde(default)]
    pub new_only: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    New,
    Used,
    #[default]
    Unknown,
}

impl Condition {
    // Accepts the API codes ("new", "used") and the pt-BR page labels.
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "new" | "novo" | "nova" => Condition::New,
            "used" | "usado" | "usada" | "recondicionado" | "refurbished" => Condition::Used,
            _ => Condition::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::New => "new",
            Condition::Used => "used",
            Condition::Unknown => "unknown",
        }
    }
}

/// Price exactly as the source delivered it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RawPrice {
    Text(String),
    Number(f64),
    Missing,
}

impl RawPrice {
    pub fn display(&self) -> String {
        match self {
            RawPrice::Text(s) => s.clone(),
            RawPrice::Number(n) => n.to_string(),
            RawPrice::Missing => String::new(),
        }
    }
}

/// Outcome of a per-listing supplementary lookup.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum DetailField<T> {
    Present(T),
    #[default]
    NotRequested,
    Failed(String),
}

impl<T> DetailField<T> {
    pub fn present(&self) -> Option<&T> {
        match self {
            DetailField::Present(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, DetailField::Failed(_))
    }
}

// One record as fetched, before normalization
#[derive(Debug, Clone, PartialEq)]
pub struct RawListing {
    pub id: String,
    pub title: String,
    pub price: RawPrice,
    pub sold: String,
    pub condition: Condition,
    pub free_shipping: bool,
    pub fulfillment: bool,
    pub permalink: String,
    pub created: DetailField<DateTime<FixedOffset>>,
    pub thumbnail: Option<String>,
    pub page: u32,
}

// Normalized listing handed to ranking, reporting and export
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    pub id: String,
    pub title: String,
    pub price: Option<f64>,
    pub raw_price: String,
    pub sold: u64,
    pub raw_sold: String,
    pub condition: Condition,
    pub free_shipping: bool,
    pub fulfillment: bool,
    pub permalink: String,
    pub created: DetailField<DateTime<FixedOffset>>,
    pub thumbnail: Option<String>,
    pub page: u32,
}

// Body of POST /api/margin and query of GET /margin
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct MarginRequest {
    pub sale_price: f64,
    pub cost_price: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condition_labels_map_to_variants() {
        assert_eq!(Condition::from_label("new"), Condition::New);
        assert_eq!(Condition::from_label(" Usado "), Condition::Used);
        assert_eq!(Condition::from_label("Recondicionado"), Condition::Used);
        assert_eq!(Condition::from_label("not_specified"), Condition::Unknown);
    }

    #[test]
    fn search_params_use_defaults_for_sort_and_filter() {
        let params: SearchParams = serde_json::from_str(r#"{"query":"lâmpada led","limit":20}"#).unwrap();
        assert_eq!(params.sort, SortMode::Relevance);
        assert!(!params.new_only);

        let params: SearchParams =
            serde_json::from_str(r#"{"query":"x","sort":"best_selling","newOnly":true}"#).unwrap();
        assert_eq!(params.sort, SortMode::BestSelling);
        assert!(params.new_only);
        assert_eq!(params.limit, None);
    }
}
