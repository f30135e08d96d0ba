// Filtering and ordering of normalized listings

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::models::{Condition, Listing};

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Keep the order the source returned.
    #[default]
    Relevance,
    PriceAsc,
    PriceDesc,
    /// Sold-count descending, cheaper first on ties.
    BestSelling,
}

impl SortMode {
    pub fn label(&self) -> &'static str {
        match self {
            SortMode::Relevance => "Relevance",
            SortMode::PriceAsc => "Lowest price",
            SortMode::PriceDesc => "Highest price",
            SortMode::BestSelling => "Best selling",
        }
    }

    pub fn all() -> [SortMode; 4] {
        [SortMode::BestSelling, SortMode::PriceAsc, SortMode::PriceDesc, SortMode::Relevance]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SortMode::Relevance => "relevance",
            SortMode::PriceAsc => "price_asc",
            SortMode::PriceDesc => "price_desc",
            SortMode::BestSelling => "best_selling",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConditionFilter {
    #[default]
    Any,
    NewOnly,
}

impl ConditionFilter {
    pub fn from_new_only(new_only: bool) -> Self {
        if new_only { ConditionFilter::NewOnly } else { ConditionFilter::Any }
    }

    fn keeps(&self, listing: &Listing) -> bool {
        match self {
            ConditionFilter::Any => true,
            ConditionFilter::NewOnly => listing.condition == Condition::New,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "status", content = "listings", rename_all = "snake_case")]
pub enum RankOutcome {
    Ranked(Vec<Listing>),
    /// The filter left nothing to show. Not an error.
    NoMatches,
}

impl RankOutcome {
    pub fn listings(&self) -> &[Listing] {
        match self {
            RankOutcome::Ranked(listings) => listings,
            RankOutcome::NoMatches => &[],
        }
    }
}

// Absent prices go last whatever the direction
fn cmp_price(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) if descending => b.total_cmp(&a),
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Ordering used by `sort`; `Relevance` treats everything as equal.
pub fn compare(sort: SortMode, a: &Listing, b: &Listing) -> Ordering {
    match sort {
        SortMode::Relevance => Ordering::Equal,
        SortMode::PriceAsc => cmp_price(a.price, b.price, false),
        SortMode::PriceDesc => cmp_price(a.price, b.price, true),
        SortMode::BestSelling => b
            .sold
            .cmp(&a.sold)
            .then_with(|| cmp_price(a.price, b.price, false)),
    }
}

pub fn sort_listings(listings: &mut [Listing], sort: SortMode) {
    // slice::sort_by is stable, equal keys keep their source order
    if sort != SortMode::Relevance {
        listings.sort_by(|a, b| compare(sort, a, b));
    }
}

pub fn rank(listings: Vec<Listing>, sort: SortMode, filter: ConditionFilter) -> RankOutcome {
    let mut kept: Vec<Listing> = listings.into_iter().filter(|l| filter.keeps(l)).collect();
    if kept.is_empty() {
        return RankOutcome::NoMatches;
    }
    sort_listings(&mut kept, sort);
    RankOutcome::Ranked(kept)
}

pub fn top_n(ranked: &[Listing], n: usize) -> &[Listing] {
    &ranked[..n.min(ranked.len())]
}
