// 80/20 keyword analysis, cost targets and the margin calculator

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::{FeeSettings, ReportSettings};
use crate::models::Listing;
use crate::ranking::{compare, SortMode};

// Letters only, whole words. "led12" is not a token.
static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b\p{L}+\b").expect("word pattern is a valid regex")
});

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct KeywordCount {
    pub word: String,
    pub count: usize,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct CostTarget {
    pub markup: f64,
    pub max_cost: f64,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CostTargets {
    Available { mean_price: f64, targets: Vec<CostTarget> },
    /// None of the high performers had a usable price.
    Unavailable,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct Report {
    pub sample_size: usize,
    pub keywords: Vec<KeywordCount>,
    pub cost_targets: CostTargets,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MarginResult {
    pub marketplace: String,
    pub commission: f64,
    pub total_cost: f64,
    pub gross_profit: f64,
    pub margin_pct: f64,
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// The best-selling `top_fraction` of `listings`, never fewer than
/// `min_top_records` unless there are fewer listings than that.
pub fn high_performers<'a>(listings: &'a [Listing], settings: &ReportSettings) -> Vec<&'a Listing> {
    let by_fraction = (listings.len() as f64 * settings.top_fraction).floor() as usize;
    let take = by_fraction.max(settings.min_top_records).min(listings.len());

    let mut ranked: Vec<&Listing> = listings.iter().collect();
    ranked.sort_by(|a, b| compare(SortMode::BestSelling, a, b));
    ranked.truncate(take);
    ranked
}

pub fn tokenize(title: &str, min_len: usize) -> Vec<String> {
    let lowered = title.to_lowercase();
    WORD_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|w| w.chars().count() >= min_len)
        .map(str::to_string)
        .collect()
}

pub fn keyword_frequencies(sample: &[&Listing], settings: &ReportSettings) -> Vec<KeywordCount> {
    let stop_words: HashSet<String> = settings.stop_words.iter().map(|w| w.to_lowercase()).collect();

    // Insertion-ordered counter so ties keep first-seen order
    let mut order: Vec<KeywordCount> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for listing in sample {
        for token in tokenize(&listing.title, settings.min_token_len) {
            if stop_words.contains(&token) {
                continue;
            }
            match index.get(&token) {
                Some(&i) => order[i].count += 1,
                None => {
                    index.insert(token.clone(), order.len());
                    order.push(KeywordCount { word: token, count: 1 });
                }
            }
        }
    }

    order.sort_by(|a, b| b.count.cmp(&a.count));
    order.truncate(settings.keyword_count);
    order
}

pub fn cost_targets(sample: &[&Listing], markups: &[f64]) -> CostTargets {
    let prices: Vec<f64> = sample.iter().filter_map(|l| l.price).collect();
    if prices.is_empty() {
        return CostTargets::Unavailable;
    }
    let mean_price = prices.iter().sum::<f64>() / prices.len() as f64;
    let targets = markups
        .iter()
        .map(|&markup| CostTarget { markup, max_cost: mean_price / (1.0 + markup) })
        .collect();
    CostTargets::Available { mean_price, targets }
}

pub fn build_report(listings: &[Listing], settings: &ReportSettings) -> Report {
    let sample = high_performers(listings, settings);
    Report {
        sample_size: sample.len(),
        keywords: keyword_frequencies(&sample, settings),
        cost_targets: cost_targets(&sample, &settings.markup_targets),
    }
}

/// Per-marketplace profit for selling at `sale_price` something bought at
/// `cost_price`. Unprofitable or invalid input yields zeroed rows.
pub fn margins(sale_price: f64, cost_price: f64, fees: &FeeSettings) -> Vec<MarginResult> {
    let valid = sale_price.is_finite() && cost_price.is_finite() && sale_price > cost_price;

    fees.marketplaces
        .iter()
        .map(|fee| {
            if !valid {
                return MarginResult {
                    marketplace: fee.name.clone(),
                    commission: 0.0,
                    total_cost: 0.0,
                    gross_profit: 0.0,
                    margin_pct: 0.0,
                };
            }
            let commission = sale_price * fee.commission_rate;
            let total_cost = cost_price + sale_price * fees.charges_rate + commission + fee.fixed_cost;
            let gross_profit = sale_price - total_cost;
            MarginResult {
                marketplace: fee.name.clone(),
                commission: round2(commission),
                total_cost: round2(total_cost),
                gross_profit: round2(gross_profit),
                margin_pct: round2(gross_profit / sale_price * 100.0),
            }
        })
        .collect()
}
