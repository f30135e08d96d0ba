// Functions to talk to the marketplace's public JSON API (search + item details)

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::time::sleep;

use crate::{
    config::{CredentialPlacement, SourceSettings},
    error::FetchError,
    models::{Condition, DetailField, RawListing, RawPrice},
    ranking::SortMode,
};

// Shared HTTP client, built once in main and handed to both sources
pub fn build_client(settings: &SourceSettings) -> Result<Client> {
    reqwest::Client::builder()
        .user_agent(settings.user_agent.as_str())
        .timeout(Duration::from_secs(settings.request_timeout_secs))
        .build()
        .context("Failed to build reqwest client")
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<ApiItem>,
}

#[derive(Debug, Deserialize)]
struct ApiItem {
    id: String,
    #[serde(default)]
    title: String,
    price: Option<f64>,
    sold_quantity: Option<Value>,
    condition: Option<String>,
    #[serde(default)]
    permalink: String,
    thumbnail: Option<String>,
    #[serde(default)]
    shipping: ApiShipping,
}

#[derive(Debug, Deserialize, Default)]
struct ApiShipping {
    #[serde(default)]
    free_shipping: bool,
    logistic_type: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ItemDetail {
    date_created: Option<String>,
}

fn api_sort_key(sort: SortMode) -> Option<&'static str> {
    match sort {
        SortMode::PriceAsc => Some("price_asc"),
        SortMode::PriceDesc => Some("price_desc"),
        SortMode::BestSelling => Some("sold_quantity_desc"),
        SortMode::Relevance => None,
    }
}

// Header and query-parameter credentials are interchangeable for the API
fn with_credential(request: RequestBuilder, settings: &SourceSettings) -> RequestBuilder {
    match (&settings.credential, settings.credential_placement) {
        (Some(token), CredentialPlacement::Header) => request.bearer_auth(token),
        (Some(token), CredentialPlacement::Query) => request.query(&[("access_token", token)]),
        (None, _) => request,
    }
}

async fn get_json<T: serde::de::DeserializeOwned>(request: RequestBuilder, url: &str) -> Result<T, FetchError> {
    let response = request.send().await.map_err(|source| FetchError::Transport {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    tracing::debug!(url, status = %status, "Received response status");
    if !status.is_success() {
        return Err(FetchError::from_status(url, status));
    }

    let bytes = response.bytes().await.map_err(|source| FetchError::Transport {
        url: url.to_string(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn sold_label(value: Option<Value>) -> String {
    match value {
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::String(s)) => s,
        _ => String::new(),
    }
}

fn to_raw_listing(item: ApiItem, page: u32) -> RawListing {
    let fulfillment = item
        .shipping
        .logistic_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case("fulfillment"));
    RawListing {
        id: item.id,
        title: item.title,
        price: item.price.map_or(RawPrice::Missing, RawPrice::Number),
        sold: sold_label(item.sold_quantity),
        condition: item.condition.as_deref().map_or(Condition::Unknown, Condition::from_label),
        free_shipping: item.shipping.free_shipping,
        fulfillment,
        permalink: item.permalink,
        created: DetailField::NotRequested,
        thumbnail: item.thumbnail.filter(|t| !t.is_empty()),
        page,
    }
}

async fn fetch_search_page(
    client: &Client,
    settings: &SourceSettings,
    query: &str,
    offset: u32,
    page_size: u32,
    sort: SortMode,
) -> Result<Vec<ApiItem>, FetchError> {
    let url = format!(
        "{}/sites/{}/search",
        settings.api_base_url.trim_end_matches('/'),
        settings.site_id
    );
    let mut request = client
        .get(&url)
        .query(&[("q", query.to_string()), ("limit", page_size.to_string()), ("offset", offset.to_string())]);
    if let Some(key) = api_sort_key(sort) {
        request = request.query(&[("sort", key)]);
    }
    let request = with_credential(request, settings);

    tracing::debug!(url = %url, offset, page_size, "Fetching search page");
    let response: SearchResponse = get_json(request, &url).await?;
    Ok(response.results)
}

/// Creation date of one item. Failures stay attached to that item.
pub async fn fetch_created_date(
    client: &Client,
    settings: &SourceSettings,
    id: &str,
) -> DetailField<DateTime<FixedOffset>> {
    let url = format!("{}/items/{}", settings.api_base_url.trim_end_matches('/'), id);
    let request = with_credential(client.get(&url), settings);

    match get_json::<ItemDetail>(request, &url).await {
        Ok(ItemDetail { date_created: Some(raw) }) => match DateTime::parse_from_rfc3339(&raw) {
            Ok(date) => DetailField::Present(date),
            Err(e) => DetailField::Failed(format!("invalid date_created {raw:?}: {e}")),
        },
        Ok(ItemDetail { date_created: None }) => DetailField::Failed("item has no date_created".to_string()),
        Err(e) => {
            tracing::warn!(id, error = %e, "Item detail lookup failed");
            DetailField::Failed(e.to_string())
        }
    }
}

// Pages through the search endpoint one request at a time
pub async fn search(
    client: &Client,
    settings: &SourceSettings,
    query: &str,
    limit: u32,
    sort: SortMode,
) -> Result<Vec<RawListing>, FetchError> {
    let page_size = settings.api_page_size.max(1);
    let mut listings: Vec<RawListing> = Vec::new();
    let mut page = 1;

    while (listings.len() as u32) < limit && page <= settings.max_pages {
        if page > 1 {
            sleep(Duration::from_millis(settings.page_delay_ms)).await;
        }
        let wanted = page_size.min(limit - listings.len() as u32);
        let items = fetch_search_page(client, settings, query, listings.len() as u32, wanted, sort).await?;
        let received = items.len() as u32;
        tracing::debug!(page, received, "Search page parsed");

        listings.extend(items.into_iter().map(|item| to_raw_listing(item, page)));
        if received < wanted {
            break;
        }
        page += 1;
    }
    listings.truncate(limit as usize);

    if settings.fetch_details {
        for listing in listings.iter_mut() {
            sleep(Duration::from_millis(settings.detail_delay_ms)).await;
            listing.created = fetch_created_date(client, settings, &listing.id).await;
        }
    }

    tracing::info!(query, count = listings.len(), "API search complete");
    Ok(listings)
}
