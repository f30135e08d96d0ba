use crate::{
    config::{Locale, SourceSettings},
    error::FetchError,
    models::{Condition, DetailField, RawListing, RawPrice},
    normalize::compose_price,
    ranking::SortMode,
};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tokio::time::sleep;

fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid selector {css:?}: {e:?}"))
}

// Result-card markup of the listing pages
static ITEM: Lazy<Selector> = Lazy::new(|| selector("li.ui-search-layout__item"));
static TITLE_LINK: Lazy<Selector> = Lazy::new(|| selector("a.poly-component__title, h2.ui-search-item__title a"));
static PRICE_WHOLE: Lazy<Selector> = Lazy::new(|| selector(".poly-price__current .andes-money-amount__fraction"));
static PRICE_CENTS: Lazy<Selector> = Lazy::new(|| selector(".poly-price__current .andes-money-amount__cents"));
static SOLD_LABEL: Lazy<Selector> = Lazy::new(|| selector(".poly-component__review-compacted .poly-phrase-label"));
static SHIPPING: Lazy<Selector> = Lazy::new(|| selector(".poly-component__shipping"));
static FULFILLMENT: Lazy<Selector> = Lazy::new(|| selector(r#"[aria-label="FULL"], .poly-component__shipped-from .poly-shipping__fulfillment"#));
static CONDITION: Lazy<Selector> = Lazy::new(|| selector(".poly-component__item-condition"));
static IMAGE: Lazy<Selector> = Lazy::new(|| selector("img.poly-component__picture"));

static ITEM_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(ML[A-Z])-?(\d+)").expect("item id pattern is a valid regex"));

fn text_of(item: &ElementRef, selector: &Selector) -> Option<String> {
    item.select(selector)
        .next()
        .map(|e| e.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
}

fn item_id(link: &str) -> String {
    ITEM_ID
        .captures(link)
        .map(|c| format!("{}{}", &c[1], &c[2]))
        .unwrap_or_else(|| link.to_string())
}

// Pages lazy-load images: the real URL is in data-src and src holds a data: placeholder
fn image_url(item: &ElementRef) -> Option<String> {
    let img = item.select(&IMAGE).next()?;
    ["data-src", "src"]
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .find(|url| !url.is_empty() && !url.starts_with("data:"))
        .map(str::to_string)
}

// Helper to parse the result cards of one listing page
pub fn parse_listing_html(html_content: &str, page: u32, locale: &Locale) -> Vec<RawListing> {
    let document = Html::parse_document(html_content);
    let mut listings = Vec::new();

    for item in document.select(&ITEM) {
        let Some(link_elem) = item.select(&TITLE_LINK).next() else {
            continue;
        };
        // Only add if a link was found
        let Some(link) = link_elem.value().attr("href").map(str::to_string) else {
            continue;
        };
        let title = link_elem.text().collect::<String>().trim().to_string();

        let price = match text_of(&item, &PRICE_WHOLE) {
            Some(whole) => compose_price(&whole, text_of(&item, &PRICE_CENTS).as_deref(), locale),
            None => RawPrice::Missing,
        };

        // "4.8 | +10mil vendidos": the count is after the rating
        let sold = text_of(&item, &SOLD_LABEL)
            .map(|label| label.rsplit('|').next().unwrap_or_default().trim().to_string())
            .unwrap_or_default();

        let free_shipping = text_of(&item, &SHIPPING)
            .is_some_and(|t| t.to_lowercase().contains("grátis") || t.to_lowercase().contains("free"));

        // Search pages only label items that are not new
        let condition = text_of(&item, &CONDITION).map_or(Condition::New, |label| Condition::from_label(&label));

        listings.push(RawListing {
            id: item_id(&link),
            title,
            price,
            sold,
            condition,
            free_shipping,
            fulfillment: item.select(&FULFILLMENT).next().is_some(),
            permalink: link,
            created: DetailField::NotRequested,
            thumbnail: image_url(&item),
            page,
        });
    }
    listings
}

fn sort_fragment(sort: SortMode) -> Option<&'static str> {
    match sort {
        SortMode::PriceAsc => Some("_OrderId_PRICE"),
        SortMode::PriceDesc => Some("_OrderId_PRICE*DESC"),
        // Best selling is ordered locally after fetching
        SortMode::BestSelling | SortMode::Relevance => None,
    }
}

/// URL of listing page `page_index` (0-based) for `query`.
pub fn listing_page_url(settings: &SourceSettings, query: &str, page_index: u32, sort: SortMode) -> String {
    let slug = query
        .split_whitespace()
        .map(|word| url::form_urlencoded::byte_serialize(word.to_lowercase().as_bytes()).collect::<String>())
        .collect::<Vec<_>>()
        .join("-");

    let mut path = slug;
    if page_index > 0 {
        path.push_str(&format!("_Desde_{}", page_index * settings.html_page_size + 1));
    }
    if let Some(fragment) = sort_fragment(sort) {
        path.push_str(fragment);
    }
    if page_index > 0 || sort_fragment(sort).is_some() {
        path.push_str("_NoIndex_True");
    }

    format!("{}/{}", settings.listing_base_url.trim_end_matches('/'), path)
}

// Fetches a single listing page
async fn fetch_page(client: &Client, url: &str) -> Result<String, FetchError> {
    let response = client.get(url).send().await.map_err(|source| FetchError::Transport {
        url: url.to_string(),
        source,
    })?;

    let status = response.status();
    tracing::debug!(url, status = %status, "Received response status");
    if !status.is_success() {
        return Err(FetchError::from_status(url, status));
    }

    response.text().await.map_err(|source| FetchError::Transport {
        url: url.to_string(),
        source,
    })
}

// Main function to fetch listings page by page, waiting between pages
pub async fn fetch_listings(
    client: &Client,
    settings: &SourceSettings,
    locale: &Locale,
    query: &str,
    limit: u32,
    sort: SortMode,
) -> Result<Vec<RawListing>, FetchError> {
    tracing::info!(query, limit, sort = sort.as_str(), "Starting listing page fetch");

    let mut all_results: Vec<RawListing> = Vec::new();
    for page_index in 0..settings.max_pages {
        if all_results.len() >= limit as usize {
            break;
        }
        if page_index > 0 {
            sleep(Duration::from_millis(settings.page_delay_ms)).await;
        }

        let url = listing_page_url(settings, query, page_index, sort);
        tracing::debug!(page = page_index + 1, url = %url, "Fetching listing page");
        let html = fetch_page(client, &url).await?;
        let page_results = parse_listing_html(&html, page_index + 1, locale);
        tracing::debug!(page = page_index + 1, count = page_results.len(), "Parsed listing page");

        if page_results.is_empty() {
            break;
        }
        all_results.extend(page_results);
    }
    all_results.truncate(limit as usize);

    tracing::info!(query, count = all_results.len(), "Listing page fetch complete");
    Ok(all_results)
}
