// One search: validate, consult the cache, fetch, normalize, rank, report

use std::sync::Arc;

use cached::{Cached, TimedSizedCache};
use reqwest::Client;
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    config::{Settings, SourceMode},
    error::SearchError,
    marketplace_api,
    models::{Listing, SearchParams},
    normalize::normalize_all,
    ranking::{rank, top_n, ConditionFilter, RankOutcome, SortMode},
    report::{build_report, Report},
    scraper,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    query: String,
    limit: u32,
    sort: SortMode,
}

impl CacheKey {
    pub fn new(query: &str, limit: u32, sort: SortMode) -> Self {
        Self { query: query.trim().to_lowercase(), limit, sort }
    }
}

/// Parameters after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidSearch {
    pub query: String,
    pub limit: u32,
    pub sort: SortMode,
    pub filter: ConditionFilter,
}

pub fn validate(params: &SearchParams, settings: &Settings) -> Result<ValidSearch, SearchError> {
    let query = params.query.trim();
    if query.is_empty() {
        return Err(SearchError::EmptyQuery);
    }
    let max = settings.search.max_limit;
    let limit = params.limit.unwrap_or(settings.search.default_limit);
    if limit == 0 || limit > max {
        return Err(SearchError::InvalidLimit { max });
    }
    Ok(ValidSearch {
        query: query.to_string(),
        limit,
        sort: params.sort,
        filter: ConditionFilter::from_new_only(params.new_only),
    })
}

#[derive(Debug, Serialize)]
pub struct SearchOutcome {
    pub query: String,
    pub sort: SortMode,
    /// Records returned by the source before filtering.
    pub fetched: usize,
    pub from_cache: bool,
    pub ranked: RankOutcome,
    /// Absent when nothing matched.
    pub report: Option<Report>,
}

impl SearchOutcome {
    pub fn rows(&self) -> &[Listing] {
        self.ranked.listings()
    }
}

pub struct SearchService {
    settings: Arc<Settings>,
    client: Client,
    cache: Option<Mutex<TimedSizedCache<CacheKey, Arc<Vec<Listing>>>>>,
}

impl SearchService {
    pub fn new(settings: Arc<Settings>, client: Client) -> Self {
        let cache = (settings.cache.ttl_secs > 0 && settings.cache.capacity > 0).then(|| {
            Mutex::new(TimedSizedCache::with_size_and_lifespan(
                settings.cache.capacity,
                settings.cache.ttl_secs,
            ))
        });
        Self { settings, client, cache }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    async fn cached(&self, key: &CacheKey) -> Option<Arc<Vec<Listing>>> {
        let cache = self.cache.as_ref()?;
        cache.lock().await.cache_get(key).cloned()
    }

    pub(crate) async fn remember(&self, key: CacheKey, listings: Arc<Vec<Listing>>) {
        if let Some(cache) = &self.cache {
            cache.lock().await.cache_set(key, listings);
        }
    }

    async fn fetch(&self, search: &ValidSearch) -> Result<Vec<Listing>, SearchError> {
        let source = &self.settings.source;
        let raw = match source.mode {
            SourceMode::Api => {
                marketplace_api::search(&self.client, source, &search.query, search.limit, search.sort).await?
            }
            SourceMode::Html => {
                scraper::fetch_listings(
                    &self.client,
                    source,
                    &self.settings.locale,
                    &search.query,
                    search.limit,
                    search.sort,
                )
                .await?
            }
        };
        Ok(normalize_all(raw, &self.settings.locale))
    }

    pub async fn search(&self, params: &SearchParams) -> Result<SearchOutcome, SearchError> {
        let search = validate(params, &self.settings)?;
        let key = CacheKey::new(&search.query, search.limit, search.sort);

        let (listings, from_cache) = match self.cached(&key).await {
            Some(listings) => {
                tracing::info!(query = %search.query, "Serving search from cache");
                (listings, true)
            }
            None => {
                let listings = Arc::new(self.fetch(&search).await?);
                self.remember(key, Arc::clone(&listings)).await;
                (listings, false)
            }
        };

        let fetched = listings.len();
        let (ranked, report) = match rank((*listings).clone(), search.sort, search.filter) {
            RankOutcome::Ranked(all) => {
                let report = build_report(&all, &self.settings.report);
                let rows = top_n(&all, search.limit as usize).to_vec();
                (RankOutcome::Ranked(rows), Some(report))
            }
            RankOutcome::NoMatches => (RankOutcome::NoMatches, None),
        };
        tracing::info!(
            query = %search.query,
            fetched,
            shown = ranked.listings().len(),
            from_cache,
            "Search finished"
        );

        Ok(SearchOutcome {
            query: search.query,
            sort: search.sort,
            fetched,
            from_cache,
            ranked,
            report,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::Condition;
    use crate::ranking::tests::listing;

    fn params(query: &str, limit: Option<u32>, sort: SortMode, new_only: bool) -> SearchParams {
        SearchParams { query: query.to_string(), limit, sort, new_only }
    }

    // The source URLs point nowhere, so any fetch would fail the test.
    pub(crate) fn offline_service() -> SearchService {
        let mut settings = Settings::default();
        settings.source.api_base_url = "http://127.0.0.1:9".to_string();
        settings.source.listing_base_url = "http://127.0.0.1:9".to_string();
        SearchService::new(Arc::new(settings), Client::new())
    }

    #[test]
    fn validation_rejects_empty_query_and_bad_limits() {
        let settings = Settings::default();
        assert!(matches!(
            validate(&params("   ", Some(10), SortMode::Relevance, false), &settings),
            Err(SearchError::EmptyQuery)
        ));
        assert!(matches!(
            validate(&params("led", Some(0), SortMode::Relevance, false), &settings),
            Err(SearchError::InvalidLimit { max: 200 })
        ));
        assert!(matches!(
            validate(&params("led", Some(201), SortMode::Relevance, false), &settings),
            Err(SearchError::InvalidLimit { .. })
        ));

        let ok = validate(&params(" led ", None, SortMode::PriceAsc, true), &settings).unwrap();
        assert_eq!(ok.query, "led");
        assert_eq!(ok.limit, 20);
        assert_eq!(ok.filter, ConditionFilter::NewOnly);
    }

    #[test]
    fn cache_key_ignores_case_and_padding() {
        assert_eq!(
            CacheKey::new(" Lâmpada LED ", 20, SortMode::PriceAsc),
            CacheKey::new("lâmpada led", 20, SortMode::PriceAsc)
        );
        assert_ne!(
            CacheKey::new("led", 20, SortMode::PriceAsc),
            CacheKey::new("led", 20, SortMode::BestSelling)
        );
    }

    #[tokio::test]
    async fn cache_hit_skips_fetching_and_applies_filter() {
        let service = offline_service();
        let cached = vec![
            listing("a", Some(30.0), 1, Condition::New),
            listing("b", Some(10.0), 9, Condition::Used),
            listing("c", Some(20.0), 5, Condition::New),
        ];
        service
            .remember(CacheKey::new("led", 2, SortMode::PriceAsc), Arc::new(cached))
            .await;

        let outcome = service.search(&params("LED", Some(2), SortMode::PriceAsc, true)).await.unwrap();
        assert!(outcome.from_cache);
        assert_eq!(outcome.fetched, 3);
        let ids: Vec<&str> = outcome.rows().iter().map(|l| l.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
        assert_eq!(outcome.report.unwrap().sample_size, 2);
    }

    #[tokio::test]
    async fn filtered_out_cache_entry_reports_no_matches() {
        let service = offline_service();
        service
            .remember(
                CacheKey::new("led", 5, SortMode::Relevance),
                Arc::new(vec![listing("a", Some(1.0), 1, Condition::Used)]),
            )
            .await;

        let outcome = service.search(&params("led", Some(5), SortMode::Relevance, true)).await.unwrap();
        assert_eq!(outcome.ranked, RankOutcome::NoMatches);
        assert!(outcome.report.is_none());
    }

    #[tokio::test]
    async fn cache_miss_surfaces_transport_errors() {
        let service = offline_service();
        let err = service.search(&params("led", Some(5), SortMode::Relevance, false)).await.unwrap_err();
        assert!(matches!(err, SearchError::Fetch(_)), "{err:?}");
    }
}
