// Route definitions

use axum::{
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use crate::{export::ExportFormat, models::SearchParams, ranking::SortMode, AppState};

mod api;
mod pages;

// Query string shared by the result page and the export endpoint.
// Checkboxes arrive as "on" or not at all.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct SearchForm {
    #[serde(default)]
    pub query: String,
    pub limit: Option<u32>,
    #[serde(default)]
    pub sort: SortMode,
    pub new_only: Option<String>,
    pub format: Option<ExportFormat>,
}

impl SearchForm {
    pub fn new_only(&self) -> bool {
        self.new_only
            .as_deref()
            .is_some_and(|v| !v.is_empty() && v != "false" && v != "0")
    }

    pub fn params(&self) -> SearchParams {
        SearchParams {
            query: self.query.clone(),
            limit: self.limit,
            sort: self.sort,
            new_only: self.new_only(),
        }
    }

    // Query string for the download links on the result page
    pub fn export_query(&self, format: ExportFormat) -> String {
        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        serializer.append_pair("query", self.query.trim());
        if let Some(limit) = self.limit {
            serializer.append_pair("limit", &limit.to_string());
        }
        serializer.append_pair("sort", self.sort.as_str());
        if self.new_only() {
            serializer.append_pair("new_only", "on");
        }
        serializer.append_pair("format", format.extension());
        serializer.finish()
    }
}

pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/search", post(api::search_listings))
        .route("/export", get(api::export_listings))
        .route("/margin", post(api::calculate_margin));

    Router::new()
        .route("/", get(pages::index_page))
        .route("/results", get(pages::results_page))
        .route("/margin", get(pages::margin_page))
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::Condition,
        ranking::tests::listing,
        search::{tests::offline_service, CacheKey, SearchService},
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, HeaderMap, Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(service: SearchService) -> Router {
        let settings = Arc::new(service.settings().clone());
        create_router(AppState { settings, search: Arc::new(service) })
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, String::from_utf8_lossy(&body).into_owned())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn seeded_service() -> SearchService {
        let service = offline_service();
        let mut bulb = listing("MLB1", Some(19.9), 1500, Condition::New);
        bulb.title = "Lâmpada LED Bivolt".to_string();
        let mut used = listing("MLB2", Some(5.0), 3, Condition::Used);
        used.title = "Lâmpada usada".to_string();
        service
            .remember(CacheKey::new("lampada", 20, SortMode::BestSelling), Arc::new(vec![bulb, used]))
            .await;
        service
    }

    #[test]
    fn export_query_round_trips_the_form() {
        let form = SearchForm {
            query: " lâmpada led ".to_string(),
            limit: Some(20),
            sort: SortMode::PriceAsc,
            new_only: Some("on".to_string()),
            format: None,
        };
        assert_eq!(
            form.export_query(ExportFormat::Csv),
            "query=l%C3%A2mpada+led&limit=20&sort=price_asc&new_only=on&format=csv"
        );
        assert!(!SearchForm { new_only: Some("false".to_string()), ..SearchForm::default() }.new_only());
    }

    #[tokio::test]
    async fn index_page_renders_both_forms() {
        let (status, _, body) = send(app(offline_service()), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#"action="/results""#));
        assert!(body.contains(r#"action="/margin""#));
    }

    #[tokio::test]
    async fn results_page_shows_ranked_rows_and_report() {
        let uri = "/results?query=lampada&limit=20&sort=best_selling";
        let (status, _, body) = send(app(seeded_service().await), get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Lâmpada LED Bivolt"));
        assert!(body.contains("1.500"));
        assert!(body.contains("bivolt"));
        assert!(body.contains("format=xlsx"));
    }

    #[tokio::test]
    async fn results_page_reports_empty_filter_result() {
        let service = offline_service();
        service
            .remember(
                CacheKey::new("lampada", 20, SortMode::Relevance),
                Arc::new(vec![listing("MLB2", Some(5.0), 3, Condition::Used)]),
            )
            .await;
        let uri = "/results?query=lampada&limit=20&sort=relevance&new_only=on";
        let (status, _, body) = send(app(service), get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("No listings matched"));
    }

    #[tokio::test]
    async fn results_page_rejects_empty_query() {
        let (status, _, body) = send(app(offline_service()), get("/results?query=&limit=20")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("enter a search term"));
    }

    #[tokio::test]
    async fn export_downloads_csv_attachment() {
        let uri = "/api/export?query=lampada&limit=20&sort=best_selling&format=csv";
        let (status, headers, body) = send(app(seeded_service().await), get(uri)).await;
        assert_eq!(status, StatusCode::OK);
        let disposition = headers[header::CONTENT_DISPOSITION].to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"listings_report_"));
        assert!(disposition.ends_with(".csv\""));
        assert!(body.starts_with("Title,Price (R$)"));
        assert!(body.contains("Lâmpada LED Bivolt"));
    }

    #[tokio::test]
    async fn search_api_returns_json_outcome() {
        let body = r#"{"query":"lampada","limit":20,"sort":"best_selling","newOnly":true}"#;
        let (status, _, body) = send(app(seeded_service().await), post_json("/api/search", body)).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["from_cache"], true);
        assert_eq!(json["ranked"]["status"], "ranked");
        assert_eq!(json["ranked"]["listings"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn search_api_rejects_empty_query() {
        let (status, _, _) = send(app(offline_service()), post_json("/api/search", r#"{"query":" "}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn margin_api_and_page() {
        let (status, _, body) = send(
            app(offline_service()),
            post_json("/api/margin", r#"{"sale_price":100.0,"cost_price":50.0}"#),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["profitable"], true);
        assert_eq!(json["results"].as_array().unwrap().len(), 2);

        let (status, _, body) = send(app(offline_service()), get("/margin?sale_price=40&cost_price=50")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("does not cover the cost"));
    }

    #[tokio::test]
    async fn margin_page_flags_loss_after_fees() {
        let (status, _, body) = send(app(offline_service()), get("/margin?sale_price=100&cost_price=90")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Fees take more than the spread"));
        assert!(body.contains("-19,75"));
        assert!(!body.contains("N/A"));
    }
}
