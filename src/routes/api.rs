// Handlers for the JSON API and file downloads

use axum::{
    extract::{Json as JsonExtract, Query, State},
    http::header,
    response::{IntoResponse, Json},
};
use serde::Serialize;

use super::SearchForm;
use crate::{
    error::AppError,
    export,
    models::{MarginRequest, SearchParams},
    report::{margins, MarginResult},
    AppState,
};

#[derive(Serialize)]
pub struct MarginResponse {
    sale_price: f64,
    cost_price: f64,
    profitable: bool,
    results: Vec<MarginResult>,
}

pub async fn search_listings(
    State(app_state): State<AppState>,
    JsonExtract(params): JsonExtract<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    tracing::info!("API call: search_listings for query: {:?}", params.query);
    let outcome = app_state.search.search(&params).await?;
    Ok(Json(outcome))
}

pub async fn export_listings(
    State(app_state): State<AppState>,
    Query(form): Query<SearchForm>,
) -> Result<impl IntoResponse, AppError> {
    let format = form.format.unwrap_or_default();
    tracing::info!("API call: export_listings as {} for query: {:?}", format.extension(), form.query);

    let outcome = app_state.search.search(&form.params()).await?;
    let bytes = export::export(outcome.rows(), &app_state.settings.locale, format)?;
    let file_name = export::export_file_name(format, &chrono::Local::now());

    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{}\"", file_name)),
        ],
        bytes,
    ))
}

pub async fn calculate_margin(
    State(app_state): State<AppState>,
    JsonExtract(request): JsonExtract<MarginRequest>,
) -> Json<MarginResponse> {
    let results = margins(request.sale_price, request.cost_price, &app_state.settings.fees);
    Json(MarginResponse {
        sale_price: request.sale_price,
        cost_price: request.cost_price,
        profitable: request.sale_price > request.cost_price,
        results,
    })
}
