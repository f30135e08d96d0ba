// Error types for the listing sources, the search service and the HTTP layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// A failed outbound request. Any of these aborts the whole search.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("could not reach {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("the marketplace denied access (HTTP {status}); requests from this network may be blocked, try again later or configure a credential")]
    AccessDenied { url: String, status: u16 },
    #[error("the marketplace answered HTTP {status} for {url}")]
    Status { url: String, status: u16 },
    #[error("unexpected response from {url}: {reason}")]
    Decode { url: String, reason: String },
}

impl FetchError {
    pub fn from_status(url: &str, status: reqwest::StatusCode) -> Self {
        if status == reqwest::StatusCode::FORBIDDEN {
            FetchError::AccessDenied { url: url.to_string(), status: status.as_u16() }
        } else {
            FetchError::Status { url: url.to_string(), status: status.as_u16() }
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, FetchError::AccessDenied { .. })
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("enter a search term")]
    EmptyQuery,
    #[error("the number of results must be between 1 and {max}")]
    InvalidLimit { max: u32 },
    #[error(transparent)]
    Fetch(#[from] FetchError),
}

#[derive(Debug)]
pub enum AppError {
    InternalServerError(anyhow::Error),
    BadRequest(String),
    Upstream(FetchError),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::InternalServerError(error)
    }
}

impl From<SearchError> for AppError {
    fn from(error: SearchError) -> Self {
        match error {
            SearchError::Fetch(e) => AppError::Upstream(e),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(e) => {
                tracing::error!("Internal server error: {:?}", e);
                // Don't expose internal details to the client
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::BadRequest(message) => {
                tracing::debug!("Rejected request: {}", message);
                (StatusCode::BAD_REQUEST, message)
            }
            AppError::Upstream(e) => {
                tracing::warn!(error = %e, "Marketplace request failed");
                let status = if e.is_access_denied() {
                    StatusCode::FORBIDDEN
                } else {
                    StatusCode::BAD_GATEWAY
                };
                (status, e.to_string())
            }
        };

        (status, error_message).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_status_is_access_denied() {
        let e = FetchError::from_status("https://x", reqwest::StatusCode::FORBIDDEN);
        assert!(e.is_access_denied());
        assert!(e.to_string().contains("denied access"));

        let e = FetchError::from_status("https://x", reqwest::StatusCode::NOT_FOUND);
        assert!(!e.is_access_denied());
        assert!(e.to_string().contains("HTTP 404"));
    }

    #[test]
    fn search_errors_map_to_http_statuses() {
        let response = AppError::from(SearchError::EmptyQuery).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let denied = SearchError::Fetch(FetchError::AccessDenied { url: "u".into(), status: 403 });
        assert_eq!(AppError::from(denied).into_response().status(), StatusCode::FORBIDDEN);

        let failed = SearchError::Fetch(FetchError::Status { url: "u".into(), status: 500 });
        assert_eq!(AppError::from(failed).into_response().status(), StatusCode::BAD_GATEWAY);
    }
}
