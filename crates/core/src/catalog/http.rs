//! Response classification shared by the HTTP catalog clients.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;

use super::CatalogError;
use crate::metrics;

/// How a response should be handled by the calling client.
pub(crate) enum Outcome {
    Success(Response),
    /// HTTP 429 with the server's (or default) retry delay.
    RateLimited(Duration),
    /// HTTP 401.
    Unauthorized(String),
    /// Any other failure, already mapped.
    Failed(CatalogError),
}

/// Map a reqwest transport error onto the catalog taxonomy.
pub(crate) fn map_transport_error(err: reqwest::Error) -> CatalogError {
    if err.is_timeout() {
        CatalogError::Timeout
    } else if err.is_decode() {
        CatalogError::Parse(err.to_string())
    } else {
        CatalogError::Network(err.to_string())
    }
}

/// Parse a `Retry-After` header given in seconds.
///
/// HTTP-date values and garbage fall back to `default`.
pub(crate) fn retry_after(headers: &HeaderMap, default: Duration) -> Duration {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(default)
}

/// Classify a response, consuming the body of failed ones for the message.
pub(crate) async fn classify(
    provider: &str,
    response: Response,
    default_retry_after: Duration,
) -> Outcome {
    let status = response.status();

    if status.is_success() {
        record(provider, "success");
        return Outcome::Success(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        record(provider, "rate_limited");
        return Outcome::RateLimited(retry_after(response.headers(), default_retry_after));
    }

    let message = error_message(response).await;

    if status == StatusCode::UNAUTHORIZED {
        record(provider, "unauthorized");
        return Outcome::Unauthorized(message);
    }

    if status.is_client_error() {
        record(provider, "client_error");
        Outcome::Failed(CatalogError::Client {
            status: status.as_u16(),
            message,
        })
    } else {
        record(provider, "server_error");
        Outcome::Failed(CatalogError::Server {
            status: status.as_u16(),
            message,
        })
    }
}

/// Deserialize a successful response body.
pub(crate) async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, CatalogError> {
    let body = response.text().await.map_err(map_transport_error)?;
    serde_json::from_str(&body).map_err(|e| CatalogError::Parse(e.to_string()))
}

/// Record a transport failure that never produced a response.
pub(crate) fn record_transport_failure(provider: &str, err: &CatalogError) {
    record(provider, err.kind());
}

fn record(provider: &str, outcome: &str) {
    metrics::CATALOG_REQUESTS
        .with_label_values(&[provider, outcome])
        .inc();
}

async fn error_message(response: Response) -> String {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("Unknown error")
            .to_string()
    } else {
        body.chars().take(200).collect()
    }
}
