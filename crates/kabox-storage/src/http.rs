use crate::traits::{StorageError, StorageResult};
use reqwest::{Response, StatusCode};
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_ERROR_BODY: usize = 512;

pub(crate) fn build_client() -> StorageResult<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| StorageError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

/// Status and a bounded slice of the body of a failed provider response.
pub(crate) async fn error_detail(response: Response) -> (StatusCode, String) {
    let status = response.status();
    let mut body = response.text().await.unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    (status, body)
}

/// Whether a provider error body describes an already existing object.
pub(crate) fn mentions_conflict(body: &str) -> bool {
    let body = body.to_lowercase();
    body.contains("already exists") || body.contains("duplicate")
}
