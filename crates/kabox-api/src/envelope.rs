//! Response envelope shared by every JSON endpoint.
//!
//! Bodies carry `author` / `email` attribution next to `success`. The attribution is
//! installed once at startup; fields that are not configured are omitted.

use axum::Json;
use kabox_core::Config;
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Default)]
pub struct Attribution {
    pub author: Option<String>,
    pub email: Option<String>,
    /// Include error details for non-sensitive errors (never in production).
    pub expose_details: bool,
}

impl Attribution {
    pub fn from_config(config: &Config) -> Self {
        Self {
            author: config.author_name().map(str::to_string),
            email: config.author_email().map(str::to_string),
            expose_details: !config.is_production(),
        }
    }
}

static ATTRIBUTION: OnceLock<Attribution> = OnceLock::new();

/// Install the process-wide attribution. Later calls are ignored.
pub fn install(attribution: Attribution) {
    if ATTRIBUTION.set(attribution).is_err() {
        tracing::debug!("Response attribution already installed");
    }
}

pub fn attribution() -> &'static Attribution {
    static EMPTY: OnceLock<Attribution> = OnceLock::new();
    ATTRIBUTION
        .get()
        .unwrap_or_else(|| EMPTY.get_or_init(Attribution::default))
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<&'static str>,
    pub success: bool,
    pub data: T,
}

/// `{author, email, success: true, data}`
pub fn success<T: Serialize>(data: T) -> Json<ApiResponse<T>> {
    let attribution = attribution();
    Json(ApiResponse {
        author: attribution.author.as_deref(),
        email: attribution.email.as_deref(),
        success: true,
        data,
    })
}
