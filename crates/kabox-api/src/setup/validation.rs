//! Configuration validation
//!
//! Runs at startup on top of [`Config::validate`] to catch settings that are legal but
//! probably wrong.

use anyhow::Result;
use kabox_core::Config;

pub fn validate_config(config: &Config) -> Result<()> {
    config.validate()?;

    if config.is_production() {
        if config.cors_origins().iter().any(|o| o == "*") {
            tracing::warn!("CORS allows all origins in production");
        }
        if config.public_base_url().starts_with("http://localhost") {
            tracing::warn!(
                public_base_url = %config.public_base_url(),
                "PUBLIC_BASE_URL points at localhost in production, download links will not work"
            );
        }
    }

    if config.trusted_proxy_count() > 10 {
        tracing::warn!(
            trusted_proxy_count = config.trusted_proxy_count(),
            "TRUSTED_PROXY_COUNT is very high - ensure this matches your actual proxy setup"
        );
    }

    if let Some(key) = config.admin_api_key() {
        if key.len() < 32 {
            anyhow::bail!("ADMIN_API_KEY must be at least 32 characters long");
        }
    }

    Ok(())
}
