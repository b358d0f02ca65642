//! Configuration module
//!
//! Settings for the HTTP surface, the upload limits, and the credentials of every
//! storage provider and metadata database the relay can rotate through.

use std::env;
use std::str::FromStr;

use crate::backend_types::{DatabaseBackend, StorageProvider};
use crate::validation::DEFAULT_ALLOWED_EXTENSIONS;

// Common constants
const SERVER_PORT: u16 = 3000;
const MAX_CONNECTIONS: u32 = 10;
const DB_TIMEOUT_SECS: u64 = 10;
const PROVIDER_TIMEOUT_SECS: u64 = 60;
const MAX_FILE_SIZE_BYTES: u64 = 100 * 1024 * 1024;
const MAX_FILES_PER_UPLOAD: usize = 5;
const RATE_LIMIT_WINDOW_MS: u64 = 1000;
const RATE_LIMIT_REQUESTS: u32 = 10;
const TRUSTED_PROXY_COUNT: usize = 1;
const DEFAULT_STORAGE_PROVIDERS: &str = "cloudinary,imagekit,supabase";
const DEFAULT_DATABASE_BACKENDS: &str = "supabase,neon,turso";
const SUPABASE_BUCKET: &str = "kabox-files";

/// Settings shared by every HTTP-facing part of the service
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    pub db_max_connections: u32,
    pub db_timeout_seconds: u64,
    pub rate_limit_window_ms: u64,
    pub rate_limit_requests: u32,
    pub trusted_proxy_count: usize,
}

#[derive(Clone, Debug)]
pub struct CloudinaryCredentials {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Clone, Debug)]
pub struct ImageKitCredentials {
    pub public_key: String,
    pub private_key: String,
    pub url_endpoint: String,
}

/// Supabase project credentials, used by both the storage bucket and the PostgREST table.
#[derive(Clone, Debug)]
pub struct SupabaseCredentials {
    pub url: String,
    pub anon_key: String,
    pub bucket: String,
}

#[derive(Clone, Debug)]
pub struct TursoCredentials {
    pub url: String,
    pub auth_token: String,
}

#[derive(Clone, Debug)]
pub struct LocalStorageSettings {
    pub path: String,
    pub base_url: String,
}

#[derive(Clone, Debug)]
pub struct TelegramSettings {
    pub bot_token: String,
    pub channel_id: String,
}

/// Relay configuration: upload policy, registry order and backend credentials
#[derive(Clone, Debug)]
pub struct RelayConfig {
    pub base: BaseConfig,
    pub public_base_url: String,
    pub author_name: Option<String>,
    pub author_email: Option<String>,
    pub max_file_size_bytes: u64,
    pub max_files_per_upload: usize,
    pub allowed_extensions: Vec<String>,
    // Registry order. Storage order drives fallback, database order drives lookup priority.
    pub storage_providers: Vec<StorageProvider>,
    pub database_backends: Vec<DatabaseBackend>,
    pub provider_timeout_secs: u64,
    pub cloudinary: Option<CloudinaryCredentials>,
    pub imagekit: Option<ImageKitCredentials>,
    pub supabase: Option<SupabaseCredentials>,
    pub neon_connection: Option<String>,
    pub turso: Option<TursoCredentials>,
    pub local_storage: LocalStorageSettings,
    pub telegram: Option<TelegramSettings>,
    pub admin_api_key: Option<String>,
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<RelayConfig>);

impl Config {
    fn as_relay(&self) -> &RelayConfig {
        &self.0
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        let environment = self.as_relay().base.environment.to_lowercase();
        environment == "production" || environment == "prod"
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_source(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_source<F>(get: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = RelayConfig::from_source(get)?;
        Ok(Config(Box::new(config)))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_relay().validate()
    }

    // Convenience getters for common fields
    pub fn server_port(&self) -> u16 {
        self.as_relay().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_relay().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_relay().base.environment
    }

    pub fn db_max_connections(&self) -> u32 {
        self.as_relay().base.db_max_connections
    }

    pub fn db_timeout_seconds(&self) -> u64 {
        self.as_relay().base.db_timeout_seconds
    }

    pub fn rate_limit_window_ms(&self) -> u64 {
        self.as_relay().base.rate_limit_window_ms
    }

    pub fn rate_limit_requests(&self) -> u32 {
        self.as_relay().base.rate_limit_requests
    }

    pub fn trusted_proxy_count(&self) -> usize {
        self.as_relay().base.trusted_proxy_count
    }

    pub fn public_base_url(&self) -> &str {
        &self.as_relay().public_base_url
    }

    pub fn author_name(&self) -> Option<&str> {
        self.as_relay().author_name.as_deref()
    }

    pub fn author_email(&self) -> Option<&str> {
        self.as_relay().author_email.as_deref()
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.as_relay().max_file_size_bytes
    }

    pub fn max_files_per_upload(&self) -> usize {
        self.as_relay().max_files_per_upload
    }

    pub fn allowed_extensions(&self) -> &[String] {
        &self.as_relay().allowed_extensions
    }

    pub fn storage_providers(&self) -> &[StorageProvider] {
        &self.as_relay().storage_providers
    }

    pub fn database_backends(&self) -> &[DatabaseBackend] {
        &self.as_relay().database_backends
    }

    pub fn provider_timeout_secs(&self) -> u64 {
        self.as_relay().provider_timeout_secs
    }

    pub fn cloudinary(&self) -> Option<&CloudinaryCredentials> {
        self.as_relay().cloudinary.as_ref()
    }

    pub fn imagekit(&self) -> Option<&ImageKitCredentials> {
        self.as_relay().imagekit.as_ref()
    }

    pub fn supabase(&self) -> Option<&SupabaseCredentials> {
        self.as_relay().supabase.as_ref()
    }

    pub fn neon_connection(&self) -> Option<&str> {
        self.as_relay().neon_connection.as_deref()
    }

    pub fn turso(&self) -> Option<&TursoCredentials> {
        self.as_relay().turso.as_ref()
    }

    pub fn local_storage(&self) -> &LocalStorageSettings {
        &self.as_relay().local_storage
    }

    pub fn telegram(&self) -> Option<&TelegramSettings> {
        self.as_relay().telegram.as_ref()
    }

    pub fn admin_api_key(&self) -> Option<&str> {
        self.as_relay().admin_api_key.as_deref()
    }
}

fn parse_list<T>(raw: &str) -> Result<Vec<T>, anyhow::Error>
where
    T: FromStr<Err = anyhow::Error>,
{
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(T::from_str)
        .collect()
}

impl RelayConfig {
    pub fn from_source<F>(get: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Blank values count as unset, matching how .env files are usually written.
        let var = |key: &str| get(key).filter(|v| !v.trim().is_empty());

        let environment = var("ENVIRONMENT")
            .or_else(|| var("APP_ENV"))
            .unwrap_or_else(|| "development".to_string());

        let cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .collect();

        let base = BaseConfig {
            server_port: var("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(SERVER_PORT),
            cors_origins,
            environment,
            db_max_connections: var("DB_MAX_CONNECTIONS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_CONNECTIONS),
            db_timeout_seconds: var("DB_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DB_TIMEOUT_SECS),
            rate_limit_window_ms: var("RATE_LIMIT_WINDOW")
                .and_then(|v| v.parse().ok())
                .unwrap_or(RATE_LIMIT_WINDOW_MS),
            rate_limit_requests: var("RATE_LIMIT_REQUESTS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(RATE_LIMIT_REQUESTS),
            trusted_proxy_count: var("TRUSTED_PROXY_COUNT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(TRUSTED_PROXY_COUNT),
        };

        let allowed_extensions = match var("ALLOWED_EXTENSIONS") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().trim_start_matches('.').to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
            None => DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
        };

        let storage_providers = parse_list::<StorageProvider>(
            &var("STORAGE_PROVIDERS").unwrap_or_else(|| DEFAULT_STORAGE_PROVIDERS.to_string()),
        )?;
        let database_backends = parse_list::<DatabaseBackend>(
            &var("DATABASE_BACKENDS").unwrap_or_else(|| DEFAULT_DATABASE_BACKENDS.to_string()),
        )?;

        let cloudinary = match (
            var("CLOUDINARY_CLOUD_NAME"),
            var("CLOUDINARY_API_KEY"),
            var("CLOUDINARY_API_SECRET"),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryCredentials {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        let imagekit = match (
            var("IMAGEKIT_PUBLIC_KEY"),
            var("IMAGEKIT_PRIVATE_KEY"),
            var("IMAGEKIT_URL_ENDPOINT"),
        ) {
            (Some(public_key), Some(private_key), Some(url_endpoint)) => Some(ImageKitCredentials {
                public_key,
                private_key,
                url_endpoint: url_endpoint.trim_end_matches('/').to_string(),
            }),
            _ => None,
        };

        let supabase = match (var("SUPABASE_URL"), var("SUPABASE_ANON_KEY")) {
            (Some(url), Some(anon_key)) => Some(SupabaseCredentials {
                url: url.trim_end_matches('/').to_string(),
                anon_key,
                bucket: var("SUPABASE_BUCKET").unwrap_or_else(|| SUPABASE_BUCKET.to_string()),
            }),
            _ => None,
        };

        let turso = match (var("TURSO_DATABASE_URL"), var("TURSO_AUTH_TOKEN")) {
            (Some(url), Some(auth_token)) => Some(TursoCredentials { url, auth_token }),
            _ => None,
        };

        let telegram = match (var("TELEGRAM_BOT_TOKEN"), var("TELEGRAM_CHANNEL_ID")) {
            (Some(bot_token), Some(channel_id)) => Some(TelegramSettings {
                bot_token,
                channel_id,
            }),
            _ => None,
        };

        let public_base_url = var("PUBLIC_BASE_URL")
            .or_else(|| var("VITE_APP_URL"))
            .unwrap_or_else(|| format!("http://localhost:{}", base.server_port))
            .trim_end_matches('/')
            .to_string();

        let local_storage = LocalStorageSettings {
            path: var("LOCAL_STORAGE_PATH").unwrap_or_else(|| "./storage".to_string()),
            base_url: var("LOCAL_STORAGE_BASE_URL")
                .unwrap_or_else(|| format!("{}/media", public_base_url))
                .trim_end_matches('/')
                .to_string(),
        };

        Ok(Self {
            base,
            public_base_url,
            author_name: var("AUTHOR_NAME"),
            author_email: var("AUTHOR_EMAIL"),
            max_file_size_bytes: var("MAX_FILE_SIZE")
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_FILE_SIZE_BYTES),
            max_files_per_upload: var("MAX_FILES_PER_UPLOAD")
                .and_then(|v| v.parse().ok())
                .unwrap_or(MAX_FILES_PER_UPLOAD),
            allowed_extensions,
            storage_providers,
            database_backends,
            provider_timeout_secs: var("PROVIDER_TIMEOUT_SECS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(PROVIDER_TIMEOUT_SECS),
            cloudinary,
            imagekit,
            supabase,
            neon_connection: var("NEON_CONNECTION"),
            turso,
            local_storage,
            telegram,
            admin_api_key: var("ADMIN_API_KEY"),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.base.server_port == 0 {
            anyhow::bail!("PORT must be greater than 0");
        }
        if self.max_file_size_bytes == 0 {
            anyhow::bail!("MAX_FILE_SIZE must be greater than 0");
        }
        if self.max_files_per_upload == 0 {
            anyhow::bail!("MAX_FILES_PER_UPLOAD must be greater than 0");
        }
        if self.allowed_extensions.is_empty() {
            anyhow::bail!("ALLOWED_EXTENSIONS must list at least one extension");
        }
        if self.storage_providers.is_empty() {
            anyhow::bail!("STORAGE_PROVIDERS must list at least one provider");
        }
        if self.database_backends.is_empty() {
            anyhow::bail!("DATABASE_BACKENDS must list at least one database");
        }
        if self.base.rate_limit_window_ms == 0 {
            anyhow::bail!("RATE_LIMIT_WINDOW must be greater than 0");
        }

        for provider in &self.storage_providers {
            let configured = match provider {
                StorageProvider::Cloudinary => self.cloudinary.is_some(),
                StorageProvider::ImageKit => self.imagekit.is_some(),
                StorageProvider::Supabase => self.supabase.is_some(),
                StorageProvider::Local => true,
            };
            if !configured {
                anyhow::bail!(
                    "Storage provider '{}' is listed in STORAGE_PROVIDERS but its credentials are missing",
                    provider
                );
            }
        }

        for backend in &self.database_backends {
            let configured = match backend {
                DatabaseBackend::Supabase => self.supabase.is_some(),
                DatabaseBackend::Neon => self.neon_connection.is_some(),
                DatabaseBackend::Turso => self.turso.is_some(),
            };
            if !configured {
                anyhow::bail!(
                    "Database '{}' is listed in DATABASE_BACKENDS but its credentials are missing",
                    backend
                );
            }
        }

        Ok(())
    }
}
