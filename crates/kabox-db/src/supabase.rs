//! Supabase record store over PostgREST.

use crate::traits::{DbError, DbResult, RecordStore};
use async_trait::async_trait;
use kabox_core::{
    parse_timestamp, DatabaseBackend, FileRecord, FileStatus, NewFileRecord, SupabaseCredentials,
};
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

const TABLE: &str = "files";

#[derive(Debug, Serialize)]
struct InsertRow<'a> {
    id: &'a str,
    name: &'a str,
    size: i64,
    mime_type: Option<&'a str>,
    storage: &'a str,
    url: Option<&'a str>,
    ip: Option<&'a str>,
    status: &'a str,
}

#[derive(Debug, Deserialize)]
struct SelectRow {
    id: String,
    name: String,
    size: i64,
    mime_type: Option<String>,
    storage: Option<String>,
    url: Option<String>,
    ip: Option<String>,
    status: Option<String>,
    created_at: Option<String>,
}

impl SelectRow {
    fn into_record(self) -> FileRecord {
        FileRecord {
            id: self.id,
            name: self.name,
            size: self.size,
            mime_type: self.mime_type,
            storage: self.storage.unwrap_or_default(),
            url: self.url,
            ip: self.ip,
            status: self
                .status
                .as_deref()
                .map(|s| s.parse().unwrap_or(FileStatus::Pending))
                .unwrap_or(FileStatus::Completed),
            created_at: self.created_at.as_deref().and_then(parse_timestamp),
        }
    }
}

#[derive(Clone)]
pub struct SupabaseRecordStore {
    client: reqwest::Client,
    rest_url: String,
    anon_key: String,
}

impl SupabaseRecordStore {
    pub fn new(credentials: &SupabaseCredentials) -> DbResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| DbError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            rest_url: format!("{}/rest/v1", credentials.url.trim_end_matches('/')),
            anon_key: credentials.anon_key.clone(),
        })
    }

    fn request(&self, method: reqwest::Method) -> RequestBuilder {
        self.client
            .request(method, format!("{}/{}", self.rest_url, TABLE))
            .bearer_auth(&self.anon_key)
            .header("apikey", &self.anon_key)
    }

    async fn check(response: reqwest::Response) -> DbResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(DbError::Query(format!("PostgREST returned {}: {}", status, body)))
    }
}

#[async_trait]
impl RecordStore for SupabaseRecordStore {
    fn name(&self) -> &str {
        DatabaseBackend::Supabase.as_str()
    }

    async fn initialize(&self) -> DbResult<()> {
        // PostgREST cannot run DDL; the table comes from the shared migration.
        let response = self
            .request(reqwest::Method::GET)
            .query(&[("select", "id"), ("limit", "1")])
            .send()
            .await?;
        Self::check(response).await.map_err(|e| {
            tracing::warn!(
                error = %e,
                "Supabase files table unreachable; apply migrations/ to the Supabase database"
            );
            e
        })?;
        Ok(())
    }

    #[tracing::instrument(skip(self, record), fields(db.table = "files", db.record_id = %record.id))]
    async fn insert(&self, record: &NewFileRecord) -> DbResult<()> {
        let row = InsertRow {
            id: &record.id,
            name: &record.name,
            size: record.size,
            mime_type: record.mime_type.as_deref(),
            storage: &record.storage,
            url: record.url.as_deref(),
            ip: record.ip.as_deref(),
            status: record.status.as_str(),
        };
        let response = self
            .request(reqwest::Method::POST)
            .header("Prefer", "return=minimal")
            .json(&row)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.record_id = %id))]
    async fn get_by_key(&self, id: &str) -> DbResult<Option<FileRecord>> {
        let response = self
            .request(reqwest::Method::GET)
            .query(&[("id", format!("eq.{}", id)), ("select", "*".to_string())])
            .send()
            .await?;
        let rows: Vec<SelectRow> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| DbError::Decode(format!("Invalid PostgREST rows: {}", e)))?;
        Ok(rows.into_iter().next().map(SelectRow::into_record))
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.record_id = %id))]
    async fn delete(&self, id: &str) -> DbResult<bool> {
        let response = self
            .request(reqwest::Method::DELETE)
            .header("Prefer", "return=representation")
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await?;
        let removed: Vec<serde_json::Value> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|e| DbError::Decode(format!("Invalid PostgREST rows: {}", e)))?;
        Ok(!removed.is_empty())
    }
}
