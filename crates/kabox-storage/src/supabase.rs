//! Supabase Storage backend.

use crate::http::{build_client, error_detail, mentions_conflict};
use crate::keys::object_key;
use crate::payload::ObjectUpload;
use crate::traits::{ObjectStore, StorageError, StorageResult, StoredObject};
use async_trait::async_trait;
use kabox_core::{StorageProvider, SupabaseCredentials};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::json;

enum PutOutcome {
    Stored,
    BucketMissing,
}

#[derive(Clone)]
pub struct SupabaseStorage {
    client: reqwest::Client,
    url: String,
    anon_key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(credentials: &SupabaseCredentials) -> StorageResult<Self> {
        Ok(Self {
            client: build_client()?,
            url: credentials.url.trim_end_matches('/').to_string(),
            anon_key: credentials.anon_key.clone(),
            bucket: credentials.bucket.clone(),
        })
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.anon_key)
            .header("apikey", &self.anon_key)
    }

    async fn try_put(&self, object: &ObjectUpload, key: &str) -> StorageResult<PutOutcome> {
        let response = self
            .authorized(self.client.post(format!(
                "{}/storage/v1/object/{}/{}",
                self.url, self.bucket, key
            )))
            .header(CONTENT_TYPE, object.content_type.as_str())
            .header(CONTENT_LENGTH, object.size)
            .header("x-upsert", "false")
            .body(object.body().await?)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key = %key, "Supabase upload request failed");
                StorageError::Http(e)
            })?;

        if response.status().is_success() {
            return Ok(PutOutcome::Stored);
        }

        let (status, body) = error_detail(response).await;
        if body.contains("Bucket not found") {
            return Ok(PutOutcome::BucketMissing);
        }
        if status == StatusCode::CONFLICT || mentions_conflict(&body) {
            return Err(StorageError::Conflict(format!(
                "supabase object {}/{}",
                self.bucket, key
            )));
        }
        Err(StorageError::UploadFailed(format!(
            "Supabase returned {}: {}",
            status, body
        )))
    }

    async fn create_bucket(&self) -> StorageResult<()> {
        let response = self
            .authorized(self.client.post(format!("{}/storage/v1/bucket", self.url)))
            .json(&json!({ "id": self.bucket, "name": self.bucket, "public": true }))
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = error_detail(response).await;
            // Another upload may have created it in the meantime.
            if !mentions_conflict(&body) {
                return Err(StorageError::BackendError(format!(
                    "Failed to create Supabase bucket {}: {} {}",
                    self.bucket, status, body
                )));
            }
        }

        tracing::info!(bucket = %self.bucket, "Created public Supabase bucket");
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for SupabaseStorage {
    fn name(&self) -> &str {
        StorageProvider::Supabase.as_str()
    }

    async fn put(&self, object: &ObjectUpload) -> StorageResult<StoredObject> {
        let start = std::time::Instant::now();
        let key = object.object_key();

        if let PutOutcome::BucketMissing = self.try_put(object, &key).await? {
            tracing::warn!(bucket = %self.bucket, "Supabase bucket missing, creating it");
            self.create_bucket().await?;
            if let PutOutcome::BucketMissing = self.try_put(object, &key).await? {
                return Err(StorageError::UploadFailed(format!(
                    "Supabase bucket {} still missing after creation",
                    self.bucket
                )));
            }
        }

        tracing::info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes = object.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Supabase upload successful"
        );

        Ok(StoredObject {
            provider: self.name().to_string(),
            url: Some(self.public_url(&object.file_id, &object.file_name)),
            object_key: key,
        })
    }

    fn public_url(&self, file_id: &str, file_name: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.url,
            self.bucket,
            object_key(file_id, file_name)
        )
    }

    async fn delete(&self, file_id: &str, file_name: &str) -> StorageResult<()> {
        let key = object_key(file_id, file_name);
        let response = self
            .authorized(
                self.client
                    .delete(format!("{}/storage/v1/object/{}", self.url, self.bucket)),
            )
            .json(&json!({ "prefixes": [key] }))
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = error_detail(response).await;
            return Err(StorageError::DeleteFailed(format!(
                "Supabase returned {}: {}",
                status, body
            )));
        }

        let removed: Vec<serde_json::Value> = response.json().await.map_err(|e| {
            StorageError::BackendError(format!("Invalid Supabase delete response: {}", e))
        })?;
        if removed.is_empty() {
            return Err(StorageError::NotFound(format!(
                "supabase object {}/{}",
                self.bucket, key
            )));
        }

        tracing::info!(bucket = %self.bucket, key = %key, "Supabase delete successful");
        Ok(())
    }
}
