//! Cloudinary upload API backend.

use crate::http::{build_client, error_detail, mentions_conflict};
use crate::keys::FOLDER;
use crate::payload::ObjectUpload;
use crate::traits::{ObjectStore, StorageError, StorageResult, StoredObject};
use async_trait::async_trait;
use kabox_core::{CloudinaryCredentials, StorageProvider};
use reqwest::multipart::Form;
use reqwest::StatusCode;
use serde::Deserialize;
use sha2::{Digest, Sha256};

const DEFAULT_API_BASE: &str = "https://api.cloudinary.com";
const DELIVERY_BASE: &str = "https://res.cloudinary.com";
/// `auto` is only valid for uploads; destroy needs the concrete type.
const RESOURCE_TYPES: [&str; 3] = ["image", "video", "raw"];

#[derive(Debug, Deserialize)]
struct UploadResponse {
    public_id: String,
    secure_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

#[derive(Clone)]
pub struct CloudinaryStorage {
    client: reqwest::Client,
    cloud_name: String,
    api_key: String,
    api_secret: String,
    api_base: String,
}

impl CloudinaryStorage {
    pub fn new(credentials: &CloudinaryCredentials) -> StorageResult<Self> {
        Ok(Self {
            client: build_client()?,
            cloud_name: credentials.cloud_name.clone(),
            api_key: credentials.api_key.clone(),
            api_secret: credentials.api_secret.clone(),
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Point the client at a different API host.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// SHA-256 request signature over the alphabetically sorted signed parameters.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by(|a, b| a.0.cmp(b.0));
        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");
        hex::encode(Sha256::digest(format!("{}{}", to_sign, self.api_secret)))
    }

    fn endpoint(&self, resource_type: &str, action: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/{}",
            self.api_base, self.cloud_name, resource_type, action
        )
    }
}

#[async_trait]
impl ObjectStore for CloudinaryStorage {
    fn name(&self) -> &str {
        StorageProvider::Cloudinary.as_str()
    }

    async fn put(&self, object: &ObjectUpload) -> StorageResult<StoredObject> {
        let start = std::time::Instant::now();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("folder", FOLDER),
            ("public_id", object.file_id.as_str()),
            ("timestamp", timestamp.as_str()),
        ]);

        let form = Form::new()
            .text("api_key", self.api_key.clone())
            .text("folder", FOLDER)
            .text("public_id", object.file_id.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256")
            .part("file", object.multipart_part().await?);

        let response = self
            .client
            .post(self.endpoint("auto", "upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, file_id = %object.file_id, "Cloudinary upload request failed");
                StorageError::Http(e)
            })?;

        if !response.status().is_success() {
            let (status, body) = error_detail(response).await;
            if status == StatusCode::CONFLICT || mentions_conflict(&body) {
                return Err(StorageError::Conflict(format!(
                    "cloudinary public_id {}/{}",
                    FOLDER, object.file_id
                )));
            }
            return Err(StorageError::UploadFailed(format!(
                "Cloudinary returned {}: {}",
                status, body
            )));
        }

        let uploaded: UploadResponse = response.json().await.map_err(|e| {
            StorageError::BackendError(format!("Invalid Cloudinary upload response: {}", e))
        })?;

        tracing::info!(
            cloud = %self.cloud_name,
            public_id = %uploaded.public_id,
            size_bytes = object.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Cloudinary upload successful"
        );

        Ok(StoredObject {
            provider: self.name().to_string(),
            url: uploaded.secure_url,
            object_key: uploaded.public_id,
        })
    }

    fn public_url(&self, file_id: &str, _file_name: &str) -> String {
        format!(
            "{}/{}/image/upload/{}/{}",
            DELIVERY_BASE, self.cloud_name, FOLDER, file_id
        )
    }

    async fn delete(&self, file_id: &str, _file_name: &str) -> StorageResult<()> {
        let public_id = format!("{}/{}", FOLDER, file_id);

        for resource_type in RESOURCE_TYPES {
            let timestamp = chrono::Utc::now().timestamp().to_string();
            let signature = self.sign(&[
                ("public_id", public_id.as_str()),
                ("timestamp", timestamp.as_str()),
            ]);
            let form = Form::new()
                .text("api_key", self.api_key.clone())
                .text("public_id", public_id.clone())
                .text("timestamp", timestamp)
                .text("signature", signature)
                .text("signature_algorithm", "sha256");

            let response = self
                .client
                .post(self.endpoint(resource_type, "destroy"))
                .multipart(form)
                .send()
                .await?;

            if !response.status().is_success() {
                let (status, body) = error_detail(response).await;
                return Err(StorageError::DeleteFailed(format!(
                    "Cloudinary returned {}: {}",
                    status, body
                )));
            }

            let destroyed: DestroyResponse = response.json().await.map_err(|e| {
                StorageError::BackendError(format!("Invalid Cloudinary destroy response: {}", e))
            })?;
            if destroyed.result == "ok" {
                tracing::info!(public_id = %public_id, resource_type, "Cloudinary delete successful");
                return Ok(());
            }
        }

        Err(StorageError::NotFound(public_id))
    }
}
