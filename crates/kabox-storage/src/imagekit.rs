//! ImageKit upload API backend.

use crate::http::{build_client, error_detail, mentions_conflict};
use crate::keys::{object_key, FOLDER};
use crate::payload::ObjectUpload;
use crate::traits::{ObjectStore, StorageError, StorageResult, StoredObject};
use async_trait::async_trait;
use kabox_core::{ImageKitCredentials, StorageProvider};
use reqwest::multipart::Form;
use reqwest::StatusCode;
use serde::Deserialize;

const DEFAULT_UPLOAD_BASE: &str = "https://upload.imagekit.io";
const DEFAULT_API_BASE: &str = "https://api.imagekit.io";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadResponse {
    file_id: String,
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileDetails {
    file_id: String,
}

#[derive(Clone)]
pub struct ImageKitStorage {
    client: reqwest::Client,
    private_key: String,
    url_endpoint: String,
    upload_base: String,
    api_base: String,
}

impl ImageKitStorage {
    pub fn new(credentials: &ImageKitCredentials) -> StorageResult<Self> {
        Ok(Self {
            client: build_client()?,
            private_key: credentials.private_key.clone(),
            url_endpoint: credentials.url_endpoint.trim_end_matches('/').to_string(),
            upload_base: DEFAULT_UPLOAD_BASE.to_string(),
            api_base: DEFAULT_API_BASE.to_string(),
        })
    }

    /// Point both the upload and the management API at a different host.
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        let base = base.into().trim_end_matches('/').to_string();
        self.upload_base = base.clone();
        self.api_base = base;
        self
    }

    /// ImageKit ids are not derivable from our key, so deletes look the file up by name.
    async fn find_file_id(&self, name: &str) -> StorageResult<Option<String>> {
        let response = self
            .client
            .get(format!("{}/v1/files", self.api_base))
            .basic_auth(&self.private_key, Some(""))
            .query(&[("searchQuery", format!("name=\"{}\"", name))])
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = error_detail(response).await;
            return Err(StorageError::BackendError(format!(
                "ImageKit file search returned {}: {}",
                status, body
            )));
        }

        let files: Vec<FileDetails> = response.json().await.map_err(|e| {
            StorageError::BackendError(format!("Invalid ImageKit search response: {}", e))
        })?;
        Ok(files.into_iter().next().map(|f| f.file_id))
    }
}

#[async_trait]
impl ObjectStore for ImageKitStorage {
    fn name(&self) -> &str {
        StorageProvider::ImageKit.as_str()
    }

    async fn put(&self, object: &ObjectUpload) -> StorageResult<StoredObject> {
        let start = std::time::Instant::now();
        let key = object.object_key();

        let form = Form::new()
            .text("fileName", key.clone())
            .text("folder", format!("/{}", FOLDER))
            .text("useUniqueFileName", "false")
            .part("file", object.multipart_part().await?);

        let response = self
            .client
            .post(format!("{}/api/v1/files/upload", self.upload_base))
            .basic_auth(&self.private_key, Some(""))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, key = %key, "ImageKit upload request failed");
                StorageError::Http(e)
            })?;

        if !response.status().is_success() {
            let (status, body) = error_detail(response).await;
            if status == StatusCode::CONFLICT || mentions_conflict(&body) {
                return Err(StorageError::Conflict(format!("imagekit file {}", key)));
            }
            return Err(StorageError::UploadFailed(format!(
                "ImageKit returned {}: {}",
                status, body
            )));
        }

        let uploaded: UploadResponse = response.json().await.map_err(|e| {
            StorageError::BackendError(format!("Invalid ImageKit upload response: {}", e))
        })?;

        tracing::info!(
            key = %key,
            file_id = %uploaded.file_id,
            size_bytes = object.size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "ImageKit upload successful"
        );

        Ok(StoredObject {
            provider: self.name().to_string(),
            url: uploaded.url,
            object_key: uploaded.file_id,
        })
    }

    fn public_url(&self, file_id: &str, file_name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.url_endpoint,
            FOLDER,
            object_key(file_id, file_name)
        )
    }

    async fn delete(&self, file_id: &str, file_name: &str) -> StorageResult<()> {
        let key = object_key(file_id, file_name);
        let imagekit_id = self
            .find_file_id(&key)
            .await?
            .ok_or_else(|| StorageError::NotFound(format!("imagekit file {}", key)))?;

        let response = self
            .client
            .delete(format!("{}/v1/files/{}", self.api_base, imagekit_id))
            .basic_auth(&self.private_key, Some(""))
            .send()
            .await?;

        if !response.status().is_success() {
            let (status, body) = error_detail(response).await;
            return Err(StorageError::DeleteFailed(format!(
                "ImageKit returned {}: {}",
                status, body
            )));
        }

        tracing::info!(key = %key, imagekit_id = %imagekit_id, "ImageKit delete successful");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn storage(server: &MockServer) -> ImageKitStorage {
        ImageKitStorage::new(&ImageKitCredentials {
            public_key: "public".to_string(),
            private_key: "private".to_string(),
            url_endpoint: "https://ik.imagekit.io/kabox/".to_string(),
        })
        .unwrap()
        .with_api_base(server.uri())
    }

    #[tokio::test]
    async fn test_upload_uses_basic_auth_and_returns_file_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/files/upload"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "fileId": "ik_1",
                "name": "abc123_doc.pdf",
                "url": "https://ik.imagekit.io/kabox/kabox/abc123_doc.pdf"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let upload = ObjectUpload::from_bytes("abc123", "doc.pdf", "application/pdf", &b"%PDF"[..]);
        let stored = storage(&server).put(&upload).await.unwrap();

        assert_eq!(stored.provider, "imagekit");
        assert_eq!(stored.object_key, "ik_1");
        assert_eq!(
            stored.url.as_deref(),
            Some("https://ik.imagekit.io/kabox/kabox/abc123_doc.pdf")
        );
    }

    #[tokio::test]
    async fn test_delete_searches_by_name_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/files"))
            .and(query_param("searchQuery", "name=\"abc123_doc.pdf\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"fileId": "ik_1"}])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/files/ik_1"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        storage(&server).delete("abc123", "doc.pdf").await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_of_unknown_file_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;

        let err = storage(&server).delete("abc123", "doc.pdf").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_public_url_uses_sanitized_key() {
        let storage = ImageKitStorage::new(&ImageKitCredentials {
            public_key: "public".to_string(),
            private_key: "private".to_string(),
            url_endpoint: "https://ik.imagekit.io/kabox".to_string(),
        })
        .unwrap();
        assert_eq!(
            storage.public_url("abc123", "my doc.pdf"),
            "https://ik.imagekit.io/kabox/kabox/abc123_my_doc.pdf"
        );
    }
}
