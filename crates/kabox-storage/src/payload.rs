use crate::keys;
use crate::traits::{StorageError, StorageResult};
use bytes::Bytes;
use std::io::Cursor;
use std::path::PathBuf;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

type PayloadReader = Box<dyn AsyncRead + Send + Sync + Unpin>;

#[derive(Debug, Clone)]
enum PayloadSource {
    /// Spooled upload on disk. Reopened for every attempt.
    File(PathBuf),
    Bytes(Bytes),
}

/// One file to upload, readable from the start any number of times.
#[derive(Debug, Clone)]
pub struct ObjectUpload {
    pub file_id: String,
    /// Sanitized name. The object key is derived from it.
    pub file_name: String,
    pub content_type: String,
    pub size: u64,
    source: PayloadSource,
}

impl ObjectUpload {
    pub fn from_file(
        file_id: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        path: impl Into<PathBuf>,
        size: u64,
    ) -> Self {
        Self {
            file_id: file_id.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            size,
            source: PayloadSource::File(path.into()),
        }
    }

    pub fn from_bytes(
        file_id: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        Self {
            file_id: file_id.into(),
            file_name: file_name.into(),
            content_type: content_type.into(),
            size: data.len() as u64,
            source: PayloadSource::Bytes(data),
        }
    }

    /// Deterministic key for this upload, identical across attempts and providers.
    pub fn object_key(&self) -> String {
        keys::object_key(&self.file_id, &self.file_name)
    }

    /// Fresh reader positioned at the first byte.
    pub async fn reader(&self) -> StorageResult<PayloadReader> {
        match &self.source {
            PayloadSource::File(path) => {
                let file = tokio::fs::File::open(path).await.map_err(|e| {
                    StorageError::UploadFailed(format!(
                        "Failed to open spooled upload {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                Ok(Box::new(file))
            }
            PayloadSource::Bytes(data) => Ok(Box::new(Cursor::new(data.clone()))),
        }
    }

    /// Streaming request body.
    pub async fn body(&self) -> StorageResult<reqwest::Body> {
        let reader = self.reader().await?;
        Ok(reqwest::Body::wrap_stream(ReaderStream::new(reader)))
    }

    /// Streaming multipart part named after the object key.
    pub async fn multipart_part(&self) -> StorageResult<reqwest::multipart::Part> {
        let part = reqwest::multipart::Part::stream_with_length(self.body().await?, self.size)
            .file_name(self.object_key());
        part.mime_str(&self.content_type)
            .map_err(|e| StorageError::UploadFailed(format!("Invalid content type: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_file_payload_can_be_read_repeatedly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.bin");
        tokio::fs::write(&path, b"hello kabox").await.unwrap();

        let upload = ObjectUpload::from_file("id1", "hello.txt", "text/plain", &path, 11);
        for _ in 0..2 {
            let mut contents = String::new();
            upload
                .reader()
                .await
                .unwrap()
                .read_to_string(&mut contents)
                .await
                .unwrap();
            assert_eq!(contents, "hello kabox");
        }
        assert_eq!(upload.object_key(), "id1_hello.txt");
    }

    #[tokio::test]
    async fn test_missing_spool_file_is_an_upload_failure() {
        let upload = ObjectUpload::from_file("id1", "a.txt", "text/plain", "/nonexistent/x", 1);
        assert!(matches!(
            upload.reader().await,
            Err(StorageError::UploadFailed(_))
        ));
    }
}
