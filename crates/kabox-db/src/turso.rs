//! Turso record store over the libSQL HTTP pipeline protocol.

use crate::traits::{DbError, DbResult, RecordStore};
use async_trait::async_trait;
use kabox_core::{
    parse_timestamp, DatabaseBackend, FileRecord, FileStatus, NewFileRecord, TursoCredentials,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const CREATE_FILES_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    size INTEGER NOT NULL,
    mime_type TEXT,
    storage TEXT,
    url TEXT,
    ip TEXT,
    status TEXT DEFAULT 'completed',
    created_at TEXT DEFAULT CURRENT_TIMESTAMP
)
"#;

/// Wire value. Integers travel as strings to keep 64-bit precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Value {
    Null,
    Integer { value: String },
    Float { value: f64 },
    Text { value: String },
    Blob { base64: String },
}

impl Value {
    fn text(value: &str) -> Self {
        Value::Text {
            value: value.to_string(),
        }
    }

    fn optional_text(value: Option<&str>) -> Self {
        value.map(Value::text).unwrap_or(Value::Null)
    }

    fn as_text(&self) -> Option<String> {
        match self {
            Value::Text { value } | Value::Integer { value } => Some(value.clone()),
            Value::Float { value } => Some(value.to_string()),
            Value::Null | Value::Blob { .. } => None,
        }
    }

    fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer { value } | Value::Text { value } => value.parse().ok(),
            Value::Float { value } => Some(*value as i64),
            Value::Null | Value::Blob { .. } => None,
        }
    }
}

#[derive(Debug, Serialize)]
struct Statement<'a> {
    sql: &'a str,
    args: Vec<Value>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PipelineRequest<'a> {
    Execute { stmt: Statement<'a> },
    Close,
}

#[derive(Debug, Serialize)]
struct Pipeline<'a> {
    requests: Vec<PipelineRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct PipelineResponse {
    results: Vec<PipelineResult>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum PipelineResult {
    Ok { response: StreamResponse },
    Error { error: StreamError },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum StreamResponse {
    Execute { result: ExecuteResult },
    Close,
}

#[derive(Debug, Deserialize)]
struct StreamError {
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteResult {
    cols: Vec<Column>,
    rows: Vec<Vec<Value>>,
    affected_row_count: u64,
}

#[derive(Debug, Deserialize)]
struct Column {
    name: Option<String>,
}

impl ExecuteResult {
    fn records(self) -> DbResult<Vec<FileRecord>> {
        let names: Vec<String> = self
            .cols
            .into_iter()
            .map(|c| c.name.unwrap_or_default())
            .collect();

        self.rows
            .into_iter()
            .map(|row| {
                let fields: HashMap<&str, Value> = names
                    .iter()
                    .map(String::as_str)
                    .zip(row)
                    .collect();
                let text = |column: &str| fields.get(column).and_then(Value::as_text);

                Ok(FileRecord {
                    id: text("id").ok_or_else(|| DbError::Decode("row without id".to_string()))?,
                    name: text("name").unwrap_or_default(),
                    size: fields.get("size").and_then(Value::as_i64).unwrap_or(0),
                    mime_type: text("mime_type"),
                    storage: text("storage").unwrap_or_default(),
                    url: text("url"),
                    ip: text("ip"),
                    status: text("status")
                        .map(|s| s.parse().unwrap_or(FileStatus::Pending))
                        .unwrap_or(FileStatus::Completed),
                    created_at: text("created_at").as_deref().and_then(parse_timestamp),
                })
            })
            .collect()
    }
}

/// `libsql://` URLs are served over HTTPS.
fn http_base_url(url: &str) -> String {
    let url = url.trim_end_matches('/');
    match url.strip_prefix("libsql://") {
        Some(host) => format!("https://{}", host),
        None => url.to_string(),
    }
}

#[derive(Clone)]
pub struct TursoRecordStore {
    client: reqwest::Client,
    base_url: String,
    auth_token: String,
}

impl TursoRecordStore {
    pub fn new(credentials: &TursoCredentials) -> DbResult<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| DbError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: http_base_url(&credentials.url),
            auth_token: credentials.auth_token.clone(),
        })
    }

    async fn execute(&self, sql: &str, args: Vec<Value>) -> DbResult<ExecuteResult> {
        let pipeline = Pipeline {
            requests: vec![
                PipelineRequest::Execute {
                    stmt: Statement { sql, args },
                },
                PipelineRequest::Close,
            ],
        };

        let response = self
            .client
            .post(format!("{}/v2/pipeline", self.base_url))
            .bearer_auth(&self.auth_token)
            .json(&pipeline)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(DbError::Query(format!("Turso returned {}: {}", status, body)));
        }

        let parsed: PipelineResponse = response
            .json()
            .await
            .map_err(|e| DbError::Decode(format!("Invalid Turso pipeline response: {}", e)))?;

        match parsed.results.into_iter().next() {
            Some(PipelineResult::Ok {
                response: StreamResponse::Execute { result },
            }) => Ok(result),
            Some(PipelineResult::Error { error }) => Err(DbError::Query(error.message)),
            _ => Err(DbError::Decode(
                "Turso pipeline returned no execute result".to_string(),
            )),
        }
    }
}

#[async_trait]
impl RecordStore for TursoRecordStore {
    fn name(&self) -> &str {
        DatabaseBackend::Turso.as_str()
    }

    async fn initialize(&self) -> DbResult<()> {
        self.execute(CREATE_FILES_TABLE, Vec::new()).await?;
        tracing::info!(database = %self.name(), "Turso files table ready");
        Ok(())
    }

    #[tracing::instrument(skip(self, record), fields(db.table = "files", db.record_id = %record.id))]
    async fn insert(&self, record: &NewFileRecord) -> DbResult<()> {
        let args = vec![
            Value::text(&record.id),
            Value::text(&record.name),
            Value::Integer {
                value: record.size.to_string(),
            },
            Value::optional_text(record.mime_type.as_deref()),
            Value::text(&record.storage),
            Value::optional_text(record.url.as_deref()),
            Value::optional_text(record.ip.as_deref()),
            Value::text(record.status.as_str()),
        ];
        self.execute(
            "INSERT INTO files (id, name, size, mime_type, storage, url, ip, status) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            args,
        )
        .await?;
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.record_id = %id))]
    async fn get_by_key(&self, id: &str) -> DbResult<Option<FileRecord>> {
        let result = self
            .execute(
                "SELECT id, name, size, mime_type, storage, url, ip, status, created_at \
                 FROM files WHERE id = ?",
                vec![Value::text(id)],
            )
            .await?;
        Ok(result.records()?.into_iter().next())
    }

    #[tracing::instrument(skip(self), fields(db.table = "files", db.record_id = %id))]
    async fn delete(&self, id: &str) -> DbResult<bool> {
        let result = self
            .execute("DELETE FROM files WHERE id = ?", vec![Value::text(id)])
            .await?;
        Ok(result.affected_row_count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> TursoRecordStore {
        TursoRecordStore::new(&TursoCredentials {
            url: server.uri(),
            auth_token: "token".to_string(),
        })
        .unwrap()
    }

    fn execute_ok(result: serde_json::Value) -> serde_json::Value {
        json!({
            "baton": null,
            "base_url": null,
            "results": [
                {"type": "ok", "response": {"type": "execute", "result": result}},
                {"type": "ok", "response": {"type": "close"}}
            ]
        })
    }

    #[test]
    fn test_libsql_urls_are_rewritten() {
        assert_eq!(
            http_base_url("libsql://kabox-user.turso.io/"),
            "https://kabox-user.turso.io"
        );
        assert_eq!(http_base_url("http://127.0.0.1:8080"), "http://127.0.0.1:8080");
    }

    #[test]
    fn test_value_encoding() {
        assert_eq!(
            serde_json::to_value(Value::Integer {
                value: "42".to_string()
            })
            .unwrap(),
            json!({"type": "integer", "value": "42"})
        );
        assert_eq!(serde_json::to_value(Value::Null).unwrap(), json!({"type": "null"}));
    }

    #[tokio::test]
    async fn test_insert_sends_typed_args() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/pipeline"))
            .and(header("authorization", "Bearer token"))
            .and(body_partial_json(json!({
                "requests": [{"type": "execute"}, {"type": "close"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(execute_ok(json!({
                "cols": [],
                "rows": [],
                "affected_row_count": 1,
                "last_insert_rowid": null
            }))))
            .expect(1)
            .mount(&server)
            .await;

        let record = NewFileRecord {
            id: "abc123".to_string(),
            name: "a.txt".to_string(),
            size: 3,
            mime_type: None,
            storage: "supabase".to_string(),
            url: Some("https://x/a.txt".to_string()),
            ip: None,
            status: FileStatus::Completed,
        };
        store(&server).insert(&record).await.unwrap();
    }

    #[tokio::test]
    async fn test_get_by_key_decodes_row() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/pipeline"))
            .respond_with(ResponseTemplate::new(200).set_body_json(execute_ok(json!({
                "cols": [
                    {"name": "id"}, {"name": "name"}, {"name": "size"}, {"name": "mime_type"},
                    {"name": "storage"}, {"name": "url"}, {"name": "ip"}, {"name": "status"},
                    {"name": "created_at"}
                ],
                "rows": [[
                    {"type": "text", "value": "abc123"},
                    {"type": "text", "value": "a.txt"},
                    {"type": "integer", "value": "3"},
                    {"type": "null"},
                    {"type": "text", "value": "cloudinary"},
                    {"type": "null"},
                    {"type": "text", "value": "10.0.0.1"},
                    {"type": "text", "value": "completed"},
                    {"type": "text", "value": "2024-05-01 08:00:00"}
                ]],
                "affected_row_count": 0
            }))))
            .mount(&server)
            .await;

        let record = store(&server).get_by_key("abc123").await.unwrap().unwrap();
        assert_eq!(record.size, 3);
        assert_eq!(record.storage, "cloudinary");
        assert!(record.mime_type.is_none());
        assert_eq!(record.ip.as_deref(), Some("10.0.0.1"));
        assert!(record.created_at.is_some());
    }

    #[tokio::test]
    async fn test_statement_error_is_query_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v2/pipeline"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [
                    {"type": "error", "error": {"message": "no such table: files", "code": "SQLITE_ERROR"}},
                    {"type": "ok", "response": {"type": "close"}}
                ]
            })))
            .mount(&server)
            .await;

        match store(&server).get_by_key("abc123").await {
            Err(DbError::Query(message)) => assert!(message.contains("no such table")),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
