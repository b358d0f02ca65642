use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Lifecycle tag of a stored file.
///
/// Uploads complete in a single request, so every record is written as `Completed`.
/// Any other stored value is surfaced as `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Completed,
    Pending,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileStatus::Completed => "completed",
            FileStatus::Pending => "pending",
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            FileStatus::Completed => "Upload completed",
            FileStatus::Pending => "Upload in progress",
        }
    }
}

impl FromStr for FileStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(if s.eq_ignore_ascii_case("completed") {
            FileStatus::Completed
        } else {
            FileStatus::Pending
        })
    }
}

impl Display for FileStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Metadata row describing one uploaded object.
///
/// A record lives in exactly one metadata database and points at exactly one storage
/// provider. Records are never updated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub mime_type: Option<String>,
    /// Name of the provider that accepted the object.
    pub storage: String,
    /// Provider-returned URL. When absent it is rebuilt from `storage`, `id` and `name`.
    pub url: Option<String>,
    pub ip: Option<String>,
    pub status: FileStatus,
    /// Assigned by the metadata store.
    pub created_at: Option<DateTime<Utc>>,
}

/// Row to insert after a successful storage upload.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFileRecord {
    pub id: String,
    pub name: String,
    pub size: i64,
    pub mime_type: Option<String>,
    pub storage: String,
    pub url: Option<String>,
    pub ip: Option<String>,
    pub status: FileStatus,
}

impl NewFileRecord {
    /// Materialize the record as a store would return it.
    pub fn into_record(self, created_at: Option<DateTime<Utc>>) -> FileRecord {
        FileRecord {
            id: self.id,
            name: self.name,
            size: self.size,
            mime_type: self.mime_type,
            storage: self.storage,
            url: self.url,
            ip: self.ip,
            status: self.status,
            created_at,
        }
    }
}

/// Parse the timestamp formats the metadata stores hand back.
///
/// Postgres/PostgREST return ISO 8601 with or without offset, SQLite returns
/// `YYYY-MM-DD HH:MM:SS`. Offset-less values are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_status_parsing_is_lenient() {
        assert_eq!("completed".parse::<FileStatus>().unwrap(), FileStatus::Completed);
        assert_eq!("COMPLETED".parse::<FileStatus>().unwrap(), FileStatus::Completed);
        assert_eq!("uploading".parse::<FileStatus>().unwrap(), FileStatus::Pending);
        assert_eq!(FileStatus::Completed.message(), "Upload completed");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let sqlite = parse_timestamp("2024-03-01 10:20:30").unwrap();
        assert_eq!((sqlite.year(), sqlite.hour(), sqlite.second()), (2024, 10, 30));

        let postgrest = parse_timestamp("2024-03-01T10:20:30.123456").unwrap();
        assert_eq!(postgrest.minute(), 20);

        let with_offset = parse_timestamp("2024-03-01T12:20:30+02:00").unwrap();
        assert_eq!(with_offset.hour(), 10);

        assert!(parse_timestamp("yesterday").is_none());
    }
}
