use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Object storage providers a file can be uploaded to.
///
/// The display form is the value persisted in the `storage` column, so it must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageProvider {
    Cloudinary,
    ImageKit,
    Supabase,
    Local,
}

impl StorageProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageProvider::Cloudinary => "cloudinary",
            StorageProvider::ImageKit => "imagekit",
            StorageProvider::Supabase => "supabase",
            StorageProvider::Local => "local",
        }
    }
}

impl FromStr for StorageProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cloudinary" => Ok(StorageProvider::Cloudinary),
            "imagekit" => Ok(StorageProvider::ImageKit),
            "supabase" => Ok(StorageProvider::Supabase),
            "local" => Ok(StorageProvider::Local),
            _ => Err(anyhow::anyhow!("Invalid storage provider: {}", s)),
        }
    }
}

impl Display for StorageProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// Metadata databases a file record can be written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    Supabase,
    Neon,
    Turso,
}

impl DatabaseBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseBackend::Supabase => "supabase",
            DatabaseBackend::Neon => "neon",
            DatabaseBackend::Turso => "turso",
        }
    }
}

impl FromStr for DatabaseBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "supabase" => Ok(DatabaseBackend::Supabase),
            "neon" => Ok(DatabaseBackend::Neon),
            "turso" => Ok(DatabaseBackend::Turso),
            _ => Err(anyhow::anyhow!("Invalid database backend: {}", s)),
        }
    }
}

impl Display for DatabaseBackend {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}
