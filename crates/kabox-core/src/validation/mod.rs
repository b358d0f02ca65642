//! Upload validation
//!
//! Per-file checks run before any storage attempt. Checks run in a fixed order and the
//! first failing check decides the message returned to the uploader.

mod filename;

pub use filename::{file_extension, sanitize_filename, MAX_FILENAME_LENGTH};

/// Extensions accepted when `ALLOWED_EXTENSIONS` is not set.
#[rustfmt::skip]
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &[
    // images
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "svg", "ico", "tiff", "tif",
    // video
    "mp4", "avi", "mov", "wmv", "flv", "mkv", "webm", "m4v", "mpg", "mpeg",
    // audio
    "mp3", "wav", "ogg", "flac", "aac", "m4a", "wma", "opus",
    // documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx", "txt", "rtf", "odt", "ods", "odp",
    // archives
    "zip", "rar", "7z", "tar", "gz", "bz2", "xz",
    // data and source
    "json", "xml", "csv", "yaml", "yml", "toml", "ini", "js", "jsx", "ts", "tsx", "py", "java",
    "cpp", "c", "h", "cs", "php", "rb", "go", "rs", "swift", "kt", "html", "css", "scss", "sass",
    "less", "md", "markdown", "sql", "db", "sqlite", "mdb",
    // design
    "psd", "ai", "eps", "sketch", "fig", "xd",
    // fonts
    "ttf", "otf", "woff", "woff2", "eot",
    // installers and images
    "apk", "ipa", "exe", "dmg", "deb", "rpm", "iso", "img", "vdi", "vmdk",
    // 3d and cad
    "stl", "obj", "fbx", "blend", "3ds", "dae", "dwg", "dxf", "step", "stp", "iges", "igs",
];

/// Allowed but logged with a content hash when uploaded.
pub const DANGEROUS_EXTENSIONS: &[&str] = &["exe", "bat", "cmd", "com", "pif", "scr", "vbs", "js"];

const BYTES_PER_MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Nama file tidak valid")]
    MissingFilename,

    #[error("Ekstensi file .{0} tidak didukung")]
    InvalidExtension(String),

    #[error("Ukuran file terlalu besar. Maksimal {max_mb}MB")]
    FileTooLarge { size: u64, max_mb: u64 },

    #[error("File kosong")]
    EmptyFile,

    #[error("Nama file tidak valid setelah sanitasi")]
    InvalidFilename,
}

/// Outcome of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedUpload {
    pub sanitized_name: String,
    pub extension: String,
    pub is_dangerous: bool,
}

/// Validate one uploaded file.
///
/// `size` is the number of bytes actually received. A file of exactly `max_size` bytes passes.
pub fn validate_upload(
    name: &str,
    size: u64,
    max_size: u64,
    allowed_extensions: &[String],
) -> Result<ValidatedUpload, ValidationError> {
    if name.trim().is_empty() {
        return Err(ValidationError::MissingFilename);
    }

    let extension = file_extension(name);
    if !allowed_extensions.iter().any(|allowed| *allowed == extension) {
        return Err(ValidationError::InvalidExtension(extension));
    }

    if size > max_size {
        return Err(ValidationError::FileTooLarge {
            size,
            max_mb: (max_size + BYTES_PER_MB / 2) / BYTES_PER_MB,
        });
    }

    if size == 0 {
        return Err(ValidationError::EmptyFile);
    }

    let sanitized_name = sanitize_filename(name);
    if sanitized_name.is_empty() {
        return Err(ValidationError::InvalidFilename);
    }

    let is_dangerous = DANGEROUS_EXTENSIONS.contains(&extension.as_str());

    Ok(ValidatedUpload {
        sanitized_name,
        extension,
        is_dangerous,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: u64 = 1024;

    fn allowed() -> Vec<String> {
        DEFAULT_ALLOWED_EXTENSIONS
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    #[test]
    fn test_size_boundary() {
        assert!(validate_upload("report.pdf", MAX, MAX, &allowed()).is_ok());
        assert!(matches!(
            validate_upload("report.pdf", MAX + 1, MAX, &allowed()),
            Err(ValidationError::FileTooLarge { size, .. }) if size == MAX + 1
        ));
        assert_eq!(
            validate_upload("report.pdf", 0, MAX, &allowed()),
            Err(ValidationError::EmptyFile)
        );
    }

    #[test]
    fn test_extension_checked_before_size() {
        assert_eq!(
            validate_upload("payload.sh", 0, MAX, &allowed()),
            Err(ValidationError::InvalidExtension("sh".to_string()))
        );
        assert_eq!(
            validate_upload("README", 10, MAX, &allowed()).unwrap_err().to_string(),
            "Ekstensi file .readme tidak didukung"
        );
    }

    #[test]
    fn test_extension_match_is_case_insensitive() {
        let validated = validate_upload("Holiday Photo.JPG", 10, MAX, &allowed()).unwrap();
        assert_eq!(validated.extension, "jpg");
        assert_eq!(validated.sanitized_name, "Holiday_Photo.JPG");
        assert!(!validated.is_dangerous);
    }

    #[test]
    fn test_dangerous_extension_passes_but_is_flagged() {
        let validated = validate_upload("setup.exe", 10, MAX, &allowed()).unwrap();
        assert!(validated.is_dangerous);
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            ValidationError::FileTooLarge {
                size: 200 * BYTES_PER_MB,
                max_mb: 100
            }
            .to_string(),
            "Ukuran file terlalu besar. Maksimal 100MB"
        );
        assert_eq!(
            validate_upload(" ", 10, MAX, &allowed()),
            Err(ValidationError::MissingFilename)
        );
    }
}
