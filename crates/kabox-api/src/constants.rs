//! Route prefixes and fixed response messages.

pub const API_PREFIX: &str = "/api";
pub const FILES_PREFIX: &str = "/files";
pub const MEDIA_PREFIX: &str = "/media";

/// Multipart field carrying the uploaded files.
pub const UPLOAD_FIELD: &str = "files";

pub const MSG_NO_FILES: &str = "Tidak ada file yang diupload";
pub const MSG_FILE_NOT_FOUND: &str = "File tidak ditemukan";
pub const MSG_INVALID_REQUEST: &str = "Invalid request";
pub const MSG_STORAGE_EXHAUSTED: &str = "Semua penyimpanan gagal";
pub const MSG_METADATA_FAILED: &str = "Gagal menyimpan metadata file";
pub const MSG_RATE_LIMITED: &str = "Terlalu banyak request, coba lagi nanti";
pub const MSG_TOO_LARGE: &str = "Ukuran file terlalu besar";

pub fn too_many_files_message(limit: usize) -> String {
    format!("Maksimal {} file per upload", limit)
}
