use kabox_core::sanitize_filename;

/// Folder every provider places uploads under.
pub(crate) const FOLDER: &str = "kabox";

/// Deterministic object key: `{file_id}_{sanitized name}`.
pub(crate) fn object_key(file_id: &str, file_name: &str) -> String {
    format!("{}_{}", file_id, sanitize_filename(file_name))
}
