/// Length of generated file identifiers.
pub const FILE_ID_LENGTH: usize = 12;

/// Generate a new file identifier.
///
/// Uniqueness across metadata databases relies on this generator alone: 72 bits of
/// URL-safe randomness, no cross-database constraint.
pub fn generate_file_id() -> String {
    nanoid::nanoid!(FILE_ID_LENGTH)
}

/// Whether `id` has the shape of an identifier this service could have issued.
pub fn is_valid_file_id(id: &str) -> bool {
    (1..=64).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}
