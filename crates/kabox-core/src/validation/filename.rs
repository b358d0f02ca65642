/// Longest sanitized filename, in bytes.
pub const MAX_FILENAME_LENGTH: usize = 255;

/// Lowercased text after the last `.` of `name`.
///
/// A name without a dot is its own extension, so `README` yields `readme` and is checked
/// against the allow-list like any other extension.
pub fn file_extension(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).to_lowercase()
}

/// Make a filename safe for use inside storage object keys.
///
/// Every character outside `[A-Za-z0-9._-]` becomes `_`, runs of `.` and `_` collapse to a
/// single character, and the result is cut to [`MAX_FILENAME_LENGTH`] bytes. The output can
/// never contain a path separator or `..`.
pub fn sanitize_filename(name: &str) -> String {
    let mut sanitized = String::with_capacity(name.len().min(MAX_FILENAME_LENGTH));
    let mut previous: Option<char> = None;

    for c in name.chars() {
        let mapped = if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
            c
        } else {
            '_'
        };
        if (mapped == '.' || mapped == '_') && previous == Some(mapped) {
            continue;
        }
        if sanitized.len() == MAX_FILENAME_LENGTH {
            break;
        }
        sanitized.push(mapped);
        previous = Some(mapped);
    }

    sanitized
}
