//! Object key normalization.
//!
//! Both backends run every key through [`sanitize_key`] before touching the
//! filesystem or the network, so a key rejected by one backend is rejected by
//! the other with the same error.

use crate::error::{Error, Result};

/// Normalize `raw` into a relative, `/`-separated key.
///
/// Rejects keys that are empty, absolute, contain a NUL byte or any `..`
/// segment, or that normalize to nothing. `\` counts as a separator and empty
/// or `.` segments are dropped, so `a//b/./c` becomes `a/b/c`.
pub fn sanitize_key(raw: &str) -> Result<String> {
    let invalid = |reason| Error::InvalidKey {
        key: raw.to_string(),
        reason,
    };

    if raw.is_empty() {
        return Err(invalid("key is empty"));
    }
    if raw.contains('\0') {
        return Err(invalid("key contains a NUL byte"));
    }
    if raw.starts_with('/') || raw.starts_with('\\') || has_drive_prefix(raw) {
        return Err(invalid("key must be relative"));
    }

    let mut segments = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(invalid("key escapes the storage root")),
            s => segments.push(s),
        }
    }

    if segments.is_empty() {
        return Err(invalid("key has no path segments"));
    }

    Ok(segments.join("/"))
}

// `C:foo` or `C:\foo` would be absolute or drive-relative on Windows.
fn has_drive_prefix(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':'
}
