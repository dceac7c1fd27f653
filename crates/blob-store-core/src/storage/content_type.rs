//! Extension-based content type lookup.

/// Fallback for unknown or missing extensions.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const CONTENT_TYPES: &[(&str, &str)] = &[
    ("html", "text/html"),
    ("htm", "text/html"),
    ("css", "text/css"),
    ("js", "application/javascript"),
    ("json", "application/json"),
    ("xml", "application/xml"),
    ("txt", "text/plain"),
    ("md", "text/markdown"),
    ("csv", "text/csv"),
    ("pdf", "application/pdf"),
    ("zip", "application/zip"),
    ("tar", "application/x-tar"),
    ("gz", "application/gzip"),
    ("png", "image/png"),
    ("jpg", "image/jpeg"),
    ("jpeg", "image/jpeg"),
    ("gif", "image/gif"),
    ("svg", "image/svg+xml"),
    ("webp", "image/webp"),
    ("ico", "image/x-icon"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("webm", "video/webm"),
    ("wasm", "application/wasm"),
];

/// Resolve a MIME type from the extension of the last segment of `key`.
pub fn content_type_for(key: &str) -> &'static str {
    let name = key.rsplit(['/', '\\']).next().unwrap_or(key);
    let Some((stem, ext)) = name.rsplit_once('.') else {
        return DEFAULT_CONTENT_TYPE;
    };
    if stem.is_empty() && !name[1..].contains('.') {
        // dotfile like ".env", no extension
        return DEFAULT_CONTENT_TYPE;
    }

    let ext = ext.to_ascii_lowercase();
    CONTENT_TYPES
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_extensions() {
        assert_eq!(content_type_for("index.html"), "text/html");
        assert_eq!(content_type_for("photos/cat.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("bundle.tar.gz"), "application/gzip");
    }

    #[test]
    fn test_extension_lookup_is_case_insensitive() {
        assert_eq!(content_type_for("REPORT.PDF"), "application/pdf");
        assert_eq!(content_type_for("a/B.Json"), "application/json");
    }

    #[test]
    fn test_unknown_or_missing_extension_falls_back() {
        assert_eq!(content_type_for("data.bin"), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for("Makefile"), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for("dir.d/noext"), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for(".env"), DEFAULT_CONTENT_TYPE);
        assert_eq!(content_type_for("trailing."), DEFAULT_CONTENT_TYPE);
    }
}
