//! Utility functions for names, image references, durations and MIME types

use std::time::Duration;

/// Split a file name at its first dot into `(stem, extension)`
///
/// The extension keeps any further dots (`"table.md.zip"` → `("table", "md.zip")`).
/// A name without a dot yields an empty extension.
///
/// # Examples
///
/// ```
/// use parsr_batch::utils::split_file_name;
///
/// assert_eq!(split_file_name("report.pdf"), ("report", "pdf"));
/// assert_eq!(split_file_name("notes"), ("notes", ""));
/// ```
pub fn split_file_name(name: &str) -> (&str, &str) {
    match name.split_once('.') {
        Some((stem, extension)) => (stem, extension),
        None => (name, ""),
    }
}

/// Normalize a container image reference so an implicit tag reads as `:latest`
///
/// A colon only counts as a tag separator when it comes after the last `/`,
/// which keeps registry ports (`localhost:5000/parsr`) intact. Digest references
/// are returned unchanged.
///
/// # Examples
///
/// ```
/// use parsr_batch::utils::normalize_image;
///
/// assert_eq!(normalize_image("axarev/parsr"), "axarev/parsr:latest");
/// assert_eq!(normalize_image("axarev/parsr:v1"), "axarev/parsr:v1");
/// assert_eq!(normalize_image("localhost:5000/parsr"), "localhost:5000/parsr:latest");
/// ```
pub fn normalize_image(image: &str) -> String {
    let image = image.trim();
    if image.contains('@') {
        return image.to_string();
    }
    let name_start = image.rfind('/').map(|i| i + 1).unwrap_or(0);
    if image[name_start..].contains(':') {
        image.to_string()
    } else {
        format!("{}:latest", image)
    }
}

/// Format a duration for log messages (e.g., "30m", "1h 5m 3s", "45s")
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    if total == 0 {
        return format!("{}ms", duration.as_millis());
    }

    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut parts = Vec::with_capacity(3);
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if seconds > 0 {
        parts.push(format!("{}s", seconds));
    }
    parts.join(" ")
}

/// Guess the MIME type sent for an input document from its extension
///
/// Only the last dot-separated segment is looked up, so `"scan.tiff"` and
/// `"tiff"` agree. Unknown extensions fall back to `application/octet-stream`.
pub fn mime_for_extension(extension: &str) -> mime_guess::Mime {
    let last = extension.rsplit('.').next().unwrap_or(extension);
    mime_guess::from_ext(last).first_or_octet_stream()
}
