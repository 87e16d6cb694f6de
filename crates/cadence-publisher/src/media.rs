//! Media reference resolution.

/// Resolve a stored media reference into an absolute fetchable URL. Already
/// absolute references pass through; relative ones are joined onto the
/// public base URL the platform fetches media from.
pub fn resolve_media_url(public_base_url: &str, media_url: &str) -> String {
    if media_url.is_empty() {
        return media_url.to_string();
    }
    if media_url.starts_with("http://") || media_url.starts_with("https://") {
        return media_url.to_string();
    }

    let base = public_base_url.trim_end_matches('/');
    if media_url.starts_with('/') {
        format!("{base}{media_url}")
    } else {
        format!("{base}/{media_url}")
    }
}
