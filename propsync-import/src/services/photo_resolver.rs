//! Photo URL resolver
//!
//! Pure URL bookkeeping; no bytes are fetched or copied. For each photo
//! index the resolver prefers a recorded URL (object storage first, since
//! the mirror writes its URLs back to the catalog) over the deterministic
//! legacy-host construction. A listing without photos resolves to a
//! placeholder sentinel, never to a URL that would 404.

use std::fmt;

/// Outcome of resolving one photo slot
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedPhoto {
    Url(String),
    /// No photo exists for this slot; render a placeholder
    Placeholder,
}

impl ResolvedPhoto {
    pub fn as_url(&self) -> Option<&str> {
        match self {
            ResolvedPhoto::Url(url) => Some(url),
            ResolvedPhoto::Placeholder => None,
        }
    }
}

impl fmt::Display for ResolvedPhoto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedPhoto::Url(url) => write!(f, "{}", url),
            ResolvedPhoto::Placeholder => write!(f, "placeholder"),
        }
    }
}

/// Resolve one photo by 1-based index
///
/// Total and deterministic: identical inputs always yield the identical
/// output, and every index resolves to something.
pub fn resolve_photo(
    wp_id: i64,
    photo_count: i64,
    recorded_urls: &[String],
    legacy_host: &str,
    index: u32,
) -> ResolvedPhoto {
    if index == 0 {
        return ResolvedPhoto::Placeholder;
    }

    if let Some(url) = recorded_urls.get(index as usize - 1) {
        return ResolvedPhoto::Url(url.clone());
    }

    if i64::from(index) <= photo_count {
        return ResolvedPhoto::Url(legacy_photo_url(legacy_host, wp_id, index));
    }

    ResolvedPhoto::Placeholder
}

/// Resolve every photo slot of a listing
///
/// A listing with neither recorded URLs nor a photo count yields a single
/// placeholder so consumers always have something to render.
pub fn resolve_all(
    wp_id: i64,
    photo_count: i64,
    recorded_urls: &[String],
    legacy_host: &str,
) -> Vec<ResolvedPhoto> {
    let slots = recorded_urls.len().max(photo_count.max(0) as usize);
    if slots == 0 {
        return vec![ResolvedPhoto::Placeholder];
    }

    (1..=slots as u32)
        .map(|index| resolve_photo(wp_id, photo_count, recorded_urls, legacy_host, index))
        .collect()
}

/// Deterministic legacy WPL upload path, index zero-padded to two digits
pub fn legacy_photo_url(host: &str, wp_id: i64, index: u32) -> String {
    format!(
        "http://{}/wp-content/uploads/WPL/{}/img_foto{:02}.jpg",
        host, wp_id, index
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOST: &str = "legado.example.com.br";

    #[test]
    fn constructed_url_is_zero_padded() {
        assert_eq!(
            legacy_photo_url(HOST, 842, 3),
            "http://legado.example.com.br/wp-content/uploads/WPL/842/img_foto03.jpg"
        );
        assert_eq!(
            legacy_photo_url(HOST, 842, 12),
            "http://legado.example.com.br/wp-content/uploads/WPL/842/img_foto12.jpg"
        );
    }

    #[test]
    fn recorded_url_wins_over_construction() {
        let recorded = vec!["https://cdn.example.com/842/a.jpg".to_string()];
        let resolved = resolve_photo(842, 5, &recorded, HOST, 1);
        assert_eq!(resolved.as_url(), Some("https://cdn.example.com/842/a.jpg"));

        // Slots past the recorded list fall back to construction
        let resolved = resolve_photo(842, 5, &recorded, HOST, 2);
        assert_eq!(
            resolved.as_url(),
            Some("http://legado.example.com.br/wp-content/uploads/WPL/842/img_foto02.jpg")
        );
    }

    #[test]
    fn zero_photos_yields_placeholder() {
        assert_eq!(resolve_photo(842, 0, &[], HOST, 1), ResolvedPhoto::Placeholder);
        assert_eq!(resolve_all(842, 0, &[], HOST), vec![ResolvedPhoto::Placeholder]);
    }

    #[test]
    fn index_past_count_yields_placeholder() {
        assert_eq!(resolve_photo(842, 2, &[], HOST, 3), ResolvedPhoto::Placeholder);
    }

    #[test]
    fn resolver_is_deterministic() {
        let recorded = vec!["https://cdn.example.com/842/a.jpg".to_string()];
        let first = resolve_all(842, 3, &recorded, HOST);
        let second = resolve_all(842, 3, &recorded, HOST);
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }
}
