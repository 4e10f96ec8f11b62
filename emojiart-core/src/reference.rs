//! Background reference handling.

use url::Url;

/// Query parameter used by image search result links to carry the real image.
const IMAGE_URL_PARAM: &str = "imgurl";

/// Unwrap an image search result link into the image it points at.
///
/// References that are not URLs, or that carry no `imgurl` parameter, are
/// returned unchanged.
#[must_use]
pub fn normalize_image_reference(reference: &str) -> String {
    let trimmed = reference.trim();
    let Ok(url) = Url::parse(trimmed) else {
        return trimmed.to_string();
    };
    url.query_pairs()
        .find(|(key, _)| key == IMAGE_URL_PARAM)
        .and_then(|(_, value)| Url::parse(&value).ok())
        .map_or_else(|| trimmed.to_string(), String::from)
}
