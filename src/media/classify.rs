//! HTTP response classification.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::header::{HeaderMap, CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::StatusCode;

/// What a download response turned out to contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// Non-success status.
    Fail,
    /// Video or gif content.
    Animated,
    Image,
    NotImage,
}

/// Content types that mark animated media.
const ANIMATED_MARKERS: [&str; 2] = ["video", "gif"];

/// Content types servers use for untyped binary payloads.
const BINARY_MARKERS: [&str; 2] = ["application/octet-stream", "binary/octet-stream"];

/// Classify a response from its status and headers, without touching the body.
///
/// The checks run in a fixed order: status, animated marker, image content
/// type, then a generic binary type backed by an image file extension.
pub fn classify(status: StatusCode, headers: &HeaderMap, url: &str) -> ResponseKind {
    let content_type = header_str(headers, CONTENT_TYPE.as_str());
    let disposition = header_str(headers, CONTENT_DISPOSITION.as_str());
    classify_parts(status, content_type, disposition, url)
}

/// Header-free variant of [`classify`].
pub fn classify_parts(
    status: StatusCode,
    content_type: Option<&str>,
    content_disposition: Option<&str>,
    url: &str,
) -> ResponseKind {
    if !status.is_success() {
        return ResponseKind::Fail;
    }

    let content_type = content_type.unwrap_or("").to_ascii_lowercase();

    if ANIMATED_MARKERS.iter().any(|m| content_type.contains(m)) {
        return ResponseKind::Animated;
    }

    if content_type.contains("image") {
        return ResponseKind::Image;
    }

    if BINARY_MARKERS.iter().any(|m| content_type.contains(m)) {
        let url_has_image_ext = url_file_name(url).is_some_and(|name| has_image_extension(&name));
        let disposition_has_image_ext = content_disposition
            .and_then(disposition_file_name)
            .is_some_and(|name| has_image_extension(&name));

        if url_has_image_ext || disposition_has_image_ext {
            return ResponseKind::Image;
        }
    }

    ResponseKind::NotImage
}

/// Whether a file name carries a still-image extension.
pub fn has_image_extension(name: &str) -> bool {
    let guess = mime_guess::from_path(name);
    guess.iter().any(|mime| {
        mime.type_() == mime_guess::mime::IMAGE && mime.subtype() != mime_guess::mime::GIF
    })
}

/// Last path segment of a URL, ignoring query and fragment.
pub fn url_file_name(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(str::to_string)
}

/// Extract the `filename` parameter from a `Content-Disposition` value.
pub fn disposition_file_name(value: &str) -> Option<String> {
    static FILENAME: OnceLock<Regex> = OnceLock::new();
    let pattern = FILENAME.get_or_init(|| {
        Regex::new(r#"(?i)filename\*?\s*=\s*(?:UTF-8'')?"?([^";]+)"?"#).expect("valid regex")
    });

    pattern
        .captures(value)
        .and_then(|captures| captures.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|name| !name.is_empty())
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OK: StatusCode = StatusCode::OK;

    #[test]
    fn test_failure_status_wins() {
        assert_eq!(
            classify_parts(StatusCode::NOT_FOUND, Some("image/jpeg"), None, "https://x/a.jpg"),
            ResponseKind::Fail
        );
    }

    #[test]
    fn test_animated_before_image() {
        assert_eq!(
            classify_parts(OK, Some("image/gif"), None, "https://x/a.gif"),
            ResponseKind::Animated
        );
        assert_eq!(
            classify_parts(OK, Some("video/mp4"), None, "https://x/a.mp4"),
            ResponseKind::Animated
        );
    }

    #[test]
    fn test_image_content_type() {
        assert_eq!(
            classify_parts(OK, Some("image/png"), None, "https://x/download"),
            ResponseKind::Image
        );
    }

    #[test]
    fn test_octet_stream_with_url_extension() {
        assert_eq!(
            classify_parts(
                OK,
                Some("application/octet-stream"),
                None,
                "https://x/files/pic.JPG?sig=abc"
            ),
            ResponseKind::Image
        );
        assert_eq!(
            classify_parts(OK, Some("binary/octet-stream"), None, "https://x/files/blob"),
            ResponseKind::NotImage
        );
    }

    #[test]
    fn test_octet_stream_with_disposition() {
        assert_eq!(
            classify_parts(
                OK,
                Some("application/octet-stream"),
                Some("attachment; filename=\"holiday.webp\""),
                "https://x/download?id=7"
            ),
            ResponseKind::Image
        );
    }

    #[test]
    fn test_html_is_not_image() {
        assert_eq!(
            classify_parts(OK, Some("text/html; charset=utf-8"), None, "https://x/a.jpg"),
            ResponseKind::NotImage
        );
        assert_eq!(classify_parts(OK, None, None, "https://x/a"), ResponseKind::NotImage);
    }

    #[test]
    fn test_disposition_file_name() {
        assert_eq!(
            disposition_file_name("inline; filename=photo.png"),
            Some("photo.png".to_string())
        );
        assert_eq!(
            disposition_file_name("attachment; filename*=UTF-8''caf%C3%A9.jpg"),
            Some("caf%C3%A9.jpg".to_string())
        );
        assert_eq!(disposition_file_name("inline"), None);
    }

    #[test]
    fn test_url_file_name() {
        assert_eq!(
            url_file_name("https://i.example.com/a/b/c.png?x=1#frag"),
            Some("c.png".to_string())
        );
        assert_eq!(url_file_name("https://example.com/"), None);
        assert_eq!(url_file_name("not a url"), None);
    }

    #[test]
    fn test_gif_extension_is_not_still_image() {
        assert!(has_image_extension("a.jpeg"));
        assert!(has_image_extension("a.webp"));
        assert!(!has_image_extension("a.gif"));
        assert!(!has_image_extension("a.mp4"));
    }
}
