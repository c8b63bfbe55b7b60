//! Media type classification of request bodies.
//!
//! The declared `Content-Type` is matched by its `type/subtype` essence, any
//! parameter such as `charset` or `boundary` is ignored. The sets below are
//! fixed, they are not part of the configuration.

use http::header::{CONTENT_LENGTH, CONTENT_TYPE, TRANSFER_ENCODING};
use http::HeaderMap;
use mime::Mime;

pub const JSON_TYPES: [&str; 4] =
    ["application/json", "application/json-patch+json", "application/vnd.api+json", "application/csp-report"];

pub const FORM_TYPES: [&str; 1] = ["application/x-www-form-urlencoded"];

pub const MULTIPART_TYPES: [&str; 1] = ["multipart/form-data"];

pub const TEXT_TYPES: [&str; 1] = ["text/plain"];

/// The decoding strategy for a body.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Json,
    Form,
    Text,
    Multipart,
    /// Not a supported media type, the body is left untouched
    Unrecognized,
}

impl ContentKind {
    /// Classifies the `Content-Type` header of a request.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map_or(ContentKind::Unrecognized, classify)
    }

    pub fn is_recognized(self) -> bool {
        self != ContentKind::Unrecognized
    }
}

/// Maps a declared media type onto its [`ContentKind`].
///
/// # Example
///
/// ```
/// use micro_body::content_type::{classify, ContentKind};
///
/// assert_eq!(classify("application/json; charset=utf-8"), ContentKind::Json);
/// assert_eq!(classify("application/octet-stream"), ContentKind::Unrecognized);
/// ```
pub fn classify(declared_media_type: &str) -> ContentKind {
    let Ok(mime) = declared_media_type.trim().parse::<Mime>() else {
        return ContentKind::Unrecognized;
    };

    let essence = mime.essence_str();
    let matches = |set: &[&str]| set.iter().any(|candidate| candidate.eq_ignore_ascii_case(essence));

    if matches(&JSON_TYPES) {
        ContentKind::Json
    } else if matches(&FORM_TYPES) {
        ContentKind::Form
    } else if matches(&MULTIPART_TYPES) {
        ContentKind::Multipart
    } else if matches(&TEXT_TYPES) {
        ContentKind::Text
    } else {
        ContentKind::Unrecognized
    }
}

/// Determines if a request carries a body.
///
/// A body is present when the request is sent with `Transfer-Encoding`, or
/// with a `Content-Length` greater than zero.
pub fn has_body(headers: &HeaderMap) -> bool {
    if headers.contains_key(TRANSFER_ENCODING) {
        return true;
    }

    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .is_some_and(|length| length > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::HeaderValue;

    #[test]
    fn test_fixed_sets() {
        for media_type in JSON_TYPES {
            assert_eq!(classify(media_type), ContentKind::Json, "{media_type}");
        }
        for media_type in FORM_TYPES {
            assert_eq!(classify(media_type), ContentKind::Form);
        }
        for media_type in MULTIPART_TYPES {
            assert_eq!(classify(media_type), ContentKind::Multipart);
        }
        for media_type in TEXT_TYPES {
            assert_eq!(classify(media_type), ContentKind::Text);
        }
    }

    #[test]
    fn test_parameters_are_ignored() {
        assert_eq!(classify("application/json; charset=utf-8"), ContentKind::Json);
        assert_eq!(classify("multipart/form-data; boundary=----abc"), ContentKind::Multipart);
        assert_eq!(classify("text/plain;charset=latin1"), ContentKind::Text);
        assert_eq!(classify("  Application/JSON "), ContentKind::Json);
    }

    #[test]
    fn test_unrecognized() {
        assert_eq!(classify("application/octet-stream"), ContentKind::Unrecognized);
        assert_eq!(classify("text/html"), ContentKind::Unrecognized);
        assert_eq!(classify("application/problem+json"), ContentKind::Unrecognized);
        assert_eq!(classify(""), ContentKind::Unrecognized);
        assert_eq!(classify("not a media type"), ContentKind::Unrecognized);
        assert!(!ContentKind::Unrecognized.is_recognized());
    }

    #[test]
    fn test_from_headers() {
        let mut headers = HeaderMap::new();
        assert_eq!(ContentKind::from_headers(&headers), ContentKind::Unrecognized);

        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/x-www-form-urlencoded"));
        assert_eq!(ContentKind::from_headers(&headers), ContentKind::Form);
    }

    #[test]
    fn test_has_body() {
        let mut headers = HeaderMap::new();
        assert!(!has_body(&headers));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("0"));
        assert!(!has_body(&headers));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("12"));
        assert!(has_body(&headers));

        let mut headers = HeaderMap::new();
        headers.insert(TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        assert!(has_body(&headers));
    }
}
