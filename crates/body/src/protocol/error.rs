use std::io;

use http::StatusCode;
use thiserror::Error;

use crate::fields::FieldTreeConflict;

/// Errors produced while decoding a request body.
///
/// Every variant carries a stable machine readable code (see [`BodyError::code`])
/// next to its human readable message, and maps onto an HTTP status
/// (see [`BodyError::status`]).
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("payload too large: received {received} bytes, exceed the limit {limit}")]
    PayloadTooLarge { received: u64, limit: u64 },

    #[error("malformed body: {reason}")]
    MalformedBody { kind: MalformedKind, reason: String },

    #[error("io error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },
}

/// The reason a body was rejected as malformed.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MalformedKind {
    /// The JSON body has a syntax error, or a root strict mode does not allow
    InvalidJson,
    /// The url-encoded body could not be decoded
    InvalidForm,
    /// The multipart body violates the multipart framing
    InvalidMultipart,
    /// A buffered body grew past its limit before it was complete
    LimitExceeded,
    /// More field parts than the configured field count
    TooManyFields,
    /// Two keys disagree about the shape of a nested field
    FieldConflict,
}

impl MalformedKind {
    pub fn code(self) -> &'static str {
        match self {
            MalformedKind::InvalidJson => "E_INVALID_JSON",
            MalformedKind::InvalidForm => "E_INVALID_FORM",
            MalformedKind::InvalidMultipart => "E_INVALID_MULTIPART",
            MalformedKind::LimitExceeded => "E_BODY_LIMIT_EXCEEDED",
            MalformedKind::TooManyFields => "E_TOO_MANY_FIELDS",
            MalformedKind::FieldConflict => "E_FIELD_CONFLICT",
        }
    }
}

impl BodyError {
    pub fn payload_too_large(received: u64, limit: u64) -> Self {
        Self::PayloadTooLarge { received, limit }
    }

    pub fn malformed<S: ToString>(kind: MalformedKind, str: S) -> Self {
        Self::MalformedBody { kind, reason: str.to_string() }
    }

    pub fn invalid_json<S: ToString>(str: S) -> Self {
        Self::malformed(MalformedKind::InvalidJson, str)
    }

    pub fn invalid_form<S: ToString>(str: S) -> Self {
        Self::malformed(MalformedKind::InvalidForm, str)
    }

    pub fn invalid_multipart<S: ToString>(str: S) -> Self {
        Self::malformed(MalformedKind::InvalidMultipart, str)
    }

    pub fn limit_exceeded(limit: u64) -> Self {
        Self::malformed(MalformedKind::LimitExceeded, format!("request body exceed the limit {limit}"))
    }

    pub fn too_many_fields(max_num: usize) -> Self {
        Self::malformed(MalformedKind::TooManyFields, format!("field number exceed the limit {max_num}"))
    }

    pub fn io<E: Into<io::Error>>(e: E) -> Self {
        Self::Io { source: e.into() }
    }

    /// The stable error code, distinct from the display message.
    pub fn code(&self) -> &'static str {
        match self {
            BodyError::PayloadTooLarge { .. } => "E_PAYLOAD_TOO_LARGE",
            BodyError::MalformedBody { kind, .. } => kind.code(),
            BodyError::Io { .. } => "E_BODY_IO",
        }
    }

    /// The HTTP status a caller should answer with.
    pub fn status(&self) -> StatusCode {
        match self {
            BodyError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            BodyError::MalformedBody { .. } => StatusCode::BAD_REQUEST,
            BodyError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_payload_too_large(&self) -> bool {
        matches!(self, BodyError::PayloadTooLarge { .. })
    }

    /// Returns the malformed kind, if this is a [`BodyError::MalformedBody`].
    pub fn malformed_kind(&self) -> Option<MalformedKind> {
        match self {
            BodyError::MalformedBody { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

impl From<FieldTreeConflict> for BodyError {
    fn from(conflict: FieldTreeConflict) -> Self {
        Self::malformed(MalformedKind::FieldConflict, conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::FieldTree;

    #[test]
    fn test_payload_too_large() {
        let error = BodyError::payload_too_large(2048, 1024);
        assert_eq!(error.code(), "E_PAYLOAD_TOO_LARGE");
        assert_eq!(error.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert!(error.is_payload_too_large());
        assert_eq!(error.to_string(), "payload too large: received 2048 bytes, exceed the limit 1024");
    }

    #[test]
    fn test_malformed_codes() {
        assert_eq!(BodyError::invalid_json("eof").code(), "E_INVALID_JSON");
        assert_eq!(BodyError::invalid_form("bad").code(), "E_INVALID_FORM");
        assert_eq!(BodyError::invalid_multipart("bad").code(), "E_INVALID_MULTIPART");
        assert_eq!(BodyError::limit_exceeded(10).code(), "E_BODY_LIMIT_EXCEEDED");
        assert_eq!(BodyError::too_many_fields(1).code(), "E_TOO_MANY_FIELDS");
        assert_eq!(BodyError::invalid_json("eof").status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_conflict_is_malformed() {
        let mut tree = FieldTree::new();
        tree.add("a[x]", 1).unwrap();
        let conflict = tree.add("a[0]", 2).unwrap_err();

        let error = BodyError::from(conflict);
        assert_eq!(error.malformed_kind(), Some(MalformedKind::FieldConflict));
        assert_eq!(error.code(), "E_FIELD_CONFLICT");
        assert_eq!(error.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_io() {
        let error = BodyError::io(io::Error::other("disk full"));
        assert_eq!(error.code(), "E_BODY_IO");
        assert_eq!(error.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
