//! The request body decoder.
//!
//! [`BodyDecoder`] picks a strategy from the declared media type:
//!
//! - JSON and url-encoded forms are buffered up to a limit, then every key is
//!   routed through a [`FieldTree`](crate::fields::FieldTree), so
//!   `user[email]` nests the same way no matter how it was sent
//! - plain text is buffered and kept as the raw body
//! - multipart bodies are streamed part by part, files go straight to disk
//! - any other media type leaves the body untouched

mod buffered;
mod multipart;
mod upload;

use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::Request;
use http_body::Body;
use tracing::debug;

use crate::codec::parse_boundary;
use crate::content_type::{classify, has_body, ContentKind};
use crate::protocol::{BodyError, BodyParserConfig, DecodedBody, UploadLimits};
use multipart::MultipartSession;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Decodes request bodies according to a [`BodyParserConfig`].
///
/// The decoder holds no per request state, one instance can be shared by
/// any number of concurrent requests.
///
/// # Example
///
/// ```
/// use bytes::Bytes;
/// use http_body_util::Full;
/// use micro_body::decoder::BodyDecoder;
/// use micro_body::protocol::BodyParserConfig;
///
/// # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
/// let decoder = BodyDecoder::new(BodyParserConfig::default());
/// let body = Full::new(Bytes::from_static(b"user[name]=virk&user[tags][]=admin"));
///
/// let decoded = decoder.decode(body, "application/x-www-form-urlencoded").await.unwrap();
/// assert_eq!(decoded.field("user[name]").and_then(|node| node.as_text()), Some("virk"));
/// assert_eq!(decoded.field("user[tags][0]").and_then(|node| node.as_text()), Some("admin"));
/// # });
/// ```
#[derive(Debug, Clone, Default)]
pub struct BodyDecoder {
    config: BodyParserConfig,
}

impl BodyDecoder {
    pub fn new(config: BodyParserConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BodyParserConfig {
        &self.config
    }

    /// Decodes `body` as the declared media type, with the upload limits of the config.
    pub async fn decode<B>(&self, body: B, content_type: &str) -> Result<DecodedBody, BodyError>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        self.decode_with_limits(body, content_type, self.config.upload_limits()).await
    }

    /// Decodes `body` as the declared media type.
    ///
    /// `limits` only applies to multipart bodies; the other kinds are bounded
    /// by the buffering limits of the config. On failure nothing is returned
    /// and no uploaded file is kept.
    pub async fn decode_with_limits<B>(
        &self,
        body: B,
        content_type: &str,
        limits: UploadLimits,
    ) -> Result<DecodedBody, BodyError>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let kind = classify(content_type);
        debug!(content_type, ?kind, "decode request body");

        let config = &self.config;
        let mut decoded = match kind {
            ContentKind::Json => buffered::decode_json(buffered::read_limited(body, config.json_limit()).await?, config)?,
            ContentKind::Form => buffered::decode_form(buffered::read_limited(body, config.form_limit()).await?, config)?,
            ContentKind::Text => buffered::decode_text(buffered::read_limited(body, config.text_limit()).await?),
            ContentKind::Multipart => {
                let boundary = parse_boundary(content_type)?;
                MultipartSession::new(&boundary, limits, &config.uploads, &config.qs).decode(body).await?
            }
            ContentKind::Unrecognized => return Ok(DecodedBody::empty()),
        };

        if config.trim_strings {
            decoded.fields.trim_strings();
        }
        Ok(decoded)
    }

    /// Decodes the body of a request, reading the media type from its `Content-Type`.
    ///
    /// A request without a body (no `Transfer-Encoding` and no positive
    /// `Content-Length`) or without a `Content-Type` decodes to an empty
    /// [`DecodedBody`].
    pub async fn decode_request<B>(&self, request: Request<B>) -> Result<DecodedBody, BodyError>
    where
        B: Body<Data = Bytes>,
        B::Error: Into<BoxError>,
    {
        let (parts, body) = request.into_parts();
        if !has_body(&parts.headers) {
            debug!("request has no body");
            return Ok(DecodedBody::empty());
        }

        let Some(content_type) = parts.headers.get(CONTENT_TYPE).and_then(|value| value.to_str().ok()) else {
            debug!("request body has no content type");
            return Ok(DecodedBody::empty());
        };

        self.decode(body, content_type).await
    }
}
