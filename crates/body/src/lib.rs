//! An asynchronous HTTP request body decoder
//!
//! This crate turns the body of an HTTP request into structured data: nested
//! form fields, uploaded files stored on disk, or the raw text. It works on any
//! `http_body::Body`, so it can sit behind any server built on the `http` crate.
//!
//! # Features
//!
//! - JSON, url-encoded form, plain text and `multipart/form-data` bodies
//! - Bracket-notation field names (`user[email]`, `tags[]`, `items[0][id]`)
//!   decoded into nested objects and sequences, whatever the body format
//! - Streaming multipart decoding, file parts never buffered in memory
//! - Cumulative upload limit enforced while the body arrives
//! - Stable error codes mapped onto HTTP status codes
//!
//! # Example
//!
//! ```no_run
//! use bytes::Bytes;
//! use http::Request;
//! use http_body_util::Full;
//! use micro_body::decoder::BodyDecoder;
//! use micro_body::protocol::{BodyParserConfig, ByteSize};
//! use tracing::{error, info};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = BodyParserConfig::default().max_upload_size(ByteSize::mib(16));
//!     let decoder = BodyDecoder::new(config);
//!
//!     let request = Request::builder()
//!         .header(http::header::CONTENT_TYPE, "application/x-www-form-urlencoded")
//!         .header(http::header::CONTENT_LENGTH, 39)
//!         .body(Full::new(Bytes::from_static(b"user[email]=a@x.com&user[roles][]=admin")))
//!         .unwrap();
//!
//!     match decoder.decode_request(request).await {
//!         Ok(decoded) => info!(fields = %serde_json::to_string(&decoded.fields).unwrap(), "decoded body"),
//!         Err(e) => error!(code = e.code(), status = %e.status(), cause = %e, "failed to decode body"),
//!     }
//! }
//! ```
//!
//! # Architecture
//!
//! - [`fields`]: bracket key tokenizing and the nested [`fields::FieldTree`]
//! - [`content_type`]: media type classification
//! - [`codec`]: the incremental multipart wire decoder
//! - [`protocol`]: errors, configuration and the decoded result
//! - [`decoder`]: [`decoder::BodyDecoder`], tying all of the above together
//!
//! # Limitations
//!
//! - Maximum multipart part header size: 8KB
//! - Maximum number of headers in a multipart part: 16
//! - Non utf-8 multipart field values are decoded lossily

pub mod codec;
pub mod content_type;
pub mod decoder;
pub mod fields;
pub mod protocol;

mod utils;
pub(crate) use utils::ensure;
