//! Types shared by every body decoding strategy.
//!
//! - **Errors**: [`BodyError`] and its [`MalformedKind`]s, each with a
//!   stable code and an HTTP status
//! - **Configuration** ([`config`]): [`BodyParserConfig`] and the [`UploadLimits`]
//!   derived from it
//! - **Results**: [`DecodedBody`], [`FileMeta`] and [`FileField`]

mod error;
pub use error::BodyError;
pub use error::MalformedKind;

mod byte_size;
pub use byte_size::ByteSize;
pub use byte_size::ParseByteSizeError;

pub mod config;
pub use config::BodyParserConfig;
pub use config::QueryStringOptions;
pub use config::UploadLimits;
pub use config::UploadOptions;

mod decoded;
pub use decoded::DecodedBody;
pub use decoded::FileField;
pub use decoded::FileMeta;
