//! Body parser configuration.
//!
//! [`BodyParserConfig`] deserializes from any serde source with every key
//! optional, e.g. in JSON:
//!
//! ```json
//! {
//!     "limit": "1mb",
//!     "strict": true,
//!     "qs": { "parameter_limit": 1000, "array_limit": 20, "depth": 5 },
//!     "uploads": { "max_size": "4mb", "multiple": true, "dir": "/var/tmp/uploads" },
//!     "trim_strings": false
//! }
//! ```

use std::path::PathBuf;

use serde::Deserialize;

use super::ByteSize;
use crate::fields::{FieldTree, DEFAULT_ARRAY_LIMIT, DEFAULT_DEPTH};

pub const DEFAULT_JSON_LIMIT: ByteSize = ByteSize::mib(1);
pub const DEFAULT_TEXT_LIMIT: ByteSize = ByteSize::mib(1);
pub const DEFAULT_FORM_LIMIT: ByteSize = ByteSize::kib(56);
pub const DEFAULT_UPLOAD_MAX_SIZE: ByteSize = ByteSize::mib(4);
pub const DEFAULT_PARAMETER_LIMIT: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BodyParserConfig {
    /// Buffering limit of json, form and text bodies; per kind defaults apply when unset
    pub limit: Option<ByteSize>,
    /// Only accept an object or an array as JSON root
    pub strict: bool,
    pub qs: QueryStringOptions,
    pub uploads: UploadOptions,
    /// Trim whitespace around every decoded text value
    pub trim_strings: bool,
}

impl Default for BodyParserConfig {
    fn default() -> Self {
        Self { limit: None, strict: true, qs: QueryStringOptions::default(), uploads: UploadOptions::default(), trim_strings: false }
    }
}

/// Options handed through to url-encoded and bracket key decoding.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueryStringOptions {
    /// Maximum number of decoded parameters (and multipart field parts)
    pub parameter_limit: usize,
    /// Largest numeric key treated as a sequence index
    pub array_limit: usize,
    /// How many bracket segments a key may nest below its root name, at most 64
    pub depth: usize,
}

impl Default for QueryStringOptions {
    fn default() -> Self {
        Self { parameter_limit: DEFAULT_PARAMETER_LIMIT, array_limit: DEFAULT_ARRAY_LIMIT, depth: DEFAULT_DEPTH }
    }
}

impl QueryStringOptions {
    /// An empty field tree applying these options.
    pub fn field_tree(&self) -> FieldTree {
        FieldTree::with_array_limit(self.array_limit).with_depth(self.depth)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct UploadOptions {
    /// Ceiling on the cumulative bytes of a multipart body
    pub max_size: ByteSize,
    /// Collect repeated file fields instead of keeping the last one
    pub multiple: bool,
    /// Where uploaded files are stored, the OS temp dir when unset
    pub dir: Option<PathBuf>,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self { max_size: DEFAULT_UPLOAD_MAX_SIZE, multiple: true, dir: None }
    }
}

impl UploadOptions {
    pub fn upload_dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// The size guards of a multipart decode, fixed for the decoder's lifetime.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UploadLimits {
    pub max_cumulative_bytes: u64,
    pub max_field_count: usize,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self { max_cumulative_bytes: DEFAULT_UPLOAD_MAX_SIZE.as_u64(), max_field_count: DEFAULT_PARAMETER_LIMIT }
    }
}

impl BodyParserConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn limit(mut self, limit: ByteSize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn max_upload_size(mut self, max_size: ByteSize) -> Self {
        self.uploads.max_size = max_size;
        self
    }

    pub fn parameter_limit(mut self, parameter_limit: usize) -> Self {
        self.qs.parameter_limit = parameter_limit;
        self
    }

    pub fn depth(mut self, depth: usize) -> Self {
        self.qs.depth = depth;
        self
    }

    pub fn upload_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.uploads.dir = Some(dir.into());
        self
    }

    pub fn multiple_uploads(mut self, multiple: bool) -> Self {
        self.uploads.multiple = multiple;
        self
    }

    pub fn trim_strings(mut self, trim_strings: bool) -> Self {
        self.trim_strings = trim_strings;
        self
    }

    pub fn json_limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_JSON_LIMIT).as_u64()
    }

    pub fn form_limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_FORM_LIMIT).as_u64()
    }

    pub fn text_limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_TEXT_LIMIT).as_u64()
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits { max_cumulative_bytes: self.uploads.max_size.as_u64(), max_field_count: self.qs.parameter_limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = BodyParserConfig::default();
        assert!(config.strict);
        assert!(config.uploads.multiple);
        assert_eq!(config.json_limit(), 1024 * 1024);
        assert_eq!(config.form_limit(), 56 * 1024);
        assert_eq!(config.upload_limits(), UploadLimits::default());
        assert_eq!(config.upload_limits().max_cumulative_bytes, 4 * 1024 * 1024);
        assert_eq!(config.upload_limits().max_field_count, 1000);
        assert_eq!(config.uploads.upload_dir(), std::env::temp_dir());
    }

    #[test]
    fn test_deserialize() {
        let config: BodyParserConfig = serde_json::from_value(json!({
            "limit": "2mb",
            "strict": false,
            "qs": { "parameter_limit": 10, "depth": 2 },
            "uploads": { "max_size": 1024, "dir": "/var/tmp/uploads" }
        }))
        .unwrap();

        assert!(!config.strict);
        assert_eq!(config.form_limit(), 2 * 1024 * 1024);
        assert_eq!(config.qs.array_limit, DEFAULT_ARRAY_LIMIT);
        assert_eq!(config.qs.depth, 2);
        assert!(config.uploads.multiple);
        assert_eq!(config.upload_limits(), UploadLimits { max_cumulative_bytes: 1024, max_field_count: 10 });
        assert_eq!(config.uploads.upload_dir(), PathBuf::from("/var/tmp/uploads"));
    }

    #[test]
    fn test_deserialize_empty() {
        let config: BodyParserConfig = serde_json::from_value(json!({})).unwrap();
        assert_eq!(config, BodyParserConfig::default());
    }

    #[test]
    fn test_builder() {
        let config = BodyParserConfig::new().max_upload_size(ByteSize::kib(1)).parameter_limit(3).trim_strings(true);
        assert_eq!(config.upload_limits(), UploadLimits { max_cumulative_bytes: 1024, max_field_count: 3 });
        assert!(config.trim_strings);
    }

    #[test]
    fn test_field_tree_uses_depth() {
        let config = BodyParserConfig::new().depth(1);
        let mut tree = config.qs.field_tree();
        tree.add("a[b][c][d]", "x").unwrap();
        assert_eq!(serde_json::to_value(tree.finalize()).unwrap(), json!({"a": {"b": {"[c][d]": "x"}}}));
    }
}
