use std::path::PathBuf;

use bytes::Bytes;
use indexmap::IndexMap;
use serde::Serialize;

use crate::fields::FieldNode;

/// Metadata of one uploaded file, stored on disk while the body was decoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileMeta {
    pub field_name: String,
    /// The file name sent by the client, reduced to its base name
    pub original_name: String,
    pub stored_path: PathBuf,
    /// The declared `Content-Type` of the part
    pub mime_type: String,
    pub size_bytes: u64,
}

/// The file(s) uploaded under one field name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum FileField {
    One(FileMeta),
    Many(Vec<FileMeta>),
}

impl FileField {
    /// The first file uploaded under this name.
    pub fn first(&self) -> Option<&FileMeta> {
        match self {
            FileField::One(meta) => Some(meta),
            FileField::Many(metas) => metas.first(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &FileMeta> {
        match self {
            FileField::One(meta) => std::slice::from_ref(meta).iter(),
            FileField::Many(metas) => metas.iter(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            FileField::One(_) => 1,
            FileField::Many(metas) => metas.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Adds another file uploaded under the same name.
    pub(crate) fn push(&mut self, meta: FileMeta) {
        *self = match std::mem::replace(self, FileField::Many(Vec::new())) {
            FileField::One(first) => FileField::Many(vec![first, meta]),
            FileField::Many(mut metas) => {
                metas.push(meta);
                FileField::Many(metas)
            }
        };
    }
}

/// The decoded request body: nested fields, uploaded files and the raw text body.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBody {
    /// Always a [`FieldNode::Object`]
    pub fields: FieldNode,
    pub files: IndexMap<String, FileField>,
    pub raw: Option<Bytes>,
}

impl Default for DecodedBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl DecodedBody {
    pub fn empty() -> Self {
        Self { fields: FieldNode::object(), files: IndexMap::new(), raw: None }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.files.is_empty() && self.raw.is_none()
    }

    /// Looks a field up by a bracket-notation key.
    pub fn field(&self, raw_key: &str) -> Option<&FieldNode> {
        self.fields.lookup(raw_key)
    }

    /// The first file uploaded under `field_name`.
    pub fn file(&self, field_name: &str) -> Option<&FileMeta> {
        self.files.get(field_name).and_then(FileField::first)
    }

    /// The raw body as text, `None` when absent or not valid utf-8.
    pub fn raw_text(&self) -> Option<&str> {
        self.raw.as_deref().and_then(|raw| std::str::from_utf8(raw).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(original_name: &str) -> FileMeta {
        FileMeta {
            field_name: "avatar".into(),
            original_name: original_name.into(),
            stored_path: PathBuf::from("/tmp").join(original_name),
            mime_type: "image/png".into(),
            size_bytes: 3,
        }
    }

    #[test]
    fn test_empty() {
        let body = DecodedBody::empty();
        assert!(body.is_empty());
        assert!(body.fields.as_object().is_some());
        assert!(body.raw_text().is_none());
    }

    #[test]
    fn test_file_field_push() {
        let mut field = FileField::One(meta("a.png"));
        assert_eq!(field.len(), 1);

        field.push(meta("b.png"));
        field.push(meta("c.png"));

        let names: Vec<_> = field.iter().map(|meta| meta.original_name.as_str()).collect();
        assert_eq!(names, ["a.png", "b.png", "c.png"]);
        assert_eq!(field.first().map(|meta| meta.original_name.as_str()), Some("a.png"));
    }

    #[test]
    fn test_serialize_file_field() {
        let value = serde_json::to_value(FileField::One(meta("a.png"))).unwrap();
        assert_eq!(value["original_name"], json!("a.png"));
        assert_eq!(value["size_bytes"], json!(3));

        let value = serde_json::to_value(FileField::Many(vec![meta("a.png")])).unwrap();
        assert!(value.is_array());
    }

    #[test]
    fn test_raw_text() {
        let body = DecodedBody { raw: Some(Bytes::from_static(b"hello")), ..DecodedBody::empty() };
        assert_eq!(body.raw_text(), Some("hello"));
        assert!(!body.is_empty());
    }
}
