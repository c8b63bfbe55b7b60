use std::fmt;

use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::{Number, Value};

use super::key::{tokenize, PathSegment};

/// A terminal scalar stored at the end of a field path.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl FieldValue {
    /// Returns the text if this is a [`FieldValue::Text`].
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Number::from_f64(value).map_or(FieldValue::Null, FieldValue::Number)
    }
}

macro_rules! impl_from_integer {
    ($($ty:ty)*) => {
        $(
        impl From<$ty> for FieldValue {
            fn from(value: $ty) -> Self {
                FieldValue::Number(Number::from(value))
            }
        }
        )*
    };
}

impl_from_integer!(i8 i16 i32 i64 isize u8 u16 u32 u64 usize);

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Text(text) => serializer.serialize_str(text),
            FieldValue::Number(number) => number.serialize(serializer),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
            FieldValue::Null => serializer.serialize_unit(),
        }
    }
}

/// The kind of a [`FieldNode`], used in conflict reports.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Empty,
    Leaf,
    Object,
    Sequence,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Empty => "nothing",
            NodeKind::Leaf => "a value",
            NodeKind::Object => "an object",
            NodeKind::Sequence => "a sequence",
        };
        f.write_str(s)
    }
}

/// A node of the decoded field structure.
///
/// Objects keep their keys in arrival order. Sequences may hold
/// [`FieldNode::Empty`] placeholders where an index was skipped; they
/// serialize as `null`.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldNode {
    #[default]
    Empty,
    Leaf(FieldValue),
    Object(IndexMap<String, FieldNode>),
    Sequence(Vec<FieldNode>),
}

impl FieldNode {
    pub fn object() -> Self {
        FieldNode::Object(IndexMap::new())
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            FieldNode::Empty => NodeKind::Empty,
            FieldNode::Leaf(_) => NodeKind::Leaf,
            FieldNode::Object(_) => NodeKind::Object,
            FieldNode::Sequence(_) => NodeKind::Sequence,
        }
    }

    /// Returns true for an unfilled placeholder slot.
    pub fn is_placeholder(&self) -> bool {
        matches!(self, FieldNode::Empty)
    }

    /// Returns true for a placeholder, an empty object or an empty sequence.
    pub fn is_empty(&self) -> bool {
        match self {
            FieldNode::Empty => true,
            FieldNode::Leaf(_) => false,
            FieldNode::Object(map) => map.is_empty(),
            FieldNode::Sequence(seq) => seq.is_empty(),
        }
    }

    pub fn as_value(&self) -> Option<&FieldValue> {
        match self {
            FieldNode::Leaf(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        self.as_value().and_then(FieldValue::as_str)
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, FieldNode>> {
        match self {
            FieldNode::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[FieldNode]> {
        match self {
            FieldNode::Sequence(seq) => Some(seq),
            _ => None,
        }
    }

    /// Gets a direct child of an object by its literal key.
    pub fn get(&self, key: &str) -> Option<&FieldNode> {
        self.as_object().and_then(|map| map.get(key))
    }

    /// Looks a node up by a bracket-notation key, `user[0][email]`.
    ///
    /// `[]` segments never match since they don't address an existing slot.
    pub fn lookup(&self, raw_key: &str) -> Option<&FieldNode> {
        let path = tokenize(raw_key);
        let mut current = self;

        for segment in path.iter() {
            current = match (current, segment) {
                (FieldNode::Object(map), PathSegment::Name(name)) => map.get(name.as_str())?,
                (FieldNode::Sequence(seq), PathSegment::Name(name)) => seq.get(name.parse::<usize>().ok()?)?,
                (FieldNode::Sequence(seq), PathSegment::Index(index)) => seq.get(*index)?,
                _ => return None,
            };
        }

        Some(current)
    }

    /// Trims leading and trailing whitespace of every text leaf.
    pub fn trim_strings(&mut self) {
        match self {
            FieldNode::Leaf(FieldValue::Text(text)) => {
                let trimmed = text.trim();
                if trimmed.len() != text.len() {
                    *text = trimmed.to_owned();
                }
            }
            FieldNode::Object(map) => map.values_mut().for_each(FieldNode::trim_strings),
            FieldNode::Sequence(seq) => seq.iter_mut().for_each(FieldNode::trim_strings),
            FieldNode::Empty | FieldNode::Leaf(_) => {}
        }
    }
}

impl From<FieldValue> for FieldNode {
    fn from(value: FieldValue) -> Self {
        FieldNode::Leaf(value)
    }
}

/// Converts a decoded JSON value structurally.
impl From<Value> for FieldNode {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FieldNode::Leaf(FieldValue::Null),
            Value::Bool(b) => FieldNode::Leaf(FieldValue::Bool(b)),
            Value::Number(number) => FieldNode::Leaf(FieldValue::Number(number)),
            Value::String(text) => FieldNode::Leaf(FieldValue::Text(text)),
            Value::Array(items) => FieldNode::Sequence(items.into_iter().map(FieldNode::from).collect()),
            Value::Object(map) => FieldNode::Object(map.into_iter().map(|(k, v)| (k, FieldNode::from(v))).collect()),
        }
    }
}

impl Serialize for FieldNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldNode::Empty => serializer.serialize_none(),
            FieldNode::Leaf(value) => value.serialize(serializer),
            FieldNode::Object(map) => map.serialize(serializer),
            FieldNode::Sequence(seq) => seq.serialize(serializer),
        }
    }
}
