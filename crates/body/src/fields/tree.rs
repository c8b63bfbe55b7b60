use std::borrow::Cow;

use thiserror::Error;
use tracing::trace;

use super::key::{tokenize_with_depth, FieldPath, PathSegment, DEFAULT_DEPTH, MAX_DEPTH};
use super::node::{FieldNode, FieldValue, NodeKind};

/// The largest index a numeric key may address before it is kept as a literal object key.
pub const DEFAULT_ARRAY_LIMIT: usize = 20;

/// Two keys of the same body disagree about the shape of a nested field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("field `{path}` expects {expected} but found {found}")]
pub struct FieldTreeConflict {
    path: String,
    expected: NodeKind,
    found: NodeKind,
}

impl FieldTreeConflict {
    fn new(path: &FieldPath, expected: NodeKind, found: NodeKind) -> Self {
        Self { path: path.to_string(), expected, found }
    }

    /// The offending key, in bracket notation.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn expected(&self) -> NodeKind {
        self.expected
    }

    pub fn found(&self) -> NodeKind {
        self.found
    }
}

/// Builds the nested field structure of one request body.
///
/// Values are added in the order they were read from the wire; that order is
/// what gives `name[]` its accumulate semantic. A tree lives for a single
/// request and is consumed by [`FieldTree::finalize`].
///
/// # Example
///
/// ```
/// use micro_body::fields::FieldTree;
///
/// let mut tree = FieldTree::new();
/// tree.add("user[0][email]", "a@x.com").unwrap();
/// tree.add("user[1][age]", 22).unwrap();
///
/// let fields = tree.finalize();
/// assert_eq!(fields.lookup("user[0][email]").and_then(|node| node.as_text()), Some("a@x.com"));
/// ```
#[derive(Debug, Clone)]
pub struct FieldTree {
    root: FieldNode,
    array_limit: usize,
    depth: usize,
}

impl Default for FieldTree {
    fn default() -> Self {
        Self::new()
    }
}

/// A path segment resolved against its position in the tree.
#[derive(Debug, Clone, Copy)]
enum Step<'a> {
    Key(&'a str),
    Index(usize),
    Append,
}

impl<'a> Step<'a> {
    fn resolve(segment: &'a PathSegment, at_root: bool, array_limit: usize) -> Self {
        match segment {
            PathSegment::Name(name) if !at_root => match parse_index(name) {
                Some(index) if within_limit(index, array_limit) => Step::Index(index),
                _ => Step::Key(name),
            },
            PathSegment::Name(name) => Step::Key(name),
            PathSegment::Index(index) => Step::Index(*index),
            PathSegment::Append => Step::Append,
        }
    }

    /// The container kind this step must be applied to.
    fn kind(self) -> NodeKind {
        match self {
            Step::Key(_) => NodeKind::Object,
            Step::Index(_) | Step::Append => NodeKind::Sequence,
        }
    }

    fn container(self) -> FieldNode {
        match self {
            Step::Key(_) => FieldNode::object(),
            Step::Index(_) | Step::Append => FieldNode::Sequence(Vec::new()),
        }
    }
}

fn within_limit(index: usize, array_limit: usize) -> bool {
    index <= array_limit && index.checked_add(1).is_some()
}

/// Keeps the segments the tree does not expand as text.
///
/// Explicit indexes above `array_limit` become names, and everything nested
/// more than `depth` levels below the root name folds into one name in
/// bracket notation, the same way [`tokenize_with_depth`] folds a raw key.
fn bounded_path(path: &FieldPath, depth: usize, array_limit: usize) -> Cow<'_, FieldPath> {
    let too_deep = path.len() > depth + 2;
    let large_index = path.iter().any(|segment| matches!(segment, PathSegment::Index(index) if !within_limit(*index, array_limit)));
    if !too_deep && !large_index {
        return Cow::Borrowed(path);
    }

    let mut segments: Vec<PathSegment> = path
        .iter()
        .map(|segment| match segment {
            PathSegment::Index(index) if !within_limit(*index, array_limit) => PathSegment::Name(index.to_string()),
            segment => segment.clone(),
        })
        .collect();

    if too_deep {
        let mut rest = String::new();
        for segment in segments.split_off(depth + 1) {
            match segment {
                PathSegment::Name(name) => {
                    rest.push('[');
                    rest.push_str(&name);
                    rest.push(']');
                }
                PathSegment::Index(index) => rest.push_str(&format!("[{index}]")),
                PathSegment::Append => rest.push_str("[]"),
            }
        }
        segments.push(PathSegment::Name(rest));
    }

    Cow::Owned(FieldPath::from_segments(segments).unwrap_or_else(|| path.clone()))
}

/// Parses a canonical decimal index, `"0"` or `"12"` but not `"012"`.
fn parse_index(name: &str) -> Option<usize> {
    let canonical = !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()) && (name == "0" || !name.starts_with('0'));
    if canonical { name.parse().ok() } else { None }
}

impl FieldTree {
    pub fn new() -> Self {
        Self::with_array_limit(DEFAULT_ARRAY_LIMIT)
    }

    /// Creates a tree where numeric keys above `array_limit` stay literal object keys.
    pub fn with_array_limit(array_limit: usize) -> Self {
        Self { root: FieldNode::object(), array_limit, depth: DEFAULT_DEPTH }
    }

    /// Sets how many segments a key may nest below its root name, capped at [`MAX_DEPTH`].
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.depth = depth.min(MAX_DEPTH);
        self
    }

    /// Returns true if nothing was added yet.
    pub fn is_empty(&self) -> bool {
        self.root.is_empty()
    }

    /// Stores a scalar value under a bracket-notation key.
    pub fn add<V: Into<FieldValue>>(&mut self, raw_key: &str, value: V) -> Result<(), FieldTreeConflict> {
        self.insert(raw_key, FieldNode::Leaf(value.into()))
    }

    /// Stores a whole node under a bracket-notation key.
    pub fn insert(&mut self, raw_key: &str, node: FieldNode) -> Result<(), FieldTreeConflict> {
        let path = tokenize_with_depth(raw_key, self.depth);
        self.insert_path(&path, node)
    }

    /// Stores a node under an already tokenized path.
    ///
    /// Intermediate containers are created on demand, their kind taken from
    /// the segment that addresses into them. The final slot is overwritten
    /// when it is empty or holds a value, so a repeated plain key keeps its
    /// last value.
    ///
    /// The tree's depth and array limit apply here too: segments nested too
    /// deep are kept as one literal name, and so are explicit indexes above
    /// the array limit.
    pub fn insert_path(&mut self, path: &FieldPath, node: FieldNode) -> Result<(), FieldTreeConflict> {
        let array_limit = self.array_limit;
        let bounded = bounded_path(path, self.depth, array_limit);
        let mut current = &mut self.root;

        for (depth, segment) in bounded.iter().enumerate() {
            let step = Step::resolve(segment, depth == 0, array_limit);
            if current.is_placeholder() {
                *current = step.container();
            }

            current = match (current, step) {
                (FieldNode::Object(map), Step::Key(key)) => map.entry(key.to_owned()).or_default(),
                (FieldNode::Sequence(seq), Step::Index(index)) => {
                    if seq.len() <= index {
                        seq.resize_with(index + 1, FieldNode::default);
                    }
                    &mut seq[index]
                }
                (FieldNode::Sequence(seq), Step::Append) => {
                    seq.push(FieldNode::Empty);
                    let last = seq.len() - 1;
                    &mut seq[last]
                }
                (found, step) => {
                    trace!(path = %path, expected = %step.kind(), found = %found.kind(), "field tree conflict");
                    return Err(FieldTreeConflict::new(path, step.kind(), found.kind()));
                }
            };
        }

        match current.kind() {
            NodeKind::Empty | NodeKind::Leaf => {
                *current = node;
                Ok(())
            }
            found @ (NodeKind::Object | NodeKind::Sequence) => Err(FieldTreeConflict::new(path, node.kind(), found)),
        }
    }

    /// Consumes the tree, returning the root object.
    ///
    /// Sparse sequences are not compacted: skipped indexes stay as
    /// [`FieldNode::Empty`] placeholders.
    pub fn finalize(self) -> FieldNode {
        self.root
    }
}
