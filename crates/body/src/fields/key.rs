//! Bracket-notation key tokenizer.
//!
//! Turns a flat field name such as `user[0][email]` or `tags[]` into an ordered
//! [`FieldPath`]. The tokenizer is total: malformed bracket nesting never fails,
//! it degrades into literal text instead.
//!
//! Bracket groups are matched by depth, so a group may itself contain bracket
//! pairs (`user[email[]]`). The content of every group is tokenized again as a
//! key of its own, which is how such nested groups flatten into one path.
//!
//! Nesting is bounded: a key holds at most a configured number of segments
//! below its root name (see [`tokenize_with_depth`]), anything deeper is kept
//! as literal text. Group nesting is bounded by the same depth.
//!
//! Numeric names are left as [`PathSegment::Name`] here. Whether `"0"` means a
//! sequence position or a literal key depends on where it lands in the tree,
//! so the [`FieldTree`](super::FieldTree) decides.

use std::fmt;
use std::ops::Deref;

/// One element of a [`FieldPath`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A literal object key
    Name(String),
    /// An explicit sequence position
    Index(usize),
    /// The next free sequence position, `[]`
    Append,
}

impl PathSegment {
    pub fn name<S: Into<String>>(name: S) -> Self {
        PathSegment::Name(name.into())
    }

    /// Returns true if this segment is a name made of ascii digits only.
    pub fn is_numeric_name(&self) -> bool {
        matches!(self, PathSegment::Name(name) if !name.is_empty() && name.bytes().all(|b| b.is_ascii_digit()))
    }
}

/// The tokenized form of one raw field name.
///
/// A `FieldPath` always holds at least one segment, and the first one is
/// always a [`PathSegment::Name`] since the decoded fields are rooted in an object.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Builds a path from already split segments.
    ///
    /// Returns `None` when `segments` is empty.
    pub fn from_segments(segments: Vec<PathSegment>) -> Option<Self> {
        (!segments.is_empty()).then_some(Self { segments })
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<PathSegment> {
        self.segments
    }

    /// The segment the value is finally stored at.
    pub fn last(&self) -> &PathSegment {
        // from_segments and tokenize never build an empty path
        &self.segments[self.segments.len() - 1]
    }
}

impl Deref for FieldPath {
    type Target = [PathSegment];

    fn deref(&self) -> &Self::Target {
        &self.segments
    }
}

/// Renders the path back in bracket notation, `user[0][email]`.
impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (idx, segment) in self.segments.iter().enumerate() {
            match (idx, segment) {
                (0, PathSegment::Name(name)) => f.write_str(name)?,
                (_, PathSegment::Name(name)) => write!(f, "[{name}]")?,
                (_, PathSegment::Index(index)) => write!(f, "[{index}]")?,
                (_, PathSegment::Append) => f.write_str("[]")?,
            }
        }
        Ok(())
    }
}

/// How many bracket segments a key may nest below its root name by default.
pub const DEFAULT_DEPTH: usize = 5;

/// The ceiling of any configured depth.
pub const MAX_DEPTH: usize = 64;

/// Tokenizes one raw field name into its [`FieldPath`], nesting at most [`DEFAULT_DEPTH`] levels.
///
/// # Example
///
/// ```
/// use micro_body::fields::{tokenize, PathSegment};
///
/// let path = tokenize("user[email[]]");
/// assert_eq!(path.segments(), &[PathSegment::name("user"), PathSegment::name("email"), PathSegment::Append]);
/// ```
pub fn tokenize(raw_key: &str) -> FieldPath {
    tokenize_with_depth(raw_key, DEFAULT_DEPTH)
}

/// Tokenizes a raw field name, nesting at most `depth` segments below the root name.
///
/// Once the path is full, everything from the next bracket on is kept as a
/// single literal segment: with a depth of 2, `a[b][c][d][e]` tokenizes to
/// `a`, `b`, `c`, `[d][e]`. `depth` is capped at [`MAX_DEPTH`]; a depth of 0
/// keeps the whole key as one name.
pub fn tokenize_with_depth(raw_key: &str, depth: usize) -> FieldPath {
    let depth = depth.min(MAX_DEPTH);
    if depth == 0 {
        return FieldPath { segments: vec![PathSegment::Name(unescape(raw_key))] };
    }

    let mut tokenizer = Tokenizer { raw: raw_key, depth, segments: Vec::new(), done: false };
    tokenizer.run(0, raw_key.len(), 0, 0);
    let segments = tokenizer.segments;

    match segments.first() {
        Some(PathSegment::Name(_)) => FieldPath { segments },
        // an empty key, or one that opens with `[]`, names a single top level field
        _ => FieldPath { segments: vec![PathSegment::Name(unescape(raw_key))] },
    }
}

struct Tokenizer<'a> {
    raw: &'a str,
    depth: usize,
    segments: Vec<PathSegment>,
    /// Set once the rest of the key was kept literally
    done: bool,
}

impl Tokenizer<'_> {
    /// Tokenizes `raw[start..end]`. `anchor` is where the literal rest starts
    /// if the path fills up at the first segment of this range.
    fn run(&mut self, start: usize, end: usize, anchor: usize, level: usize) {
        let raw = self.raw;
        let bytes = &raw.as_bytes()[..end];
        let mut literal = String::new();

        let mut pos = read_literal(self.raw, start, end, &mut literal);
        if !literal.is_empty() {
            self.push(PathSegment::Name(std::mem::take(&mut literal)), anchor);
        }

        while pos < end && !self.done {
            let Some(close) = find_closing(bytes, pos) else {
                // unmatched `[`, keep the rest as text
                self.fold(unescape(&self.raw[pos..end]), pos);
                return;
            };

            if close == pos + 1 {
                self.push(PathSegment::Append, pos);
            } else if level >= self.depth {
                // nested too deep, the group stays text
                self.fold(self.raw[pos..=close].to_owned(), pos);
            } else {
                self.run(pos + 1, close, pos, level + 1);
            }

            if self.done {
                return;
            }

            let next = read_literal(self.raw, close + 1, end, &mut literal);
            if !literal.is_empty() {
                self.fold(std::mem::take(&mut literal), close + 1);
            }
            pos = next;
        }
    }

    fn is_full(&self) -> bool {
        self.segments.len() > self.depth
    }

    /// Adds a segment, or keeps everything from `pos` as the last segment once the path is full.
    fn push(&mut self, segment: PathSegment, pos: usize) {
        if self.done {
            return;
        }

        if self.is_full() {
            self.segments.push(PathSegment::Name(self.raw[pos..].to_owned()));
            self.done = true;
        } else {
            self.segments.push(segment);
        }
    }

    /// Appends text to the preceding name, or adds it as a name of its own.
    fn fold(&mut self, text: String, pos: usize) {
        match self.segments.last_mut() {
            Some(PathSegment::Name(name)) if !self.done => name.push_str(&text),
            _ => self.push(PathSegment::Name(text), pos),
        }
    }
}

/// Reads literal text from `start` up to the next unescaped `[` before `end`, returning its position.
fn read_literal(s: &str, start: usize, end: usize, literal: &mut String) -> usize {
    let bytes = s.as_bytes();
    let mut run = start;
    let mut idx = start;

    while idx < end {
        match bytes[idx] {
            b'\\' if idx + 1 < end && matches!(bytes[idx + 1], b'[' | b']') => {
                literal.push_str(&s[run..idx]);
                literal.push(char::from(bytes[idx + 1]));
                idx += 2;
                run = idx;
            }
            b'[' => break,
            _ => idx += 1,
        }
    }

    literal.push_str(&s[run..idx]);
    idx
}

/// Finds the `]` balancing the `[` at `open`.
fn find_closing(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut idx = open;

    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' if matches!(bytes.get(idx + 1), Some(b'[' | b']')) => {
                idx += 2;
                continue;
            }
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
        idx += 1;
    }

    None
}

fn unescape(s: &str) -> String {
    if !s.contains('\\') {
        return s.to_owned();
    }

    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\\' && matches!(chars.peek(), Some('[' | ']')) {
            continue;
        }
        result.push(c);
    }
    result
}
