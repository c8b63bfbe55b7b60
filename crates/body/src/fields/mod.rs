//! Nested form fields built from bracket-notation keys.
//!
//! - [`tokenize`] splits a raw field name into a [`FieldPath`]
//! - [`FieldTree`] applies `(key, value)` pairs in arrival order and yields the
//!   finished [`FieldNode`] structure
//!
//! ```
//! use micro_body::fields::FieldTree;
//!
//! let mut tree = FieldTree::new();
//! tree.add("tags[]", "rust").unwrap();
//! tree.add("tags[]", "http").unwrap();
//! tree.add("user[email]", "a@x.com").unwrap();
//!
//! let fields = tree.finalize();
//! assert_eq!(fields.lookup("tags[1]").and_then(|node| node.as_text()), Some("http"));
//! ```

mod key;
mod node;
mod tree;

pub use key::tokenize;
pub use key::tokenize_with_depth;
pub use key::DEFAULT_DEPTH;
pub use key::MAX_DEPTH;
pub use key::FieldPath;
pub use key::PathSegment;

pub use node::FieldNode;
pub use node::FieldValue;
pub use node::NodeKind;

pub use tree::FieldTree;
pub use tree::FieldTreeConflict;
pub use tree::DEFAULT_ARRAY_LIMIT;
