// File: src/lib.rs
// Purpose: URL tree model - segments, groups, query params, fragment

//! # Wayfare URL
//!
//! Hierarchical URL model for the Wayfare navigation engine.
//!
//! A URL like `/inbox/33(popup:compose);open=true?hl=en#top` is modeled as a
//! tree of [`UrlSegmentGroup`]s: an ordered list of [`UrlSegment`]s (each
//! carrying matrix parameters) plus named child groups, one per outlet. The
//! primary outlet uses the reserved name [`PRIMARY_OUTLET`].
//!
//! Trees are immutable values: every transformation (redirect rewrite,
//! navigation command application) produces a new tree. All parsing and
//! serialization functions are pure.
//!
//! ## Example
//!
//! ```
//! use wayfare_url::{parse, serialize};
//!
//! let tree = parse("/users/42;details=full?tab=posts#top").unwrap();
//! assert_eq!(tree.fragment.as_deref(), Some("top"));
//!
//! let segments = &tree.root.child("primary").unwrap().segments;
//! assert_eq!(segments[0].path, "users");
//! assert_eq!(segments[1].path, "42");
//! assert_eq!(segments[1].parameters.get("details").map(String::as_str), Some("full"));
//!
//! // Serialization round-trips.
//! assert_eq!(parse(&serialize(&tree)).unwrap(), tree);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

mod compare;
mod parser;
mod serializer;

pub use compare::{
    contains_tree, FragmentCompare, MatrixCompare, PathCompare, QueryCompare, UrlCompareOptions,
};
pub use parser::{parse, UrlParseError};
pub use serializer::serialize;

/// Name of the default outlet. A segment group's unnamed children and
/// top-level segments all live under this outlet.
pub const PRIMARY_OUTLET: &str = "primary";

/// One `/`-delimited path token plus its matrix parameters.
///
/// `users;sort=name` parses into path `users` with `{sort: name}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlSegment {
    /// Decoded path text of the segment.
    pub path: String,
    /// Decoded matrix parameters attached to this segment.
    pub parameters: BTreeMap<String, String>,
}

impl UrlSegment {
    /// Creates a segment with no matrix parameters.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Creates a segment with matrix parameters.
    pub fn with_parameters(path: impl Into<String>, parameters: BTreeMap<String, String>) -> Self {
        Self {
            path: path.into(),
            parameters,
        }
    }
}

impl fmt::Display for UrlSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serializer::serialize_path(self))
    }
}

/// An ordered run of segments plus named child groups, one per outlet.
///
/// The tree has no parent back-pointers; consumers that need upward
/// navigation walk from the root or use the snapshot arena in the router.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlSegmentGroup {
    /// Segments owned by this group, in path order.
    pub segments: Vec<UrlSegment>,
    /// Child groups keyed by outlet name (keys unique).
    pub children: BTreeMap<String, UrlSegmentGroup>,
}

impl UrlSegmentGroup {
    /// Creates a group from segments and children.
    pub fn new(segments: Vec<UrlSegment>, children: BTreeMap<String, UrlSegmentGroup>) -> Self {
        Self { segments, children }
    }

    /// Returns the child group for `outlet`, if any.
    pub fn child(&self, outlet: &str) -> Option<&UrlSegmentGroup> {
        self.children.get(outlet)
    }

    /// True when this group has at least one child outlet.
    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Number of segments in this group.
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// True when this group carries neither segments nor children.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty() && self.children.is_empty()
    }

    /// Collapses redundant nesting: a group whose only content is a single
    /// primary child with no own segments is structurally equivalent to that
    /// child. Applied after redirects to normalize rewritten trees.
    pub fn squash(self) -> UrlSegmentGroup {
        let mut group = self;
        loop {
            if group.segments.is_empty()
                && group.children.len() == 1
                && group.children.contains_key(PRIMARY_OUTLET)
            {
                group = group
                    .children
                    .remove(PRIMARY_OUTLET)
                    .unwrap_or_default();
                continue;
            }
            break;
        }
        UrlSegmentGroup {
            segments: group.segments,
            children: group
                .children
                .into_iter()
                .map(|(outlet, child)| (outlet, child.squash_children()))
                .collect(),
        }
    }

    // Children are squashed recursively, but a non-root group keeps its own
    // shape: only the chain of empty primary wrappers collapses.
    fn squash_children(self) -> UrlSegmentGroup {
        if self.segments.is_empty()
            && self.children.len() == 1
            && self.children.contains_key(PRIMARY_OUTLET)
        {
            return self.squash();
        }
        UrlSegmentGroup {
            segments: self.segments,
            children: self
                .children
                .into_iter()
                .map(|(outlet, child)| (outlet, child.squash_children()))
                .collect(),
        }
    }
}

/// One query parameter: a single value or, for repeated keys, several.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Single(String),
    Multi(Vec<String>),
}

impl QueryValue {
    /// All values carried by this parameter, in arrival order.
    pub fn values(&self) -> Vec<&str> {
        match self {
            QueryValue::Single(v) => vec![v.as_str()],
            QueryValue::Multi(vs) => vs.iter().map(String::as_str).collect(),
        }
    }

    /// The first value.
    pub fn first(&self) -> &str {
        match self {
            QueryValue::Single(v) => v,
            QueryValue::Multi(vs) => vs.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// Appends a value, promoting a single value to a list.
    pub fn push(&mut self, value: String) {
        match self {
            QueryValue::Single(existing) => {
                *self = QueryValue::Multi(vec![std::mem::take(existing), value]);
            }
            QueryValue::Multi(vs) => vs.push(value),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(v: &str) -> Self {
        QueryValue::Single(v.to_string())
    }
}

impl From<String> for QueryValue {
    fn from(v: String) -> Self {
        QueryValue::Single(v)
    }
}

/// Query parameters keyed by name. Insertion order is irrelevant for
/// equality; repeated keys accumulate into [`QueryValue::Multi`].
pub type QueryParams = BTreeMap<String, QueryValue>;

/// A complete parsed URL: segment tree, query parameters, and fragment.
///
/// Immutable once constructed; redirects and navigation commands build new
/// trees rather than mutating in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UrlTree {
    /// Root segment group. The root never carries its own segments; all
    /// top-level segments live under its primary child.
    pub root: UrlSegmentGroup,
    /// Decoded query parameters.
    pub query_params: QueryParams,
    /// Decoded fragment, without the leading `#`.
    pub fragment: Option<String>,
}

impl UrlTree {
    /// Creates a tree from its parts.
    pub fn new(root: UrlSegmentGroup, query_params: QueryParams, fragment: Option<String>) -> Self {
        Self {
            root,
            query_params,
            fragment,
        }
    }

    /// The empty tree, equivalent to parsing `"/"`.
    pub fn empty() -> Self {
        Self::default()
    }
}

impl fmt::Display for UrlTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serialize(self))
    }
}

impl FromStr for UrlTree {
    type Err = UrlParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(path: &str) -> UrlSegment {
        UrlSegment::new(path)
    }

    #[test]
    fn test_segment_group_empty() {
        let group = UrlSegmentGroup::default();
        assert!(group.is_empty());
        assert!(!group.has_children());
        assert_eq!(group.len(), 0);
    }

    #[test]
    fn test_squash_collapses_primary_wrapper() {
        // ( -> primary -> primary -> [a] ) squashes to [a]
        let inner = UrlSegmentGroup::new(vec![seg("a")], BTreeMap::new());
        let mid = UrlSegmentGroup::new(
            vec![],
            BTreeMap::from([(PRIMARY_OUTLET.to_string(), inner.clone())]),
        );
        let outer = UrlSegmentGroup::new(
            vec![],
            BTreeMap::from([(PRIMARY_OUTLET.to_string(), mid)]),
        );
        assert_eq!(outer.squash(), inner);
    }

    #[test]
    fn test_squash_keeps_named_outlets() {
        let aux = UrlSegmentGroup::new(vec![seg("b")], BTreeMap::new());
        let group = UrlSegmentGroup::new(
            vec![],
            BTreeMap::from([("aux".to_string(), aux.clone())]),
        );
        assert_eq!(group.clone().squash(), group);
    }

    #[test]
    fn test_query_value_push_promotes() {
        let mut value = QueryValue::Single("a".to_string());
        value.push("b".to_string());
        assert_eq!(
            value,
            QueryValue::Multi(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(value.first(), "a");
        assert_eq!(value.values(), vec!["a", "b"]);
    }
}
