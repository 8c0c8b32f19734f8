// File: src/serializer.rs
// Purpose: Render UrlTree values back into canonical URL strings

//! URL serializer
//!
//! Inverse of the parser: renders a [`UrlTree`] back into its canonical
//! string form. Round-trips with [`crate::parse`] for any tree the parser
//! can produce.
//!
//! Percent-encoding follows a fixed reserved-character allowlist: `@ : $ ,`
//! stay literal everywhere, `;` additionally survives in query strings, and
//! `&` survives inside path segments (where it carries no meaning). `(` and
//! `)` are always encoded inside segments because they delimit outlet
//! groups.

use crate::{QueryValue, UrlSegment, UrlSegmentGroup, UrlTree, PRIMARY_OUTLET};

/// Serializes a [`UrlTree`] into a URL string.
///
/// ```
/// use wayfare_url::{parse, serialize};
///
/// let tree = parse("/one/two;k=v(aux:three)?q=1#f").unwrap();
/// assert_eq!(serialize(&tree), "/one/two;k=v(aux:three)?q=1#f");
/// ```
pub fn serialize(tree: &UrlTree) -> String {
    let segments = serialize_segment_group(&tree.root, true);
    let query = serialize_query_params(&tree.query_params);
    let fragment = tree
        .fragment
        .as_ref()
        .map(|f| format!("#{}", encode_uri_fragment(f)))
        .unwrap_or_default();
    format!("/{segments}{query}{fragment}")
}

fn serialize_segment_group(group: &UrlSegmentGroup, root: bool) -> String {
    if group.has_children() && root {
        let primary = group
            .child(PRIMARY_OUTLET)
            .map(|child| serialize_segment_group(child, false))
            .unwrap_or_default();
        let auxiliary: Vec<String> = group
            .children
            .iter()
            .filter(|(outlet, _)| outlet.as_str() != PRIMARY_OUTLET)
            .map(|(outlet, child)| {
                format!(
                    "{}:{}",
                    encode_uri_segment(outlet),
                    serialize_segment_group(child, false)
                )
            })
            .collect();
        if auxiliary.is_empty() {
            primary
        } else {
            format!("{primary}({})", auxiliary.join("//"))
        }
    } else if group.has_children() {
        let children: Vec<String> = group
            .children
            .iter()
            .map(|(outlet, child)| {
                if outlet.as_str() == PRIMARY_OUTLET {
                    serialize_segment_group(child, false)
                } else {
                    format!(
                        "{}:{}",
                        encode_uri_segment(outlet),
                        serialize_segment_group(child, false)
                    )
                }
            })
            .collect();
        format!("{}/({})", serialize_paths(group), children.join("//"))
    } else {
        serialize_paths(group)
    }
}

fn serialize_paths(group: &UrlSegmentGroup) -> String {
    group
        .segments
        .iter()
        .map(serialize_path)
        .collect::<Vec<_>>()
        .join("/")
}

/// Serializes one segment: encoded path plus `;key=value` matrix params.
pub(crate) fn serialize_path(segment: &UrlSegment) -> String {
    let mut out = encode_uri_segment(&segment.path);
    for (key, value) in &segment.parameters {
        out.push(';');
        out.push_str(&encode_uri_segment(key));
        out.push('=');
        out.push_str(&encode_uri_segment(value));
    }
    out
}

fn serialize_query_params(params: &crate::QueryParams) -> String {
    let mut pairs = Vec::new();
    for (key, value) in params {
        let encoded_key = encode_uri_query(key);
        match value {
            QueryValue::Single(v) => pairs.push(format!("{encoded_key}={}", encode_uri_query(v))),
            QueryValue::Multi(vs) => {
                for v in vs {
                    pairs.push(format!("{encoded_key}={}", encode_uri_query(v)));
                }
            }
        }
    }
    if pairs.is_empty() {
        String::new()
    } else {
        format!("?{}", pairs.join("&"))
    }
}

// Encoding sets. `urlencoding::encode` percent-encodes everything outside
// the unreserved set; the replacements below restore the characters the
// router's grammar tolerates in each position.

fn encode_uri_string(s: &str) -> String {
    urlencoding::encode(s)
        .replace("%40", "@")
        .replace("%3A", ":")
        .replace("%3a", ":")
        .replace("%24", "$")
        .replace("%2C", ",")
        .replace("%2c", ",")
}

/// Encoding for query keys and values: `;` carries no meaning there.
fn encode_uri_query(s: &str) -> String {
    encode_uri_string(s).replace("%3B", ";").replace("%3b", ";")
}

/// Encoding for path segments, outlet names, and matrix keys/values:
/// `&` is harmless in paths, but parentheses must stay encoded.
fn encode_uri_segment(s: &str) -> String {
    encode_uri_string(s).replace("%26", "&")
}

/// Fragments keep the broadest allowlist: only characters that cannot
/// appear raw in a URI at all are escaped.
fn encode_uri_fragment(s: &str) -> String {
    encode_uri_string(s)
        .replace("%3B", ";")
        .replace("%3b", ";")
        .replace("%26", "&")
        .replace("%3D", "=")
        .replace("%3d", "=")
        .replace("%2B", "+")
        .replace("%2F", "/")
        .replace("%3F", "?")
}
