// File: src/parser.rs
// Purpose: Parse raw URL strings into UrlTree values

//! URL parser
//!
//! Tokenizes a raw URL string into a [`UrlTree`]: path segments, matrix
//! parameters (`;key=value`), parenthesized auxiliary outlet groups
//! (`(outlet:segments//outlet2:segments)`), query string, and fragment.
//!
//! The parser is a small recursive-descent scanner over the remaining input;
//! no lookahead beyond two characters is required. All functions are pure.

use std::borrow::Cow;
use std::collections::BTreeMap;

use thiserror::Error;

use crate::{QueryParams, QueryValue, UrlSegment, UrlSegmentGroup, UrlTree, PRIMARY_OUTLET};

/// Errors produced while parsing a URL string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlParseError {
    /// A structural rule was violated, e.g. an empty segment followed by a
    /// matrix-parameter delimiter (`/;k=v`).
    #[error("invalid route content in {url:?}: {reason}")]
    InvalidRouteContent { url: String, reason: String },

    /// The parser expected a fixed token that was not present.
    #[error("cannot parse url {url:?}: expected {expected:?}")]
    Expected { url: String, expected: String },

    /// A parenthesized outlet group was malformed or never closed.
    #[error("unbalanced or malformed parentheses in {url:?}")]
    UnbalancedParentheses { url: String },

    /// A percent-encoded sequence did not decode to valid UTF-8.
    #[error("invalid percent-encoding in {url:?}")]
    InvalidEncoding { url: String },
}

/// Parses a raw URL string into a [`UrlTree`].
///
/// ```
/// use wayfare_url::parse;
///
/// let tree = parse("/a/b;k=v(aux:c)?q=1&q=2#frag").unwrap();
/// assert!(tree.root.child("primary").unwrap().child("aux").is_some());
/// ```
pub fn parse(url: &str) -> Result<UrlTree, UrlParseError> {
    let mut parser = Parser::new(url);
    let root = parser.parse_root_segment()?;
    let query_params = parser.parse_query_params()?;
    let fragment = parser.parse_fragment()?;
    Ok(UrlTree::new(root, query_params, fragment))
}

struct Parser<'a> {
    url: &'a str,
    remaining: &'a str,
}

impl<'a> Parser<'a> {
    fn new(url: &'a str) -> Self {
        Self {
            url,
            remaining: url,
        }
    }

    fn parse_root_segment(&mut self) -> Result<UrlSegmentGroup, UrlParseError> {
        if self.remaining.is_empty()
            || self.remaining.starts_with('?')
            || self.remaining.starts_with('#')
        {
            return Ok(UrlSegmentGroup::default());
        }
        // The root itself never owns segments; everything hangs off children.
        let children = self.parse_children()?;
        Ok(UrlSegmentGroup::new(Vec::new(), children))
    }

    fn parse_children(&mut self) -> Result<BTreeMap<String, UrlSegmentGroup>, UrlParseError> {
        if self.remaining.is_empty() {
            return Ok(BTreeMap::new());
        }

        self.consume_optional("/");

        let mut segments = Vec::new();
        if !self.peek_starts_with("(") {
            segments.push(self.parse_segment()?);
        }

        while self.peek_starts_with("/")
            && !self.peek_starts_with("//")
            && !self.peek_starts_with("/(")
        {
            self.capture("/")?;
            segments.push(self.parse_segment()?);
        }

        // `segment/(aux:child)` - children of the last segment run.
        let mut children = BTreeMap::new();
        if self.peek_starts_with("/(") {
            self.capture("/")?;
            children = self.parse_parens(true)?;
        }

        // `segment(aux:sibling)` - outlets at the same level as the segments.
        let mut result = BTreeMap::new();
        if self.peek_starts_with("(") {
            result = self.parse_parens(false)?;
        }

        if !segments.is_empty() || !children.is_empty() {
            result.insert(
                PRIMARY_OUTLET.to_string(),
                UrlSegmentGroup::new(segments, children),
            );
        }

        Ok(result)
    }

    fn parse_segment(&mut self) -> Result<UrlSegment, UrlParseError> {
        let path = match_segment(self.remaining);
        if path.is_empty() && self.peek_starts_with(";") {
            return Err(UrlParseError::InvalidRouteContent {
                url: self.url.to_string(),
                reason: "empty path segment cannot have matrix parameters".to_string(),
            });
        }
        self.capture(path)?;
        let parameters = self.parse_matrix_params()?;
        Ok(UrlSegment::with_parameters(self.decode(path)?, parameters))
    }

    fn parse_matrix_params(&mut self) -> Result<BTreeMap<String, String>, UrlParseError> {
        let mut params = BTreeMap::new();
        while self.consume_optional(";") {
            self.parse_matrix_param(&mut params)?;
        }
        Ok(params)
    }

    fn parse_matrix_param(
        &mut self,
        params: &mut BTreeMap<String, String>,
    ) -> Result<(), UrlParseError> {
        let key = match_matrix_key(self.remaining);
        if key.is_empty() {
            return Ok(());
        }
        self.capture(key)?;
        let mut value = "";
        if self.consume_optional("=") {
            let matched = match_segment(self.remaining);
            if !matched.is_empty() {
                value = matched;
                self.capture(matched)?;
            }
        }
        params.insert(self.decode(key)?, self.decode(value)?);
        Ok(())
    }

    fn parse_parens(
        &mut self,
        allow_primary: bool,
    ) -> Result<BTreeMap<String, UrlSegmentGroup>, UrlParseError> {
        let mut groups = BTreeMap::new();
        self.capture("(")?;

        while !self.consume_optional(")") {
            if self.remaining.is_empty() {
                return Err(UrlParseError::UnbalancedParentheses {
                    url: self.url.to_string(),
                });
            }

            let path = match_segment(self.remaining);
            let next = self.remaining[path.len()..].chars().next();
            if !matches!(next, Some('/') | Some(')') | Some(';')) {
                return Err(UrlParseError::UnbalancedParentheses {
                    url: self.url.to_string(),
                });
            }

            let outlet_name = match path.find(':') {
                Some(idx) => {
                    let name = &path[..idx];
                    self.capture(name)?;
                    self.capture(":")?;
                    self.decode(name)?
                }
                None if allow_primary => PRIMARY_OUTLET.to_string(),
                None => {
                    return Err(UrlParseError::InvalidRouteContent {
                        url: self.url.to_string(),
                        reason: format!("outlet group {path:?} is missing an outlet name"),
                    })
                }
            };

            let children = self.parse_children()?;
            let group = if children.len() == 1 && children.contains_key(PRIMARY_OUTLET) {
                children.into_iter().next().map(|(_, g)| g).unwrap_or_default()
            } else {
                UrlSegmentGroup::new(Vec::new(), children)
            };
            groups.insert(outlet_name, group);

            self.consume_optional("//");
        }

        Ok(groups)
    }

    fn parse_query_params(&mut self) -> Result<QueryParams, UrlParseError> {
        let mut params = QueryParams::new();
        if self.consume_optional("?") {
            loop {
                self.parse_query_param(&mut params)?;
                if !self.consume_optional("&") {
                    break;
                }
            }
        }
        Ok(params)
    }

    fn parse_query_param(&mut self, params: &mut QueryParams) -> Result<(), UrlParseError> {
        let key = match_query_key(self.remaining);
        if key.is_empty() {
            return Ok(());
        }
        self.capture(key)?;
        let mut value = "";
        if self.consume_optional("=") {
            let matched = match_query_value(self.remaining);
            if !matched.is_empty() {
                value = matched;
                self.capture(matched)?;
            }
        }

        let decoded_key = self.decode_query(key)?;
        let decoded_value = self.decode_query(value)?;
        match params.get_mut(&decoded_key) {
            Some(existing) => existing.push(decoded_value),
            None => {
                params.insert(decoded_key, QueryValue::Single(decoded_value));
            }
        }
        Ok(())
    }

    fn parse_fragment(&mut self) -> Result<Option<String>, UrlParseError> {
        if self.consume_optional("#") {
            let fragment = self.decode(self.remaining)?;
            self.remaining = "";
            return Ok(Some(fragment));
        }
        if !self.remaining.is_empty() {
            return Err(UrlParseError::Expected {
                url: self.url.to_string(),
                expected: "end of url".to_string(),
            });
        }
        Ok(None)
    }

    fn peek_starts_with(&self, s: &str) -> bool {
        self.remaining.starts_with(s)
    }

    fn capture(&mut self, s: &str) -> Result<(), UrlParseError> {
        if !self.remaining.starts_with(s) {
            return Err(UrlParseError::Expected {
                url: self.url.to_string(),
                expected: s.to_string(),
            });
        }
        self.remaining = &self.remaining[s.len()..];
        Ok(())
    }

    fn consume_optional(&mut self, s: &str) -> bool {
        if self.remaining.starts_with(s) {
            self.remaining = &self.remaining[s.len()..];
            true
        } else {
            false
        }
    }

    fn decode(&self, s: &str) -> Result<String, UrlParseError> {
        percent_decode(s).ok_or_else(|| UrlParseError::InvalidEncoding {
            url: self.url.to_string(),
        })
    }

    // Query strings additionally decode `+` as space.
    fn decode_query(&self, s: &str) -> Result<String, UrlParseError> {
        let replaced = s.replace('+', " ");
        percent_decode(&replaced).ok_or_else(|| UrlParseError::InvalidEncoding {
            url: self.url.to_string(),
        })
    }
}

fn percent_decode(s: &str) -> Option<String> {
    match urlencoding::decode(s) {
        Ok(Cow::Borrowed(v)) => Some(v.to_string()),
        Ok(Cow::Owned(v)) => Some(v),
        Err(_) => None,
    }
}

// Token scanners. Each returns the longest prefix of `s` not containing the
// stop characters for its position in the grammar.

/// Segment paths stop at `/ ( ) ? ; #` (a literal `=` is allowed in paths).
fn match_segment(s: &str) -> &str {
    take_until(s, |c| matches!(c, '/' | '(' | ')' | '?' | ';' | '#'))
}

/// Matrix-parameter keys additionally stop at `=`.
fn match_matrix_key(s: &str) -> &str {
    take_until(s, |c| matches!(c, '/' | '(' | ')' | '?' | ';' | '#' | '='))
}

fn match_query_key(s: &str) -> &str {
    take_until(s, |c| matches!(c, '=' | '?' | '&' | '#'))
}

fn match_query_value(s: &str) -> &str {
    take_until(s, |c| matches!(c, '?' | '&' | '#'))
}

fn take_until(s: &str, stop: impl Fn(char) -> bool) -> &str {
    match s.char_indices().find(|(_, c)| stop(*c)) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
