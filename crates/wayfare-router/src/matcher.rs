// File: src/matcher.rs
// Purpose: Structural matching of one route against remaining URL segments

use std::collections::BTreeMap;

use wayfare_url::{UrlSegment, UrlSegmentGroup};

use crate::config::{PathMatch, Route, WILDCARD};
use crate::state::Params;

/// Outcome of a structural match.
#[derive(Debug, Clone, Default)]
pub(crate) struct MatchResult {
    /// Segments this route consumed.
    pub consumed: Vec<UrlSegment>,
    /// Segments left over for child routes.
    pub remaining: Vec<UrlSegment>,
    /// Extracted parameters: positional bindings plus the last consumed
    /// segment's matrix parameters.
    pub params: Params,
    /// Positional bindings by name, keeping the whole segment so redirects
    /// can substitute it (matrix params included).
    pub positional: BTreeMap<String, UrlSegment>,
}

/// Attempts to match `route` against the remaining `segments` of `group`.
///
/// Purely structural: `can_match` guards run separately, after this
/// succeeds. Candidates are tried in declaration order by the caller, so
/// the first structural+guard match wins deterministically.
pub(crate) fn match_route(
    segments: &[UrlSegment],
    group: &UrlSegmentGroup,
    route: &Route,
) -> Option<MatchResult> {
    if let Some(matcher) = &route.matcher {
        let result = matcher.matches(segments, group, route)?;
        let remaining = segments[result.consumed.len()..].to_vec();
        let mut params: Params = result
            .positional
            .iter()
            .map(|(name, segment)| (name.clone(), segment.path.clone()))
            .collect();
        if let Some(last) = result.consumed.last() {
            params.extend(last.parameters.clone());
        }
        return Some(MatchResult {
            consumed: result.consumed,
            remaining,
            params,
            positional: result.positional,
        });
    }

    if route.path == WILDCARD {
        let consumed = segments.to_vec();
        let mut params = Params::new();
        if let Some(last) = consumed.last() {
            params.extend(last.parameters.clone());
        }
        return Some(MatchResult {
            consumed,
            remaining: Vec::new(),
            params,
            positional: BTreeMap::new(),
        });
    }

    if route.is_empty_path() {
        // Full-match empty paths refuse leftovers of any kind.
        if route.path_match == PathMatch::Full && (group.has_children() || !segments.is_empty()) {
            return None;
        }
        return Some(MatchResult {
            consumed: Vec::new(),
            remaining: segments.to_vec(),
            params: Params::new(),
            positional: BTreeMap::new(),
        });
    }

    let parts: Vec<&str> = route.path.split('/').collect();
    if parts.len() > segments.len() {
        return None;
    }
    if route.path_match == PathMatch::Full
        && (group.has_children() || parts.len() < segments.len())
    {
        return None;
    }

    let mut positional = BTreeMap::new();
    for (part, segment) in parts.iter().zip(segments) {
        match part.strip_prefix(':') {
            Some(name) => {
                positional.insert(name.to_string(), segment.clone());
            }
            None if *part == segment.path => {}
            None => return None,
        }
    }

    let consumed = segments[..parts.len()].to_vec();
    let remaining = segments[parts.len()..].to_vec();
    let mut params: Params = positional
        .iter()
        .map(|(name, segment)| (name.clone(), segment.path.clone()))
        .collect();
    if let Some(last) = consumed.last() {
        params.extend(last.parameters.clone());
    }

    Some(MatchResult {
        consumed,
        remaining,
        params,
        positional,
    })
}
