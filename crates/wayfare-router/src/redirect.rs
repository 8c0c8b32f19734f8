// File: src/redirect.rs
// Purpose: Rewrite a matched URL according to a route's redirect target

use std::collections::BTreeMap;

use wayfare_url::{
    QueryParams, QueryValue, UrlSegment, UrlSegmentGroup, UrlTree, PRIMARY_OUTLET,
};

/// Absolute redirects are bounded per navigation; past this cap further
/// redirects are silently disabled rather than erroring, so a redirect
/// cycle degrades to "no more redirects" instead of looping.
pub(crate) const MAX_ABSOLUTE_REDIRECTS: u32 = 31;

/// Why a redirect rewrite could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RedirectError {
    /// The redirect target references `:name` but the match captured no
    /// positional parameter of that name.
    MissingParam(String),
}

pub(crate) fn is_absolute(redirect_to: &str) -> bool {
    redirect_to.starts_with('/')
}

/// Flattens a segment group into a single linear run of segments.
///
/// Returns `None` when the group has more than one child or any
/// non-primary child; redirects only apply to linear chains.
pub(crate) fn linearize(group: &UrlSegmentGroup) -> Option<Vec<UrlSegment>> {
    let mut out = group.segments.clone();
    let mut current = group;
    loop {
        match current.children.len() {
            0 => return Some(out),
            1 => {
                let child = current.child(PRIMARY_OUTLET)?;
                out.extend(child.segments.iter().cloned());
                current = child;
            }
            _ => return None,
        }
    }
}

/// Builds the replacement URL tree for a redirect.
///
/// `prefix` holds the segments consumed by ancestor matches, `trailing` the
/// segments left after this match. A relative target splices its
/// substituted segments between the two; an absolute target (leading `/`)
/// replaces the whole path. Query parameter values support the same
/// `:name` substitution as path tokens.
pub(crate) fn apply_redirect(
    redirect_to: &str,
    positional: &BTreeMap<String, UrlSegment>,
    prefix: &[UrlSegment],
    trailing: &[UrlSegment],
    query_params: &QueryParams,
    fragment: Option<&str>,
) -> Result<UrlTree, RedirectError> {
    let substituted = substitute_segments(redirect_to, positional)?;

    let segments: Vec<UrlSegment> = if is_absolute(redirect_to) {
        substituted
    } else {
        prefix
            .iter()
            .cloned()
            .chain(substituted)
            .chain(trailing.iter().cloned())
            .collect()
    };

    let root = if segments.is_empty() {
        UrlSegmentGroup::default()
    } else {
        UrlSegmentGroup::new(
            Vec::new(),
            BTreeMap::from([(
                PRIMARY_OUTLET.to_string(),
                UrlSegmentGroup::new(segments, BTreeMap::new()),
            )]),
        )
    };

    Ok(UrlTree::new(
        root,
        substitute_query_params(query_params, positional),
        fragment.map(String::from),
    ))
}

fn substitute_segments(
    redirect_to: &str,
    positional: &BTreeMap<String, UrlSegment>,
) -> Result<Vec<UrlSegment>, RedirectError> {
    let path = redirect_to.trim_start_matches('/');
    if path.is_empty() {
        return Ok(Vec::new());
    }
    path.split('/')
        .map(|token| match token.strip_prefix(':') {
            Some(name) => positional
                .get(name)
                .cloned()
                .ok_or_else(|| RedirectError::MissingParam(name.to_string())),
            None => Ok(UrlSegment::new(token)),
        })
        .collect()
}

fn substitute_query_params(
    query_params: &QueryParams,
    positional: &BTreeMap<String, UrlSegment>,
) -> QueryParams {
    let substitute = |value: &str| -> String {
        match value.strip_prefix(':') {
            Some(name) => positional
                .get(name)
                .map(|segment| segment.path.clone())
                .unwrap_or_else(|| value.to_string()),
            None => value.to_string(),
        }
    };

    query_params
        .iter()
        .map(|(key, value)| {
            let new_value = match value {
                QueryValue::Single(v) => QueryValue::Single(substitute(v)),
                QueryValue::Multi(vs) => {
                    QueryValue::Multi(vs.iter().map(|v| substitute(v)).collect())
                }
            };
            (key.clone(), new_value)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfare_url::serialize;

    fn segs(paths: &[&str]) -> Vec<UrlSegment> {
        paths.iter().map(|p| UrlSegment::new(*p)).collect()
    }

    #[test]
    fn relative_redirect_splices_between_prefix_and_trailing() {
        let tree = apply_redirect(
            "new",
            &BTreeMap::new(),
            &segs(&["app"]),
            &segs(&["tail"]),
            &QueryParams::new(),
            None,
        )
        .unwrap();
        assert_eq!(serialize(&tree), "/app/new/tail");
    }

    #[test]
    fn absolute_redirect_replaces_whole_path() {
        let tree = apply_redirect(
            "/login",
            &BTreeMap::new(),
            &segs(&["app", "secure"]),
            &segs(&["x"]),
            &QueryParams::new(),
            None,
        )
        .unwrap();
        assert_eq!(serialize(&tree), "/login");
    }

    #[test]
    fn positional_params_substitute_into_path() {
        let positional = BTreeMap::from([("id".to_string(), UrlSegment::new("42"))]);
        let tree = apply_redirect(
            "items/:id",
            &positional,
            &[],
            &[],
            &QueryParams::new(),
            None,
        )
        .unwrap();
        assert_eq!(serialize(&tree), "/items/42");
    }

    #[test]
    fn missing_positional_param_fails() {
        let err = apply_redirect("items/:id", &BTreeMap::new(), &[], &[], &QueryParams::new(), None)
            .unwrap_err();
        assert_eq!(err, RedirectError::MissingParam("id".to_string()));
    }

    #[test]
    fn query_values_substitute_positionals() {
        let positional = BTreeMap::from([("id".to_string(), UrlSegment::new("7"))]);
        let query = QueryParams::from([("ref".to_string(), QueryValue::Single(":id".to_string()))]);
        let tree = apply_redirect("next", &positional, &[], &[], &query, Some("frag")).unwrap();
        assert_eq!(serialize(&tree), "/next?ref=7#frag");
    }

    #[test]
    fn empty_redirect_to_root() {
        let tree =
            apply_redirect("/", &BTreeMap::new(), &[], &[], &QueryParams::new(), None).unwrap();
        assert_eq!(serialize(&tree), "/");
    }

    #[test]
    fn linearize_rejects_branching_groups() {
        let group = UrlSegmentGroup::new(
            segs(&["a"]),
            BTreeMap::from([
                (PRIMARY_OUTLET.to_string(), UrlSegmentGroup::new(segs(&["b"]), BTreeMap::new())),
                ("aux".to_string(), UrlSegmentGroup::new(segs(&["c"]), BTreeMap::new())),
            ]),
        );
        assert!(linearize(&group).is_none());

        let linear = UrlSegmentGroup::new(
            segs(&["a"]),
            BTreeMap::from([(
                PRIMARY_OUTLET.to_string(),
                UrlSegmentGroup::new(segs(&["b"]), BTreeMap::new()),
            )]),
        );
        assert_eq!(
            linearize(&linear).unwrap(),
            segs(&["a", "b"])
        );
    }
}
