// File: src/compare.rs
// Purpose: Exact and subset containment between URL trees

//! Structural comparison of URL trees
//!
//! Two modes matter to the router: `Exact` (the trees describe the same
//! location) and `Subset` (the left tree sits "inside" the right one, i.e.
//! the container may carry extra trailing segments or extra outlets). Query
//! parameters, matrix parameters, and the fragment each compare under an
//! independently chosen mode, so a caller can ask "is `/list` active,
//! ignoring query params?" without string munging.

use crate::{QueryParams, QueryValue, UrlSegment, UrlSegmentGroup, UrlTree, PRIMARY_OUTLET};

/// Path comparison mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PathCompare {
    /// Identical segment sequences and child outlets at every level.
    #[default]
    Exact,
    /// The container may have additional trailing segments or children.
    Subset,
}

/// Query-parameter comparison mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryCompare {
    #[default]
    Exact,
    /// Every containee parameter must be present in the container with an
    /// equal value; extra container parameters are allowed.
    Subset,
    Ignored,
}

/// Matrix-parameter comparison mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixCompare {
    Exact,
    #[default]
    Ignored,
}

/// Fragment comparison mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FragmentCompare {
    Exact,
    #[default]
    Ignored,
}

/// Options controlling [`contains_tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UrlCompareOptions {
    pub paths: PathCompare,
    pub query_params: QueryCompare,
    pub matrix_params: MatrixCompare,
    pub fragment: FragmentCompare,
}

impl UrlCompareOptions {
    /// Everything must match exactly.
    pub fn exact() -> Self {
        Self {
            paths: PathCompare::Exact,
            query_params: QueryCompare::Exact,
            matrix_params: MatrixCompare::Exact,
            fragment: FragmentCompare::Exact,
        }
    }

    /// The containee may be a prefix of the container; query params must be
    /// a subset; matrix params and fragment are ignored.
    pub fn subset() -> Self {
        Self {
            paths: PathCompare::Subset,
            query_params: QueryCompare::Subset,
            matrix_params: MatrixCompare::Ignored,
            fragment: FragmentCompare::Ignored,
        }
    }
}

/// Returns true when `containee` is contained in (or equal to) `container`
/// under the given options.
pub fn contains_tree(container: &UrlTree, containee: &UrlTree, options: UrlCompareOptions) -> bool {
    let paths_ok = match options.paths {
        PathCompare::Exact => {
            equal_segment_groups(&container.root, &containee.root, options.matrix_params)
        }
        PathCompare::Subset => contains_segment_group(
            &container.root,
            &containee.root,
            &containee.root.segments,
            options.matrix_params,
        ),
    };
    if !paths_ok {
        return false;
    }

    let query_ok = match options.query_params {
        QueryCompare::Exact => query_params_equal(&container.query_params, &containee.query_params),
        QueryCompare::Subset => contains_query_params(&container.query_params, &containee.query_params),
        QueryCompare::Ignored => true,
    };
    if !query_ok {
        return false;
    }

    match options.fragment {
        FragmentCompare::Exact => container.fragment == containee.fragment,
        FragmentCompare::Ignored => true,
    }
}

fn equal_segment_groups(a: &UrlSegmentGroup, b: &UrlSegmentGroup, matrix: MatrixCompare) -> bool {
    if !equal_paths(&a.segments, &b.segments) {
        return false;
    }
    if matrix == MatrixCompare::Exact && !matrix_params_equal(&a.segments, &b.segments) {
        return false;
    }
    if a.children.len() != b.children.len() {
        return false;
    }
    a.children.iter().all(|(outlet, child_a)| {
        b.children
            .get(outlet)
            .is_some_and(|child_b| equal_segment_groups(child_a, child_b, matrix))
    })
}

fn contains_segment_group(
    container: &UrlSegmentGroup,
    containee: &UrlSegmentGroup,
    containee_paths: &[UrlSegment],
    matrix: MatrixCompare,
) -> bool {
    if container.segments.len() > containee_paths.len() {
        // Container is deeper along this run: the containee must be fully
        // consumed here with no children of its own.
        let current = &container.segments[..containee_paths.len()];
        if !equal_paths(current, containee_paths) {
            return false;
        }
        if containee.has_children() {
            return false;
        }
        matrix == MatrixCompare::Ignored || matrix_params_equal(current, containee_paths)
    } else if container.segments.len() == containee_paths.len() {
        if !equal_paths(&container.segments, containee_paths) {
            return false;
        }
        if matrix == MatrixCompare::Exact
            && !matrix_params_equal(&container.segments, containee_paths)
        {
            return false;
        }
        containee.children.iter().all(|(outlet, containee_child)| {
            container.children.get(outlet).is_some_and(|container_child| {
                contains_segment_group(
                    container_child,
                    containee_child,
                    &containee_child.segments,
                    matrix,
                )
            })
        })
    } else {
        // Containee run continues past this group: descend into the
        // container's primary child with the remaining paths.
        let current = &containee_paths[..container.segments.len()];
        let next = &containee_paths[container.segments.len()..];
        if !equal_paths(&container.segments, current) {
            return false;
        }
        if matrix == MatrixCompare::Exact && !matrix_params_equal(&container.segments, current) {
            return false;
        }
        match container.children.get(PRIMARY_OUTLET) {
            Some(primary) => contains_segment_group(primary, containee, next, matrix),
            None => false,
        }
    }
}

fn equal_paths(a: &[UrlSegment], b: &[UrlSegment]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.path == y.path)
}

fn matrix_params_equal(a: &[UrlSegment], b: &[UrlSegment]) -> bool {
    a.iter().zip(b).all(|(x, y)| x.parameters == y.parameters)
}

fn query_params_equal(a: &QueryParams, b: &QueryParams) -> bool {
    a.len() == b.len()
        && a.iter().all(|(key, value)| {
            b.get(key)
                .is_some_and(|other| values_equal_unordered(other, value))
        })
}

fn contains_query_params(container: &QueryParams, containee: &QueryParams) -> bool {
    containee.len() <= container.len()
        && containee.iter().all(|(key, value)| {
            container
                .get(key)
                .is_some_and(|other| values_equal_unordered(other, value))
        })
}

// Multi-values compare as multisets; a Single equals a one-element Multi.
fn values_equal_unordered(a: &QueryValue, b: &QueryValue) -> bool {
    let mut a_values: Vec<&str> = a.values();
    let mut b_values: Vec<&str> = b.values();
    a_values.sort_unstable();
    b_values.sort_unstable();
    a_values == b_values
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    fn tree(url: &str) -> UrlTree {
        parse(url).unwrap()
    }

    #[test]
    fn test_exact_equal() {
        assert!(contains_tree(
            &tree("/a/b?x=1"),
            &tree("/a/b?x=1"),
            UrlCompareOptions::exact()
        ));
    }

    #[test]
    fn test_exact_rejects_different_paths() {
        assert!(!contains_tree(
            &tree("/a/b"),
            &tree("/a/c"),
            UrlCompareOptions::exact()
        ));
    }

    #[test]
    fn test_exact_rejects_extra_segments() {
        assert!(!contains_tree(
            &tree("/a/b/c"),
            &tree("/a/b"),
            UrlCompareOptions::exact()
        ));
    }

    #[test]
    fn test_subset_allows_extra_trailing_segments() {
        assert!(contains_tree(
            &tree("/a/b/c"),
            &tree("/a/b"),
            UrlCompareOptions::subset()
        ));
    }

    #[test]
    fn test_subset_rejects_diverging_paths() {
        assert!(!contains_tree(
            &tree("/a/x/c"),
            &tree("/a/b"),
            UrlCompareOptions::subset()
        ));
    }

    #[test]
    fn test_subset_query_params() {
        let options = UrlCompareOptions::subset();
        assert!(contains_tree(&tree("/a?x=1&y=2"), &tree("/a?x=1"), options));
        assert!(!contains_tree(&tree("/a?x=1"), &tree("/a?x=2"), options));
    }

    #[test]
    fn test_ignored_query_params() {
        let options = UrlCompareOptions {
            paths: PathCompare::Exact,
            query_params: QueryCompare::Ignored,
            matrix_params: MatrixCompare::Ignored,
            fragment: FragmentCompare::Ignored,
        };
        assert!(contains_tree(&tree("/a?x=1"), &tree("/a?y=2"), options));
    }

    #[test]
    fn test_exact_fragment() {
        assert!(!contains_tree(
            &tree("/a#one"),
            &tree("/a#two"),
            UrlCompareOptions::exact()
        ));
        assert!(contains_tree(
            &tree("/a#one"),
            &tree("/a#one"),
            UrlCompareOptions::exact()
        ));
    }

    #[test]
    fn test_matrix_params_exact() {
        let options = UrlCompareOptions::exact();
        assert!(!contains_tree(&tree("/a;k=1"), &tree("/a;k=2"), options));
        assert!(contains_tree(&tree("/a;k=1"), &tree("/a;k=1"), options));
    }

    #[test]
    fn test_matrix_params_ignored_by_default_subset() {
        assert!(contains_tree(
            &tree("/a;k=1"),
            &tree("/a;k=2"),
            UrlCompareOptions::subset()
        ));
    }

    #[test]
    fn test_subset_with_outlets() {
        assert!(contains_tree(
            &tree("/a/b(aux:c)"),
            &tree("/a/b"),
            UrlCompareOptions::subset()
        ));
    }

    #[test]
    fn test_repeated_query_values_compare_as_multiset() {
        assert!(contains_tree(
            &tree("/a?t=1&t=2"),
            &tree("/a?t=2&t=1"),
            UrlCompareOptions::exact()
        ));
    }
}
