// File: tests/url_tests.rs
// Purpose: Round-trip, comparison, and parse-error scenarios

//! Integration tests for wayfare-url
//!
//! Covers the round-trip property (parse → serialize → parse is identity),
//! structural comparison across modes, and parser error surfaces.

use pretty_assertions::assert_eq;
use rstest::rstest;
use wayfare_url::{
    contains_tree, parse, serialize, UrlCompareOptions, UrlParseError, UrlTree, PRIMARY_OUTLET,
};

#[rstest]
#[case("/")]
#[case("/about")]
#[case("/users/42")]
#[case("/users;sort=name;dir=asc/42;details=full")]
#[case("/inbox/33(popup:compose)")]
#[case("/inbox/33/(messages//side:details)")]
#[case("/a/b(aux:c/d//right:e)")]
#[case("/search?page=2&q=rust")]
#[case("/search?tag=a&tag=b&tag=c")]
#[case("/docs#section-2")]
#[case("/a;m=1(aux:b;n=2)?x=1&y=2#frag")]
#[case("/caf%C3%A9")]
#[case("/a%20b/c%2Fd")]
fn round_trip(#[case] url: &str) {
    let tree = parse(url).unwrap();
    let serialized = serialize(&tree);
    assert_eq!(serialized, url);
    assert_eq!(parse(&serialized).unwrap(), tree);
}

#[rstest]
#[case("/a(b:c//d:e)")]
#[case("/x/(a//named:b)")]
fn round_trip_structural(#[case] url: &str) {
    // Outlet order is canonicalized on serialize, so compare trees rather
    // than strings.
    let tree = parse(url).unwrap();
    assert_eq!(parse(&serialize(&tree)).unwrap(), tree);
}

#[test]
fn parse_extracts_all_parts() {
    let tree = parse("/users/42;tab=posts?hl=en#top").unwrap();
    let group = tree.root.child(PRIMARY_OUTLET).unwrap();
    assert_eq!(group.segments.len(), 2);
    assert_eq!(group.segments[1].path, "42");
    assert_eq!(
        group.segments[1].parameters.get("tab").map(String::as_str),
        Some("posts")
    );
    assert_eq!(tree.query_params.get("hl").unwrap().first(), "en");
    assert_eq!(tree.fragment.as_deref(), Some("top"));
}

#[test]
fn parse_rejects_matrix_params_on_empty_segment() {
    assert!(matches!(
        parse("/;a=b"),
        Err(UrlParseError::InvalidRouteContent { .. })
    ));
}

#[test]
fn parse_rejects_unclosed_outlet_group() {
    assert!(matches!(
        parse("/a(b:c"),
        Err(UrlParseError::UnbalancedParentheses { .. })
    ));
}

#[test]
fn display_and_from_str() {
    let tree: UrlTree = "/a/b?x=1".parse().unwrap();
    assert_eq!(tree.to_string(), "/a/b?x=1");
}

#[test]
fn subset_containment_matches_prefix_navigation() {
    let container = parse("/team/33/user/11?debug=1").unwrap();
    let containee = parse("/team/33").unwrap();
    assert!(contains_tree(
        &container,
        &containee,
        UrlCompareOptions::subset()
    ));
    assert!(!contains_tree(
        &containee,
        &container,
        UrlCompareOptions::subset()
    ));
}

#[test]
fn exact_containment_is_symmetric_equality() {
    let a = parse("/team/33?x=1").unwrap();
    let b = parse("/team/33?x=1").unwrap();
    let options = UrlCompareOptions::exact();
    assert!(contains_tree(&a, &b, options));
    assert!(contains_tree(&b, &a, options));
}
