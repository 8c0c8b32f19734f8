// File: src/title.rs
// Purpose: Document title derivation from the committed route tree

use std::sync::Mutex;

use crate::state::SnapshotTree;

/// Derives and applies the document title after a navigation commits.
///
/// The router calls `on_navigation_end` with the committed snapshot tree;
/// implementations push the built title wherever the host displays it.
pub trait TitleStrategy: Send + Sync {
    /// The title for a committed navigation: by default, the `title` of the
    /// deepest primary route that defines one.
    fn build_title(&self, tree: &SnapshotTree) -> Option<String> {
        let mut id = tree.deepest_primary();
        loop {
            if let Some(title) = tree.snapshot(id).title() {
                return Some(title);
            }
            id = tree.parent(id)?;
        }
    }

    fn on_navigation_end(&self, tree: &SnapshotTree);
}

/// Keeps the built title in memory, readable through `title()`.
#[derive(Debug, Default)]
pub struct DefaultTitleStrategy {
    current: Mutex<Option<String>>,
}

impl DefaultTitleStrategy {
    pub fn new() -> Self {
        Self::default()
    }

    /// The title of the last committed navigation, if any route set one.
    pub fn title(&self) -> Option<String> {
        self.current.lock().ok().and_then(|t| t.clone())
    }
}

impl TitleStrategy for DefaultTitleStrategy {
    fn on_navigation_end(&self, tree: &SnapshotTree) {
        let title = self.build_title(tree);
        if let Ok(mut current) = self.current.lock() {
            *current = title;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Route;
    use crate::loader::ConfigMemo;
    use crate::recognize::{recognize, ParamInheritance};
    use wayfare_url::{parse, UrlTree};

    async fn tree_for(routes: &crate::config::Routes, url: &str) -> SnapshotTree {
        let target = parse(url).unwrap();
        recognize(
            routes,
            &ConfigMemo::default(),
            &target,
            &UrlTree::empty(),
            ParamInheritance::EmptyOnly,
            1,
            &|_| {},
        )
        .await
        .unwrap()
        .tree
    }

    #[tokio::test]
    async fn deepest_primary_title_wins() {
        let routes = vec![Route::path("shop")
            .title("Shop")
            .component("Shop")
            .child(Route::path("cart").title("Cart").component("Cart"))
            .arc()];
        let tree = tree_for(&routes, "/shop/cart").await;

        let strategy = DefaultTitleStrategy::new();
        strategy.on_navigation_end(&tree);
        assert_eq!(strategy.title().as_deref(), Some("Cart"));
    }

    #[tokio::test]
    async fn untitled_leaf_falls_back_to_ancestor() {
        let routes = vec![Route::path("shop")
            .title("Shop")
            .component("Shop")
            .child(Route::path("cart").component("Cart"))
            .arc()];
        let tree = tree_for(&routes, "/shop/cart").await;

        let strategy = DefaultTitleStrategy::new();
        strategy.on_navigation_end(&tree);
        assert_eq!(strategy.title().as_deref(), Some("Shop"));
    }
}
