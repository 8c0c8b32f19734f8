// File: src/state.rs
// Purpose: Route snapshots (arena tree), live activated routes, router state

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;
use wayfare_url::{QueryParams, UrlSegment, UrlTree, PRIMARY_OUTLET};

use crate::config::Route;
use crate::reuse::{DetachedRouteHandle, RouteReuseStrategy};

/// Resolved path/matrix parameters of one snapshot.
pub type Params = BTreeMap<String, String>;

/// Resolved data bag of one snapshot.
pub type DataMap = BTreeMap<String, Value>;

/// An immutable, point-in-time view of one matched route.
///
/// Snapshots are sealed: `params`, `query_params`, and `data` are never
/// mutated after construction. When a later pipeline stage (inheritance,
/// resolvers) needs different values, it produces a new snapshot and swaps
/// it into the tree.
#[derive(Debug, Clone)]
pub struct RouteSnapshot {
    /// URL segments consumed by this route's match.
    pub url: Vec<UrlSegment>,
    /// Effective parameters: positional params plus the matched segments'
    /// matrix params, merged with ancestors per the inheritance policy.
    pub params: Params,
    /// Query parameters of the whole navigation (shared by every node).
    pub query_params: QueryParams,
    pub fragment: Option<String>,
    /// Effective data: inherited ancestor data, overridden by the route's
    /// static `data`, overridden by this node's resolved data.
    pub data: DataMap,
    pub outlet: String,
    pub component: Option<String>,
    /// Matched route config; `None` only for the synthetic root node.
    pub route: Option<Arc<Route>>,
    /// Raw resolver outputs before merging, keyed by resolver name.
    pub(crate) resolved_data: DataMap,
}

impl RouteSnapshot {
    /// The synthetic root snapshot of a navigation.
    pub(crate) fn root(tree: &UrlTree) -> Self {
        Self {
            url: Vec::new(),
            params: Params::new(),
            query_params: tree.query_params.clone(),
            fragment: tree.fragment.clone(),
            data: DataMap::new(),
            outlet: PRIMARY_OUTLET.to_string(),
            component: None,
            route: None,
            resolved_data: DataMap::new(),
        }
    }

    /// The route's title, from the explicit field or the `title` data key.
    pub fn title(&self) -> Option<String> {
        if let Some(route) = &self.route {
            if let Some(title) = &route.title {
                return Some(title.clone());
            }
        }
        self.data.get("title").and_then(|v| v.as_str()).map(String::from)
    }

    /// Joined path of the consumed segments, for diagnostics and events.
    pub fn path(&self) -> String {
        self.url
            .iter()
            .map(|s| s.path.as_str())
            .collect::<Vec<_>>()
            .join("/")
    }
}

/// Index of a node in a [`SnapshotTree`] arena.
pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct SnapshotNode {
    pub snapshot: Arc<RouteSnapshot>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
}

/// A navigation's snapshot tree, stored as a flat arena.
///
/// Parent/child links are indices rather than references, so upward lookup
/// is O(1) without reference cycles, and the whole tree is trivially
/// cloneable and shareable.
#[derive(Debug, Clone)]
pub struct SnapshotTree {
    nodes: Vec<SnapshotNode>,
    root: NodeId,
}

impl SnapshotTree {
    pub(crate) fn new(root_snapshot: RouteSnapshot) -> Self {
        Self {
            nodes: vec![SnapshotNode {
                snapshot: Arc::new(root_snapshot),
                parent: None,
                children: Vec::new(),
            }],
            root: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &SnapshotNode {
        &self.nodes[id]
    }

    pub fn snapshot(&self, id: NodeId) -> &Arc<RouteSnapshot> {
        &self.nodes[id].snapshot
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].children
    }

    pub(crate) fn add_child(&mut self, parent: NodeId, snapshot: RouteSnapshot) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(SnapshotNode {
            snapshot: Arc::new(snapshot),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent].children.push(id);
        id
    }

    /// Swaps in a replacement snapshot for `id`. The old snapshot value is
    /// untouched; holders of the old `Arc` keep the sealed view they had.
    pub(crate) fn replace_snapshot(&mut self, id: NodeId, snapshot: RouteSnapshot) {
        self.nodes[id].snapshot = Arc::new(snapshot);
    }

    /// Pre-order (parents before children) traversal ids.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut out = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            out.push(id);
            // Reverse keeps declaration order when popping.
            for &child in self.nodes[id].children.iter().rev() {
                stack.push(child);
            }
        }
        out
    }

    /// The child of `id` filling `outlet`, if any.
    pub fn child_by_outlet(&self, id: NodeId, outlet: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|&c| self.snapshot(c).outlet == outlet)
    }

    /// Deepest node reachable from the root through primary outlets only.
    /// The title strategy reads its `title`.
    pub fn deepest_primary(&self) -> NodeId {
        let mut id = self.root;
        while let Some(next) = self.child_by_outlet(id, PRIMARY_OUTLET) {
            id = next;
        }
        id
    }
}

static COMPONENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// An opaque stand-in for an instantiated component.
///
/// The engine does not render anything; it only tracks instance identity so
/// the reuse strategy's guarantees (same instance survives a reused
/// navigation) are observable by the host and by tests.
#[derive(Debug, Clone)]
pub struct ComponentHandle {
    type_name: String,
    instance_id: u64,
}

impl ComponentHandle {
    pub(crate) fn new(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            instance_id: COMPONENT_SEQ.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Unique per instantiation; survives reuse, changes on recreate.
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }
}

impl PartialEq for ComponentHandle {
    fn eq(&self, other: &Self) -> bool {
        self.instance_id == other.instance_id
    }
}

impl Eq for ComponentHandle {}

/// A live activated route.
///
/// The node's identity is stable across navigations that reuse it; only the
/// snapshot behind the watch channel advances. Subscribers hold a
/// [`watch::Receiver`] and observe every committed snapshot without ever
/// seeing a half-updated one.
#[derive(Debug)]
pub struct ActivatedRoute {
    tx: watch::Sender<Arc<RouteSnapshot>>,
}

impl ActivatedRoute {
    pub(crate) fn new(snapshot: Arc<RouteSnapshot>) -> Arc<Self> {
        let (tx, _rx) = watch::channel(snapshot);
        Arc::new(Self { tx })
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Arc<RouteSnapshot> {
        self.tx.borrow().clone()
    }

    /// Reactive view over this node's snapshots.
    pub fn watch(&self) -> watch::Receiver<Arc<RouteSnapshot>> {
        self.tx.subscribe()
    }

    pub(crate) fn advance(&self, snapshot: Arc<RouteSnapshot>) {
        self.tx.send_replace(snapshot);
    }
}

/// One node of the live route tree: the activated route plus the component
/// instance currently filling its outlet.
#[derive(Debug, Clone)]
pub struct LiveNode {
    pub route: Arc<ActivatedRoute>,
    pub component: Option<ComponentHandle>,
    pub children: Vec<LiveNode>,
}

impl LiveNode {
    fn new(snapshot: Arc<RouteSnapshot>) -> Self {
        let component = snapshot.component.as_deref().map(ComponentHandle::new);
        Self {
            route: ActivatedRoute::new(snapshot),
            component,
            children: Vec::new(),
        }
    }

    /// The child filling `outlet`, if any.
    pub fn child_by_outlet(&self, outlet: &str) -> Option<&LiveNode> {
        self.children
            .iter()
            .find(|c| c.route.snapshot().outlet == outlet)
    }

    /// Walks the primary chain to its deepest node.
    pub fn deepest_primary(&self) -> &LiveNode {
        let mut node = self;
        while let Some(next) = node.child_by_outlet(PRIMARY_OUTLET) {
            node = next;
        }
        node
    }
}

/// The committed navigation state: the snapshot tree of the last successful
/// navigation plus the live node tree built from it.
#[derive(Debug, Clone)]
pub struct RouterState {
    pub snapshot: SnapshotTree,
    pub root: LiveNode,
}

impl RouterState {
    /// The initial state before any navigation commits.
    pub(crate) fn initial(tree: &UrlTree) -> Self {
        let snapshot = SnapshotTree::new(RouteSnapshot::root(tree));
        let root = LiveNode::new(snapshot.snapshot(snapshot.root()).clone());
        Self { snapshot, root }
    }
}

/// Builds the next live tree from the previous one and a freshly recognized
/// snapshot tree, applying the reuse strategy node by node.
///
/// Reused nodes keep their `ActivatedRoute` identity and component handle;
/// non-reused branches are either detached into the strategy's store or
/// dropped, and their replacements come from the store (`retrieve`) or are
/// created fresh.
pub(crate) fn advance_state(
    previous: &RouterState,
    next_tree: &SnapshotTree,
    reuse: &dyn RouteReuseStrategy,
) -> LiveNode {
    advance_node(
        Some(&previous.root),
        next_tree,
        next_tree.root(),
        reuse,
        true,
    )
}

fn advance_node(
    old: Option<&LiveNode>,
    next_tree: &SnapshotTree,
    id: NodeId,
    reuse: &dyn RouteReuseStrategy,
    is_root: bool,
) -> LiveNode {
    let next_snapshot = next_tree.snapshot(id).clone();

    if let Some(old_node) = old {
        let reusable =
            is_root || reuse.should_reuse_route(&next_snapshot, &old_node.route.snapshot());
        if reusable {
            // The old node survives: repoint its snapshot, keep its component.
            old_node.route.advance(next_snapshot);
            let children = advance_children(Some(old_node), next_tree, id, reuse);
            return LiveNode {
                route: Arc::clone(&old_node.route),
                component: old_node.component.clone(),
                children,
            };
        }
    }

    // Old branch (if any) goes away: offer it to the detach store.
    if let Some(old_node) = old {
        let old_snapshot = old_node.route.snapshot();
        if reuse.should_detach(&old_snapshot) {
            reuse.store(&old_snapshot, DetachedRouteHandle::new(old_node.clone()));
        }
    }

    // Replacement: reattach a stored subtree or build a fresh node.
    if reuse.should_attach(&next_snapshot) {
        if let Some(handle) = reuse.retrieve(&next_snapshot) {
            let node = handle.into_node();
            node.route.advance(next_snapshot);
            // A reattached subtree comes back verbatim, children included.
            return node;
        }
    }

    let mut node = LiveNode::new(next_snapshot);
    node.children = advance_children(None, next_tree, id, reuse);
    node
}

fn advance_children(
    old: Option<&LiveNode>,
    next_tree: &SnapshotTree,
    id: NodeId,
    reuse: &dyn RouteReuseStrategy,
) -> Vec<LiveNode> {
    let next_children = next_tree.children(id);

    // Old children with no counterpart in the next tree get detached or
    // dropped here.
    if let Some(old_node) = old {
        for old_child in &old_node.children {
            let outlet = old_child.route.snapshot().outlet.clone();
            let survives = next_children
                .iter()
                .any(|&c| next_tree.snapshot(c).outlet == outlet);
            if !survives {
                let old_snapshot = old_child.route.snapshot();
                if reuse.should_detach(&old_snapshot) {
                    reuse.store(&old_snapshot, DetachedRouteHandle::new(old_child.clone()));
                }
            }
        }
    }

    next_children
        .iter()
        .map(|&child_id| {
            let outlet = &next_tree.snapshot(child_id).outlet;
            let old_child = old.and_then(|o| o.child_by_outlet(outlet));
            advance_node(old_child, next_tree, child_id, reuse, false)
        })
        .collect()
}
