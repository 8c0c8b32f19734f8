// File: src/commands.rs
// Purpose: Build target URL trees from navigation commands

use wayfare_url::{parse, QueryParams, UrlSegment, UrlTree};

use crate::errors::RouterError;

/// What happens to the current URL's query parameters when navigating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryParamsHandling {
    /// Use only the query parameters supplied with the navigation.
    #[default]
    Replace,
    /// Merge supplied parameters over the current ones.
    Merge,
    /// Keep the current parameters, ignoring supplied ones.
    Preserve,
}

/// Per-navigation options.
#[derive(Default, Clone)]
pub struct NavigationExtras {
    /// Base segments relative commands resolve against. Defaults to the
    /// root, making plain commands absolute.
    pub relative_to: Option<Vec<UrlSegment>>,
    pub query_params: Option<QueryParams>,
    pub query_params_handling: QueryParamsHandling,
    pub fragment: Option<String>,
    /// Keep the current fragment instead of `fragment`.
    pub preserve_fragment: bool,
    /// Commit the navigation without touching the history stack.
    pub skip_location_change: bool,
    /// Replace the current history entry instead of pushing one.
    pub replace_url: bool,
}

impl std::fmt::Debug for NavigationExtras {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NavigationExtras")
            .field("query_params", &self.query_params)
            .field("query_params_handling", &self.query_params_handling)
            .field("fragment", &self.fragment)
            .field("skip_location_change", &self.skip_location_change)
            .field("replace_url", &self.replace_url)
            .finish()
    }
}

/// Builds the target URL tree for a list of commands.
///
/// Commands are path tokens: `["users", "42"]` becomes `/users/42`. A
/// leading `/` in the first command makes the target absolute regardless of
/// `relative_to`; `..` pops a segment from the base and `.` is a no-op.
/// Matrix parameters and auxiliary outlets use the URL syntax directly,
/// e.g. `["items;sort=asc", "(aux:panel)"]`.
///
/// ```
/// use wayfare_router::{create_url_tree, NavigationExtras};
/// use wayfare_url::UrlTree;
///
/// let current = UrlTree::empty();
/// let tree = create_url_tree(&current, &["users", "42"], &NavigationExtras::default()).unwrap();
/// assert_eq!(tree.to_string(), "/users/42");
/// ```
pub fn create_url_tree(
    current: &UrlTree,
    commands: &[&str],
    extras: &NavigationExtras,
) -> Result<UrlTree, RouterError> {
    let mut tree = if commands.is_empty() {
        current.clone()
    } else {
        let path = resolve_commands(commands, extras)?;
        parse(&path).map_err(|e| {
            RouterError::InvalidCommands(format!("commands produce an unparsable URL: {e}"))
        })?
    };

    tree.query_params = match extras.query_params_handling {
        QueryParamsHandling::Replace => extras.query_params.clone().unwrap_or_default(),
        QueryParamsHandling::Preserve => current.query_params.clone(),
        QueryParamsHandling::Merge => {
            let mut merged = current.query_params.clone();
            if let Some(params) = &extras.query_params {
                merged.extend(params.clone());
            }
            merged
        }
    };

    tree.fragment = if extras.preserve_fragment {
        current.fragment.clone()
    } else {
        extras.fragment.clone()
    };

    Ok(tree)
}

fn resolve_commands(commands: &[&str], extras: &NavigationExtras) -> Result<String, RouterError> {
    let joined = commands.join("/");
    let absolute = joined.starts_with('/');

    let mut segments: Vec<String> = if absolute {
        Vec::new()
    } else {
        extras
            .relative_to
            .as_ref()
            .map(|base| base.iter().map(|s| s.to_string()).collect())
            .unwrap_or_default()
    };

    for token in joined.trim_start_matches('/').split('/') {
        match token {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(RouterError::InvalidCommands(format!(
                        "commands {commands:?} navigate above the root"
                    )));
                }
            }
            other => segments.push(other.to_string()),
        }
    }

    Ok(format!("/{}", segments.join("/")))
}
