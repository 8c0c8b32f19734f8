// File: src/errors.rs
// Purpose: Error taxonomy for the navigation engine

use thiserror::Error;
use wayfare_url::UrlParseError;

/// Boxed error type carried by loaders, guards, and resolvers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors surfaced by the router.
///
/// Recoverable routing failures (guard rejection, superseded navigations)
/// never appear here; they resolve the navigation handle `false` and emit a
/// `NavigationCancel` event instead. `RouterError` covers malformed input,
/// invalid configuration, and failures inside user-supplied collaborators.
#[derive(Debug, Error)]
pub enum RouterError {
    /// The requested URL string could not be parsed.
    #[error(transparent)]
    Parse(#[from] UrlParseError),

    /// No declared route matched a segment group of the requested URL.
    #[error("no route matched url {url:?}")]
    NoMatch { url: String },

    /// A route definition violated a setup-time rule. Thrown synchronously
    /// at router construction, never during navigation.
    #[error("invalid route configuration: {0}")]
    InvalidConfig(String),

    /// A lazy route loader failed.
    #[error("failed to load child routes for route {path:?}")]
    LoadFailed {
        path: String,
        #[source]
        source: BoxError,
    },

    /// A guard returned an error (as opposed to a deny, which cancels).
    #[error("guard for route {path:?} failed")]
    GuardFailed {
        path: String,
        #[source]
        source: BoxError,
    },

    /// A data resolver failed.
    #[error("resolver {key:?} failed")]
    ResolveFailed {
        key: String,
        #[source]
        source: BoxError,
    },

    /// A relative navigation command walked above the root.
    #[error("invalid navigation commands: {0}")]
    InvalidCommands(String),
}
