// File: src/location.rs
// Purpose: History abstraction the router commits URLs to

use std::sync::Mutex;

use tokio::sync::broadcast;
use tracing::trace;

use crate::events::NavigationSource;

/// A URL change reported by the platform history, e.g. the user pressing
/// back.
#[derive(Debug, Clone)]
pub struct LocationChange {
    pub url: String,
    pub source: NavigationSource,
}

/// The router's view of the host's history stack.
///
/// The router writes committed URLs through `push`/`replace` and reacts to
/// externally triggered changes via `changes`. Implementations wrap
/// whatever the host platform offers; [`MemoryLocation`] is the in-process
/// reference implementation used in tests and headless embeddings.
pub trait LocationAdapter: Send + Sync {
    /// The URL the history currently points at.
    fn current(&self) -> String;

    /// Appends a new history entry.
    fn push(&self, url: &str);

    /// Replaces the current history entry.
    fn replace(&self, url: &str);

    /// Moves the history cursor by `delta` entries, like `history.go`.
    /// Out-of-range deltas are a no-op.
    fn go(&self, delta: isize);

    /// Stream of changes originating outside the router.
    fn changes(&self) -> broadcast::Receiver<LocationChange>;
}

struct MemoryHistory {
    entries: Vec<String>,
    index: usize,
}

/// An in-memory history stack.
///
/// `back`/`forward` emulate the user's history buttons: they move the
/// cursor and emit a popstate-style [`LocationChange`], which a listening
/// router turns into a navigation.
pub struct MemoryLocation {
    history: Mutex<MemoryHistory>,
    tx: broadcast::Sender<LocationChange>,
}

impl MemoryLocation {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self {
            history: Mutex::new(MemoryHistory {
                entries: vec!["/".to_string()],
                index: 0,
            }),
            tx,
        }
    }

    /// Steps back one entry, emitting a popstate change. Returns `false` at
    /// the start of the stack.
    pub fn back(&self) -> bool {
        self.shift(-1)
    }

    /// Steps forward one entry, emitting a popstate change. Returns `false`
    /// at the end of the stack.
    pub fn forward(&self) -> bool {
        self.shift(1)
    }

    /// Number of entries currently on the stack.
    pub fn depth(&self) -> usize {
        self.history.lock().map(|h| h.entries.len()).unwrap_or(0)
    }

    fn shift(&self, delta: isize) -> bool {
        let url = {
            let Ok(mut history) = self.history.lock() else {
                return false;
            };
            let target = history.index as isize + delta;
            if target < 0 || target as usize >= history.entries.len() {
                return false;
            }
            history.index = target as usize;
            history.entries[history.index].clone()
        };
        trace!(%url, "history cursor moved");
        let _ = self.tx.send(LocationChange {
            url,
            source: NavigationSource::Popstate,
        });
        true
    }
}

impl Default for MemoryLocation {
    fn default() -> Self {
        Self::new()
    }
}

impl LocationAdapter for MemoryLocation {
    fn current(&self) -> String {
        self.history
            .lock()
            .map(|h| h.entries[h.index].clone())
            .unwrap_or_else(|_| "/".to_string())
    }

    fn push(&self, url: &str) {
        if let Ok(mut history) = self.history.lock() {
            let index = history.index;
            // A push drops any forward entries, like a browser would.
            history.entries.truncate(index + 1);
            history.entries.push(url.to_string());
            history.index += 1;
        }
    }

    fn replace(&self, url: &str) {
        if let Ok(mut history) = self.history.lock() {
            let index = history.index;
            history.entries[index] = url.to_string();
        }
    }

    fn go(&self, delta: isize) {
        self.shift(delta);
    }

    fn changes(&self) -> broadcast::Receiver<LocationChange> {
        self.tx.subscribe()
    }
}
