// File: src/scroll.rs
// Purpose: Scroll position bookkeeping and Scroll event production

use std::collections::HashMap;
use std::sync::Mutex;

use crate::events::{NavigationSource, RouterEvent};

/// Whether scroll positions are restored when the user moves through
/// history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollPositionRestoration {
    /// Never emit a position; the host manages scrolling itself.
    #[default]
    Disabled,
    /// Restore the recorded position when returning to a URL via history,
    /// scroll to the top otherwise.
    Enabled,
    /// Always scroll to the top.
    Top,
}

/// Whether a URL fragment becomes a scroll anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnchorScrolling {
    #[default]
    Disabled,
    Enabled,
}

/// Records scroll positions per URL and produces the `Scroll` event that
/// follows each successful navigation.
///
/// The engine never scrolls anything itself; the host reports positions via
/// `note_position` and reacts to the emitted [`RouterEvent::Scroll`].
#[derive(Debug, Default)]
pub struct ScrollManager {
    restoration: ScrollPositionRestoration,
    anchor: AnchorScrolling,
    positions: Mutex<HashMap<String, (f64, f64)>>,
}

impl ScrollManager {
    pub fn new(restoration: ScrollPositionRestoration, anchor: AnchorScrolling) -> Self {
        Self {
            restoration,
            anchor,
            positions: Mutex::new(HashMap::new()),
        }
    }

    /// Host callback: the viewport position while `url` was current.
    pub fn note_position(&self, url: &str, position: (f64, f64)) {
        if let Ok(mut positions) = self.positions.lock() {
            positions.insert(url.to_string(), position);
        }
    }

    /// The event to emit once navigation `id` has committed `url`.
    pub(crate) fn scroll_event(
        &self,
        id: u64,
        url: &str,
        fragment: Option<&str>,
        source: NavigationSource,
    ) -> RouterEvent {
        let anchor = match self.anchor {
            AnchorScrolling::Enabled => fragment.map(String::from),
            AnchorScrolling::Disabled => None,
        };
        let position = match self.restoration {
            ScrollPositionRestoration::Disabled => None,
            ScrollPositionRestoration::Top => Some((0.0, 0.0)),
            ScrollPositionRestoration::Enabled => {
                if source == NavigationSource::Popstate {
                    self.positions
                        .lock()
                        .ok()
                        .and_then(|p| p.get(url).copied())
                        .or(Some((0.0, 0.0)))
                } else {
                    Some((0.0, 0.0))
                }
            }
        };
        RouterEvent::Scroll {
            id,
            position,
            anchor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_restoration_emits_no_position() {
        let scroll = ScrollManager::default();
        let event = scroll.scroll_event(1, "/a", None, NavigationSource::Imperative);
        assert!(matches!(
            event,
            RouterEvent::Scroll {
                position: None,
                anchor: None,
                ..
            }
        ));
    }

    #[test]
    fn popstate_restores_recorded_position() {
        let scroll = ScrollManager::new(
            ScrollPositionRestoration::Enabled,
            AnchorScrolling::Disabled,
        );
        scroll.note_position("/a", (0.0, 640.0));

        let event = scroll.scroll_event(2, "/a", None, NavigationSource::Popstate);
        assert!(matches!(
            event,
            RouterEvent::Scroll {
                position: Some((_, y)),
                ..
            } if y == 640.0
        ));

        // A fresh imperative navigation starts at the top.
        let event = scroll.scroll_event(3, "/a", None, NavigationSource::Imperative);
        assert!(matches!(
            event,
            RouterEvent::Scroll {
                position: Some((0.0, 0.0)),
                ..
            }
        ));
    }

    #[test]
    fn anchor_scrolling_passes_the_fragment() {
        let scroll =
            ScrollManager::new(ScrollPositionRestoration::Disabled, AnchorScrolling::Enabled);
        let event = scroll.scroll_event(1, "/doc", Some("section-2"), NavigationSource::Imperative);
        assert!(matches!(
            event,
            RouterEvent::Scroll { anchor: Some(a), .. } if a == "section-2"
        ));
    }
}
