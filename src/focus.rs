//! Window focus detection
//!
//! Input is only ever injected while the target window holds focus. Any
//! failure to determine the foreground window counts as "not focused".

/// Answers whether a window currently holds OS input focus
pub trait FocusOracle: Send + Sync {
    /// Whether the window matching `window_title` is in the foreground.
    ///
    /// Implementations must return `false` on any internal error.
    fn is_focused(&self, window_title: &str) -> bool;
}

/// Focus oracle backed by the OS foreground-window query
#[derive(Debug, Clone, Copy, Default)]
pub struct ActiveWindowOracle;

impl FocusOracle for ActiveWindowOracle {
    fn is_focused(&self, window_title: &str) -> bool {
        match active_win_pos_rs::get_active_window() {
            Ok(window) => title_matches(&window.title, window_title),
            Err(()) => {
                tracing::trace!("foreground window query failed");
                false
            }
        }
    }
}

/// Case-insensitive substring match of the target title against the
/// foreground window's title. An empty target never matches.
#[must_use]
pub fn title_matches(active_title: &str, target: &str) -> bool {
    let target = target.trim();
    if target.is_empty() {
        return false;
    }
    active_title.to_lowercase().contains(&target.to_lowercase())
}
