//! Top-level view selection.
//!
//! Every window loads the same web bundle; the URL fragment decides which
//! view it mounts.  Only the exact settings fragment selects the settings
//! panel.  Anything else (no fragment, an unknown fragment, a typo) falls
//! back to the main clock display.

use serde::{Deserialize, Serialize};

/// URL fragment that selects the settings panel.
pub const SETTINGS_FRAGMENT: &str = "#/settings";

/// The two views a window can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum View {
    /// The frameless clock display.
    #[default]
    Main,
    /// The settings panel.
    Settings,
}

impl View {
    /// Chooses the view for a window from its URL fragment.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use fishclock_core::View;
    ///
    /// assert_eq!(View::from_fragment("#/settings"), View::Settings);
    /// assert_eq!(View::from_fragment(""), View::Main);
    /// assert_eq!(View::from_fragment("#/about"), View::Main);
    /// ```
    pub fn from_fragment(fragment: &str) -> Self {
        if fragment == SETTINGS_FRAGMENT {
            View::Settings
        } else {
            View::Main
        }
    }

    /// The URL a window must load to render this view.
    pub fn url(self) -> &'static str {
        match self {
            View::Main => "/",
            View::Settings => "/#/settings",
        }
    }

    /// The fragment part of [`url`](Self::url), empty for the main view.
    pub fn fragment(self) -> &'static str {
        match self {
            View::Main => "",
            View::Settings => SETTINGS_FRAGMENT,
        }
    }
}
