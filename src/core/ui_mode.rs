//! UI mode (simple / advanced) business logic.
//!
//! The mode decides which of two alternative views a screen shows. It is
//! read once from the [`PreferenceStore`] when the context is initialized and
//! written back on every change, so a restart always sees the last explicit
//! choice. Until initialization finishes the context reports no mode at all;
//! dependent views wait instead of flashing the default.

use crate::{
    core::preferences::PreferenceStore,
    errors::{Error, Result},
};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr, sync::Arc};
use tokio::sync::watch;
use tracing::{info, warn};

/// Preference key the mode is stored under.
pub const UI_MODE_KEY: &str = "ui_mode";

/// Display density preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UiMode {
    /// Reduced set of fields and actions
    #[default]
    Simple,
    /// Every field and action
    Advanced,
}

impl UiMode {
    /// Stored literal for this mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Advanced => "advanced",
        }
    }

    /// True for [`UiMode::Simple`].
    #[must_use]
    pub const fn is_simple(self) -> bool {
        matches!(self, Self::Simple)
    }

    /// Picks the value matching this mode.
    pub fn pick<T>(self, simple: T, advanced: T) -> T {
        match self {
            Self::Simple => simple,
            Self::Advanced => advanced,
        }
    }
}

impl fmt::Display for UiMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UiMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "simple" => Ok(Self::Simple),
            "advanced" => Ok(Self::Advanced),
            other => Err(Error::validation(format!("Unknown UI mode: {other:?}"))),
        }
    }
}

/// Lifecycle of the mode context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiModeState {
    /// Persisted value not read yet; dependent views must not render
    Loading,
    /// Mode known
    Ready(UiMode),
}

impl UiModeState {
    /// The mode once ready.
    #[must_use]
    pub const fn mode(self) -> Option<UiMode> {
        match self {
            Self::Loading => None,
            Self::Ready(mode) => Some(mode),
        }
    }
}

/// Explicitly constructed holder of the current UI mode.
///
/// Share it with views through an `Arc`; every change is broadcast to
/// [`UiModeContext::subscribe`] receivers.
pub struct UiModeContext {
    store: Arc<dyn PreferenceStore>,
    state: watch::Sender<UiModeState>,
}

impl fmt::Debug for UiModeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiModeContext")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl UiModeContext {
    /// Creates a context in the [`UiModeState::Loading`] state.
    #[must_use]
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        let (state, _) = watch::channel(UiModeState::Loading);
        Self { store, state }
    }

    /// Creates a context and initializes it from the store.
    pub async fn load(store: Arc<dyn PreferenceStore>) -> Self {
        let ctx = Self::new(store);
        ctx.initialize().await;
        ctx
    }

    /// Reads the persisted mode, falling back to [`UiMode::Simple`] when it is
    /// missing, unrecognized or unreadable. Returns the resulting mode.
    ///
    /// A mode set while the read was in progress wins over the stored one.
    pub async fn initialize(&self) -> UiMode {
        if let Some(mode) = self.mode() {
            return mode;
        }

        let persisted = match self.store.get(UI_MODE_KEY).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Failed to read persisted UI mode, using default: {}", e);
                None
            }
        };

        let loaded = match persisted.as_deref() {
            None => UiMode::default(),
            Some(raw) => raw.parse().unwrap_or_else(|_| {
                warn!(value = raw, "Ignoring unrecognized persisted UI mode");
                UiMode::default()
            }),
        };

        self.state.send_if_modified(|state| {
            if *state == UiModeState::Loading {
                *state = UiModeState::Ready(loaded);
                true
            } else {
                false
            }
        });

        let mode = self.mode().unwrap_or(loaded);
        info!(mode = %mode, "UI mode ready");
        mode
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> UiModeState {
        *self.state.borrow()
    }

    /// True once a mode is known.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.mode().is_some()
    }

    /// Current mode, `None` while loading.
    #[must_use]
    pub fn mode(&self) -> Option<UiMode> {
        self.state().mode()
    }

    /// Whether the simple view applies, `None` while loading.
    #[must_use]
    pub fn is_simple(&self) -> Option<bool> {
        self.mode().map(UiMode::is_simple)
    }

    /// Chooses between two labels by mode, `None` while loading.
    #[must_use]
    pub fn label<'a>(&self, simple: &'a str, advanced: &'a str) -> Option<&'a str> {
        self.mode().map(|mode| mode.pick(simple, advanced))
    }

    /// Persists `next` and makes it current.
    ///
    /// The in-memory mode only changes after the store accepted the write.
    pub async fn set_mode(&self, next: UiMode) -> Result<()> {
        self.store.put(UI_MODE_KEY, next.as_str()).await?;
        let previous = self.state.send_replace(UiModeState::Ready(next));
        if previous != UiModeState::Ready(next) {
            info!(mode = %next, "UI mode changed");
        }
        Ok(())
    }

    /// Receiver notified on every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<UiModeState> {
        self.state.subscribe()
    }
}
