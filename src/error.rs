//! Error taxonomy for the discovery engine.
//!
//! Nothing here is fatal. Scanners log these and fall back to empty or partial
//! results; only the observer surfaces them to its caller as a status.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DetectorError {
    /// Accessibility trust is missing, so neither the tap nor AX queries work.
    #[error("accessibility permission not granted")]
    PermissionDenied,

    /// A data source (hotkey store, app subtree) could not be read or decoded.
    #[error("{what} unavailable: {reason}")]
    DataUnavailable { what: String, reason: String },

    /// The global key-down tap could not be installed.
    #[error("event tap unavailable: {0}")]
    TapUnavailable(String),

    /// `stop()` raced an in-flight `start()`.
    #[error("observer start cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Plist(#[from] plist::Error),
}

impl DetectorError {
    pub fn data_unavailable(what: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Permission problems are the only kind the user can fix by retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::PermissionDenied | Self::TapUnavailable(_))
    }
}
