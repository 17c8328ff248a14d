/*!
 * Hotkey Detector Library
 *
 * Discovers keyboard shortcuts bound by running applications and by the
 * system, and matches live key presses against them.
 */

pub mod a11y;
pub mod catalog;
pub mod config;
pub mod error;
pub mod input;
pub mod metrics;
pub mod platform;
pub mod shortcut;
pub mod system_hotkeys;

// Re-export commonly used types
pub use a11y::{AccessibilityElement, ApplicationMenuWalker, ShortcutNormalizer};
pub use catalog::{
    ApplicationSource, Catalog, CatalogReader, ScanMode, ScanReport, ScanState,
    ShortcutCatalogBuilder,
};
pub use config::DetectorConfig;
pub use error::DetectorError;
pub use input::{LiveKeyObserver, ModifierSet, ObserverState};
pub use shortcut::{KeyObservation, Shortcut, ShortcutRecord, ShortcutSource};
pub use system_hotkeys::SystemHotkeyRegistry;
