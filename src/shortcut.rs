//! Shortcut records, live key observations, and the normalized form used to
//! compare them.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::input::macos_keys::key_code_to_symbol;
use crate::input::modifiers::{decode_live_event_flags, ModifierSet};

/// Where a binding was discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShortcutSource {
    /// A menu item of a running application
    Application,
    /// The symbolic hotkey store
    System,
}

impl ShortcutSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShortcutSource::Application => "application",
            ShortcutSource::System => "system",
        }
    }
}

/// Normalized `{modifiers, key}` pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Shortcut {
    pub modifiers: ModifierSet,
    pub key: String,
}

impl Shortcut {
    pub fn new(modifiers: ModifierSet, key: impl Into<String>) -> Self {
        Self {
            modifiers,
            key: key.into(),
        }
    }

    /// Display form, e.g. "⌃⌘A"
    pub fn display(&self) -> String {
        format!("{}{}", self.modifiers.glyphs(), self.key.to_uppercase())
    }

    /// Exact, case-insensitive comparison of the display forms
    pub fn matches(&self, other: &Shortcut) -> bool {
        self.display().to_uppercase() == other.display().to_uppercase()
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

/// One discovered binding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortcutRecord {
    pub id: Uuid,
    pub source: ShortcutSource,
    pub owner_name: String,
    pub label: String,
    pub modifiers: ModifierSet,
    pub key: String,
}

impl ShortcutRecord {
    pub fn new(
        source: ShortcutSource,
        owner_name: impl Into<String>,
        label: impl Into<String>,
        modifiers: ModifierSet,
        key: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            owner_name: owner_name.into(),
            label: label.into(),
            modifiers,
            key: key.into(),
        }
    }

    pub fn shortcut(&self) -> Shortcut {
        Shortcut::new(self.modifiers, self.key.clone())
    }

    pub fn display_shortcut(&self) -> String {
        self.shortcut().display()
    }
}

/// One live key-down, already normalized
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyObservation {
    pub physical_key_code: i64,
    pub raw_modifier_flags: u64,
    pub decoded_key: String,
    pub modifiers: ModifierSet,
    pub timestamp: DateTime<Utc>,
}

impl KeyObservation {
    /// Build from the raw values a tap reports. Only table lookups, so it is
    /// safe to call from inside the input callback.
    pub fn from_raw(physical_key_code: i64, raw_modifier_flags: u64) -> Self {
        Self {
            physical_key_code,
            raw_modifier_flags,
            decoded_key: key_code_to_symbol(physical_key_code),
            modifiers: decode_live_event_flags(raw_modifier_flags),
            timestamp: Utc::now(),
        }
    }

    pub fn shortcut(&self) -> Shortcut {
        Shortcut::new(self.modifiers, self.decoded_key.clone())
    }

    pub fn display_shortcut(&self) -> String {
        self.shortcut().display()
    }
}
