//! System hotkey registry.
//!
//! Reads the per-user symbolic hotkey store
//! (`~/Library/Preferences/com.apple.symbolichotkeys.plist`) and turns every
//! bound entry into a [`ShortcutRecord`]. The store looks like:
//!
//! ```text
//! AppleSymbolicHotKeys = {
//!     "64" = { enabled = 1; value = { parameters = (32, 49, 1048576); type = standard; }; };
//!     ...
//! }
//! ```
//!
//! `parameters` is `[character, keyCode, modifierMask]`; key code 65535 marks
//! an unbound slot.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::DetectorError;
use crate::input::macos_keys::key_code_to_symbol;
use crate::input::modifiers::decode_system_store_modifiers;
use crate::shortcut::{ShortcutRecord, ShortcutSource};

/// Top-level dictionary key in the store
pub const SYMBOLIC_HOTKEYS_KEY: &str = "AppleSymbolicHotKeys";

/// Key code the store uses for "no key assigned"
pub const UNBOUND_KEY_CODE: i64 = 65535;

/// Owner label given to system records unless configured otherwise
pub const DEFAULT_SYSTEM_OWNER: &str = "System";

/// Known symbolic hotkey action ids
/// Reference: HIToolbox Events.h and the System Settings keyboard pane
const ACTION_LABELS: &[(i64, &str)] = &[
    (12, "Turn Dock Hiding On/Off"),
    (28, "Save Picture of Screen to Clipboard"),
    (29, "Save Picture of Main Window"),
    (30, "Copy Picture of Main Window to Clipboard"),
    (31, "Save Picture of Selected Area"),
    (32, "Mission Control"),
    (33, "Application Windows"),
    (34, "Show Desktop"),
    (35, "Dashboard"),
    (57, "Services Menu"),
    (60, "Input Menu"),
    (61, "Show Help Menu"),
    (64, "Show Spotlight Search"),
    (65, "Show Spotlight Window"),
    (79, "Select Previous Input Source"),
    (80, "Select Next Input Source"),
    (81, "Select Previous Input Source (Alternate)"),
    (82, "Select Next Input Source (Alternate)"),
    (175, "Save Picture of Screen"),
];

/// Human label for an action id; unknown ids get a synthetic label
pub fn action_label(action_id: i64) -> String {
    ACTION_LABELS
        .iter()
        .find(|(id, _)| *id == action_id)
        .map(|(_, label)| (*label).to_string())
        .unwrap_or_else(|| format!("System Action (ID: {})", action_id))
}

/// Reads the persisted symbolic hotkey configuration
#[derive(Debug, Clone)]
pub struct SystemHotkeyRegistry {
    path: PathBuf,
    owner_label: String,
}

impl SystemHotkeyRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            owner_label: DEFAULT_SYSTEM_OWNER.to_string(),
        }
    }

    /// Registry at the standard per-user location, if a home directory exists
    pub fn at_default_location() -> Option<Self> {
        crate::platform::default_hotkey_store_path().map(Self::new)
    }

    pub fn with_owner_label(mut self, owner_label: impl Into<String>) -> Self {
        self.owner_label = owner_label.into();
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Scan the store. A missing or unreadable store yields no records.
    pub fn scan(&self) -> Vec<ShortcutRecord> {
        match self.load() {
            Ok(records) => {
                info!(
                    "[Registry] {} system shortcuts from {}",
                    records.len(),
                    self.path.display()
                );
                records
            }
            Err(e) => {
                warn!(
                    "[Registry] Could not read system hotkeys at {}: {}",
                    self.path.display(),
                    e
                );
                Vec::new()
            }
        }
    }

    /// Read and decode the store, reporting why it failed
    pub fn load(&self) -> Result<Vec<ShortcutRecord>, DetectorError> {
        if !self.path.exists() {
            return Err(DetectorError::data_unavailable(
                "hotkey store",
                format!("{} does not exist", self.path.display()),
            ));
        }

        let data = std::fs::read(&self.path)?;
        let root = plist::Value::from_reader(Cursor::new(data))?;
        self.records_from_value(&root)
    }

    /// Decode an already-parsed store
    pub fn records_from_value(
        &self,
        root: &plist::Value,
    ) -> Result<Vec<ShortcutRecord>, DetectorError> {
        let hotkeys = root
            .as_dictionary()
            .and_then(|dict| dict.get(SYMBOLIC_HOTKEYS_KEY))
            .and_then(|value| value.as_dictionary())
            .ok_or_else(|| {
                DetectorError::data_unavailable(
                    "hotkey store",
                    format!("missing {} dictionary", SYMBOLIC_HOTKEYS_KEY),
                )
            })?;

        let mut bound: Vec<(i64, ShortcutRecord)> = Vec::new();

        for (key, entry) in hotkeys.iter() {
            let Ok(action_id) = key.parse::<i64>() else {
                debug!("[Registry] Skipping non-numeric action id '{}'", key);
                continue;
            };

            let Some(parameters) = entry_parameters(entry) else {
                debug!("[Registry] Skipping action {}: malformed parameters", action_id);
                continue;
            };

            let key_code = parameters[1];
            let mask = parameters[2];

            if key_code == UNBOUND_KEY_CODE {
                continue;
            }

            let record = ShortcutRecord::new(
                ShortcutSource::System,
                self.owner_label.clone(),
                action_label(action_id),
                decode_system_store_modifiers(mask),
                key_code_to_symbol(key_code),
            );
            bound.push((action_id, record));
        }

        bound.sort_by_key(|(action_id, _)| *action_id);
        Ok(bound.into_iter().map(|(_, record)| record).collect())
    }
}

/// `value.parameters` as integers, when there are at least three of them
fn entry_parameters(entry: &plist::Value) -> Option<Vec<i64>> {
    let parameters = entry
        .as_dictionary()?
        .get("value")?
        .as_dictionary()?
        .get("parameters")?
        .as_array()?;

    let integers: Vec<i64> = parameters
        .iter()
        .map(|value| value.as_signed_integer())
        .collect::<Option<Vec<_>>>()?;

    (integers.len() >= 3).then_some(integers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::modifiers::ModifierSet;
    use std::io::Write;

    fn entry(parameters: &[i64]) -> String {
        let ints: String = parameters
            .iter()
            .map(|p| format!("<integer>{}</integer>", p))
            .collect();
        format!(
            "<dict><key>enabled</key><true/><key>value</key><dict>\
             <key>parameters</key><array>{}</array>\
             <key>type</key><string>standard</string></dict></dict>",
            ints
        )
    }

    fn store_xml(entries: &[(&str, String)]) -> String {
        let body: String = entries
            .iter()
            .map(|(id, value)| format!("<key>{}</key>{}", id, value))
            .collect();
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0"><dict><key>AppleSymbolicHotKeys</key><dict>{}</dict></dict></plist>"#,
            body
        )
    }

    fn write_store(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn spotlight_entry_decodes() {
        let file = write_store(&store_xml(&[("64", entry(&[1, 49, 1_048_576]))]));
        let records = SystemHotkeyRegistry::new(file.path()).scan();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.source, ShortcutSource::System);
        assert_eq!(record.owner_name, DEFAULT_SYSTEM_OWNER);
        assert_eq!(record.label, "Show Spotlight Search");
        assert_eq!(record.modifiers, ModifierSet::COMMAND);
        assert_eq!(record.key, "Space");
    }

    #[test]
    fn unbound_entries_are_skipped_for_any_action() {
        let file = write_store(&store_xml(&[
            ("64", entry(&[65535, 65535, 0])),
            ("32", entry(&[7, 65535, 1_048_576])),
            ("9999", entry(&[0, 65535, 786_432])),
            ("33", entry(&[65535, 125, 262_144])),
        ]));
        let records = SystemHotkeyRegistry::new(file.path()).scan();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label, "Application Windows");
        assert_eq!(records[0].display_shortcut(), "⌃↓");
    }

    #[test]
    fn unknown_actions_get_synthetic_labels() {
        let file = write_store(&store_xml(&[("4242", entry(&[0, 0, 786_432]))]));
        let records = SystemHotkeyRegistry::new(file.path()).scan();

        assert_eq!(records[0].label, "System Action (ID: 4242)");
        assert_eq!(records[0].display_shortcut(), "⌃⌥A");
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let file = write_store(&store_xml(&[
            ("60", entry(&[32, 49])),
            ("61", "<dict><key>enabled</key><false/></dict>".to_string()),
            ("abc", entry(&[0, 1, 0])),
            ("118", entry(&[65535, 18, 262_144])),
        ]));
        let records = SystemHotkeyRegistry::new(file.path()).scan();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].label, "System Action (ID: 118)");
        assert_eq!(records[0].key, "1");
    }

    #[test]
    fn records_are_sorted_by_action_id() {
        let file = write_store(&store_xml(&[
            ("175", entry(&[0, 20, 1_179_648])),
            ("12", entry(&[100, 2, 1_572_864])),
        ]));
        let records = SystemHotkeyRegistry::new(file.path()).scan();
        let labels: Vec<_> = records.iter().map(|r| r.label.as_str()).collect();
        assert_eq!(labels, vec!["Turn Dock Hiding On/Off", "Save Picture of Screen"]);
        assert_eq!(records[0].display_shortcut(), "⌥⌘D");
        assert_eq!(records[1].display_shortcut(), "⇧⌘3");
    }

    #[test]
    fn missing_file_is_soft_failure() {
        let dir = tempfile::tempdir().unwrap();
        let registry = SystemHotkeyRegistry::new(dir.path().join("absent.plist"));

        assert!(registry.scan().is_empty());
        assert!(matches!(
            registry.load(),
            Err(DetectorError::DataUnavailable { .. })
        ));
    }

    #[test]
    fn corrupt_file_is_soft_failure() {
        let file = write_store("this is not a property list");
        let registry = SystemHotkeyRegistry::new(file.path());
        assert!(registry.scan().is_empty());
        assert!(registry.load().is_err());
    }

    #[test]
    fn missing_hotkey_dictionary_is_soft_failure() {
        let file = write_store(
            r#"<?xml version="1.0" encoding="UTF-8"?><plist version="1.0"><dict><key>Other</key><string>x</string></dict></plist>"#,
        );
        assert!(SystemHotkeyRegistry::new(file.path()).scan().is_empty());
    }

    #[test]
    fn custom_owner_label() {
        let file = write_store(&store_xml(&[("64", entry(&[1, 49, 1_048_576]))]));
        let records = SystemHotkeyRegistry::new(file.path())
            .with_owner_label("macOS")
            .scan();
        assert_eq!(records[0].owner_name, "macOS");
    }
}
