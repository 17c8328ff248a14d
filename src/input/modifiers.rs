//! Modifier bitmask decoding.
//!
//! Three sources report modifiers, each with its own bit layout:
//!
//! - `AXMenuItemCmdModifiers` on menu items (Command is implied unless bit 0x08 is set)
//! - the `parameters[2]` mask in `com.apple.symbolichotkeys.plist`
//! - `CGEventFlags` on live key events
//!
//! A mask decoded with the wrong function still yields a plausible-looking set,
//! so each layout gets its own named entry point and they are never mixed.

use bitflags::bitflags;
use serde::ser::{Serialize, SerializeSeq, Serializer};

bitflags! {
    /// Normalized modifier set. Bit order is the canonical display order:
    /// Control, Option, Shift, Command.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ModifierSet: u8 {
        /// Control key (⌃)
        const CONTROL = 1 << 0;
        /// Option/Alt key (⌥)
        const OPTION = 1 << 1;
        /// Shift key (⇧)
        const SHIFT = 1 << 2;
        /// Command key (⌘)
        const COMMAND = 1 << 3;
    }
}

const ORDERED: [(ModifierSet, char, &str); 4] = [
    (ModifierSet::CONTROL, '⌃', "control"),
    (ModifierSet::OPTION, '⌥', "option"),
    (ModifierSet::SHIFT, '⇧', "shift"),
    (ModifierSet::COMMAND, '⌘', "command"),
];

impl ModifierSet {
    /// Glyphs in canonical order, e.g. "⌃⌥⇧⌘"
    pub fn glyphs(&self) -> String {
        ORDERED
            .iter()
            .filter(|(flag, _, _)| self.contains(*flag))
            .map(|(_, glyph, _)| *glyph)
            .collect()
    }

    /// Lowercase names in canonical order
    pub fn names(&self) -> Vec<&'static str> {
        ORDERED
            .iter()
            .filter(|(flag, _, _)| self.contains(*flag))
            .map(|(_, _, name)| *name)
            .collect()
    }

    /// Modifier for a glyph or a common name (ctrl, alt, opt, cmd, super, ...)
    pub fn from_alias(alias: &str) -> Option<Self> {
        match alias.to_lowercase().as_str() {
            "⌃" | "ctrl" | "control" => Some(Self::CONTROL),
            "⌥" | "alt" | "opt" | "option" => Some(Self::OPTION),
            "⇧" | "shift" => Some(Self::SHIFT),
            "⌘" | "cmd" | "command" | "super" | "meta" => Some(Self::COMMAND),
            _ => None,
        }
    }
}

impl Serialize for ModifierSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let names = self.names();
        let mut seq = serializer.serialize_seq(Some(names.len()))?;
        for name in names {
            seq.serialize_element(name)?;
        }
        seq.end()
    }
}

/// `AXMenuItemCmdModifiers` bits (Carbon menu glyph modifiers)
pub mod accessibility {
    pub const SHIFT: i64 = 0x01;
    pub const OPTION: i64 = 0x02;
    pub const CONTROL: i64 = 0x04;
    /// kMenuNoCommandModifier: set when the item has no Command key
    pub const NO_COMMAND: i64 = 0x08;
}

/// Modifier bits stored in the symbolic hotkey plist
pub mod system_store {
    pub const SHIFT: i64 = 131_072;
    pub const CONTROL: i64 = 262_144;
    pub const OPTION: i64 = 524_288;
    pub const COMMAND: i64 = 1_048_576;
}

/// `CGEventFlags` device-independent modifier bits
pub mod event_flags {
    pub const SHIFT: u64 = 0x0002_0000;
    pub const CONTROL: u64 = 0x0004_0000;
    pub const ALTERNATE: u64 = 0x0008_0000;
    pub const COMMAND: u64 = 0x0010_0000;
}

/// Decode a menu item's `AXMenuItemCmdModifiers` mask.
///
/// Command is present by default and only bit 0x08 removes it, so a mask of 0
/// means "⌘ only" and 0x08 alone means "no modifiers".
pub fn decode_accessibility_modifiers(mask: i64) -> ModifierSet {
    let mut set = ModifierSet::empty();
    if mask & accessibility::CONTROL != 0 {
        set |= ModifierSet::CONTROL;
    }
    if mask & accessibility::OPTION != 0 {
        set |= ModifierSet::OPTION;
    }
    if mask & accessibility::SHIFT != 0 {
        set |= ModifierSet::SHIFT;
    }
    if mask & accessibility::NO_COMMAND == 0 {
        set |= ModifierSet::COMMAND;
    }
    set
}

/// Decode the modifier mask of a symbolic hotkey store entry
pub fn decode_system_store_modifiers(mask: i64) -> ModifierSet {
    let mut set = ModifierSet::empty();
    if mask & system_store::CONTROL != 0 {
        set |= ModifierSet::CONTROL;
    }
    if mask & system_store::OPTION != 0 {
        set |= ModifierSet::OPTION;
    }
    if mask & system_store::SHIFT != 0 {
        set |= ModifierSet::SHIFT;
    }
    if mask & system_store::COMMAND != 0 {
        set |= ModifierSet::COMMAND;
    }
    set
}

/// Decode the flags of a live key event
pub fn decode_live_event_flags(flags: u64) -> ModifierSet {
    let mut set = ModifierSet::empty();
    if flags & event_flags::CONTROL != 0 {
        set |= ModifierSet::CONTROL;
    }
    if flags & event_flags::ALTERNATE != 0 {
        set |= ModifierSet::OPTION;
    }
    if flags & event_flags::SHIFT != 0 {
        set |= ModifierSet::SHIFT;
    }
    if flags & event_flags::COMMAND != 0 {
        set |= ModifierSet::COMMAND;
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessibility_no_command_bit_suppresses_command() {
        assert_eq!(decode_accessibility_modifiers(0x08), ModifierSet::empty());
        assert_eq!(decode_accessibility_modifiers(0x00), ModifierSet::COMMAND);
    }

    #[test]
    fn accessibility_bits_add_to_implied_command() {
        assert_eq!(
            decode_accessibility_modifiers(0x04),
            ModifierSet::CONTROL | ModifierSet::COMMAND
        );
        assert_eq!(
            decode_accessibility_modifiers(0x05),
            ModifierSet::CONTROL | ModifierSet::SHIFT | ModifierSet::COMMAND
        );
        assert_eq!(
            decode_accessibility_modifiers(0x0F),
            ModifierSet::CONTROL | ModifierSet::OPTION | ModifierSet::SHIFT
        );
    }

    #[test]
    fn system_store_masks() {
        assert_eq!(decode_system_store_modifiers(1_048_576), ModifierSet::COMMAND);
        assert_eq!(
            decode_system_store_modifiers(786_432),
            ModifierSet::CONTROL | ModifierSet::OPTION
        );
        assert_eq!(decode_system_store_modifiers(0), ModifierSet::empty());
        // caps lock (1 << 16) is not a modifier we report
        assert_eq!(decode_system_store_modifiers(65_536), ModifierSet::empty());
    }

    #[test]
    fn encodings_disagree_on_the_same_mask() {
        // 0 means "Command" to a menu item and "nothing" to the hotkey store
        assert_ne!(
            decode_accessibility_modifiers(0),
            decode_system_store_modifiers(0)
        );
    }

    #[test]
    fn live_flags_ignore_non_modifier_bits() {
        let caps_lock_and_fn = 0x0001_0000 | 0x0080_0000;
        assert_eq!(decode_live_event_flags(caps_lock_and_fn), ModifierSet::empty());
        assert_eq!(
            decode_live_event_flags(event_flags::CONTROL | event_flags::COMMAND | 0x100),
            ModifierSet::CONTROL | ModifierSet::COMMAND
        );
    }

    #[test]
    fn glyphs_use_canonical_order() {
        let all = ModifierSet::all();
        assert_eq!(all.glyphs(), "⌃⌥⇧⌘");
        assert_eq!((ModifierSet::COMMAND | ModifierSet::SHIFT).glyphs(), "⇧⌘");
        assert_eq!(ModifierSet::empty().glyphs(), "");
    }

    #[test]
    fn serializes_as_ordered_names() {
        let set = ModifierSet::COMMAND | ModifierSet::CONTROL;
        assert_eq!(
            serde_json::to_string(&set).unwrap(),
            r#"["control","command"]"#
        );
    }

    #[test]
    fn aliases() {
        assert_eq!(ModifierSet::from_alias("Ctrl"), Some(ModifierSet::CONTROL));
        assert_eq!(ModifierSet::from_alias("⌥"), Some(ModifierSet::OPTION));
        assert_eq!(ModifierSet::from_alias("cmd"), Some(ModifierSet::COMMAND));
        assert_eq!(ModifierSet::from_alias("hyper"), None);
    }
}
