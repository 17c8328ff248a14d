/*!
 * Shortcut Normalizer
 *
 * Converts user-typed shortcut strings into the normalized form used by the
 * catalog, so "Ctrl+Cmd+A", "<Control><Command>a" and "⌃⌘A" all compare equal.
 */

use tracing::debug;

use crate::input::macos_keys::symbol_to_key_code;
use crate::input::modifiers::ModifierSet;
use crate::shortcut::Shortcut;

const MODIFIER_GLYPHS: [char; 4] = ['⌃', '⌥', '⇧', '⌘'];

pub struct ShortcutNormalizer;

impl ShortcutNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Parse a shortcut string
    ///
    /// Examples:
    /// - "⌘C" → {Command} + "C"
    /// - "Ctrl+L" → {Control} + "L"
    /// - "<Control>l" → {Control} + "L"
    /// - "cmd+shift+space" → {Shift, Command} + "Space"
    ///
    /// Returns `None` when no key is left after the modifiers.
    pub fn parse(&self, shortcut: &str) -> Option<Shortcut> {
        let trimmed = shortcut.trim();
        if trimmed.is_empty() {
            return None;
        }

        let mut modifiers = ModifierSet::empty();

        // Leading glyphs: "⌃⌥⇧⌘K"
        let mut rest = trimmed;
        while let Some(first) = rest.chars().next() {
            if !MODIFIER_GLYPHS.contains(&first) {
                break;
            }
            if let Some(flag) = ModifierSet::from_alias(&first.to_string()) {
                modifiers |= flag;
            }
            rest = &rest[first.len_utf8()..];
        }

        // "Cmd++" and "Cmd+-" bind the plus and minus keys themselves
        let (rest, punctuation_key) = match split_punctuation_key(rest) {
            Some((prefix, key)) => (prefix, Some(key)),
            None => (rest, None),
        };

        // Remove angle brackets: <Control>l → Control l
        let clean = rest.replace('<', " ").replace('>', " ");
        let mut parts: Vec<&str> = clean
            .split(&['+', ' ', '-'][..])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();

        // A lone "-" or "+" is the key, not a separator
        if parts.is_empty() && punctuation_key.is_none() {
            let single = rest.trim();
            if single.chars().count() == 1 {
                parts.push(single);
            }
        }

        let key = match punctuation_key {
            Some(key) => Some(key.to_string()),
            None => parts.pop().map(canonical_key),
        };

        for part in parts {
            match ModifierSet::from_alias(part) {
                Some(flag) => modifiers |= flag,
                None => {
                    debug!("Ignoring unknown modifier '{}' in '{}'", part, shortcut);
                }
            }
        }

        let key = key.filter(|k| !k.is_empty())?;
        if symbol_to_key_code(&key).is_none() {
            debug!("'{}' has no physical key code; it can only match menu items", key);
        }

        let normalized = Shortcut::new(modifiers, key);
        debug!("Normalized '{}' → {}", shortcut, normalized);
        Some(normalized)
    }
}

impl Default for ShortcutNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// A trailing `+` or `-` right after a separator is the key, not a separator
fn split_punctuation_key(s: &str) -> Option<(&str, char)> {
    let mut chars = s.chars().rev();
    let key = chars.next().filter(|c| matches!(c, '+' | '-'))?;
    chars.next().filter(|c| matches!(c, '+' | '-' | ' ' | '>'))?;
    Some((&s[..s.len() - 1], key))
}

/// Named key to the symbol the key tables produce
fn canonical_key(token: &str) -> String {
    let lower = token.to_lowercase();
    let named = match lower.as_str() {
        "return" | "enter" => "↩",
        "tab" => "⇥",
        "space" | "spacebar" => "Space",
        "esc" | "escape" => "⎋",
        "delete" | "backspace" | "del" => "⌫",
        "forwarddelete" => "⌦",
        "left" | "leftarrow" => "←",
        "right" | "rightarrow" => "→",
        "up" | "uparrow" => "↑",
        "down" | "downarrow" => "↓",
        "plus" => "+",
        "minus" => "-",
        _ => {
            if let Some(number) = lower.strip_prefix('f').and_then(|n| n.parse::<u8>().ok()) {
                if (1..=35).contains(&number) {
                    return format!("F{}", number);
                }
            }
            return token.to_uppercase();
        }
    };
    named.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> Option<Shortcut> {
        ShortcutNormalizer::new().parse(s)
    }

    #[test]
    fn test_normalize_single() {
        assert_eq!(parse("g"), Some(Shortcut::new(ModifierSet::empty(), "G")));
    }

    #[test]
    fn test_normalize_ctrl_plus() {
        assert_eq!(parse("Ctrl+L"), Some(Shortcut::new(ModifierSet::CONTROL, "L")));
    }

    #[test]
    fn test_normalize_angle_brackets() {
        assert_eq!(parse("<Control>l"), Some(Shortcut::new(ModifierSet::CONTROL, "L")));
    }

    #[test]
    fn test_normalize_multiple_modifiers() {
        let parsed = parse("Cmd+Shift+N").unwrap();
        assert_eq!(parsed.display(), "⇧⌘N");
    }

    #[test]
    fn test_normalize_glyphs() {
        let parsed = parse("⌘⌃a").unwrap();
        assert_eq!(parsed.modifiers, ModifierSet::CONTROL | ModifierSet::COMMAND);
        assert_eq!(parsed.display(), "⌃⌘A");
    }

    #[test]
    fn test_named_keys() {
        assert_eq!(parse("cmd+space").unwrap().display(), "⌘SPACE");
        assert_eq!(parse("ctrl+return").unwrap().key, "↩");
        assert_eq!(parse("opt+f13").unwrap().key, "F13");
        assert_eq!(parse("⌘←").unwrap().key, "←");
    }

    #[test]
    fn test_punctuation_keys() {
        assert_eq!(parse("Cmd++").unwrap().key, "+");
        assert_eq!(parse("⌘-").unwrap().key, "-");
        assert_eq!(parse("⌘,").unwrap().key, ",");

        let zoom_out = parse("cmd+-").unwrap();
        assert_eq!(zoom_out.modifiers, ModifierSet::COMMAND);
        assert_eq!(zoom_out.key, "-");

        let minus = parse("ctrl+shift+-").unwrap();
        assert_eq!(minus.modifiers, ModifierSet::CONTROL | ModifierSet::SHIFT);
        assert_eq!(minus.key, "-");

        let plus = parse("<Control>+").unwrap();
        assert_eq!(plus.modifiers, ModifierSet::CONTROL);
        assert_eq!(plus.key, "+");
    }

    #[test]
    fn test_no_key() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("⌘"), None);
    }

    #[test]
    fn test_matches_catalog_display() {
        let from_user = parse("ctrl+cmd+a").unwrap();
        let from_menu = Shortcut::new(ModifierSet::CONTROL | ModifierSet::COMMAND, "A");
        assert!(from_user.matches(&from_menu));
    }
}
