/// macOS virtual key codes and the glyphs shown for them
/// Reference: https://developer.apple.com/documentation/coregraphics/cgkeycode

/// Physical key code to display symbol. Order follows the ANSI key code values.
const KEY_CODE_TABLE: &[(u16, &str)] = &[
    // Letters, digits and punctuation
    (0x00, "A"),
    (0x01, "S"),
    (0x02, "D"),
    (0x03, "F"),
    (0x04, "H"),
    (0x05, "G"),
    (0x06, "Z"),
    (0x07, "X"),
    (0x08, "C"),
    (0x09, "V"),
    (0x0B, "B"),
    (0x0C, "Q"),
    (0x0D, "W"),
    (0x0E, "E"),
    (0x0F, "R"),
    (0x10, "Y"),
    (0x11, "T"),
    (0x12, "1"),
    (0x13, "2"),
    (0x14, "3"),
    (0x15, "4"),
    (0x16, "6"),
    (0x17, "5"),
    (0x18, "="),
    (0x19, "9"),
    (0x1A, "7"),
    (0x1B, "-"),
    (0x1C, "8"),
    (0x1D, "0"),
    (0x1E, "]"),
    (0x1F, "O"),
    (0x20, "U"),
    (0x21, "["),
    (0x22, "I"),
    (0x23, "P"),
    (0x24, "↩"),
    (0x25, "L"),
    (0x26, "J"),
    (0x27, "'"),
    (0x28, "K"),
    (0x29, ";"),
    (0x2A, "\\"),
    (0x2B, ","),
    (0x2C, "/"),
    (0x2D, "N"),
    (0x2E, "M"),
    (0x2F, "."),
    // Special keys
    (0x30, "⇥"),
    (0x31, "Space"),
    (0x32, "`"),
    (0x33, "⌫"),
    (0x35, "⎋"),
    // Function keys
    (0x60, "F5"),
    (0x61, "F6"),
    (0x62, "F7"),
    (0x63, "F3"),
    (0x64, "F8"),
    (0x65, "F9"),
    (0x67, "F11"),
    (0x69, "F13"),
    (0x6B, "F14"),
    (0x6D, "F10"),
    (0x6F, "F12"),
    (0x71, "F15"),
    (0x76, "F4"),
    (0x78, "F2"),
    (0x7A, "F1"),
    // Arrow keys
    (0x7B, "←"),
    (0x7C, "→"),
    (0x7D, "↓"),
    (0x7E, "↑"),
];

/// Map a physical key code to its display symbol.
///
/// Never fails: codes outside the table (including negative or out-of-range
/// values from a corrupt store) come back as `Key<N>`.
pub fn key_code_to_symbol(key_code: i64) -> String {
    KEY_CODE_TABLE
        .iter()
        .find(|(code, _)| i64::from(*code) == key_code)
        .map(|(_, symbol)| (*symbol).to_string())
        .unwrap_or_else(|| format!("Key{}", key_code))
}

/// Reverse lookup: display symbol back to the physical key code
pub fn symbol_to_key_code(symbol: &str) -> Option<u16> {
    KEY_CODE_TABLE
        .iter()
        .find(|(_, s)| s.eq_ignore_ascii_case(symbol))
        .map(|(code, _)| *code)
}

/// Number of physical keys the table knows about
pub fn known_key_count() -> usize {
    KEY_CODE_TABLE.len()
}

// NSEvent function-key range for menu command characters
const NS_UP_ARROW: u32 = 0xF700;
const NS_DOWN_ARROW: u32 = 0xF701;
const NS_LEFT_ARROW: u32 = 0xF702;
const NS_RIGHT_ARROW: u32 = 0xF703;
const NS_F1: u32 = 0xF704;
const NS_F12: u32 = 0xF70F;
const NS_F13: u32 = 0xF710;
const NS_F35: u32 = 0xF726;
const NS_DELETE_FUNCTION: u32 = 0xF728;
const NS_CLEAR_LINE: u32 = 0xF739;

/// Symbol for a menu command character that does not print as itself.
///
/// Menu items report function, arrow and control keys as private-use scalars
/// rather than key codes. Returns `None` for ordinary characters.
pub fn special_scalar_symbol(scalar: char) -> Option<String> {
    let value = scalar as u32;

    if (NS_F1..=NS_F12).contains(&value) {
        return Some(format!("F{}", value - NS_F1 + 1));
    }
    if (NS_F13..=NS_F35).contains(&value) {
        return Some(format!("F{}", value - NS_F13 + 13));
    }

    let symbol = match value {
        NS_UP_ARROW => "↑",
        NS_DOWN_ARROW => "↓",
        NS_LEFT_ARROW => "←",
        NS_RIGHT_ARROW => "→",
        NS_DELETE_FUNCTION => "⌦",
        NS_CLEAR_LINE => "⌫",
        0x1B => "⎋",
        0x09 => "⇥",
        0x0D | 0x03 => "↩",
        0x20 => "Space",
        _ => return None,
    };
    Some(symbol.to_string())
}

/// Normalize an `AXMenuItemCmdChar` value into a key symbol
pub fn command_char_symbol(command_char: &str) -> String {
    match command_char.chars().next().and_then(special_scalar_symbol) {
        Some(symbol) => symbol,
        None => command_char.to_uppercase(),
    }
}
