/// Key codes, modifier encodings and the live key-down observer

pub mod macos_keys;
pub mod modifiers;
pub mod observer;

// macOS event tap and permission check
#[cfg(target_os = "macos")]
pub mod macos_tap;

pub use macos_keys::{command_char_symbol, key_code_to_symbol, symbol_to_key_code};
pub use modifiers::{
    decode_accessibility_modifiers, decode_live_event_flags, decode_system_store_modifiers,
    ModifierSet,
};
pub use observer::{AccessibilityTrust, KeyDownSink, KeyEventTap, LiveKeyObserver, ObserverState};

#[cfg(target_os = "macos")]
pub use macos_tap::{CgKeyTap, MacAccessibilityTrust};
