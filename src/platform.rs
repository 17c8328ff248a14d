use serde::Serialize;
use std::path::PathBuf;

/// File name of the per-user symbolic hotkey store
pub const HOTKEY_STORE_FILE: &str = "com.apple.symbolichotkeys.plist";

#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub os: String,
    pub arch: String,
    pub pid: u32,
    pub hotkey_store: Option<PathBuf>,
    pub accessibility_supported: bool,
}

/// Get platform name
pub fn get_platform_name() -> &'static str {
    #[cfg(target_os = "windows")]
    return "windows";

    #[cfg(target_os = "macos")]
    return "macos";

    #[cfg(target_os = "linux")]
    return "linux";

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    return "unknown";
}

/// Whether menu walking and the key tap are available on this platform
pub fn accessibility_supported() -> bool {
    cfg!(target_os = "macos")
}

/// `~/Library/Preferences/com.apple.symbolichotkeys.plist`
pub fn default_hotkey_store_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| {
        home.join("Library")
            .join("Preferences")
            .join(HOTKEY_STORE_FILE)
    })
}

/// Get system information
pub fn get_system_info() -> SystemInfo {
    SystemInfo {
        os: get_platform_name().to_string(),
        arch: std::env::consts::ARCH.to_string(),
        pid: std::process::id(),
        hotkey_store: default_hotkey_store_path(),
        accessibility_supported: accessibility_supported(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_detection() {
        let platform = get_platform_name();
        assert!(["windows", "macos", "linux", "unknown"].contains(&platform));
    }

    #[test]
    fn test_hotkey_store_path() {
        if let Some(path) = default_hotkey_store_path() {
            assert!(path.ends_with("Library/Preferences/com.apple.symbolichotkeys.plist"));
        }
    }

    #[test]
    fn test_system_info() {
        let info = get_system_info();
        assert!(!info.os.is_empty());
        assert!(!info.arch.is_empty());
        assert_eq!(info.pid, std::process::id());
    }
}
