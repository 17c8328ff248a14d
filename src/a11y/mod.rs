/*!
 * Accessibility Module
 *
 * Walks application menu trees exposed through the accessibility API to
 * extract keyboard shortcuts.
 */

pub mod normalizer;
pub mod synthetic;
pub mod walker;

#[cfg(target_os = "macos")]
pub mod macos;

pub use normalizer::ShortcutNormalizer;
pub use synthetic::SyntheticElement;
pub use walker::{ApplicationMenuWalker, WalkStats};

/// AX attribute names read during a walk
pub const AX_CHILDREN: &str = "AXChildren";
pub const AX_ROLE: &str = "AXRole";
pub const AX_TITLE: &str = "AXTitle";
pub const AX_MENU_BAR: &str = "AXMenuBar";
pub const AX_MENU_ITEM_CMD_CHAR: &str = "AXMenuItemCmdChar";
pub const AX_MENU_ITEM_CMD_MODIFIERS: &str = "AXMenuItemCmdModifiers";

/// AX role values
pub const AX_ROLE_MENU_BAR: &str = "AXMenuBar";
pub const AX_ROLE_MENU_BAR_ITEM: &str = "AXMenuBarItem";
pub const AX_ROLE_MENU: &str = "AXMenu";
pub const AX_ROLE_MENU_ITEM: &str = "AXMenuItem";

/// Typed value of an element attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    /// Present but of a type the walker does not read
    Unsupported,
}

impl AttributeValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttributeValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            AttributeValue::Integer(value) => Some(*value),
            _ => None,
        }
    }
}

/// Read-only view of one node in an application's UI element tree.
///
/// Every query can fail (app busy, permission denied, element gone); failure
/// is reported as `None` and treated as "no data" by callers.
pub trait AccessibilityElement: Sized {
    /// The element's `AXRole`
    fn role(&self) -> Option<String>;

    /// Child elements, or `None` if the subtree could not be read
    fn children(&self) -> Option<Vec<Self>>;

    /// Any other attribute by AX name
    fn attribute(&self, name: &str) -> Option<AttributeValue>;
}
