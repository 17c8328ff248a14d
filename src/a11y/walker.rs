/*!
 * Application Menu Walker
 *
 * Walks an application's menu bar element tree and extracts every menu item
 * that carries a keyboard shortcut.
 */

use serde::Serialize;
use tracing::debug;

use super::{
    AccessibilityElement, AX_MENU_ITEM_CMD_CHAR, AX_MENU_ITEM_CMD_MODIFIERS, AX_ROLE_MENU_ITEM,
    AX_TITLE,
};
use crate::input::macos_keys::command_char_symbol;
use crate::input::modifiers::decode_accessibility_modifiers;
use crate::shortcut::{ShortcutRecord, ShortcutSource};

/// Label used when a shortcut-bearing item has no readable title
pub const UNKNOWN_MENU_ITEM: &str = "Unknown Menu Item";

/// Counters for one walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    pub visited: usize,
    pub menu_items: usize,
    pub records: usize,
    pub inaccessible_subtrees: usize,
}

impl WalkStats {
    pub fn merge(&mut self, other: &WalkStats) {
        self.visited += other.visited;
        self.menu_items += other.menu_items;
        self.records += other.records;
        self.inaccessible_subtrees += other.inaccessible_subtrees;
    }
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationMenuWalker;

impl ApplicationMenuWalker {
    pub fn new() -> Self {
        Self
    }

    /// Extract shortcut records from everything below `root`
    pub fn walk<E: AccessibilityElement>(&self, root: &E, owner_name: &str) -> Vec<ShortcutRecord> {
        self.walk_with_stats(root, owner_name).0
    }

    /// Walk the tree depth-first, in document order.
    ///
    /// Uses an explicit stack: menus nest arbitrarily deep and some apps
    /// expose thousands of items. A subtree whose children cannot be read is
    /// counted and skipped; nothing here fails.
    pub fn walk_with_stats<E: AccessibilityElement>(
        &self,
        root: &E,
        owner_name: &str,
    ) -> (Vec<ShortcutRecord>, WalkStats) {
        let mut records = Vec::new();
        let mut stats = WalkStats::default();

        let mut stack: Vec<E> = match root.children() {
            Some(mut children) => {
                children.reverse();
                children
            }
            None => {
                stats.inaccessible_subtrees += 1;
                debug!("[Walker] {}: menu bar children unavailable", owner_name);
                return (records, stats);
            }
        };

        while let Some(element) = stack.pop() {
            stats.visited += 1;

            if element.role().as_deref() == Some(AX_ROLE_MENU_ITEM) {
                stats.menu_items += 1;
                if let Some(record) = self.read_menu_item(&element, owner_name) {
                    records.push(record);
                }
            }

            // Submenus hang off items whether or not the item has a shortcut
            match element.children() {
                Some(children) => stack.extend(children.into_iter().rev()),
                None => stats.inaccessible_subtrees += 1,
            }
        }

        stats.records = records.len();
        debug!(
            "[Walker] {}: {} shortcuts from {} menu items ({} nodes, {} inaccessible)",
            owner_name, stats.records, stats.menu_items, stats.visited, stats.inaccessible_subtrees
        );
        (records, stats)
    }

    /// Build a record if the item has a usable command character and modifier mask
    fn read_menu_item<E: AccessibilityElement>(
        &self,
        element: &E,
        owner_name: &str,
    ) -> Option<ShortcutRecord> {
        let char_value = element.attribute(AX_MENU_ITEM_CMD_CHAR)?;
        let command_char = char_value.as_text().filter(|c| !c.is_empty())?;
        let mask = element.attribute(AX_MENU_ITEM_CMD_MODIFIERS)?.as_integer()?;

        let title = element
            .attribute(AX_TITLE)
            .and_then(|value| value.as_text().map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_MENU_ITEM.to_string());

        Some(ShortcutRecord::new(
            ShortcutSource::Application,
            owner_name,
            title,
            decode_accessibility_modifiers(mask),
            command_char_symbol(command_char),
        ))
    }
}
