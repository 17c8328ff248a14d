//! In-memory accessibility tree.
//!
//! Stands in for a live application in tests and lets callers replay a
//! captured menu structure without AX access.

use std::collections::HashMap;
use std::sync::Arc;

use super::{
    AccessibilityElement, AttributeValue, AX_MENU_ITEM_CMD_CHAR, AX_MENU_ITEM_CMD_MODIFIERS,
    AX_ROLE_MENU, AX_ROLE_MENU_BAR, AX_ROLE_MENU_BAR_ITEM, AX_ROLE_MENU_ITEM, AX_TITLE,
};

#[derive(Debug, Default)]
struct Node {
    role: Option<String>,
    attributes: HashMap<String, AttributeValue>,
    /// `None` simulates a subtree the process may not inspect
    children: Option<Vec<SyntheticElement>>,
}

/// Cheaply clonable handle to a synthetic node
#[derive(Debug, Clone)]
pub struct SyntheticElement(Arc<Node>);

impl SyntheticElement {
    pub fn builder(role: &str) -> SyntheticElementBuilder {
        SyntheticElementBuilder {
            node: Node {
                role: Some(role.to_string()),
                attributes: HashMap::new(),
                children: Some(Vec::new()),
            },
        }
    }

    /// Menu bar root with the given top-level items
    pub fn menu_bar(items: Vec<SyntheticElement>) -> Self {
        Self::builder(AX_ROLE_MENU_BAR).children(items).build()
    }

    /// Menu bar item ("File", "Edit") holding one menu
    pub fn menu_bar_item(title: &str, items: Vec<SyntheticElement>) -> Self {
        let menu = Self::builder(AX_ROLE_MENU).children(items).build();
        Self::builder(AX_ROLE_MENU_BAR_ITEM)
            .text(AX_TITLE, title)
            .child(menu)
            .build()
    }

    /// Menu item with a shortcut
    pub fn shortcut_item(title: &str, command_char: &str, modifiers: i64) -> Self {
        Self::builder(AX_ROLE_MENU_ITEM)
            .text(AX_TITLE, title)
            .text(AX_MENU_ITEM_CMD_CHAR, command_char)
            .integer(AX_MENU_ITEM_CMD_MODIFIERS, modifiers)
            .build()
    }

    /// Menu item without a shortcut
    pub fn plain_item(title: &str) -> Self {
        Self::builder(AX_ROLE_MENU_ITEM).text(AX_TITLE, title).build()
    }

    /// Menu item opening a submenu
    pub fn submenu(title: &str, items: Vec<SyntheticElement>) -> Self {
        let menu = Self::builder(AX_ROLE_MENU).children(items).build();
        Self::builder(AX_ROLE_MENU_ITEM)
            .text(AX_TITLE, title)
            .child(menu)
            .build()
    }
}

impl AccessibilityElement for SyntheticElement {
    fn role(&self) -> Option<String> {
        self.0.role.clone()
    }

    fn children(&self) -> Option<Vec<Self>> {
        self.0.children.clone()
    }

    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        self.0.attributes.get(name).cloned()
    }
}

pub struct SyntheticElementBuilder {
    node: Node,
}

impl SyntheticElementBuilder {
    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.node
            .attributes
            .insert(name.to_string(), AttributeValue::Text(value.to_string()));
        self
    }

    pub fn integer(mut self, name: &str, value: i64) -> Self {
        self.node
            .attributes
            .insert(name.to_string(), AttributeValue::Integer(value));
        self
    }

    pub fn attribute(mut self, name: &str, value: AttributeValue) -> Self {
        self.node.attributes.insert(name.to_string(), value);
        self
    }

    pub fn child(mut self, child: SyntheticElement) -> Self {
        self.node.children.get_or_insert_with(Vec::new).push(child);
        self
    }

    pub fn children(mut self, children: Vec<SyntheticElement>) -> Self {
        self.node
            .children
            .get_or_insert_with(Vec::new)
            .extend(children);
        self
    }

    /// Make the children query fail, as AX does for protected subtrees
    pub fn inaccessible(mut self) -> Self {
        self.node.children = None;
        self
    }

    /// Drop the role attribute entirely
    pub fn without_role(mut self) -> Self {
        self.node.role = None;
        self
    }

    pub fn build(self) -> SyntheticElement {
        SyntheticElement(Arc::new(self.node))
    }
}
