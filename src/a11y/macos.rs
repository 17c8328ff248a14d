/*!
 * macOS Accessibility Adapter
 *
 * `AXUIElement` handles wrapped in core-foundation types so retain/release
 * is automatic. Only the two AX calls the walker needs are bound.
 */

use std::ffi::c_void;

use core_foundation::array::{CFArrayGetCount, CFArrayGetTypeID, CFArrayGetValueAtIndex, CFArrayRef};
use core_foundation::base::{CFGetTypeID, CFType, CFTypeRef, TCFType};
use core_foundation::boolean::CFBoolean;
use core_foundation::number::CFNumber;
use core_foundation::string::{CFString, CFStringRef};
use tracing::debug;

use super::{AccessibilityElement, AttributeValue, AX_CHILDREN, AX_MENU_BAR, AX_ROLE};

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXUIElementCreateApplication(pid: i32) -> *const c_void;
    fn AXUIElementCopyAttributeValue(
        element: *const c_void,
        attribute: CFStringRef,
        value: *mut CFTypeRef,
    ) -> i32;
}

const AX_ERROR_SUCCESS: i32 = 0;
const AX_ERROR_ATTRIBUTE_UNSUPPORTED: i32 = -25205;
const AX_ERROR_NO_VALUE: i32 = -25212;

/// One live accessibility element
#[derive(Clone)]
pub struct AxElement(CFType);

impl AxElement {
    /// Top-level element for a running process
    pub fn application(pid: i32) -> Option<Self> {
        let raw = unsafe { AXUIElementCreateApplication(pid) };
        if raw.is_null() {
            return None;
        }
        Some(Self(unsafe { CFType::wrap_under_create_rule(raw) }))
    }

    /// The process's `AXMenuBar`, if it exposes one
    pub fn application_menu_bar(pid: i32) -> Option<Self> {
        let app = Self::application(pid)?;
        match app.copy_attribute(AX_MENU_BAR) {
            Ok(Some(menu_bar)) => Some(Self(menu_bar)),
            Ok(None) => None,
            Err(code) => {
                debug!("[AX] pid {}: menu bar unavailable (AXError {})", pid, code);
                None
            }
        }
    }

    /// `Ok(None)` when the attribute is absent, `Err` for any other AX failure
    fn copy_attribute(&self, name: &str) -> Result<Option<CFType>, i32> {
        let attribute = CFString::new(name);
        let mut value: CFTypeRef = std::ptr::null();

        let code = unsafe {
            AXUIElementCopyAttributeValue(
                self.0.as_CFTypeRef(),
                attribute.as_concrete_TypeRef(),
                &mut value,
            )
        };

        match code {
            AX_ERROR_SUCCESS if !value.is_null() => {
                Ok(Some(unsafe { CFType::wrap_under_create_rule(value) }))
            }
            AX_ERROR_SUCCESS | AX_ERROR_NO_VALUE | AX_ERROR_ATTRIBUTE_UNSUPPORTED => Ok(None),
            other => Err(other),
        }
    }
}

impl AccessibilityElement for AxElement {
    fn role(&self) -> Option<String> {
        let value = self.copy_attribute(AX_ROLE).ok().flatten()?;
        value.downcast::<CFString>().map(|role| role.to_string())
    }

    fn children(&self) -> Option<Vec<Self>> {
        let value = match self.copy_attribute(AX_CHILDREN) {
            Ok(Some(value)) => value,
            // Leaves report no children attribute at all
            Ok(None) => return Some(Vec::new()),
            Err(_) => return None,
        };

        let raw = value.as_CFTypeRef();
        if unsafe { CFGetTypeID(raw) != CFArrayGetTypeID() } {
            return None;
        }

        let array = raw as CFArrayRef;
        let count = unsafe { CFArrayGetCount(array) };
        let mut children = Vec::with_capacity(count.max(0) as usize);
        for index in 0..count {
            let child = unsafe { CFArrayGetValueAtIndex(array, index) };
            if !child.is_null() {
                children.push(Self(unsafe { CFType::wrap_under_get_rule(child) }));
            }
        }
        Some(children)
    }

    fn attribute(&self, name: &str) -> Option<AttributeValue> {
        let value = self.copy_attribute(name).ok().flatten()?;

        if let Some(text) = value.downcast::<CFString>() {
            return Some(AttributeValue::Text(text.to_string()));
        }
        if let Some(number) = value.downcast::<CFNumber>() {
            return Some(
                number
                    .to_i64()
                    .map(AttributeValue::Integer)
                    .unwrap_or(AttributeValue::Unsupported),
            );
        }
        if let Some(flag) = value.downcast::<CFBoolean>() {
            return Some(AttributeValue::Boolean(flag.into()));
        }
        Some(AttributeValue::Unsupported)
    }
}
