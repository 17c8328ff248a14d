/*!
 * Running applications via NSWorkspace
 */

use std::ffi::CStr;
use std::os::raw::c_char;

use cocoa::base::{id, nil};
use cocoa::foundation::NSAutoreleasePool;
use objc::{class, msg_send, sel, sel_impl};
use tracing::{debug, warn};

use super::{ActivationPolicy, ApplicationSource, RunningApplication};
use crate::a11y::macos::AxElement;

/// NSApplicationActivationPolicy raw values
const NS_ACTIVATION_POLICY_REGULAR: i64 = 0;
const NS_ACTIVATION_POLICY_ACCESSORY: i64 = 1;

/// Applications from `NSWorkspace.runningApplications`, menus via AX
#[derive(Debug, Clone, Copy, Default)]
pub struct MacApplicationSource;

impl MacApplicationSource {
    pub fn new() -> Self {
        Self
    }
}

impl ApplicationSource for MacApplicationSource {
    type Element = AxElement;

    fn running_applications(&self) -> Vec<RunningApplication> {
        let mut apps = Vec::new();

        unsafe {
            let pool = NSAutoreleasePool::new(nil);

            let workspace: id = msg_send![class!(NSWorkspace), sharedWorkspace];
            if workspace == nil {
                warn!("[Scanner] NSWorkspace unavailable");
                let _: () = msg_send![pool, drain];
                return apps;
            }

            let running: id = msg_send![workspace, runningApplications];
            let count: usize = if running == nil { 0 } else { msg_send![running, count] };

            for index in 0..count {
                let app: id = msg_send![running, objectAtIndex: index];
                if app == nil {
                    continue;
                }

                let pid: i32 = msg_send![app, processIdentifier];
                let policy: i64 = msg_send![app, activationPolicy];
                let name: id = msg_send![app, localizedName];

                apps.push(RunningApplication {
                    pid,
                    name: nsstring_to_string(name),
                    activation_policy: activation_policy(policy),
                });
            }

            let _: () = msg_send![pool, drain];
        }

        debug!("[Scanner] {} running applications", apps.len());
        apps
    }

    fn menu_bar(&self, app: &RunningApplication) -> Option<AxElement> {
        AxElement::application_menu_bar(app.pid)
    }
}

fn activation_policy(raw: i64) -> ActivationPolicy {
    match raw {
        NS_ACTIVATION_POLICY_REGULAR => ActivationPolicy::Regular,
        NS_ACTIVATION_POLICY_ACCESSORY => ActivationPolicy::Accessory,
        _ => ActivationPolicy::Prohibited,
    }
}

unsafe fn nsstring_to_string(nsstring: id) -> Option<String> {
    if nsstring == nil {
        return None;
    }
    let utf8: *const c_char = msg_send![nsstring, UTF8String];
    if utf8.is_null() {
        return None;
    }
    CStr::from_ptr(utf8).to_str().ok().map(str::to_string)
}
