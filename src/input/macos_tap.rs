/*!
 * macOS Event Tap
 *
 * Session-level, listen-only `CGEventTap` for key-down events, run on its
 * own CFRunLoop thread. Events are always passed through unchanged.
 */

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use core_foundation::runloop::{kCFRunLoopCommonModes, kCFRunLoopDefaultMode, CFRunLoop};
use core_graphics::event::{
    CGEventTap, CGEventTapLocation, CGEventTapOptions, CGEventTapPlacement, CGEventType,
    EventField,
};
use macos_accessibility_client::accessibility;
use tracing::{debug, error, info, warn};

use super::observer::{AccessibilityTrust, KeyDownSink, KeyEventTap};
use crate::error::DetectorError;

/// How long `install` waits for the tap thread to report back
const TAP_STARTUP_TIMEOUT: Duration = Duration::from_secs(2);

/// Upper bound on one run loop pass, so the stop and re-enable flags are seen promptly
const RUN_LOOP_SLICE: Duration = Duration::from_millis(250);

/// What the tap callback does with one delivered event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TapAction {
    Forward,
    /// The system switched the tap off; it has to be enabled again
    Reenable,
    Ignore,
}

fn tap_action(event_type: CGEventType) -> TapAction {
    match event_type {
        CGEventType::KeyDown => TapAction::Forward,
        CGEventType::TapDisabledByTimeout | CGEventType::TapDisabledByUserInput => {
            TapAction::Reenable
        }
        _ => TapAction::Ignore,
    }
}

struct RunningTap {
    run_loop: CFRunLoop,
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

/// Global key-down tap backed by Core Graphics
#[derive(Default)]
pub struct CgKeyTap {
    running: Option<RunningTap>,
}

impl CgKeyTap {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyEventTap for CgKeyTap {
    fn install(&mut self, sink: KeyDownSink) -> Result<(), DetectorError> {
        if self.running.is_some() {
            return Ok(());
        }

        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let (tx, rx) = mpsc::channel::<Result<CFRunLoop, String>>();

        let thread = std::thread::Builder::new()
            .name("key-tap".into())
            .spawn(move || run_tap_thread(sink, thread_stop, tx))?;

        match rx.recv_timeout(TAP_STARTUP_TIMEOUT) {
            Ok(Ok(run_loop)) => {
                info!("[Tap] Key-down tap installed");
                self.running = Some(RunningTap {
                    run_loop,
                    stop,
                    thread,
                });
                Ok(())
            }
            Ok(Err(reason)) => {
                let _ = thread.join();
                Err(DetectorError::TapUnavailable(reason))
            }
            Err(_) => {
                // The thread never reported; make sure it exits if it ever gets going
                stop.store(true, Ordering::SeqCst);
                Err(DetectorError::TapUnavailable(
                    "timed out starting the event tap thread".into(),
                ))
            }
        }
    }

    fn remove(&mut self) {
        if let Some(running) = self.running.take() {
            running.stop.store(true, Ordering::SeqCst);
            running.run_loop.stop();
            if running.thread.join().is_err() {
                error!("[Tap] Event tap thread panicked");
            }
            info!("[Tap] Key-down tap removed");
        }
    }

    fn is_installed(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for CgKeyTap {
    fn drop(&mut self) {
        self.remove();
    }
}

fn run_tap_thread(
    sink: KeyDownSink,
    stop: Arc<AtomicBool>,
    tx: mpsc::Sender<Result<CFRunLoop, String>>,
) {
    let run_loop = CFRunLoop::get_current();
    let disabled = Arc::new(AtomicBool::new(false));
    let callback_disabled = Arc::clone(&disabled);

    let tap = CGEventTap::new(
        CGEventTapLocation::Session,
        CGEventTapPlacement::HeadInsertEventTap,
        CGEventTapOptions::ListenOnly,
        vec![CGEventType::KeyDown],
        move |_proxy, event_type, event| {
            match tap_action(event_type) {
                TapAction::Forward => {
                    let key_code =
                        event.get_integer_value_field(EventField::KEYBOARD_EVENT_KEYCODE);
                    let flags = event.get_flags().bits();
                    // A panic must not unwind into Core Graphics
                    if catch_unwind(AssertUnwindSafe(|| sink(key_code, flags))).is_err() {
                        error!("[Tap] Key-down handler panicked; event ignored");
                    }
                }
                TapAction::Reenable => callback_disabled.store(true, Ordering::SeqCst),
                TapAction::Ignore => {}
            }
            None
        },
    );

    let tap = match tap {
        Ok(tap) => tap,
        Err(()) => {
            let _ = tx.send(Err(
                "CGEventTapCreate failed; grant Accessibility or Input Monitoring access".into(),
            ));
            return;
        }
    };

    let source = match tap.mach_port.create_runloop_source(0) {
        Ok(source) => source,
        Err(()) => {
            let _ = tx.send(Err("failed to create run loop source for event tap".into()));
            return;
        }
    };

    unsafe {
        run_loop.add_source(&source, kCFRunLoopCommonModes);
    }
    tap.enable();

    if tx.send(Ok(run_loop.clone())).is_err() {
        warn!("[Tap] Installer gave up before the tap was ready");
        return;
    }

    while !stop.load(Ordering::SeqCst) {
        CFRunLoop::run_in_mode(unsafe { kCFRunLoopDefaultMode }, RUN_LOOP_SLICE, false);
        if disabled.swap(false, Ordering::SeqCst) {
            warn!("[Tap] Event tap was disabled by the system, re-enabling");
            tap.enable();
        }
    }

    debug!("[Tap] Run loop exited");
}

/// Accessibility trust as reported by the system
#[derive(Debug, Clone, Copy, Default)]
pub struct MacAccessibilityTrust;

impl AccessibilityTrust for MacAccessibilityTrust {
    fn is_trusted(&self) -> bool {
        let trusted = accessibility::application_is_trusted();
        debug!("[Tap] Accessibility trusted: {}", trusted);
        trusted
    }

    fn request(&self) {
        // Shows the system prompt when not yet trusted
        let trusted = accessibility::application_is_trusted_with_prompt();
        debug!("[Tap] Accessibility prompt shown, trusted: {}", trusted);
    }
}
