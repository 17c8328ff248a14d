/*!
 * Live Key Observer
 *
 * Listens to system-wide key-down events through an installed tap and
 * publishes each one, normalized, as the latest `KeyObservation`.
 *
 * The tap callback only does table lookups and a non-blocking send into a
 * bounded queue. A pump task moves observations into the watch cell that
 * readers see. When the queue is full the key-down is counted as undelivered.
 */

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{mpsc, watch, Notify};
use tracing::{debug, info, warn};

use crate::error::DetectorError;
use crate::metrics::ObserverMetrics;
use crate::shortcut::KeyObservation;

/// Default wait between prompting for accessibility trust and re-checking it
pub const DEFAULT_PERMISSION_SETTLE: Duration = Duration::from_secs(1);

/// Key-downs buffered between the tap callback and the publishing task
pub const OBSERVATION_QUEUE: usize = 64;

/// Called with `(key_code, raw_flags)` for every key-down.
///
/// Runs on the input delivery thread: must return quickly and never panic.
pub type KeyDownSink = Arc<dyn Fn(i64, u64) + Send + Sync>;

/// A system-wide, listen-only key-down tap
pub trait KeyEventTap: Send {
    /// Install the tap; `sink` is invoked for every key-down until `remove`.
    fn install(&mut self, sink: KeyDownSink) -> Result<(), DetectorError>;

    /// Remove the tap and drop the sink. No-op if not installed.
    fn remove(&mut self);

    fn is_installed(&self) -> bool;
}

/// Process-level accessibility authorization
pub trait AccessibilityTrust: Send + Sync {
    fn is_trusted(&self) -> bool;

    /// Ask the user to grant trust (shows the system prompt)
    fn request(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObserverState {
    Stopped,
    RequestingPermission,
    Monitoring,
}

pub struct LiveKeyObserver {
    tap: Mutex<Box<dyn KeyEventTap>>,
    trust: Arc<dyn AccessibilityTrust>,
    settle_delay: Duration,
    state_tx: watch::Sender<ObserverState>,
    observation_tx: Arc<watch::Sender<Option<KeyObservation>>>,
    /// Bumped by every `stop()` so a pending `start()` can tell it was cancelled
    generation: AtomicU64,
    cancel: Notify,
    metrics: ObserverMetrics,
}

impl LiveKeyObserver {
    pub fn new(tap: Box<dyn KeyEventTap>, trust: Arc<dyn AccessibilityTrust>) -> Self {
        let (state_tx, _) = watch::channel(ObserverState::Stopped);
        let (observation_tx, _) = watch::channel(None);

        Self {
            tap: Mutex::new(tap),
            trust,
            settle_delay: DEFAULT_PERMISSION_SETTLE,
            state_tx,
            observation_tx: Arc::new(observation_tx),
            generation: AtomicU64::new(0),
            cancel: Notify::new(),
            metrics: ObserverMetrics::new(),
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn state(&self) -> ObserverState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ObserverState> {
        self.state_tx.subscribe()
    }

    /// Latest observed key-down; `None` until the first one arrives
    pub fn observations(&self) -> watch::Receiver<Option<KeyObservation>> {
        self.observation_tx.subscribe()
    }

    pub fn metrics(&self) -> &ObserverMetrics {
        &self.metrics
    }

    /// Start monitoring.
    ///
    /// Prompts for accessibility trust when missing and re-checks after the
    /// settle delay. Starting while already monitoring is a no-op.
    ///
    /// State changes are published while the tap lock is held, so the
    /// published state always agrees with whether a tap is installed.
    pub async fn start(&self) -> Result<(), DetectorError> {
        // Registered before any await so a concurrent stop() is never missed
        let cancelled = self.cancel.notified();
        tokio::pin!(cancelled);
        let generation = self.generation.load(Ordering::SeqCst);

        if !self.trust.is_trusted() {
            {
                let tap = self.tap.lock();
                if self.generation.load(Ordering::SeqCst) != generation {
                    return Err(DetectorError::Cancelled);
                }
                if tap.is_installed() {
                    debug!("[Observer] Already monitoring");
                    return Ok(());
                }
                self.state_tx.send_replace(ObserverState::RequestingPermission);
            }
            info!("[Observer] Accessibility permission missing, requesting");
            self.trust.request();

            tokio::select! {
                _ = tokio::time::sleep(self.settle_delay) => {}
                _ = &mut cancelled => {
                    debug!("[Observer] Start cancelled while waiting for permission");
                    return Err(DetectorError::Cancelled);
                }
            }

            if !self.trust.is_trusted() {
                let tap = self.tap.lock();
                if self.generation.load(Ordering::SeqCst) != generation {
                    return Err(DetectorError::Cancelled);
                }
                warn!("[Observer] Accessibility permission denied");
                if !tap.is_installed() {
                    self.state_tx.send_replace(ObserverState::Stopped);
                }
                return Err(DetectorError::PermissionDenied);
            }
            info!("[Observer] Accessibility permission granted");
        }

        let mut tap = self.tap.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            return Err(DetectorError::Cancelled);
        }
        if tap.is_installed() {
            debug!("[Observer] Already monitoring");
            return Ok(());
        }

        let (sink, pump) = self.sink_and_pump();
        match tap.install(sink) {
            Ok(()) => {
                tokio::spawn(pump);
                self.state_tx.send_replace(ObserverState::Monitoring);
                drop(tap);
                info!("[Observer] Monitoring key-down events");
                Ok(())
            }
            Err(e) => {
                self.state_tx.send_replace(ObserverState::Stopped);
                drop(tap);
                warn!("[Observer] Failed to install event tap: {}", e);
                Err(match e {
                    DetectorError::TapUnavailable(_) => e,
                    other => DetectorError::TapUnavailable(other.to_string()),
                })
            }
        }
    }

    /// Stop monitoring. Safe to call from any state, any number of times.
    pub fn stop(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cancel.notify_waiters();

        let mut tap = self.tap.lock();
        let was_installed = tap.is_installed();
        if was_installed {
            tap.remove();
        }
        self.state_tx.send_replace(ObserverState::Stopped);
        drop(tap);

        if was_installed {
            info!(
                "[Observer] Stopped monitoring after {} key-downs",
                self.metrics.key_downs()
            );
        }
    }

    /// Build the tap callback and the task that publishes what it sends.
    ///
    /// The pump ends once the tap drops the sink.
    fn sink_and_pump(&self) -> (KeyDownSink, impl Future<Output = ()> + Send + 'static) {
        let (tx, mut rx) = mpsc::channel::<KeyObservation>(OBSERVATION_QUEUE);
        let metrics = self.metrics.clone();

        let sink: KeyDownSink = Arc::new(move |key_code: i64, flags: u64| {
            metrics.record_key_down();
            // Never blocks the input thread; a full or closed queue drops the event
            if tx.try_send(KeyObservation::from_raw(key_code, flags)).is_err() {
                metrics.record_undelivered();
            }
        });

        let observation_tx = Arc::clone(&self.observation_tx);
        let pump = async move {
            while let Some(observation) = rx.recv().await {
                debug!(
                    "[Observer] {} (code {}, flags {:#x})",
                    observation.display_shortcut(),
                    observation.physical_key_code,
                    observation.raw_modifier_flags
                );
                observation_tx.send_replace(Some(observation));
            }
            debug!("[Observer] Sink dropped, pump finished");
        };

        (sink, pump)
    }
}

impl Drop for LiveKeyObserver {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::modifiers::{event_flags, ModifierSet};
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use tokio_stream::{wrappers::WatchStream, StreamExt};

    /// Tap driven by the test instead of the OS
    #[derive(Clone, Default)]
    struct ManualTap {
        sink: Arc<Mutex<Option<KeyDownSink>>>,
        fail: bool,
        installs: Arc<AtomicUsize>,
    }

    impl ManualTap {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        fn press(&self, key_code: i64, flags: u64) {
            let sink = self.sink.lock().clone();
            if let Some(sink) = sink {
                sink(key_code, flags);
            }
        }
    }

    impl KeyEventTap for ManualTap {
        fn install(&mut self, sink: KeyDownSink) -> Result<(), DetectorError> {
            if self.fail {
                return Err(DetectorError::TapUnavailable("refused".into()));
            }
            self.installs.fetch_add(1, Ordering::SeqCst);
            *self.sink.lock() = Some(sink);
            Ok(())
        }

        fn remove(&mut self) {
            self.sink.lock().take();
        }

        fn is_installed(&self) -> bool {
            self.sink.lock().is_some()
        }
    }

    /// Trust provider whose answers are set by the test
    #[derive(Default)]
    struct ScriptedTrust {
        trusted: AtomicBool,
        grant_on_request: bool,
        requests: AtomicUsize,
    }

    impl ScriptedTrust {
        fn trusted() -> Arc<Self> {
            Arc::new(Self {
                trusted: AtomicBool::new(true),
                ..Self::default()
            })
        }

        fn denied() -> Arc<Self> {
            Arc::new(Self::default())
        }

        fn granted_after_prompt() -> Arc<Self> {
            Arc::new(Self {
                grant_on_request: true,
                ..Self::default()
            })
        }
    }

    impl AccessibilityTrust for ScriptedTrust {
        fn is_trusted(&self) -> bool {
            self.trusted.load(Ordering::SeqCst)
        }

        fn request(&self) {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.grant_on_request {
                self.trusted.store(true, Ordering::SeqCst);
            }
        }
    }

    fn observer(tap: &ManualTap, trust: Arc<ScriptedTrust>) -> LiveKeyObserver {
        LiveKeyObserver::new(Box::new(tap.clone()), trust)
            .with_settle_delay(Duration::from_millis(10))
    }

    async fn next_observation(
        rx: &mut watch::Receiver<Option<KeyObservation>>,
    ) -> KeyObservation {
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("observation published")
            .unwrap();
        rx.borrow_and_update().clone().unwrap()
    }

    #[tokio::test]
    async fn publishes_normalized_key_downs() {
        let tap = ManualTap::default();
        let observer = observer(&tap, ScriptedTrust::trusted());
        let mut observations = observer.observations();

        observer.start().await.unwrap();
        assert_eq!(observer.state(), ObserverState::Monitoring);

        tap.press(0, event_flags::CONTROL | event_flags::COMMAND);
        let observation = next_observation(&mut observations).await;

        assert_eq!(observation.physical_key_code, 0);
        assert_eq!(observation.decoded_key, "A");
        assert_eq!(observation.modifiers, ModifierSet::CONTROL | ModifierSet::COMMAND);
        assert_eq!(observer.metrics().key_downs(), 1);
    }

    #[tokio::test]
    async fn latest_observation_wins() {
        let tap = ManualTap::default();
        let observer = observer(&tap, ScriptedTrust::trusted());
        let mut stream = WatchStream::new(observer.observations());
        observer.start().await.unwrap();

        tap.press(0, 0);
        tap.press(49, event_flags::COMMAND);
        let last = tokio::time::timeout(Duration::from_secs(2), async {
            while let Some(latest) = stream.next().await {
                if let Some(observation) = latest.filter(|o| o.decoded_key == "Space") {
                    return observation;
                }
            }
            panic!("observation stream closed");
        })
        .await
        .unwrap();

        assert_eq!(last.display_shortcut(), "⌘SPACE");
        assert_eq!(observer.metrics().key_downs(), 2);
    }

    #[tokio::test]
    async fn permission_denied_after_prompt() {
        let tap = ManualTap::default();
        let trust = ScriptedTrust::denied();
        let observer = observer(&tap, Arc::clone(&trust));
        let mut states = observer.subscribe_state();

        let result = observer.start().await;

        assert!(matches!(result, Err(DetectorError::PermissionDenied)));
        assert_eq!(trust.requests.load(Ordering::SeqCst), 1);
        assert_eq!(observer.state(), ObserverState::Stopped);
        assert!(!tap.is_installed());
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ObserverState::Stopped);
    }

    #[tokio::test]
    async fn permission_granted_on_recheck_starts_monitoring() {
        let tap = ManualTap::default();
        let trust = ScriptedTrust::granted_after_prompt();
        let observer = observer(&tap, Arc::clone(&trust));

        observer.start().await.unwrap();

        assert_eq!(trust.requests.load(Ordering::SeqCst), 1);
        assert_eq!(observer.state(), ObserverState::Monitoring);
        assert!(tap.is_installed());
    }

    #[tokio::test]
    async fn requesting_permission_is_visible_while_waiting() {
        let tap = ManualTap::default();
        let observer = Arc::new(
            LiveKeyObserver::new(Box::new(tap.clone()), ScriptedTrust::denied())
                .with_settle_delay(Duration::from_millis(200)),
        );
        let mut states = observer.subscribe_state();

        let starting = tokio::spawn({
            let observer = Arc::clone(&observer);
            async move { observer.start().await }
        });

        states
            .wait_for(|state| *state == ObserverState::RequestingPermission)
            .await
            .unwrap();
        let result = starting.await.unwrap();
        assert!(matches!(result, Err(DetectorError::PermissionDenied)));
    }

    #[tokio::test]
    async fn stop_during_permission_wait_cancels_start() {
        let tap = ManualTap::default();
        let observer = Arc::new(
            LiveKeyObserver::new(Box::new(tap.clone()), ScriptedTrust::granted_after_prompt())
                .with_settle_delay(Duration::from_secs(30)),
        );
        let mut states = observer.subscribe_state();

        let starting = tokio::spawn({
            let observer = Arc::clone(&observer);
            async move { observer.start().await }
        });

        states
            .wait_for(|state| *state == ObserverState::RequestingPermission)
            .await
            .unwrap();
        observer.stop();

        let result = tokio::time::timeout(Duration::from_secs(2), starting)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(DetectorError::Cancelled)));
        assert!(!tap.is_installed());
        assert_eq!(observer.state(), ObserverState::Stopped);
    }

    #[tokio::test]
    async fn tap_failure_reports_unavailable() {
        let tap = ManualTap::failing();
        let observer = observer(&tap, ScriptedTrust::trusted());

        let result = observer.start().await;

        assert!(matches!(result, Err(DetectorError::TapUnavailable(_))));
        assert_eq!(observer.state(), ObserverState::Stopped);
    }

    #[tokio::test]
    async fn start_twice_installs_once() {
        let tap = ManualTap::default();
        let observer = observer(&tap, ScriptedTrust::trusted());

        observer.start().await.unwrap();
        observer.start().await.unwrap();

        assert_eq!(tap.installs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_removes_tap() {
        let tap = ManualTap::default();
        let observer = observer(&tap, ScriptedTrust::trusted());

        observer.stop();
        observer.start().await.unwrap();
        observer.stop();
        observer.stop();

        assert!(!tap.is_installed());
        assert_eq!(observer.state(), ObserverState::Stopped);

        // Restart after stop works
        observer.start().await.unwrap();
        assert_eq!(tap.installs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn concurrent_stop_never_leaves_monitoring_without_tap() {
        for _ in 0..500 {
            let tap = ManualTap::default();
            let observer = Arc::new(observer(&tap, ScriptedTrust::trusted()));

            let stopper = std::thread::spawn({
                let observer = Arc::clone(&observer);
                move || {
                    for _ in 0..20 {
                        observer.stop();
                        std::thread::yield_now();
                    }
                }
            });
            let _ = observer.start().await;
            stopper.join().unwrap();

            let monitoring = observer.state() == ObserverState::Monitoring;
            assert_eq!(monitoring, tap.is_installed());
        }
    }

    #[tokio::test]
    async fn full_queue_counts_undelivered_key_downs() {
        let tap = ManualTap::default();
        let observer = observer(&tap, ScriptedTrust::trusted());
        let mut observations = observer.observations();
        observer.start().await.unwrap();

        // No await between presses, so the publishing task cannot drain the queue
        for _ in 0..OBSERVATION_QUEUE + 10 {
            tap.press(0, 0);
        }

        assert_eq!(observer.metrics().key_downs(), (OBSERVATION_QUEUE + 10) as u64);
        assert_eq!(observer.metrics().undelivered(), 10);
        assert_eq!(next_observation(&mut observations).await.decoded_key, "A");
    }

    #[tokio::test]
    async fn drop_removes_tap() {
        let tap = ManualTap::default();
        {
            let observer = observer(&tap, ScriptedTrust::trusted());
            observer.start().await.unwrap();
            assert!(tap.is_installed());
        }
        assert!(!tap.is_installed());
    }

    #[tokio::test]
    async fn sink_tolerates_any_raw_values() {
        let tap = ManualTap::default();
        let observer = observer(&tap, ScriptedTrust::trusted());
        let mut observations = observer.observations();
        observer.start().await.unwrap();

        tap.press(i64::MIN, u64::MAX);
        let observation = next_observation(&mut observations).await;
        assert_eq!(observation.decoded_key, format!("Key{}", i64::MIN));
        assert_eq!(observation.modifiers, ModifierSet::all());
    }
}
