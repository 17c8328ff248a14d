/*!
 * Shortcut Catalog
 *
 * Runs scans over the system hotkey store and running applications, and
 * publishes the result as one immutable snapshot.
 *
 * Readers always see either the empty in-progress catalog or a complete
 * one. The "already scanning?" check and the clear happen in a single
 * update of the watch cell, so two callers can never both start a scan.
 */

#[cfg(target_os = "macos")]
pub mod macos;

use std::panic::{catch_unwind, resume_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::a11y::{AccessibilityElement, ApplicationMenuWalker, SyntheticElement, WalkStats};
use crate::metrics::{CatalogMetrics, ScanMetrics};
use crate::shortcut::{KeyObservation, Shortcut, ShortcutRecord, ShortcutSource};
use crate::system_hotkeys::SystemHotkeyRegistry;

/// Owner name for applications that report no localized name
pub const UNKNOWN_APPLICATION: &str = "Unknown Application";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
pub enum ScanMode {
    /// Menu shortcuts of running applications
    #[default]
    #[serde(rename = "apps")]
    #[value(name = "apps")]
    ApplicationsOnly,
    /// The system hotkey store only
    #[serde(rename = "system")]
    #[value(name = "system")]
    SystemOnly,
    /// System hotkeys, then applications
    #[serde(rename = "all")]
    #[value(name = "all")]
    All,
}

impl ScanMode {
    pub fn includes_system(&self) -> bool {
        matches!(self, ScanMode::SystemOnly | ScanMode::All)
    }

    pub fn includes_applications(&self) -> bool {
        matches!(self, ScanMode::ApplicationsOnly | ScanMode::All)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanState {
    Idle,
    Scanning,
}

/// Result of one completed scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct Catalog {
    pub scan_id: Option<String>,
    pub mode: Option<ScanMode>,
    pub completed_at: Option<DateTime<Utc>>,
    pub records: Vec<ShortcutRecord>,
}

impl Catalog {
    /// Catalog built outside a scan, e.g. from saved records
    pub fn from_records(records: Vec<ShortcutRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Every record bound to `shortcut`
    pub fn matching(&self, shortcut: &Shortcut) -> Vec<&ShortcutRecord> {
        self.records
            .iter()
            .filter(|record| record.shortcut().matches(shortcut))
            .collect()
    }

    /// Every record bound to the key combination just pressed
    pub fn matching_observation(&self, observation: &KeyObservation) -> Vec<&ShortcutRecord> {
        self.matching(&observation.shortcut())
    }

    pub fn by_source(&self, source: ShortcutSource) -> impl Iterator<Item = &ShortcutRecord> {
        self.records.iter().filter(move |record| record.source == source)
    }
}

/// What readers observe: the scan state and the catalog that goes with it
#[derive(Debug, Clone)]
pub struct CatalogView {
    pub state: ScanState,
    pub catalog: Arc<Catalog>,
}

impl Default for CatalogView {
    fn default() -> Self {
        Self {
            state: ScanState::Idle,
            catalog: Arc::new(Catalog::default()),
        }
    }
}

/// Read handle on the published catalog
#[derive(Debug, Clone)]
pub struct CatalogReader {
    rx: watch::Receiver<CatalogView>,
}

impl CatalogReader {
    pub fn view(&self) -> CatalogView {
        self.rx.borrow().clone()
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        Arc::clone(&self.rx.borrow().catalog)
    }

    pub fn state(&self) -> ScanState {
        self.rx.borrow().state
    }

    /// Wait for the next publication and return it
    pub async fn changed(&mut self) -> Result<CatalogView, watch::error::RecvError> {
        self.rx.changed().await?;
        Ok(self.rx.borrow_and_update().clone())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationPolicy {
    /// Ordinary app with a Dock icon and menu bar
    Regular,
    /// Agent or menu extra
    Accessory,
    /// Background-only
    Prohibited,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningApplication {
    pub pid: i32,
    pub name: Option<String>,
    pub activation_policy: ActivationPolicy,
}

/// Enumerates running applications and opens their menu bars
pub trait ApplicationSource: Send + Sync + 'static {
    type Element: AccessibilityElement;

    fn running_applications(&self) -> Vec<RunningApplication>;

    /// The app's menu bar element, or `None` if it does not expose one
    fn menu_bar(&self, app: &RunningApplication) -> Option<Self::Element>;
}

/// Source with no applications, for platforms without accessibility access
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyApplicationSource;

impl ApplicationSource for EmptyApplicationSource {
    type Element = SyntheticElement;

    fn running_applications(&self) -> Vec<RunningApplication> {
        Vec::new()
    }

    fn menu_bar(&self, _app: &RunningApplication) -> Option<SyntheticElement> {
        None
    }
}

/// Summary of one scan
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub scan_id: String,
    pub mode: ScanMode,
    pub apps_scanned: usize,
    pub apps_without_menu_bar: usize,
    pub application_records: usize,
    pub system_records: usize,
    pub elapsed_ms: u64,
    pub walk: WalkStats,
}

impl ScanReport {
    pub fn total_records(&self) -> usize {
        self.application_records + self.system_records
    }
}

pub struct ShortcutCatalogBuilder<S: ApplicationSource> {
    source: Arc<S>,
    registry: Option<SystemHotkeyRegistry>,
    walker: ApplicationMenuWalker,
    excluded_pid: i32,
    view_tx: Arc<watch::Sender<CatalogView>>,
    metrics: CatalogMetrics,
}

impl<S: ApplicationSource> ShortcutCatalogBuilder<S> {
    /// `registry` is `None` when there is no hotkey store to read
    pub fn new(source: S, registry: Option<SystemHotkeyRegistry>) -> Self {
        let (view_tx, _) = watch::channel(CatalogView::default());
        Self {
            source: Arc::new(source),
            registry,
            walker: ApplicationMenuWalker::new(),
            excluded_pid: std::process::id() as i32,
            view_tx: Arc::new(view_tx),
            metrics: CatalogMetrics::new(),
        }
    }

    /// Process to leave out of application scans (defaults to this one)
    pub fn with_excluded_pid(mut self, pid: i32) -> Self {
        self.excluded_pid = pid;
        self
    }

    pub fn catalog(&self) -> CatalogReader {
        CatalogReader {
            rx: self.view_tx.subscribe(),
        }
    }

    pub fn state(&self) -> ScanState {
        self.view_tx.borrow().state
    }

    pub fn metrics(&self) -> &CatalogMetrics {
        &self.metrics
    }

    /// Start a scan on the blocking pool.
    ///
    /// Returns `None` without doing anything if a scan is already running.
    /// Must be called from within a Tokio runtime.
    pub fn scan(&self, mode: ScanMode) -> Option<JoinHandle<ScanReport>> {
        let started = self.view_tx.send_if_modified(|view| {
            if view.state == ScanState::Scanning {
                return false;
            }
            *view = CatalogView {
                state: ScanState::Scanning,
                catalog: Arc::new(Catalog::default()),
            };
            true
        });

        if !started {
            self.metrics.record_rejected();
            info!("[Scanner] Scan already in progress, ignoring {:?} request", mode);
            return None;
        }

        let source = Arc::clone(&self.source);
        let registry = self.registry.clone();
        let walker = self.walker.clone();
        let excluded_pid = self.excluded_pid;
        let view_tx = Arc::clone(&self.view_tx);
        let metrics = self.metrics.clone();

        Some(tokio::task::spawn_blocking(move || {
            let outcome = catch_unwind(AssertUnwindSafe(|| {
                collect(&*source, registry.as_ref(), &walker, excluded_pid, mode)
            }));

            match outcome {
                Ok((catalog, report)) => {
                    metrics.record_completed(report.elapsed_ms);
                    view_tx.send_replace(CatalogView {
                        state: ScanState::Idle,
                        catalog: Arc::new(catalog),
                    });
                    report
                }
                Err(panic) => {
                    warn!("[Scanner] Scan panicked; publishing empty catalog");
                    view_tx.send_replace(CatalogView::default());
                    resume_unwind(panic)
                }
            }
        }))
    }
}

/// One full scan, synchronous
fn collect<S: ApplicationSource>(
    source: &S,
    registry: Option<&SystemHotkeyRegistry>,
    walker: &ApplicationMenuWalker,
    excluded_pid: i32,
    mode: ScanMode,
) -> (Catalog, ScanReport) {
    let metrics = ScanMetrics::new();
    info!("[Scanner] Starting {:?} scan {}", mode, metrics.scan_id);

    let mut report = ScanReport {
        scan_id: metrics.scan_id.clone(),
        mode,
        ..ScanReport::default()
    };
    let mut records = Vec::new();

    if mode.includes_system() {
        match registry {
            Some(registry) => {
                let system = registry.scan();
                report.system_records = system.len();
                records.extend(system);
            }
            None => warn!("[Scanner] No hotkey store location; skipping system shortcuts"),
        }
    }

    if mode.includes_applications() {
        for app in source.running_applications() {
            if app.activation_policy != ActivationPolicy::Regular || app.pid == excluded_pid {
                continue;
            }

            let name = app
                .name
                .clone()
                .unwrap_or_else(|| UNKNOWN_APPLICATION.to_string());
            report.apps_scanned += 1;

            let Some(menu_bar) = source.menu_bar(&app) else {
                debug!("[Scanner] {} (pid {}) exposes no menu bar", name, app.pid);
                report.apps_without_menu_bar += 1;
                continue;
            };

            let (app_records, stats) = walker.walk_with_stats(&menu_bar, &name);
            report.walk.merge(&stats);
            report.application_records += app_records.len();
            records.extend(app_records);
        }
    }

    report.elapsed_ms = metrics.elapsed_ms();
    info!(
        "[Scanner] Scan {} finished: {} shortcuts ({} system, {} from {} apps) in {}ms",
        report.scan_id,
        report.total_records(),
        report.system_records,
        report.application_records,
        report.apps_scanned,
        report.elapsed_ms
    );

    let catalog = Catalog {
        scan_id: Some(report.scan_id.clone()),
        mode: Some(mode),
        completed_at: Some(Utc::now()),
        records,
    };
    (catalog, report)
}
