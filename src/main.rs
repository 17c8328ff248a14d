//! hotkey-detector: list the keyboard shortcuts bound on this machine and
//! find out which application or system function owns a key combination.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hotkey_detector::catalog::{
    ApplicationSource, Catalog, ScanMode, ScanReport, ShortcutCatalogBuilder,
};
use hotkey_detector::platform::{get_platform_name, get_system_info};
use hotkey_detector::shortcut::ShortcutRecord;
use hotkey_detector::{DetectorConfig, ShortcutNormalizer};

#[derive(Parser, Debug)]
#[command(
    name = "hotkey-detector",
    version,
    about = "Discover keyboard shortcuts and who owns them"
)]
struct Cli {
    /// What to scan
    #[arg(long, value_enum)]
    mode: Option<ScanMode>,

    /// Symbolic hotkey store to read instead of the per-user default
    #[arg(long, value_name = "PATH")]
    store: Option<PathBuf>,

    /// JSON config file
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Print JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Only show bindings for this shortcut, e.g. "cmd+shift+4" or "⌃⌘A"
    #[arg(long, value_name = "SHORTCUT")]
    lookup: Option<String>,

    /// After scanning, report each key press and what it is bound to (Ctrl-C to quit)
    #[arg(long)]
    monitor: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = DetectorConfig::load(cli.config.as_deref())?;
    if let Some(mode) = cli.mode {
        config.scan_mode = mode;
    }
    if let Some(store) = cli.store.clone() {
        config.hotkey_store_path = Some(store);
    }

    // Logs go to stderr so --json output stays clean
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!(
        "[Detector] Starting on {} (mode {:?})",
        get_platform_name(),
        config.scan_mode
    );

    #[cfg(target_os = "macos")]
    let source = hotkey_detector::catalog::macos::MacApplicationSource::new();
    #[cfg(not(target_os = "macos"))]
    let source = hotkey_detector::catalog::EmptyApplicationSource;

    let (catalog, report) = run_scan(source, &config).await?;

    if let Some(query) = &cli.lookup {
        let shortcut = ShortcutNormalizer::new()
            .parse(query)
            .with_context(|| format!("Could not parse shortcut '{}'", query))?;
        let hits = catalog.matching(&shortcut);
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&hits)?);
        } else if hits.is_empty() {
            println!(
                "{} is not bound by any scanned application or system function",
                shortcut
            );
        } else {
            print_table(hits.into_iter());
        }
    } else if cli.json {
        let output = serde_json::json!({
            "system": get_system_info(),
            "report": report,
            "records": catalog.records,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        print_table(catalog.records.iter());
        println!(
            "\n{} shortcuts ({} system, {} from {} apps) in {}ms",
            report.total_records(),
            report.system_records,
            report.application_records,
            report.apps_scanned,
            report.elapsed_ms
        );
    }

    if cli.monitor {
        monitor(&config, catalog, cli.json).await?;
    }

    Ok(())
}

async fn run_scan<S: ApplicationSource>(
    source: S,
    config: &DetectorConfig,
) -> Result<(Arc<Catalog>, ScanReport)> {
    if config.scan_mode.includes_applications()
        && !hotkey_detector::platform::accessibility_supported()
    {
        warn!(
            "[Detector] Application menus cannot be read on {}; only system hotkeys are available",
            get_platform_name()
        );
    }

    let builder = ShortcutCatalogBuilder::new(source, config.hotkey_registry());
    let Some(handle) = builder.scan(config.scan_mode) else {
        bail!("A scan is already running");
    };
    let report = handle.await.context("Scan task failed")?;
    Ok((builder.catalog().snapshot(), report))
}

fn print_table<'a>(records: impl Iterator<Item = &'a ShortcutRecord>) {
    println!("{:<10} {:<10} {:<28} {}", "SHORTCUT", "SOURCE", "OWNER", "ACTION");
    for record in records {
        println!(
            "{:<10} {:<10} {:<28} {}",
            record.display_shortcut(),
            record.source.as_str(),
            record.owner_name,
            record.label
        );
    }
}

#[cfg(target_os = "macos")]
async fn monitor(config: &DetectorConfig, catalog: Arc<Catalog>, json: bool) -> Result<()> {
    use hotkey_detector::input::{CgKeyTap, LiveKeyObserver, MacAccessibilityTrust};
    use tokio_stream::{wrappers::WatchStream, StreamExt};

    let observer =
        LiveKeyObserver::new(Box::new(CgKeyTap::new()), Arc::new(MacAccessibilityTrust))
            .with_settle_delay(config.permission_settle());
    observer
        .start()
        .await
        .context("Failed to start key monitoring")?;

    println!("Monitoring key presses, Ctrl-C to stop");
    let mut observations = WatchStream::new(observer.observations());
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            next = observations.next() => {
                let Some(latest) = next else { break };
                let Some(observation) = latest else { continue };
                let hits = catalog.matching_observation(&observation);
                if json {
                    let line = serde_json::json!({ "observation": observation, "matches": hits });
                    println!("{}", line);
                } else if hits.is_empty() {
                    println!("{:<10} unbound", observation.display_shortcut());
                } else {
                    for hit in hits {
                        println!(
                            "{:<10} {} → {}",
                            observation.display_shortcut(),
                            hit.owner_name,
                            hit.label
                        );
                    }
                }
            }
        }
    }

    observer.stop();
    info!(
        "[Detector] Observed {} key-downs",
        observer.metrics().key_downs()
    );
    Ok(())
}

#[cfg(not(target_os = "macos"))]
async fn monitor(_config: &DetectorConfig, _catalog: Arc<Catalog>, _json: bool) -> Result<()> {
    bail!(
        "--monitor needs the macOS event tap and is not supported on {}",
        get_platform_name()
    )
}
