// src/main.rs
use clap::Parser;
use cname_sentry::classifier::Classifier;
use cname_sentry::cli::{Cli, OutputFormat, RunMode};
use cname_sentry::config::Config;
use cname_sentry::dedupe::Dedupe;
use cname_sentry::metrics;
use cname_sentry::notifier::telegram::TelegramNotifier;
use cname_sentry::notifier::webhook::WebhookNotifier;
use cname_sentry::notifier::NotifierSet;
use cname_sentry::orchestrator::Orchestrator;
use cname_sentry::output::{csv, human, json, OutputManager};
use cname_sentry::progress::ProgressIndicator;
use cname_sentry::resolver::{HickoryLookup, Resolver};
use cname_sentry::scheduler::{Scheduler, SweepTrigger, TriggerStatus};
use cname_sentry::snapshot::SnapshotExporter;
use cname_sentry::state::AlertStateFile;
use cname_sentry::stats::StatsCollector;
use cname_sentry::store::{MemoryStore, PostgresStore, ResultStore};
use cname_sentry::targets::{StaticTargets, TargetFile, TargetSource};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Checked when the configured target file is missing
const LEGACY_TARGETS_FILE: &str = "domains.txt";

const LOG_FILE_PREFIX: &str = "cname-sentry.log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Validate arguments
    cli.validate()?;

    // Load config file, falling back to defaults when absent
    let mut config = Config::load_or_default(Path::new(&cli.config))?;
    config.apply_env_overrides();

    // Apply CLI overrides
    if let Some(interval) = cli.interval {
        config.scan.interval_secs = interval;
    }
    if let Some(concurrency) = cli.concurrency {
        config.scan.max_concurrency = concurrency;
    }

    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level(&config.logging.level)));

    // Optional daily-rotated log file next to stdout; the guard flushes it on exit
    let (file_layer, _log_guard) = match config.logging.dir {
        Some(ref dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    if let Some(ref dir) = config.logging.dir {
        tracing::info!("Writing daily log files to {}", dir);
    }

    tracing::info!("Starting cname-sentry...");

    metrics::register_metrics();

    // Initialize result store
    let store: Arc<dyn ResultStore> = if config.database.enabled {
        tracing::info!("Database enabled, connecting to PostgreSQL...");
        let postgres = PostgresStore::new(&config.database.url, config.database.max_connections).await?;
        postgres.migrate().await?;
        tracing::info!("Database initialized and migrated successfully");
        Arc::new(postgres)
    } else {
        tracing::info!(
            "Database disabled, keeping the last {} runs in memory",
            config.database.memory_max_runs
        );
        Arc::new(MemoryStore::with_retention(
            config.database.memory_max_runs,
            config.database.memory_max_results,
        ))
    };

    let exporter = Arc::new(SnapshotExporter::new(PathBuf::from(&config.export.snapshot_path)));
    let mode = cli.run_mode();

    // Handle --export-snapshot
    if mode == RunMode::ExportSnapshot {
        return export_snapshot(store.as_ref(), &exporter).await;
    }

    // Handle --history
    if let RunMode::History(limit) = mode {
        if !config.database.enabled {
            tracing::warn!("History requires [database] enabled = true");
        }
        for result in store.history(limit).await? {
            println!("{}", serde_json::to_string(&result)?);
        }
        return Ok(());
    }

    // Notifiers
    let mut notifiers = NotifierSet::new();
    if cli.no_notify {
        tracing::info!("Notifications disabled");
    } else {
        let timeout = Duration::from_secs(config.notifications.timeout_secs);

        if let Some(ref telegram) = config.notifications.telegram {
            notifiers.add(Arc::new(TelegramNotifier::new(telegram.clone(), timeout)));
            tracing::info!("Telegram notifications enabled");
        }

        if let Some(ref webhook) = config.notifications.webhook {
            notifiers.add(Arc::new(WebhookNotifier::new(webhook.clone(), timeout)));
            tracing::info!("Webhook notifications enabled");
        }

        if notifiers.is_empty() {
            tracing::warn!("No notifier configured, HIGH findings will only be logged");
        }
    }

    // DNS resolver
    let dns_timeout = Duration::from_secs(config.scan.dns_timeout_secs);
    let lookup = match config.scan.nameservers {
        Some(ref nameservers) if !nameservers.is_empty() => {
            tracing::info!("Using {} configured nameservers", nameservers.len());
            HickoryLookup::with_nameservers(nameservers, dns_timeout)?
        }
        _ => HickoryLookup::from_system(dns_timeout),
    };
    let resolver = Resolver::new(lookup, dns_timeout);

    let classifier = Classifier::new(config.signatures.providers.iter().cloned());
    tracing::info!("Loaded {} provider signatures", classifier.signatures().len());

    // Create output manager
    let mut output_manager = OutputManager::new();

    // Add output handlers based on format
    match cli.output_format() {
        OutputFormat::Human => {
            if let Some(ref path) = cli.output {
                let file = std::fs::File::create(path)?;
                output_manager.add_handler(Arc::new(human::HumanOutput::to_file(file)));
                tracing::info!("Writing human-readable output to: {}", path);
            } else {
                output_manager.add_handler(Arc::new(human::HumanOutput::new()));
            }
        }
        OutputFormat::Json => {
            if let Some(ref path) = cli.output {
                let file = std::fs::File::create(path)?;
                output_manager.add_handler(Arc::new(json::JsonOutput::to_file(file)));
                tracing::info!("Writing JSON output to: {}", path);
            } else {
                output_manager.add_handler(Arc::new(json::JsonOutput::new()));
            }
        }
        OutputFormat::Csv => {
            if let Some(ref path) = cli.output {
                let file = std::fs::File::create(path)?;
                output_manager.add_handler(Arc::new(csv::CsvOutput::to_file(file)));
                tracing::info!("Writing CSV output to: {}", path);
            } else {
                output_manager.add_handler(Arc::new(csv::CsvOutput::new()));
            }
        }
    }
    output_manager.add_handler(exporter.clone());

    let stats = StatsCollector::new();
    let progress = ProgressIndicator::new(cli.should_show_progress());

    let mut orchestrator = Orchestrator::new(Arc::new(resolver), classifier, Arc::new(notifiers), store)
        .with_outputs(output_manager)
        .with_stats(stats.clone())
        .with_progress(progress)
        .with_max_concurrency(config.scan.max_concurrency);

    // Alert history
    if config.alerts.persist {
        let state = AlertStateFile::new(PathBuf::from(&config.alerts.state_file));
        let dedupe: Dedupe = state.load().await?;
        tracing::info!(
            "Loaded {} alert records from {}",
            dedupe.len().await,
            config.alerts.state_file
        );
        orchestrator = orchestrator.with_dedupe(dedupe).with_alert_state(state);
    }

    let orchestrator = Arc::new(orchestrator);
    let targets = target_source(&mode, &config);

    if mode.is_scheduled() {
        let scheduler = Scheduler::new(
            orchestrator.clone(),
            targets,
            Duration::from_secs(config.scan.interval_secs),
        );
        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        spawn_manual_trigger(scheduler.trigger());

        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Received Ctrl-C, finishing current sweep...");
                shutdown_tx.send(true).ok();
            }
        });

        scheduler.run(shutdown_rx).await;
    } else {
        let run = orchestrator.run_sweep(&targets.load().await?).await?;
        if !run.diagnostics.is_clean() {
            tracing::warn!("Sweep completed with failures");
        }
    }

    if let Err(e) = orchestrator.flush_outputs().await {
        tracing::warn!("Failed to flush output: {:#}", e);
    }

    // Print final stats if enabled
    if cli.stats {
        let snapshot = stats.snapshot();
        println!("\n📊 Final Statistics:");
        println!("  Sweeps completed: {}", snapshot.sweeps_completed);
        println!("  Sweeps rejected: {}", snapshot.sweeps_rejected);
        println!("  Targets scanned: {}", snapshot.targets_scanned);
        println!("  High risk found: {}", snapshot.high_risk_found);
        println!("  Alerts sent: {}", snapshot.alerts_sent);
        println!("  Uptime: {}", StatsCollector::format_uptime(snapshot.uptime_secs));
        println!("\n{}", metrics::gather_text());
    }

    Ok(())
}

/// Where each sweep gets its target list from
fn target_source(mode: &RunMode, config: &Config) -> Arc<dyn TargetSource> {
    match mode {
        RunMode::Domains(domains) => Arc::new(StaticTargets(domains.clone())),
        RunMode::File(path) => Arc::new(TargetFile::new(PathBuf::from(path))),
        _ => match config.scan.domains {
            Some(ref domains) if !domains.is_empty() => Arc::new(StaticTargets(domains.clone())),
            _ => Arc::new(
                TargetFile::new(PathBuf::from(&config.scan.targets_file))
                    .with_fallback(PathBuf::from(LEGACY_TARGETS_FILE))
                    .create_example_if_missing(true),
            ),
        },
    }
}

async fn export_snapshot(store: &dyn ResultStore, exporter: &SnapshotExporter) -> anyhow::Result<()> {
    if let Some(run) = store.latest_snapshot().await? {
        println!("{}", SnapshotExporter::render(&run)?);
        return Ok(());
    }

    match exporter.read().await? {
        Some(snapshot) => println!("{}", serde_json::to_string_pretty(&snapshot)?),
        None => tracing::warn!("No snapshot found at {:?}", exporter.path()),
    }
    Ok(())
}

/// SIGUSR1 requests an immediate sweep
#[cfg(unix)]
fn spawn_manual_trigger(trigger: SweepTrigger) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = match signal(SignalKind::user_defined1()) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!("Manual sweep trigger unavailable: {}", e);
            return;
        }
    };

    tokio::spawn(async move {
        while usr1.recv().await.is_some() {
            match trigger.request() {
                TriggerStatus::Queued => tracing::info!("Manual sweep requested"),
                TriggerStatus::Coalesced => tracing::info!("Manual sweep already pending"),
                TriggerStatus::Stopped => break,
            }
        }
    });
}

#[cfg(not(unix))]
fn spawn_manual_trigger(_trigger: SweepTrigger) {
    tracing::debug!("Manual sweep trigger requires unix signals");
}
