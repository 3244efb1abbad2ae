use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use foldersync::config::{self, AppConfig};
use foldersync::consumer::QueueConsumer;
use foldersync::engine::orchestrator::SyncOrchestrator;
use foldersync::reporter::{EngineEvent, LogBuffer, Reporter, DEFAULT_MAX_LOG_LINES};
use foldersync::policy::SyncMode;
use foldersync::watch::ChangeWatcher;

#[derive(Parser)]
#[command(name = "sync-cli")]
#[command(about = "Directory synchronization CLI", long_about = None)]
struct Cli {
    /// Configuration file to load and persist.
    #[arg(short = 'C', long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    source: Option<PathBuf>,

    #[arg(short, long)]
    target: Option<PathBuf>,

    #[arg(short, long, value_enum)]
    mode: Option<SyncMode>,

    /// Active filter name (all, images, documents, custom, ...).
    #[arg(short, long)]
    filter: Option<String>,

    #[arg(short, long)]
    bidirectional: bool,

    /// Apply the reversible byte transform to copied content.
    #[arg(short, long)]
    encrypt: bool,

    /// Stay resident: watch the source tree and run on a schedule.
    #[arg(short, long)]
    watch: bool,

    /// Auto-sync interval in minutes (watch mode).
    #[arg(long)]
    interval: Option<u64>,

    /// Append timestamped log lines to this file.
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// List the registered filters and exit.
    #[arg(long)]
    list_filters: bool,

    /// Add an extension to the custom filter and exit.
    #[arg(long)]
    add_ext: Option<String>,

    /// Remove an extension from the custom filter and exit.
    #[arg(long)]
    remove_ext: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone();
    let mut config = match &config_path {
        Some(path) => AppConfig::load(path)?,
        None => AppConfig::default(),
    };

    if let Some(source) = cli.source {
        config.src = source;
    }
    if let Some(target) = cli.target {
        config.dst = target;
    }
    if let Some(mode) = cli.mode {
        config.mode = mode;
    }
    if let Some(filter) = cli.filter {
        config.active_filter = filter;
    }
    if let Some(interval) = cli.interval {
        config.interval = interval;
    }
    if cli.bidirectional {
        config.bidirectional = true;
    }
    if cli.encrypt {
        config.encryption = true;
    }
    if cli.watch {
        config.realtime = true;
    }

    if cli.list_filters {
        let library = config.filter_library();
        println!("Registered filters:");
        for name in library.names() {
            let extensions = library
                .extensions(name)
                .map(|set| set.iter().cloned().collect::<Vec<_>>().join(" "))
                .unwrap_or_default();
            if name == "all" {
                println!("   {name:<12} (matches everything)");
            } else {
                println!("   {name:<12} {extensions}");
            }
        }
        return Ok(());
    }

    if cli.add_ext.is_some() || cli.remove_ext.is_some() {
        let mut library = config.filter_library();
        if let Some(ext) = &cli.add_ext {
            if library.add_custom(ext) {
                println!("Added {ext} to the custom filter");
            } else {
                println!("{ext} was already in the custom filter");
            }
        }
        if let Some(ext) = &cli.remove_ext {
            if library.remove_custom(ext) {
                println!("Removed {ext} from the custom filter");
            } else {
                println!("{ext} was not in the custom filter");
            }
        }
        config.filters = library.to_config();
        if let Some(path) = &config_path {
            config.save(path)?;
            println!("Saved {}", path.display());
        }
        return Ok(());
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;
    if let Some(path) = &config_path {
        config.save(path)?;
    }

    let (reporter, mut events) = Reporter::channel();

    // One task owns all presentation state: the bar, the log buffer and
    // the optional log file.
    let mut log_file = match &cli.log_file {
        Some(path) => Some(
            std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?,
        ),
        None => None,
    };
    let progress = ProgressBar::new(100);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}% {msg}")?
            .progress_chars("#>-"),
    );
    let buffer = Arc::new(LogBuffer::new(DEFAULT_MAX_LOG_LINES));
    let printer_buffer = buffer.clone();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::Progress { percent, file } => {
                    progress.set_position(percent as u64);
                    progress.set_message(file);
                }
                EngineEvent::Log(entry) => {
                    progress.println(format!(
                        "{} [{}] {}",
                        entry.timestamp,
                        entry.level.as_str(),
                        entry.message
                    ));
                    if let Some(file) = log_file.as_mut() {
                        let _ = writeln!(
                            file,
                            "{} [{}] {}",
                            entry.timestamp,
                            entry.level.as_str(),
                            entry.message
                        );
                    }
                    printer_buffer.push(entry);
                }
            }
        }
        progress.finish_and_clear();
    });

    let orchestrator = Arc::new(SyncOrchestrator::new(reporter.clone()));
    let shared = config::shared(config);
    let resident = cli.watch || shared.read().await.realtime;

    if resident {
        println!("👀 Watch mode: syncing now, then watching for changes (Ctrl-C to stop)");

        let initial_task = { shared.read().await.task() };
        let _ = orchestrator.run_once(initial_task).await;

        let mut watcher = ChangeWatcher::new();
        let source = { shared.read().await.src.clone() };
        let (tx, rx) = mpsc::unbounded_channel();
        let consumer = match watcher.start(&source, tx) {
            Ok(()) => {
                reporter.info(format!("watching {}", source.display()));
                let consumer = QueueConsumer::new(
                    rx,
                    shared.clone(),
                    reporter.clone(),
                    orchestrator.control().cancellation_token(),
                );
                Some(tokio::spawn(consumer.run()))
            }
            Err(e) => {
                // Scheduled syncs still run without the watcher.
                reporter.error(format!("realtime sync disabled: {e}"));
                None
            }
        };

        let periodic = orchestrator.spawn_periodic(shared.clone());

        tokio::signal::ctrl_c().await?;
        reporter.info("shutting down");
        orchestrator.cancel();
        watcher.stop();

        periodic.await?;
        if let Some(handle) = consumer {
            handle.await?;
        }
        drop(orchestrator);
        drop(reporter);
        printer.await?;
        return Ok(());
    }

    println!("🚀 Starting synchronization...");
    let task = { shared.read().await.task() };
    let result = orchestrator.run_once(task).await;

    drop(orchestrator);
    drop(reporter);
    printer.await?;

    match result {
        Ok(outcome) => {
            println!();
            println!("📊 Results:");
            println!("   Files copied: {}", outcome.files_copied);
            println!("   Files skipped: {}", outcome.files_skipped);
            if !outcome.errors.is_empty() {
                println!("   Errors: {}", outcome.errors.len());
                for error in &outcome.errors {
                    eprintln!("   ⚠️  {}: {}", error.path.display(), error.message);
                }
                std::process::exit(1);
            }
        }
        Err(e) => {
            eprintln!("❌ Sync failed: {e}");
            std::process::exit(1);
        }
    }

    Ok(())
}
