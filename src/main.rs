use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::EnvFilter;

use stayd::cache::Cache;
use stayd::config::Config;
use stayd::effects::EffectDispatcher;
use stayd::engine::{run_compactor, BookingEngine, MemoryStore};
use stayd::notify::LogNotifier;
use stayd::sweeper::{run_sweeper, Sweeper};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env();
    stayd::observability::init(config.metrics_port)?;

    let store = if config.journal {
        std::fs::create_dir_all(&config.data_dir)?;
        Arc::new(MemoryStore::open(&config.journal_path())?)
    } else {
        Arc::new(MemoryStore::new())
    };

    let cache = Cache::in_memory();
    let (effects, effect_worker) =
        EffectDispatcher::spawn(cache.clone(), Arc::new(LogNotifier), config.effect_queue_capacity);
    let engine = Arc::new(BookingEngine::with_store(store.clone(), cache, effects.clone()));
    let sweeper = Arc::new(Sweeper::new(engine.clone()));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper_task = tokio::spawn(run_sweeper(sweeper, config.sweep_at, shutdown_rx.clone()));
    let compactor_task = config.journal.then(|| {
        tokio::spawn(run_compactor(
            store.clone(),
            config.compact_threshold,
            Duration::from_secs(30),
            shutdown_rx.clone(),
        ))
    });

    info!("stayd started");
    info!("  data_dir: {}", config.data_dir.display());
    info!("  journal: {}", if config.journal { "enabled" } else { "disabled" });
    info!("  sweep_at: {} UTC", config.sweep_at.format("%H:%M"));
    info!("  effect_queue: {}", config.effect_queue_capacity);
    info!(
        "  metrics: {}",
        config.metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    wait_for_signal().await?;
    info!("shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = sweeper_task.await;
    if let Some(task) = compactor_task {
        let _ = task.await;
    }

    info!("draining side effects...");
    if effect_worker.drain(&effects, config.shutdown_drain).await {
        info!("side effects drained");
    }
    if config.journal {
        store.compact().await?;
    }

    info!("stayd stopped");
    Ok(())
}

async fn wait_for_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
    }
    Ok(())
}
