use anyhow::Context;
use rollcall_core::{Clock, SystemClock};
use rollcall_store::Store;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

use config::Config;
use dbus_interface::KioskService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("rollcalld starting");

    let config = Config::load()?;
    if let Some(parent) = config.db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::create_dir_all(&config.capture_dir)
        .with_context(|| format!("failed to create {}", config.capture_dir.display()))?;

    let store = Store::open(&config.db_path, &config.descriptor_secret)
        .await
        .context("failed to open store")?;
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let scanning = store
        .subscription()
        .await?
        .map(|s| s.is_active(clock.now()))
        .unwrap_or(false);
    if !scanning {
        tracing::warn!("no active subscription; kiosk scanning locked until activation");
    }

    // Camera or model failure here is fatal: the kiosk must not start
    // half-blind. The operator restarts after fixing the setup.
    let engine = engine::spawn_engine(
        &config,
        store.clone(),
        clock.clone(),
        tokio::runtime::Handle::current(),
        scanning,
    )
    .context("kiosk setup failed")?;

    let service = KioskService::new(engine.clone(), store, config.year.clone(), clock);
    let _conn = zbus::connection::Builder::system()?
        .name("org.rollcall.Kiosk1")?
        .serve_at("/org/rollcall/Kiosk1", service)?
        .build()
        .await
        .context("failed to register on the system bus")?;

    tracing::info!(year = %config.year, "rollcalld ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("rollcalld shutting down");
    engine.shutdown();

    Ok(())
}
