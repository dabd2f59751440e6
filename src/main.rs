use anyhow::{Context, Result};
use energy_flow::controller::{BuildingFlowView, RefreshScheduler, SiteRefreshJob};
use energy_flow::{config::Config, telemetry};
use std::sync::Arc;
use tracing::{info, warn};

fn print_views(views: &[BuildingFlowView]) {
    for view in views {
        match serde_json::to_string(view) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(building = %view.building_id, error = %e, "cannot serialize view"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load()?;
    telemetry::init_tracing(&cfg.logging);

    let job = SiteRefreshJob::new(&cfg.site.path, Box::new(print_views));

    let views = job
        .compute()
        .await
        .with_context(|| format!("computing flows for {}", cfg.site.path))?;
    info!(site = %cfg.site.path, buildings = views.len(), "initial flows computed");
    print_views(&views);

    if !cfg.refresh.enabled {
        return Ok(());
    }

    let handle = RefreshScheduler::new(Arc::new(job), cfg.refresh.interval_minutes).start();
    telemetry::shutdown_signal().await;
    handle.shutdown().await;

    warn!("shutdown complete");
    Ok(())
}
