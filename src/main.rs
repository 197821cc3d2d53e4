// ReWear Exchange - Main Entry Point

use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rewear_exchange::app_state::Snapshot;
use rewear_exchange::{build_router, AppConfig, AppState, SharedState};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rewear_exchange=debug,tower_http=info")),
        )
        .init();

    if let Err(e) = run().await {
        error!(error = %e, "server exited with an error");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    let listen_addr = config.listen_addr;
    let uploads_dir = config.uploads_dir.clone();
    let autosave_secs = config.autosave_secs;

    let state: SharedState = AppState::load_or_new(config)?.shared();

    if autosave_secs > 0 {
        let autosave_state = state.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(autosave_secs));
            interval.tick().await;
            loop {
                interval.tick().await;
                save(&autosave_state).await;
            }
        });
        info!(every_secs = autosave_secs, "autosave enabled");
    }

    let app = build_router(state.clone(), &uploads_dir);
    let listener = tokio::net::TcpListener::bind(listen_addr).await?;
    info!(addr = %listen_addr, "ReWear exchange listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("shutdown signal received, saving state");
    save(&state).await;
    Ok(())
}

/// Serialize under the lock, then write the file off the async workers
async fn save(state: &SharedState) {
    let Some(snapshot) = take_snapshot(state) else {
        return;
    };
    match tokio::task::spawn_blocking(move || snapshot.write()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(error = %e, "failed to save state"),
        Err(e) => error!(error = %e, "snapshot writer task failed"),
    }
}

fn take_snapshot(state: &SharedState) -> Option<Snapshot> {
    let app = match state.lock() {
        Ok(app) => app,
        Err(_) => {
            warn!("state lock poisoned, snapshot skipped");
            return None;
        }
    };
    app.snapshot()
        .map_err(|e| error!(error = %e, "failed to serialize state"))
        .ok()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to install ctrl-c handler");
        std::future::pending::<()>().await;
    }
}
