use anyhow::{Context, Result};
use std::sync::Arc;

use inspection_analysis::config::Settings;
use inspection_analysis::logging;
use inspection_analysis::{AnalysisClient, AnalysisSession, AnalysisSubject};

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let settings = Settings::from_env()?;

    // Initialize logging
    logging::init_logging(&settings.env)?;

    let subject = std::env::args()
        .nth(1)
        .map(AnalysisSubject::from)
        .context("usage: analysis-session <subject-id>")?;

    tracing::info!(
        env = ?settings.env,
        analysis_service_url = %settings.analysis_service_url,
        subject = %subject,
        "Starting analysis session"
    );

    // Create analysis service client
    let client = AnalysisClient::new(
        &settings.analysis_service_url,
        &settings.analysis_service_token,
        settings.analysis_service_timeout_seconds,
    )?;

    // Optionally check analysis service health (non-blocking)
    tokio::spawn({
        let client = client.clone();
        async move {
            match client.health_check().await {
                Ok(()) => tracing::info!("Analysis service is healthy"),
                Err(e) => tracing::warn!(error = %e, "Analysis service health check failed"),
            }
        }
    });

    let session = AnalysisSession::new(Arc::new(client), settings.session_config());

    // Log every state transition while the load runs
    let mut updates = session.subscribe();
    let watcher = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            tracing::info!(status = %state.status(), message = ?state.error(), "Session state changed");
        }
    });

    let state = session.load(Some(subject)).await;
    drop(session);
    watcher.await.ok();

    println!("{}", serde_json::to_string_pretty(&state)?);
    Ok(())
}
