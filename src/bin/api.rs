use agent_supervisor::{
    api::start_server,
    config::Settings,
    lookup::PopulationLookup,
    orchestrator::{Orchestrator, Strategy},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = Settings::from_env()?;
    if settings.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY not set, routing with the offline keyword decider");
    }

    let strategy = match std::env::var("STRATEGY") {
        Ok(raw) => raw.parse()?,
        Err(_) => Strategy::Hitl,
    };

    info!("Agent supervisor API server");
    info!(port = settings.port, %strategy, "Configuration loaded");

    let orchestrator = Arc::new(Orchestrator::from_settings(
        &settings,
        strategy,
        Arc::new(PopulationLookup),
    )?);

    start_server(orchestrator, settings.port).await?;

    Ok(())
}
