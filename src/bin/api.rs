use banking_widget_engine::{
    analytics::AnalyticsLog,
    api::start_server,
    engine::WidgetQueryEngine,
    ledger::ledger_from_env,
    widgets::{InMemoryWidgetStore, WidgetService, WidgetStore},
};
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let api_port: u16 = std::env::var("PORT")
        .or_else(|_| std::env::var("API_PORT"))
        .unwrap_or_else(|_| "8080".to_string())
        .parse()?;

    info!("🚀 Banking Widget Engine - API Server");
    info!("📍 Port: {}", api_port);

    // Create components
    let ledger = ledger_from_env();
    let engine = WidgetQueryEngine::new(ledger);
    let store: Arc<dyn WidgetStore> = Arc::new(InMemoryWidgetStore::new());
    let service = Arc::new(WidgetService::new(engine, store));
    let analytics = Arc::new(AnalyticsLog::new());

    info!("✅ Widget engine initialized");
    info!("📡 Starting API server...");

    // Start API server
    start_server(service, analytics, api_port).await?;

    Ok(())
}
