use banking_widget_engine::{
    engine::WidgetQueryEngine,
    ledger::InMemoryLedger,
    models::{Account, QueryConfig, QueryFilters, QueryType, Transaction},
    timerange::TimeRange,
    widgets::{DataMode, InMemoryWidgetStore, Widget, WidgetService, WidgetStore},
};
use chrono::{Duration, Utc};
use serde_json::json;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    info!("Banking Widget Engine demo starting");

    // Seed a demo ledger
    let ledger = InMemoryLedger::new();
    let user_id = Uuid::new_v4();

    let checking = Account::new(user_id, "Everyday Checking", "checking", 1420.50);
    let savings = Account::new(user_id, "Rainy Day Savings", "savings", 5200.00);
    let checking_id = checking.id;
    ledger.add_account(checking).await;
    ledger.add_account(savings).await;

    let now = Utc::now();
    ledger
        .add_transaction(Transaction::deposit(
            checking_id,
            2500.0,
            now - Duration::days(40),
        ))
        .await;
    for (days_ago, amount, category, merchant) in [
        (35, 82.40, "Groceries", "SuperMart"),
        (28, 45.00, "Transport", "Metro Card"),
        (21, 130.25, "Groceries", "SuperMart"),
        (12, 60.00, "Entertainment", "Cinema"),
        (4, 19.99, "Entertainment", "Streaming Plus"),
    ] {
        ledger
            .add_transaction(Transaction::payment(
                checking_id,
                amount,
                Some(category),
                Some(merchant),
                now - Duration::days(days_ago),
            ))
            .await;
    }

    // Create components
    let engine = WidgetQueryEngine::new(Arc::new(ledger));
    let store: Arc<dyn WidgetStore> = Arc::new(InMemoryWidgetStore::new());
    let service = WidgetService::new(engine, store);

    // Create a dynamic widget
    let widget = Widget::new(
        user_id,
        "Spending by category",
        "chart",
        json!({"chartType": "pie", "customProps": {"data": []}}),
        DataMode::Dynamic,
        Some(QueryConfig {
            query_type: QueryType::SpendingByCategory,
            time_range: TimeRange::Last3Months,
            filters: QueryFilters::default(),
        }),
    );

    info!(title = %widget.title, "Creating dynamic widget");
    let widget = service.create(widget).await?;

    println!("\n=== WIDGET: {} ===", widget.title);
    if let Some(rows) = widget.cached_data() {
        for row in rows {
            println!("  {}", row);
        }
    }

    // Run a few ad-hoc queries through the same engine
    for query_type in [
        QueryType::MonthlyTrend,
        QueryType::TopMerchants,
        QueryType::AccountBalances,
    ] {
        let config = QueryConfig {
            query_type,
            time_range: TimeRange::Last3Months,
            filters: QueryFilters::default(),
        };
        let rows = service.engine().execute(&config, user_id).await?;

        println!("\n=== {:?} ===", query_type);
        for row in &rows {
            println!("  {}", serde_json::Value::Object(row.clone()));
        }
    }

    // Refresh the widget again to show the cache swap
    let refreshed = service.refresh(widget.id, user_id).await?;
    info!(
        widget_id = %refreshed.id,
        last_refreshed = ?refreshed.last_refreshed,
        "Widget refreshed"
    );

    Ok(())
}
