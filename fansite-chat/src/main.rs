use std::sync::Arc;

use fansite_shared::clients::db::{create_pool, StoreRegistry};

use fansite_chat::config::AppConfig;
use fansite_chat::hub::ChatHub;
use fansite_chat::models::{Identities, Side};
use fansite_chat::store::PgMessageLog;
use fansite_chat::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fansite_shared::middleware::init_tracing("fansite-chat");

    let config = AppConfig::load()?;
    let port = config.port;

    // One pool per logical store
    let settings = config.pool_settings();
    let mut registry = StoreRegistry::new();
    registry.register(Side::Visitor.store_name(), create_pool(&config.visitor_database_url, settings));
    registry.register(Side::Operator.store_name(), create_pool(&config.operator_database_url, settings));
    let registry = Arc::new(registry);

    let visitor_log = PgMessageLog::new(registry.clone(), Side::Visitor, config.visitor_schema.clone());
    let operator_log = PgMessageLog::new(registry.clone(), Side::Operator, config.operator_schema.clone());

    let hub = ChatHub::new(
        Arc::new(visitor_log),
        Arc::new(operator_log),
        Identities::new(config.operator_identity.clone(), config.broadcast_identity.clone()),
        config.greeting.clone(),
    );

    if config.reset_schema_on_start {
        tracing::warn!("reset_schema_on_start set, recreating chat tables");
        hub.reset_schemas().await?;
    } else {
        hub.ensure_schemas().await;
    }

    let metrics_handle = match fansite_shared::middleware::init_metrics() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "metrics recorder unavailable");
            None
        }
    };

    let state = Arc::new(AppState { hub, metrics_handle });
    let app = fansite_chat::router(state);

    let addr = format!("0.0.0.0:{port}");
    tracing::info!(addr = %addr, "fansite-chat starting");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
