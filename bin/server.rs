// Medicaid Billing - Web Server
// REST API for recipients, schedules, billing input and intake file export

use anyhow::{Context, Result};
use medicaid_billing::api::{router, AppState};
use medicaid_billing::{init_tracing, open_database, AppConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing("medicaid_billing=info,billing_server=info,tower_http=info");

    let config = AppConfig::load().context("Failed to load configuration")?;

    let conn = open_database(&config.database.path)
        .with_context(|| format!("Failed to open database {:?}", config.database.path))?;

    let state = AppState::new(conn, &config);
    let app = router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!(
        %addr,
        contract = %config.contract.contract_number,
        version = medicaid_billing::VERSION,
        "Billing server listening"
    );

    axum::serve(listener, app)
        .await
        .context("Server terminated unexpectedly")?;

    Ok(())
}
