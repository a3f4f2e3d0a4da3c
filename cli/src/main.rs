mod cli;
mod commands;

use std::sync::Arc;

use anyhow::Context;
use attendance::FlowConfig;
use clap::Parser;
use common::logger::{TraceId, init_logger, root_span};
use gateway::{ApiClient, ApiConfig};
use session::{SessionStore, store::SqliteStore};
use tracing::Instrument;

use crate::cli::Cli;
use crate::commands::App;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_logger("rollcall", cli.json_logs || is_production);

    let mut api = ApiConfig::from_env();
    if let Some(url) = cli.api_url {
        api.base_url = url;
    }

    let store = Arc::new(
        SqliteStore::new(&cli.db)
            .await
            .with_context(|| format!("failed to open local store at {}", cli.db))?,
    );
    let client = ApiClient::new(&api, SessionStore::new(store.clone()))?;

    let app = App {
        client,
        store,
        flow: FlowConfig::from_env(),
    };

    let trace_id = TraceId::default();
    let span = root_span("cli", &trace_id);
    if let Some(role) = app.client.session().role().await {
        span.record("role", role.as_str());
    }

    app.run(cli.command).instrument(span).await
}
