use std::env;

use anyhow::Context;
use serde_json::json;

use vtuner_gateway::{app_state::AppState, config::Config, http, logging::init_logger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let logger = init_logger("vtuner-gateway");

    let config = Config::load().context("failed to load configuration")?;

    if matches!(env::args().nth(1).as_deref(), Some("check-config")) {
        logger.info(
            "config.check_passed",
            serde_json::to_value(&config).unwrap_or_else(|_| json!({ "status": "ok" })),
        );
        return Ok(());
    }

    let state = AppState::initialize(config.clone())
        .await
        .context("failed to initialize application state")?;

    logger.info(
        "server.initialized",
        json!({
            "address": config.bind_address.to_string(),
            "port": config.port,
            "myStations": state.catalog.my_stations().is_some(),
            "stationTracking": config.station_tracking,
        }),
    );

    http::serve(state).await.context("http server failed")
}
