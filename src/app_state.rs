use std::sync::Arc;

use anyhow::Context;
use serde_json::json;

use crate::{
    catalog::{Catalog, RemoteCatalog},
    config::Config,
    icons::IconCache,
    logging::logger,
    my_stations::MyStations,
    radio_browser::RadioBrowserClient,
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub catalog: Catalog,
    pub icons: IconCache,
}

impl AppState {
    pub async fn initialize(config: Config) -> anyhow::Result<Self> {
        let radio_browser = RadioBrowserClient::new(config.radio_browser.clone())
            .context("failed to build radio browser client")?;
        let my_stations = MyStations::open(&config.stations_file).await;
        if my_stations.is_none() {
            logger().warn(
                "my_stations.disabled",
                json!({ "path": config.stations_file.display().to_string() }),
            );
        }

        let catalog = Catalog::new(my_stations, Arc::new(radio_browser));
        Self::new(config, catalog)
    }

    /// Wires a state around an existing catalog, e.g. one backed by a stub remote.
    pub fn new(config: Config, catalog: Catalog) -> anyhow::Result<Self> {
        let icons = IconCache::new(&config.cache_dir, &config.icons)?;
        Ok(Self {
            config: Arc::new(config),
            catalog,
            icons,
        })
    }

    pub fn remote(&self) -> &dyn RemoteCatalog {
        self.catalog.remote()
    }
}
