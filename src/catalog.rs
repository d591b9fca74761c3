use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::{
    logging::logger,
    my_stations::MyStations,
    stations::{Backend, Directory, Station, StationId},
};

/// Browsable dimensions of the remote directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Facet {
    Country,
    Language,
    Genre,
}

impl Facet {
    pub const ALL: [Facet; 3] = [Facet::Country, Facet::Language, Facet::Genre];

    pub const fn path(self) -> &'static str {
        match self {
            Facet::Country => "country",
            Facet::Language => "language",
            Facet::Genre => "genre",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Facet::Country => "Countries",
            Facet::Language => "Languages",
            Facet::Genre => "Genres",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopOrder {
    Clicks,
    Votes,
}

/// The community station directory. Implementations swallow upstream
/// failures and answer with empty results.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    async fn station_by_id(&self, id: &str) -> Option<Station>;
    async fn playable_url(&self, id: &str) -> Option<String>;
    async fn search(&self, name: &str) -> Vec<Station>;
    async fn directories(&self, facet: Facet) -> Vec<Directory>;
    async fn stations_by(&self, facet: Facet, value: &str) -> Vec<Station>;
    async fn top_stations(&self, order: TopOrder) -> Vec<Station>;
    fn station_limit(&self) -> usize;
}

#[derive(Clone)]
pub struct Catalog {
    my_stations: Option<Arc<MyStations>>,
    remote: Arc<dyn RemoteCatalog>,
}

impl Catalog {
    pub fn new(my_stations: Option<MyStations>, remote: Arc<dyn RemoteCatalog>) -> Self {
        Self {
            my_stations: my_stations.map(Arc::new),
            remote,
        }
    }

    pub fn my_stations(&self) -> Option<&MyStations> {
        self.my_stations.as_deref()
    }

    pub fn remote(&self) -> &dyn RemoteCatalog {
        self.remote.as_ref()
    }

    /// Resolves a prefixed station id against its backend. With
    /// `resolve_stream` the remote backend is asked for the current stream url.
    pub async fn station(&self, raw_id: &str, resolve_stream: bool) -> Option<Station> {
        let Some(id) = StationId::parse(raw_id) else {
            logger().warn("station.id_unresolved", json!({ "stationId": raw_id }));
            return None;
        };

        match id.backend() {
            Backend::MyStations => match self.my_stations() {
                Some(my_stations) => my_stations.station_by_id(id.local_id()).await,
                None => None,
            },
            Backend::RadioBrowser => {
                let mut station = self.remote.station_by_id(id.local_id()).await?;
                if resolve_stream {
                    if let Some(url) = self.remote.playable_url(id.local_id()).await {
                        station.url = url;
                    }
                }
                Some(station)
            }
        }
    }

    /// Static-list matches come first, followed by the remote directory.
    pub async fn search(&self, query: &str) -> Vec<Station> {
        let mut stations = match self.my_stations() {
            Some(my_stations) => my_stations.search(query).await,
            None => Vec::new(),
        };
        stations.extend(self.remote.search(query).await);
        stations
    }
}
