use std::path::PathBuf;

use serde_json::json;
use serde_yaml::{Mapping, Value};

use crate::{
    logging::logger,
    stations::{address_of, Backend, Directory, Station, StationId},
};

/// The user-maintained station list. The file is re-read on every access so
/// edits show up without a restart.
#[derive(Debug, Clone)]
pub struct MyStations {
    path: PathBuf,
}

#[derive(Debug, Default, PartialEq)]
struct StationList {
    categories: Vec<Category>,
}

#[derive(Debug, PartialEq)]
struct Category {
    name: String,
    entries: Vec<(String, String)>,
}

impl MyStations {
    /// Returns `None` when the file cannot be loaded; the feature then stays off.
    pub async fn open(path: impl Into<PathBuf>) -> Option<Self> {
        let stations = Self { path: path.into() };
        let list = stations.load().await?;
        logger().info(
            "my_stations.loaded",
            json!({
                "path": stations.path.display().to_string(),
                "categories": list.categories.len(),
            }),
        );
        Some(stations)
    }

    pub async fn categories(&self) -> Vec<Directory> {
        let list = self.load().await.unwrap_or_default();
        list.categories
            .iter()
            .map(|category| Directory::new(category.name.clone(), category.entries.len() as u64))
            .collect()
    }

    pub async fn stations_in(&self, category: &str) -> Vec<Station> {
        let list = self.load().await.unwrap_or_default();
        let stations = list
            .categories
            .iter()
            .filter(|candidate| candidate.name == category)
            .flat_map(Category::stations)
            .collect();
        stations
    }

    pub async fn station_by_id(&self, local_id: &str) -> Option<Station> {
        let list = self.load().await?;
        let found = list.stations().find(|station| station.id.local_id() == local_id);
        found
    }

    /// Case-insensitive substring match on station names.
    pub async fn search(&self, query: &str) -> Vec<Station> {
        let needle = query.to_lowercase();
        let list = self.load().await.unwrap_or_default();
        let matches = list
            .stations()
            .filter(|station| station.name.to_lowercase().contains(&needle))
            .collect();
        matches
    }

    async fn load(&self) -> Option<StationList> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(error) => {
                logger().error(
                    "my_stations.read_failed",
                    json!({
                        "path": self.path.display().to_string(),
                        "error": error.to_string(),
                    }),
                );
                return None;
            }
        };
        match parse_station_list(&text) {
            Ok(list) => Some(list),
            Err(error) => {
                logger().error(
                    "my_stations.parse_failed",
                    json!({
                        "path": self.path.display().to_string(),
                        "error": error.to_string(),
                    }),
                );
                None
            }
        }
    }
}

impl StationList {
    fn stations(&self) -> impl Iterator<Item = Station> + '_ {
        self.categories.iter().flat_map(Category::stations)
    }
}

impl Category {
    fn stations(&self) -> impl Iterator<Item = Station> + '_ {
        self.entries.iter().filter_map(move |(name, url)| {
            let id = StationId::new(Backend::MyStations, &address_of(name, url))?;
            let mut station = Station::new(id, name.clone(), url.clone());
            station.genre = Some(self.name.clone());
            station.description = Some(self.name.clone());
            Some(station)
        })
    }
}

fn parse_station_list(text: &str) -> anyhow::Result<StationList> {
    let root: Value = serde_yaml::from_str(text)?;
    let mapping = match root {
        Value::Mapping(mapping) if !mapping.is_empty() => mapping,
        _ => anyhow::bail!("station list must be a non-empty mapping of categories"),
    };

    let categories = mapping
        .into_iter()
        .filter_map(|(key, value)| {
            let name = scalar_text(&key)?;
            let entries = match value {
                Value::Mapping(entries) => category_entries(&name, entries),
                _ => Vec::new(),
            };
            Some(Category { name, entries })
        })
        .collect();
    Ok(StationList { categories })
}

fn category_entries(category: &str, entries: Mapping) -> Vec<(String, String)> {
    entries
        .into_iter()
        .filter_map(|(name, url)| {
            let entry = scalar_text(&name).zip(scalar_text(&url));
            if entry.is_none() {
                logger().warn(
                    "my_stations.entry_skipped",
                    json!({ "category": category }),
                );
            }
            entry
        })
        .collect()
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SAMPLE: &str = r#"
Favourites:
  Radio Eins: http://radioeins.de/stream
  SWR3: https://liveradio.swr.de/sw282p3/swr3/play.mp3
News:
  BBC World Service: http://stream.live.vc.bbcmedia.co.uk/bbc_world_service
Empty:
"#;

    fn write_sample(contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("stations-{}.yml", uuid::Uuid::new_v4()));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn parsing_keeps_file_order() {
        let list = parse_station_list(SAMPLE).unwrap();
        let names: Vec<&str> = list.categories.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Favourites", "News", "Empty"]);
        assert_eq!(
            list.categories[0].entries[1],
            (
                "SWR3".to_string(),
                "https://liveradio.swr.de/sw282p3/swr3/play.mp3".to_string()
            )
        );
        assert!(list.categories[2].entries.is_empty());
    }

    #[test]
    fn non_mapping_documents_are_rejected() {
        assert!(parse_station_list("").is_err());
        assert!(parse_station_list("- a\n- b\n").is_err());
        assert!(parse_station_list("key: [unclosed").is_err());
    }

    #[test]
    fn stations_get_content_addressed_ids() {
        let list = parse_station_list(SAMPLE).unwrap();
        let stations: Vec<Station> = list.stations().collect();
        assert_eq!(stations.len(), 3);
        assert_eq!(stations[0].id.to_string(), "MY_ftL2O6thHCo");
        assert_eq!(stations[1].id.to_string(), "MY_mjW1obKW8nY");
        assert_eq!(stations[0].genre.as_deref(), Some("Favourites"));
        assert_eq!(stations[0].description.as_deref(), Some("Favourites"));
        assert_eq!(stations[0].icon, None);
    }

    #[tokio::test]
    async fn file_backed_lookups() {
        let path = write_sample(SAMPLE);
        let stations = MyStations::open(&path).await.unwrap();

        let categories = stations.categories().await;
        let summary: Vec<(&str, u64)> = categories
            .iter()
            .map(|d| (d.name.as_str(), d.item_count))
            .collect();
        assert_eq!(summary, vec![("Favourites", 2), ("News", 1), ("Empty", 0)]);

        let favourites = stations.stations_in("Favourites").await;
        assert_eq!(favourites.len(), 2);
        assert!(stations.stations_in("Missing").await.is_empty());

        let found = stations.station_by_id("mjW1obKW8nY").await.unwrap();
        assert_eq!(found.name, "SWR3");
        assert!(stations.station_by_id("nope").await.is_none());

        let hits = stations.search("bbc").await;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].name, "BBC World Service");

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn edits_are_picked_up_without_reopening() {
        let path = write_sample(SAMPLE);
        let stations = MyStations::open(&path).await.unwrap();
        std::fs::write(&path, "Other:\n  Solo: http://solo.example.com\n").unwrap();

        let categories = stations.categories().await;
        assert_eq!(categories.len(), 1);
        assert_eq!(categories[0].name, "Other");

        std::fs::remove_file(path).unwrap();
    }

    #[tokio::test]
    async fn missing_file_disables_the_feature() {
        let path = std::env::temp_dir().join(format!("missing-{}.yml", uuid::Uuid::new_v4()));
        assert!(MyStations::open(path).await.is_none());
    }
}
