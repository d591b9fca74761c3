use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::json;

use crate::{
    catalog::{Facet, RemoteCatalog, TopOrder},
    config::RadioBrowserConfig,
    countries::country_name,
    logging::logger,
    stations::{Backend, Directory, Station, StationId},
};

const RADIO_BROWSER_FALLBACK_HOSTS: &[&str] = &[
    "https://de1.api.radio-browser.info",
    "https://de2.api.radio-browser.info",
    "https://fi1.api.radio-browser.info",
    "https://nl1.api.radio-browser.info",
];

#[derive(Clone)]
pub struct RadioBrowserClient {
    config: RadioBrowserConfig,
    client: Client,
    host_pool: Vec<String>,
    host_cursor: Arc<AtomicUsize>,
}

impl RadioBrowserClient {
    pub fn new(config: RadioBrowserConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;
        let mut host_pool: Vec<String> = Vec::new();
        let configured = config.base_url.trim().trim_end_matches('/');
        if !configured.is_empty() {
            host_pool.push(configured.to_string());
        }
        for candidate in RADIO_BROWSER_FALLBACK_HOSTS {
            if !host_pool
                .iter()
                .any(|existing| existing.eq_ignore_ascii_case(candidate))
            {
                host_pool.push(candidate.to_string());
            }
        }
        Ok(Self {
            config,
            client,
            host_pool,
            host_cursor: Arc::new(AtomicUsize::new(0)),
        })
    }

    fn ordered_hosts(&self) -> Vec<String> {
        let len = self.host_pool.len();
        let start = self.host_cursor.fetch_add(1, Ordering::Relaxed) % len;
        let mut ordered = Vec::with_capacity(len);
        for offset in 0..len {
            ordered.push(self.host_pool[(start + offset) % len].clone());
        }
        ordered
    }

    fn endpoint(&self, base_url: &str, segments: &[&str], query: &[(&str, &str)]) -> anyhow::Result<Url> {
        let mut url = Url::parse(base_url)?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("{base_url} cannot carry a path"))?
            .pop_if_empty()
            .push("json")
            .extend(segments);
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> anyhow::Result<T> {
        let mut last_error = None;
        for base in self.ordered_hosts() {
            match self.fetch_from_host(&base, segments, query).await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    logger().warn(
                        "radio_browser.host_failed",
                        json!({
                            "host": base,
                            "path": segments.join("/"),
                            "error": error.to_string(),
                        }),
                    );
                    last_error = Some(error);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("Radio Browser request failed")))
    }

    async fn fetch_from_host<T: DeserializeOwned>(
        &self,
        base_url: &str,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> anyhow::Result<T> {
        let url = self.endpoint(base_url, segments, query)?;
        logger().debug("radio_browser.request", json!({ "url": url.as_str() }));

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "radio browser returned {}",
                response.status()
            ));
        }
        Ok(response.json().await?)
    }

    // Upstream failures degrade to "no data"; the caller renders an empty page.
    async fn fetch_or_default<T: DeserializeOwned + Default>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> T {
        match self.fetch(segments, query).await {
            Ok(value) => value,
            Err(error) => {
                logger().error(
                    "radio_browser.request_failed",
                    json!({
                        "path": segments.join("/"),
                        "error": error.to_string(),
                    }),
                );
                T::default()
            }
        }
    }

    async fn fetch_stations(&self, segments: &[&str], query: &[(&str, &str)]) -> Vec<Station> {
        let raw: Vec<RadioBrowserStation> = self.fetch_or_default(segments, query).await;
        raw.into_iter().filter_map(normalize_station).collect()
    }
}

#[async_trait]
impl RemoteCatalog for RadioBrowserClient {
    async fn station_by_id(&self, id: &str) -> Option<Station> {
        let raw: Vec<RadioBrowserStation> =
            self.fetch_or_default(&["stations", "byuuid", id], &[]).await;
        raw.into_iter().next().and_then(normalize_station)
    }

    async fn playable_url(&self, id: &str) -> Option<String> {
        let raw: Option<PlayableUrl> = self.fetch_or_default(&["url", id], &[]).await;
        let url = raw.and_then(|value| value.url).filter(|url| !url.trim().is_empty());
        if url.is_none() {
            logger().error(
                "radio_browser.playable_url_missing",
                json!({ "stationId": id }),
            );
        }
        url
    }

    async fn search(&self, name: &str) -> Vec<Station> {
        let limit = self.config.station_limit.to_string();
        self.fetch_stations(
            &["stations", "search"],
            &[
                ("name", name),
                ("hidebroken", self.config.hide_broken()),
                ("order", "name"),
                ("reverse", "false"),
                ("limit", &limit),
            ],
        )
        .await
    }

    async fn directories(&self, facet: Facet) -> Vec<Directory> {
        let hidebroken = self.config.hide_broken();
        match facet {
            Facet::Country => {
                let raw = self
                    .fetch_or_default(&["countries"], &[("hidebroken", hidebroken)])
                    .await;
                country_directories(raw, self.config.min_country_stations)
            }
            Facet::Language => {
                let raw = self
                    .fetch_or_default(
                        &["languages"],
                        &[("hidebroken", hidebroken), ("order", "name"), ("reverse", "false")],
                    )
                    .await;
                language_directories(raw, self.config.min_language_stations)
            }
            Facet::Genre => {
                let raw = self
                    .fetch_or_default(
                        &["tags"],
                        &[("hidebroken", hidebroken), ("order", "name"), ("reverse", "false")],
                    )
                    .await;
                genre_directories(raw, self.config.min_genre_stations)
            }
        }
    }

    async fn stations_by(&self, facet: Facet, value: &str) -> Vec<Station> {
        let by = match facet {
            Facet::Country => "bycountrycodeexact",
            Facet::Language => "bylanguageexact",
            Facet::Genre => "bytagexact",
        };
        self.fetch_stations(
            &["stations", by, value],
            &[
                ("hidebroken", self.config.hide_broken()),
                ("order", "name"),
                ("reverse", "false"),
            ],
        )
        .await
    }

    async fn top_stations(&self, order: TopOrder) -> Vec<Station> {
        let by = match order {
            TopOrder::Clicks => "topclick",
            TopOrder::Votes => "topvote",
        };
        let limit = self.config.station_limit.to_string();
        self.fetch_stations(
            &["stations", by, &limit],
            &[("hidebroken", self.config.hide_broken())],
        )
        .await
    }

    fn station_limit(&self) -> usize {
        self.config.station_limit
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RadioBrowserStation {
    stationuuid: Option<String>,
    name: Option<String>,
    url: Option<String>,
    favicon: Option<String>,
    tags: Option<String>,
    countrycode: Option<String>,
    codec: Option<String>,
    bitrate: Option<i64>,
    votes: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RadioBrowserFacet {
    name: Option<String>,
    iso_3166_1: Option<String>,
    iso_639: Option<String>,
    stationcount: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct PlayableUrl {
    #[serde(default)]
    url: Option<String>,
}

fn normalize_station(raw: RadioBrowserStation) -> Option<Station> {
    let id = StationId::new(Backend::RadioBrowser, raw.stationuuid?.trim())?;
    // Only casing changes; spacing and empty tags pass through.
    let tags: Vec<String> = raw
        .tags
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(capitalize)
        .collect();

    let mut station = Station::new(
        id,
        raw.name.unwrap_or_default(),
        raw.url.unwrap_or_default().trim(),
    );
    station.icon = raw.favicon.filter(|icon| !icon.trim().is_empty());
    station.description = Some(tags.join(", ")).filter(|joined| !joined.is_empty());
    station.genre = tags.into_iter().next().filter(|genre| !genre.is_empty());
    station.location = raw
        .countrycode
        .map(|code| code.trim().to_ascii_uppercase())
        .filter(|code| !code.is_empty());
    station.codec = raw.codec.filter(|codec| !codec.trim().is_empty());
    station.bitrate = raw.bitrate.and_then(|bitrate| u32::try_from(bitrate).ok());
    station.votes = raw.votes;
    Some(station)
}

fn country_directories(raw: Vec<RadioBrowserFacet>, threshold: u64) -> Vec<Directory> {
    // Upstream lists the same code in several spellings; merge them case-insensitively.
    let mut merged: Vec<(String, u64)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    for entry in raw {
        let code = match entry.iso_3166_1.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => code.to_lowercase(),
            _ => continue,
        };
        let count = match entry.stationcount {
            Some(count) if count > 0 => count,
            _ => continue,
        };
        match positions.get(&code) {
            Some(&index) => merged[index].1 += count,
            None => {
                positions.insert(code.clone(), merged.len());
                merged.push((code, count));
            }
        }
    }

    let mut directories: Vec<Directory> = merged
        .into_iter()
        .filter(|(_, count)| *count >= threshold)
        .map(|(code, count)| {
            let display_name = country_name(&code);
            Directory::new(code, count).with_display_name(display_name)
        })
        .collect();
    directories.sort_by(|a, b| a.display_name().cmp(b.display_name()));
    directories
}

fn language_directories(raw: Vec<RadioBrowserFacet>, threshold: u64) -> Vec<Directory> {
    raw.into_iter()
        .filter_map(|entry| {
            let name = entry.name.filter(|name| !name.is_empty())?;
            let count = entry.stationcount.filter(|count| *count > 0)?;
            if count < threshold {
                return None;
            }
            // Without a threshold, only proper ISO 639 languages make the list.
            let has_code = entry.iso_639.is_some_and(|code| !code.is_empty());
            if threshold == 0 && !has_code {
                return None;
            }
            let display_name = title_case(&name);
            Some(Directory::new(name, count).with_display_name(display_name))
        })
        .collect()
}

fn genre_directories(raw: Vec<RadioBrowserFacet>, threshold: u64) -> Vec<Directory> {
    raw.into_iter()
        .filter_map(|entry| {
            let name = entry.name.filter(|name| !name.is_empty())?;
            let count = entry.stationcount.filter(|count| *count > 0)?;
            if count < threshold {
                return None;
            }
            let display_name = capitalize(&name);
            Some(Directory::new(name, count).with_display_name(display_name))
        })
        .collect()
}

fn capitalize(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

fn title_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut in_word = false;
    for c in value.chars() {
        if c.is_alphabetic() {
            if in_word {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            result.push(c);
            in_word = false;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_user_agent;
    use pretty_assertions::assert_eq;

    fn facet(name: Option<&str>, iso_3166_1: Option<&str>, iso_639: Option<&str>, count: u64) -> RadioBrowserFacet {
        RadioBrowserFacet {
            name: name.map(str::to_string),
            iso_3166_1: iso_3166_1.map(str::to_string),
            iso_639: iso_639.map(str::to_string),
            stationcount: Some(count),
        }
    }

    fn config(base_url: &str) -> RadioBrowserConfig {
        RadioBrowserConfig {
            base_url: base_url.to_string(),
            user_agent: default_user_agent(),
            timeout_ms: 1000,
            station_limit: 200,
            min_country_stations: 5,
            min_language_stations: 0,
            min_genre_stations: 50,
            show_broken: false,
        }
    }

    #[test]
    fn station_json_maps_onto_the_station_model() {
        let raw: RadioBrowserStation = serde_json::from_value(json!({
            "stationuuid": "96062a7b-0601-11e8-ae97-52543be04c81",
            "name": "Radio Eins",
            "url": "https://radioeins.de/stream ",
            "favicon": "https://radioeins.de/favicon.png",
            "tags": "POP,rock ,indie",
            "countrycode": "de",
            "codec": "MP3",
            "bitrate": 128,
            "votes": 4321,
            "clickcount": 99
        }))
        .unwrap();

        let station = normalize_station(raw).unwrap();
        assert_eq!(
            station.id.to_string(),
            "RB_96062a7b-0601-11e8-ae97-52543be04c81"
        );
        assert_eq!(station.name, "Radio Eins");
        assert_eq!(station.url, "https://radioeins.de/stream");
        assert_eq!(station.icon.as_deref(), Some("https://radioeins.de/favicon.png"));
        assert_eq!(station.description.as_deref(), Some("Pop, Rock , Indie"));
        assert_eq!(station.genre.as_deref(), Some("Pop"));
        assert_eq!(station.location.as_deref(), Some("DE"));
        assert_eq!(station.codec.as_deref(), Some("MP3"));
        assert_eq!(station.bitrate, Some(128));
        assert_eq!(station.votes, Some(4321));
    }

    #[test]
    fn sparse_station_json_leaves_optionals_empty() {
        let raw: RadioBrowserStation = serde_json::from_value(json!({
            "stationuuid": "abc",
            "name": "Bare",
            "url": "http://bare.example.com",
            "favicon": "",
            "tags": "",
            "bitrate": -1
        }))
        .unwrap();

        let station = normalize_station(raw).unwrap();
        assert_eq!(station.icon, None);
        assert_eq!(station.description, None);
        assert_eq!(station.genre, None);
        assert_eq!(station.location, None);
        assert_eq!(station.bitrate, None);
    }

    #[test]
    fn stations_without_uuid_are_dropped() {
        let raw: RadioBrowserStation =
            serde_json::from_value(json!({ "name": "Nameless" })).unwrap();
        assert!(normalize_station(raw).is_none());
    }

    #[test]
    fn null_uuid_drops_only_that_station() {
        let raw: Vec<RadioBrowserStation> = serde_json::from_value(json!([
            { "stationuuid": null, "name": "Broken", "url": "http://broken.example.com" },
            { "stationuuid": "ok-1", "name": "Fine", "url": "http://fine.example.com" }
        ]))
        .unwrap();

        let stations: Vec<Station> = raw.into_iter().filter_map(normalize_station).collect();
        assert_eq!(stations.len(), 1);
        assert_eq!(stations[0].id.to_string(), "RB_ok-1");
    }

    #[test]
    fn tags_keep_spacing_and_empty_entries() {
        let raw: RadioBrowserStation = serde_json::from_value(json!({
            "stationuuid": "tags",
            "tags": ",jazz, smooth"
        }))
        .unwrap();

        let station = normalize_station(raw).unwrap();
        assert_eq!(station.description.as_deref(), Some(", Jazz,  smooth"));
        assert_eq!(station.genre, None);
    }

    #[test]
    fn countries_merge_case_variants_and_sort_by_name() {
        let raw = vec![
            facet(Some("Germany"), Some("DE"), None, 300),
            facet(Some("Austria"), Some("at"), None, 40),
            facet(Some("germany"), Some("de"), None, 12),
            facet(Some("Tiny"), Some("tv"), None, 3),
            facet(Some("Nowhere"), None, None, 90),
            facet(Some("Empty"), Some("fr"), None, 0),
        ];

        let directories = country_directories(raw, 5);
        let summary: Vec<(&str, u64, &str)> = directories
            .iter()
            .map(|d| (d.name.as_str(), d.item_count, d.display_name()))
            .collect();
        assert_eq!(
            summary,
            vec![("at", 40, "Austria"), ("de", 312, "Germany")]
        );
    }

    #[test]
    fn languages_without_threshold_require_an_iso_code() {
        let raw = vec![
            facet(Some("german"), None, Some("de"), 900),
            facet(Some("klingon"), None, None, 4),
            facet(Some("swiss german"), None, Some("gsw"), 12),
            facet(None, None, Some("xx"), 12),
        ];

        let directories = language_directories(raw, 0);
        let names: Vec<&str> = directories.iter().map(|d| d.display_name()).collect();
        assert_eq!(names, vec!["German", "Swiss German"]);
    }

    #[test]
    fn languages_with_threshold_ignore_iso_code() {
        let raw = vec![
            facet(Some("klingon"), None, None, 40),
            facet(Some("latin"), None, Some("la"), 2),
        ];
        let directories = language_directories(raw, 10);
        assert_eq!(directories.len(), 1);
        assert_eq!(directories[0].name, "klingon");
    }

    #[test]
    fn genres_below_threshold_are_hidden() {
        let raw = vec![
            facet(Some("jazz"), None, None, 60),
            facet(Some("polka"), None, None, 49),
            facet(Some("classic rock"), None, None, 51),
        ];

        let directories = genre_directories(raw, 50);
        let names: Vec<(&str, &str)> = directories
            .iter()
            .map(|d| (d.name.as_str(), d.display_name()))
            .collect();
        assert_eq!(names, vec![("jazz", "Jazz"), ("classic rock", "Classic rock")]);
    }

    #[test]
    fn text_helpers_follow_catalog_casing() {
        assert_eq!(capitalize("hIP hOP"), "Hip hop");
        assert_eq!(capitalize(""), "");
        assert_eq!(title_case("swiss german"), "Swiss German");
        assert_eq!(title_case("ol'chiki"), "Ol'Chiki");
    }

    #[test]
    fn endpoints_are_built_under_json_root() {
        let client = RadioBrowserClient::new(config("https://rb.example.org/")).unwrap();
        let url = client
            .endpoint(
                "https://rb.example.org/",
                &["stations", "bycountrycodeexact", "de"],
                &[("hidebroken", "true"), ("order", "name")],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://rb.example.org/json/stations/bycountrycodeexact/de?hidebroken=true&order=name"
        );

        let url = client
            .endpoint(
                "https://rb.example.org",
                &["stations", "bylanguageexact", "swiss german"],
                &[],
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://rb.example.org/json/stations/bylanguageexact/swiss%20german"
        );
    }

    #[test]
    fn host_pool_starts_with_configured_base_and_rotates() {
        let client = RadioBrowserClient::new(config("https://de1.api.radio-browser.info/")).unwrap();
        assert_eq!(client.host_pool.len(), RADIO_BROWSER_FALLBACK_HOSTS.len());
        assert_eq!(client.host_pool[0], "https://de1.api.radio-browser.info");

        let first = client.ordered_hosts();
        let second = client.ordered_hosts();
        assert_eq!(first[1], second[0]);
    }
}
