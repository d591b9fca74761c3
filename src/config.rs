use std::{env, net::IpAddr, path::PathBuf};

use serde::Serialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Message(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub bind_address: IpAddr,
    pub port: u16,
    pub stations_file: PathBuf,
    pub cache_dir: PathBuf,
    pub station_tracking: bool,
    pub radio_browser: RadioBrowserConfig,
    pub icons: IconConfig,
}

#[derive(Debug, Clone, Serialize)]
pub struct RadioBrowserConfig {
    pub base_url: String,
    pub user_agent: String,
    pub timeout_ms: u64,
    pub station_limit: usize,
    pub min_country_stations: u64,
    pub min_language_stations: u64,
    pub min_genre_stations: u64,
    pub show_broken: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct IconConfig {
    pub max_size: u32,
    pub user_agent: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let bind_address = match env::var("BIND_ADDRESS") {
            Ok(value) => value
                .trim()
                .parse()
                .map_err(|_| ConfigError::Message("BIND_ADDRESS must be an IP address".into()))?,
            Err(_) => IpAddr::from([0, 0, 0, 0]),
        };
        let port = env_u16("PORT", 80)?;
        let stations_file = env::var("STATIONS_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("stations.yml"));
        let cache_dir = env::var("CACHE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_cache_dir());
        let station_tracking = env_bool("STATION_TRACKING").unwrap_or(true);
        let radio_browser = RadioBrowserConfig::from_env()?;
        let icons = IconConfig {
            max_size: env_u32("ICON_MAX_SIZE", 290)?,
            user_agent: radio_browser.user_agent.clone(),
        };
        if icons.max_size == 0 {
            return Err(ConfigError::Message(
                "ICON_MAX_SIZE must be greater than zero.".into(),
            ));
        }

        Ok(Self {
            bind_address,
            port,
            stations_file,
            cache_dir,
            station_tracking,
            radio_browser,
            icons,
        })
    }

    pub fn default_public_host(&self) -> String {
        if self.port == 80 {
            self.bind_address.to_string()
        } else {
            format!("{}:{}", self.bind_address, self.port)
        }
    }
}

impl RadioBrowserConfig {
    fn from_env() -> Result<Self, ConfigError> {
        const DEFAULT_BASE_URL: &str = "https://all.api.radio-browser.info";

        let config = Self {
            base_url: env::var("RADIO_BROWSER_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
            user_agent: env::var("RADIO_BROWSER_USER_AGENT")
                .unwrap_or_else(|_| default_user_agent()),
            timeout_ms: env_u64("RADIO_BROWSER_TIMEOUT_MS", 10_000)?,
            station_limit: env_usize("RADIO_BROWSER_STATION_LIMIT", 200)?,
            min_country_stations: env_u64("RADIO_BROWSER_MIN_COUNTRY_STATIONS", 5)?,
            min_language_stations: env_u64("RADIO_BROWSER_MIN_LANGUAGE_STATIONS", 0)?,
            min_genre_stations: env_u64("RADIO_BROWSER_MIN_GENRE_STATIONS", 50)?,
            show_broken: env_bool("RADIO_BROWSER_SHOW_BROKEN").unwrap_or(false),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.user_agent.trim().is_empty() {
            return Err(ConfigError::Message(
                "A Radio Browser user agent must be provided.".into(),
            ));
        }
        if self.station_limit == 0 {
            return Err(ConfigError::Message(
                "RADIO_BROWSER_STATION_LIMIT must be greater than zero.".into(),
            ));
        }
        let base_url = Url::parse(&self.base_url).map_err(|err| {
            ConfigError::Message(format!("Invalid Radio Browser base URL: {err}"))
        })?;
        if base_url.scheme() != "https" && base_url.scheme() != "http" {
            return Err(ConfigError::Message(
                "RADIO_BROWSER_BASE_URL must use http or https".into(),
            ));
        }
        Ok(())
    }

    pub fn hide_broken(&self) -> &'static str {
        if self.show_broken {
            "false"
        } else {
            "true"
        }
    }
}

pub fn default_user_agent() -> String {
    format!("vtuner-gateway/{}", env!("CARGO_PKG_VERSION"))
}

fn default_cache_dir() -> PathBuf {
    let home = env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".ycast").join("cache")
}

fn env_u16(key: &str, default: u16) -> Result<u16, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Message(format!("{key} must be a valid u16"))),
        Err(_) => Ok(default),
    }
}

fn env_u32(key: &str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Message(format!("{key} must be a valid u32"))),
        Err(_) => Ok(default),
    }
}

fn env_u64(key: &str, default: u64) -> Result<u64, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Message(format!("{key} must be a valid u64"))),
        Err(_) => Ok(default),
    }
}

fn env_usize(key: &str, default: usize) -> Result<usize, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Message(format!("{key} must be a valid usize"))),
        Err(_) => Ok(default),
    }
}

fn env_bool(key: &str) -> Option<bool> {
    match env::var(key) {
        Ok(value) => match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            _ => None,
        },
        Err(_) => None,
    }
}
