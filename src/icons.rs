use std::{
    io::Cursor,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context;
use image::{imageops, imageops::FilterType, DynamicImage, ImageFormat, Rgba, RgbaImage};
use reqwest::{Client, StatusCode};
use serde_json::json;

use crate::{config::IconConfig, logging::logger, stations::Station};

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Station logos, transcoded to small opaque JPEGs and kept on disk.
#[derive(Clone)]
pub struct IconCache {
    dir: PathBuf,
    max_size: u32,
    client: Client,
}

impl IconCache {
    pub fn new(cache_dir: &Path, config: &IconConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("failed to build icon http client")?;
        Ok(Self {
            dir: cache_dir.join("icons"),
            max_size: config.max_size,
            client,
        })
    }

    /// `None` when the station has no icon or it could not be produced.
    pub async fn icon_for(&self, station: &Station) -> Option<Vec<u8>> {
        let icon_url = station.icon.as_deref()?;
        let station_id = station.id.to_string();
        match self.load_or_fetch(&station_id, icon_url).await {
            Ok(bytes) => Some(bytes),
            Err(error) => {
                logger().warn(
                    "icon.unavailable",
                    json!({
                        "stationId": station_id,
                        "iconUrl": icon_url,
                        "error": format!("{error:#}"),
                    }),
                );
                None
            }
        }
    }

    fn cache_path(&self, station_id: &str) -> PathBuf {
        let file_name: String = station_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(file_name)
    }

    async fn load_or_fetch(&self, station_id: &str, icon_url: &str) -> anyhow::Result<Vec<u8>> {
        let path = self.cache_path(station_id);
        if let Ok(bytes) = tokio::fs::read(&path).await {
            return Ok(bytes);
        }

        let response = self.client.get(icon_url).send().await?;
        if response.status() != StatusCode::OK {
            anyhow::bail!("icon server returned {}", response.status());
        }
        let original = response.bytes().await?.to_vec();

        let max_size = self.max_size;
        let jpeg = tokio::task::spawn_blocking(move || transcode(&original, max_size)).await??;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create {}", self.dir.display()))?;
        tokio::fs::write(&path, &jpeg)
            .await
            .with_context(|| format!("failed to write {}", path.display()))?;
        logger().debug(
            "icon.cached",
            json!({ "stationId": station_id, "bytes": jpeg.len() }),
        );
        Ok(jpeg)
    }
}

/// Decodes any supported image, flattens transparency onto white, scales it so
/// the longer side is `max_size` and re-encodes as JPEG.
pub fn transcode(original: &[u8], max_size: u32) -> anyhow::Result<Vec<u8>> {
    let decoded = image::load_from_memory(original).context("unsupported icon image")?;

    let mut flattened = RgbaImage::from_pixel(
        decoded.width(),
        decoded.height(),
        Rgba([255, 255, 255, 255]),
    );
    imageops::overlay(&mut flattened, &decoded.to_rgba8(), 0, 0);
    let icon =
        DynamicImage::ImageRgba8(flattened).resize(max_size, max_size, FilterType::Lanczos3);

    let mut encoded = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(icon.to_rgb8()).write_to(&mut encoded, ImageFormat::Jpeg)?;
    Ok(encoded.into_inner())
}
