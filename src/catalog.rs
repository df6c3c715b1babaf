use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::feed::HERO_ITEM_ID;

const USER_AGENT: &str = "reel-tui/0.1";

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed catalog JSON")]
    Parse(#[from] serde_json::Error),
    #[error("catalog request failed")]
    Http(#[from] reqwest::Error),
    #[error("duplicate catalog id {0:?}")]
    DuplicateId(String),
    #[error("catalog entry {0:?} has an empty video url")]
    EmptyUrl(String),
    #[error("catalog id {0:?} is reserved for the handed-off video")]
    ReservedId(String),
}

/// One "continue watching" record as delivered by a catalog source.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub cover: String,
    pub video_url: String,
}

/// The featured video shown on the home tab.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroFeature {
    pub poster: String,
    pub video_url: String,
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub hero: HeroFeature,
    pub continue_watching: Vec<CatalogEntry>,
}

/// A playable entry of the shorts feed.
#[derive(Clone, Debug, PartialEq)]
pub struct VideoItem {
    pub id: String,
    pub video_url: String,
    pub current_time: Option<f64>,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl From<&CatalogEntry> for VideoItem {
    fn from(entry: &CatalogEntry) -> Self {
        Self {
            id: entry.id.clone(),
            video_url: entry.video_url.clone(),
            current_time: None,
            title: Some(entry.title.clone()),
            description: None,
        }
    }
}

impl Catalog {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.hero.video_url.trim().is_empty() {
            return Err(CatalogError::EmptyUrl("hero".to_string()));
        }

        let mut seen = HashSet::new();
        for entry in &self.continue_watching {
            if entry.id == HERO_ITEM_ID {
                return Err(CatalogError::ReservedId(entry.id.clone()));
            }
            if !seen.insert(entry.id.as_str()) {
                return Err(CatalogError::DuplicateId(entry.id.clone()));
            }
            if entry.video_url.trim().is_empty() {
                return Err(CatalogError::EmptyUrl(entry.id.clone()));
            }
        }
        Ok(())
    }

    pub fn feed_items(&self) -> Vec<VideoItem> {
        self.continue_watching.iter().map(VideoItem::from).collect()
    }

    pub fn from_json(raw: &str) -> Result<Self, CatalogError> {
        let catalog: Catalog = serde_json::from_str(raw)?;
        catalog.validate()?;
        Ok(catalog)
    }
}

pub trait CatalogProvider {
    fn load(&self) -> Result<Catalog, CatalogError>;
}

/// Catalog compiled into the binary.
pub struct StaticCatalog {
    catalog: Catalog,
}

impl StaticCatalog {
    pub fn new(catalog: Catalog) -> Self {
        Self { catalog }
    }

    pub fn builtin() -> Self {
        const MEDIA: &str =
            "https://firebasestorage.googleapis.com/v0/b/jekinraa-5ce61.appspot.com/o/testvideoapp%2F";
        const POSTERS: &str =
            "https://097d0e9f.customer.static.core.one.accedo.tv/097d0e9f2de0f04b/image/collection";

        let entry = |id: &str, title: &str, poster: &str, episode: &str, token: &str| CatalogEntry {
            id: id.to_string(),
            title: title.to_string(),
            cover: format!("{POSTERS}/{poster}"),
            video_url: format!("{MEDIA}Billionaire.bride.{episode}.mp4?alt=media&token={token}"),
        };

        Self::new(Catalog {
            hero: HeroFeature {
                poster: format!(
                    "{POSTERS}/GLOW/poster/portrait/960x1440_tt?locale=en&t=resize%3Aw480%7Ccrop%3Aportrait"
                ),
                video_url: format!(
                    "{MEDIA}Billionaire.bride.E2.mp4?alt=media&token=6bb1bde4-2440-4bf8-a056-01969708fdc6"
                ),
            },
            continue_watching: vec![
                entry(
                    "1",
                    "Better Call Saul",
                    "WAYHNA00/poster/portrait/960x1440_tt?locale=en&t=resize%3Aw160%7Ccrop%3Aportrait",
                    "E3",
                    "8f8746fe-aceb-494f-a28d-c237dc5d21cc",
                ),
                entry(
                    "2",
                    "Movie 2",
                    "WCTH/poster/portrait/960x1440_tt?locale=en",
                    "E4",
                    "fc4a050c-fcd2-487a-baf9-0622833e5cbc",
                ),
                entry(
                    "3",
                    "The Boys",
                    "CARTNA00/poster/portrait/720x1080_tt?locale=en",
                    "E5",
                    "6cfffaa1-7fc8-4807-936d-0826b535e97f",
                ),
            ],
        })
    }
}

impl CatalogProvider for StaticCatalog {
    fn load(&self) -> Result<Catalog, CatalogError> {
        self.catalog.validate()?;
        Ok(self.catalog.clone())
    }
}

/// Catalog read from a JSON document on disk.
pub struct FileCatalog {
    path: PathBuf,
}

impl FileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogProvider for FileCatalog {
    fn load(&self) -> Result<Catalog, CatalogError> {
        let raw = std::fs::read_to_string(&self.path).map_err(|source| CatalogError::Read {
            path: self.path.clone(),
            source,
        })?;
        let catalog = Catalog::from_json(&raw)?;
        info!(
            path = %self.path.display(),
            entries = catalog.continue_watching.len(),
            "catalog loaded from file"
        );
        Ok(catalog)
    }
}

/// Catalog fetched as JSON over HTTP.
pub struct RemoteCatalog {
    client: Client,
    url: String,
}

impl RemoteCatalog {
    pub fn new(url: String) -> Result<Self, CatalogError> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(10))
            .build()?;
        Ok(Self { client, url })
    }
}

impl CatalogProvider for RemoteCatalog {
    fn load(&self) -> Result<Catalog, CatalogError> {
        info!(url = %self.url, "fetching catalog");
        let raw = self
            .client
            .get(&self.url)
            .send()?
            .error_for_status()?
            .text()?;
        Catalog::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"{
        "hero": { "poster": "poster.jpg", "videoUrl": "hero.mp4" },
        "continueWatching": [
            { "id": "a", "title": "Alpha", "cover": "a.jpg", "videoUrl": "a.mp4" },
            { "id": "b", "title": "Beta", "videoUrl": "b.mp4" }
        ]
    }"#;

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = StaticCatalog::builtin().load().unwrap();
        assert_eq!(catalog.continue_watching.len(), 3);
        assert_eq!(catalog.continue_watching[0].title, "Better Call Saul");
        assert!(catalog.hero.video_url.contains("Billionaire.bride.E2.mp4"));
    }

    #[test]
    fn parses_camel_case_json() {
        let catalog = Catalog::from_json(SAMPLE).unwrap();
        assert_eq!(catalog.hero.video_url, "hero.mp4");
        assert_eq!(catalog.continue_watching[1].cover, "");

        let items = catalog.feed_items();
        assert_eq!(items[0].id, "a");
        assert_eq!(items[0].title.as_deref(), Some("Alpha"));
        assert_eq!(items[0].current_time, None);
    }

    #[test]
    fn rejects_duplicate_ids_and_blank_urls() {
        let dup = SAMPLE.replace(r#""id": "b""#, r#""id": "a""#);
        assert!(matches!(
            Catalog::from_json(&dup),
            Err(CatalogError::DuplicateId(id)) if id == "a"
        ));

        let blank = SAMPLE.replace(r#""videoUrl": "b.mp4""#, r#""videoUrl": "  ""#);
        assert!(matches!(
            Catalog::from_json(&blank),
            Err(CatalogError::EmptyUrl(id)) if id == "b"
        ));
    }

    #[test]
    fn rejects_the_handoff_item_id() {
        let reserved = SAMPLE.replace(r#""id": "a""#, &format!(r#""id": "{HERO_ITEM_ID}""#));
        let err = Catalog::from_json(&reserved).unwrap_err();
        assert!(matches!(&err, CatalogError::ReservedId(id) if id == HERO_ITEM_ID));
        assert!(err.to_string().contains("reserved"));
    }

    #[test]
    fn file_catalog_reads_json_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let catalog = FileCatalog::new(file.path()).load().unwrap();
        assert_eq!(catalog.continue_watching.len(), 2);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = FileCatalog::new("/nonexistent/catalog.json")
            .load()
            .unwrap_err();
        assert!(matches!(err, CatalogError::Read { .. }));
        assert!(err.to_string().contains("/nonexistent/catalog.json"));
    }
}
