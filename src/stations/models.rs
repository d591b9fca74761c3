use serde::Serialize;

use super::StationId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Station {
    pub id: StationId,
    pub name: String,
    pub url: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub location: Option<String>,
    pub codec: Option<String>,
    pub bitrate: Option<u32>,
    pub votes: Option<i64>,
}

impl Station {
    pub fn new(id: StationId, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            url: url.into(),
            icon: None,
            description: None,
            genre: None,
            location: None,
            codec: None,
            bitrate: None,
            votes: None,
        }
    }
}

/// A browsable grouping: static-list category, country, language or genre.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Directory {
    pub name: String,
    pub item_count: u64,
    #[serde(rename = "displayName")]
    display_name: Option<String>,
}

impl Directory {
    pub fn new(name: impl Into<String>, item_count: u64) -> Self {
        Self {
            name: name.into(),
            item_count,
            display_name: None,
        }
    }

    pub fn with_display_name(mut self, display_name: impl Into<String>) -> Self {
        let display_name = display_name.into();
        self.display_name = if display_name.is_empty() {
            None
        } else {
            Some(display_name)
        };
        self
    }

    pub fn display_name(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_falls_back_to_raw_name() {
        assert_eq!(Directory::new("de", 120).display_name(), "de");
        assert_eq!(
            Directory::new("de", 120)
                .with_display_name("Germany")
                .display_name(),
            "Germany"
        );
        assert_eq!(
            Directory::new("jazz", 60).with_display_name("").display_name(),
            "jazz"
        );
    }
}
