use std::io::Write;

use quick_xml::{
    escape::partial_escape,
    events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event},
    Writer,
};
use serde_json::json;

use crate::logging::logger;

pub const INIT_TOKEN: &str = "<EncryptedToken>0000000000000000</EncryptedToken>";
pub const LINK_MARKER: &str = "vtuner=true";
const RELIABILITY: &str = "3";
const ROOT: &str = "ListOfItems";
const UNSET_COUNT: &str = "-1";

/// Receivers append their own parameters to returned links with a bare `&`,
/// so every link has to carry a query string already.
pub fn with_link_marker(url: &str) -> String {
    if url.contains('?') {
        format!("{url}&{LINK_MARKER}")
    } else {
        format!("{url}?{LINK_MARKER}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryItem {
    pub title: String,
    pub url: String,
    pub item_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationItem {
    pub id: String,
    pub name: String,
    pub url: String,
    pub icon: Option<String>,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub location: Option<String>,
    pub mime: Option<String>,
    pub bitrate: Option<u32>,
    pub bookmark: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Directory(DirectoryItem),
    Station(StationItem),
    Display(String),
    Search { caption: String, url: String },
    Previous { url: String },
}

impl Item {
    pub fn directory(title: impl Into<String>, url: impl Into<String>, item_count: u64) -> Self {
        Item::Directory(DirectoryItem {
            title: title.into(),
            url: url.into(),
            item_count: Some(item_count),
        })
    }

    pub fn display(text: impl Into<String>) -> Self {
        Item::Display(text.into())
    }

    fn write<W: Write>(&self, writer: &mut Writer<W>) -> anyhow::Result<()> {
        writer.write_event(Event::Start(BytesStart::new("Item")))?;
        match self {
            Item::Directory(directory) => {
                let link = with_link_marker(&directory.url);
                write_field(writer, "ItemType", "Dir")?;
                write_field(writer, "Title", &directory.title)?;
                write_field(writer, "UrlDir", &link)?;
                write_field(writer, "UrlDirBackUp", &link)?;
                let count = directory
                    .item_count
                    .map(|count| count.to_string())
                    .unwrap_or_else(|| UNSET_COUNT.to_string());
                write_field(writer, "DirCount", &count)?;
            }
            Item::Station(station) => {
                let bandwidth = station
                    .bitrate
                    .filter(|bitrate| *bitrate > 0)
                    .map(|bitrate| bitrate.to_string());
                write_field(writer, "ItemType", "Station")?;
                write_field(writer, "StationId", &station.id)?;
                write_field(writer, "StationName", &station.name)?;
                write_field(writer, "StationUrl", &station.url)?;
                write_optional(writer, "Logo", station.icon.as_deref())?;
                write_optional(writer, "StationDesc", station.description.as_deref())?;
                write_optional(writer, "StationFormat", station.genre.as_deref())?;
                write_optional(writer, "StationLocation", station.location.as_deref())?;
                write_optional(writer, "StationMime", station.mime.as_deref())?;
                write_optional(writer, "StationBandWidth", bandwidth.as_deref())?;
                write_optional(writer, "Bookmark", station.bookmark.as_deref())?;
                write_field(writer, "Relia", RELIABILITY)?;
            }
            Item::Display(text) => {
                write_field(writer, "ItemType", "Display")?;
                write_field(writer, "Display", text)?;
            }
            Item::Search { caption, url } => {
                let link = with_link_marker(url);
                write_field(writer, "ItemType", "Search")?;
                write_field(writer, "SearchURL", &link)?;
                write_field(writer, "SearchURLBackUp", &link)?;
                write_field(writer, "SearchCaption", caption)?;
                write_optional(writer, "SearchTextbox", None)?;
                write_field(writer, "SearchButtonGo", "Search")?;
                write_field(writer, "SearchButtonCancel", "Cancel")?;
            }
            Item::Previous { url } => {
                let link = with_link_marker(url);
                write_field(writer, "ItemType", "Previous")?;
                write_field(writer, "UrlPrevious", &link)?;
                write_field(writer, "UrlPreviousBackUp", &link)?;
            }
        }
        writer.write_event(Event::End(BytesEnd::new("Item")))?;
        Ok(())
    }
}

impl From<StationItem> for Item {
    fn from(station: StationItem) -> Self {
        Item::Station(station)
    }
}

/// One directory document. The declared count is what the receiver pages
/// against and is independent of how many items were actually added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    items: Vec<Item>,
    count: Option<usize>,
    dont_cache: bool,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message(text: impl Into<String>) -> Self {
        let mut page = Self::new();
        page.add(Item::display(text));
        page.set_count(1);
        page
    }

    pub fn add(&mut self, item: impl Into<Item>) {
        self.items.push(item.into());
    }

    pub fn set_count(&mut self, count: usize) {
        self.count = Some(count);
    }

    pub fn set_dont_cache(&mut self, dont_cache: bool) {
        self.dont_cache = dont_cache;
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn count(&self) -> Option<usize> {
        self.count
    }

    pub fn to_xml(&self) -> String {
        match self.render() {
            Ok(document) => document,
            Err(error) => {
                logger().error(
                    "vtuner.render_failed",
                    json!({
                        "error": error.to_string(),
                        "items": self.items.len(),
                    }),
                );
                fallback_document()
            }
        }
    }

    fn render(&self) -> anyhow::Result<String> {
        let mut writer = Writer::new(Vec::new());
        write_declaration(&mut writer)?;
        writer.write_event(Event::Start(BytesStart::new(ROOT)))?;
        let count = self
            .count
            .map(|count| count.to_string())
            .unwrap_or_else(|| UNSET_COUNT.to_string());
        write_field(&mut writer, "ItemCount", &count)?;
        if self.dont_cache {
            write_field(&mut writer, "NoDataCache", "Yes")?;
        }
        for item in &self.items {
            item.write(&mut writer)?;
        }
        writer.write_event(Event::End(BytesEnd::new(ROOT)))?;
        Ok(String::from_utf8(writer.into_inner())?)
    }
}

impl From<Item> for Page {
    fn from(item: Item) -> Self {
        let mut page = Page::new();
        page.add(item);
        page.set_count(1);
        page
    }
}

fn write_declaration<W: Write>(writer: &mut Writer<W>) -> anyhow::Result<()> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
    Ok(())
}

fn write_optional<W: Write>(
    writer: &mut Writer<W>,
    name: &str,
    text: Option<&str>,
) -> anyhow::Result<()> {
    write_field(writer, name, text.unwrap_or_default())
}

fn write_field<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> anyhow::Result<()> {
    if text.is_empty() {
        // Receivers were built against `<Tag />` for empty fields.
        let content = format!("{name} ");
        writer.write_event(Event::Empty(BytesStart::from_content(content, name.len())))?;
        return Ok(());
    }
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::from_escaped(partial_escape(text))))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn fallback_document() -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><{ROOT}><ItemCount>{UNSET_COUNT}</ItemCount></{ROOT}>"#
    )
}
