//! Static format catalog.

use std::fmt;

use convhub_core::types::Format;
use serde::{Deserialize, Serialize};

/// Coarse format grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Raster and vector images.
    Image,
    /// Text and page documents.
    Document,
    /// Tabular data.
    Spreadsheet,
    /// Slide decks.
    Presentation,
    /// Video containers.
    Video,
    /// Audio containers.
    Audio,
    /// Compressed archives.
    Archive,
}

const IMAGE: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "tiff", "gif", "svg", "ico"];
const DOCUMENT: &[&str] = &["pdf", "doc", "docx", "txt", "rtf", "odt", "epub", "mobi"];
const SPREADSHEET: &[&str] = &["xls", "xlsx", "csv", "ods"];
const PRESENTATION: &[&str] = &["ppt", "pptx", "odp"];
const VIDEO: &[&str] = &["mp4", "avi", "mov", "wmv", "flv", "mkv", "webm", "ogv", "m4v"];
const AUDIO: &[&str] = &["mp3", "wav", "flac", "aac", "ogg", "m4a", "wma", "aiff", "au"];
const ARCHIVE: &[&str] = &["zip", "rar", "7z", "tar", "gz", "bz2"];

impl Category {
    /// All categories.
    pub const ALL: [Self; 7] = [
        Self::Image,
        Self::Document,
        Self::Spreadsheet,
        Self::Presentation,
        Self::Video,
        Self::Audio,
        Self::Archive,
    ];

    /// Format names belonging to this category.
    pub fn formats(&self) -> &'static [&'static str] {
        match self {
            Self::Image => IMAGE,
            Self::Document => DOCUMENT,
            Self::Spreadsheet => SPREADSHEET,
            Self::Presentation => PRESENTATION,
            Self::Video => VIDEO,
            Self::Audio => AUDIO,
            Self::Archive => ARCHIVE,
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Image => "image",
            Self::Document => "document",
            Self::Spreadsheet => "spreadsheet",
            Self::Presentation => "presentation",
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Archive => "archive",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read-only mapping from format name to category.
#[derive(Debug, Clone, Copy, Default)]
pub struct FormatCatalog;

impl FormatCatalog {
    /// Category of `format`, or `None` when the format is unknown.
    pub fn category_of(&self, format: &Format) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|cat| cat.formats().contains(&format.as_str()))
    }

    /// Every catalogued format.
    pub fn all_formats(&self) -> impl Iterator<Item = Format> {
        Category::ALL
            .into_iter()
            .flat_map(|cat| cat.formats().iter())
            .filter_map(|name| Format::parse(name).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fmt(name: &str) -> Format {
        Format::parse(name).unwrap()
    }

    #[test]
    fn test_category_of_known_formats() {
        let catalog = FormatCatalog;
        assert_eq!(catalog.category_of(&fmt("PNG")), Some(Category::Image));
        assert_eq!(catalog.category_of(&fmt("docx")), Some(Category::Document));
        assert_eq!(catalog.category_of(&fmt("csv")), Some(Category::Spreadsheet));
        assert_eq!(catalog.category_of(&fmt("mkv")), Some(Category::Video));
        assert_eq!(catalog.category_of(&fmt("flac")), Some(Category::Audio));
        assert_eq!(catalog.category_of(&fmt("7z")), Some(Category::Archive));
        assert_eq!(catalog.category_of(&fmt("xyz")), None);
    }

    #[test]
    fn test_every_format_has_one_category() {
        let catalog = FormatCatalog;
        let mut seen = std::collections::HashSet::new();
        for format in catalog.all_formats() {
            assert!(seen.insert(format.clone()), "{format} listed twice");
            assert!(catalog.category_of(&format).is_some());
        }
    }
}
