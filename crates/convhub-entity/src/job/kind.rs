//! Conversion kinds.

use std::fmt;
use std::str::FromStr;

use convhub_core::AppError;
use serde::{Deserialize, Serialize};

/// The operation a job performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionKind {
    /// Plain format-to-format conversion.
    FormatTranscode,
    /// Raster resize, optionally with a format change.
    ImageResize,
    /// Audio track extraction from audio or video.
    AudioExtract,
    /// Document rendering (to PDF or images).
    DocumentRender,
}

impl ConversionKind {
    /// All kinds.
    pub const ALL: [Self; 4] = [
        Self::FormatTranscode,
        Self::ImageResize,
        Self::AudioExtract,
        Self::DocumentRender,
    ];

    /// Return the kind as a kebab-case string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FormatTranscode => "format-transcode",
            Self::ImageResize => "image-resize",
            Self::AudioExtract => "audio-extract",
            Self::DocumentRender => "document-render",
        }
    }
}

impl fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConversionKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s.trim())
            .ok_or_else(|| AppError::validation(format!("Unknown conversion kind '{s}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_round_trips_names() {
        for kind in ConversionKind::ALL {
            assert_eq!(kind.as_str().parse::<ConversionKind>().unwrap(), kind);
        }
        assert!("pdf-merge".parse::<ConversionKind>().is_err());
    }

    #[test]
    fn test_serde_kebab_case() {
        let json = serde_json::to_string(&ConversionKind::ImageResize).unwrap();
        assert_eq!(json, "\"image-resize\"");
    }
}
