//! External converter tool configuration.

use serde::{Deserialize, Serialize};

/// Paths of the external tools used by the process converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConvertersConfig {
    /// ffmpeg binary used for audio and video.
    #[serde(default = "default_ffmpeg")]
    pub ffmpeg_path: String,
    /// LibreOffice binary used for office documents.
    #[serde(default = "default_office")]
    pub office_path: String,
    /// Scratch directory for tool input/output files. Defaults to the
    /// system temp directory.
    #[serde(default)]
    pub temp_dir: Option<String>,
}

impl Default for ConvertersConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: default_ffmpeg(),
            office_path: default_office(),
            temp_dir: None,
        }
    }
}

fn default_ffmpeg() -> String {
    "ffmpeg".to_string()
}

fn default_office() -> String {
    "soffice".to_string()
}
