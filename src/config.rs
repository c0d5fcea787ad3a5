use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, MuxError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub media: MediaConfig,
    pub pairing: PairingConfig,
    pub encoding: EncodingConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub binary_path: String,
    /// Path to ffprobe binary, used only for progress totals
    pub probe_path: String,
    /// Additional output options appended before the output path
    /// e.g. ["-movflags", "+faststart"]
    pub extra_options: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PairingConfig {
    /// Extensions treated as video files (lowercase, no dot)
    pub video_extensions: Vec<String>,
    /// Extensions treated as subtitle files (lowercase, no dot)
    pub subtitle_extensions: Vec<String>,
    /// Appended to the video stem to name the output
    pub output_suffix: String,
    /// Extension of generated files
    pub output_extension: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodingConfig {
    /// Encoding used when detection is not confident
    pub fallback: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write a daily-rotated log file into this directory
    pub directory: Option<PathBuf>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            binary_path: "ffmpeg".to_string(),
            probe_path: "ffprobe".to_string(),
            extra_options: Vec::new(),
        }
    }
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            video_extensions: ["mp4", "m4v", "mov", "mkv", "avi", "webm"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            subtitle_extensions: ["srt", "ass", "ssa", "vtt"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            output_suffix: "-with-subs".to_string(),
            output_extension: "mp4".to_string(),
        }
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            fallback: "UTF-8".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MuxError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.media.binary_path.trim().is_empty() {
            return Err(MuxError::Config("media.binary_path must not be empty".to_string()));
        }
        if self.pairing.output_suffix.is_empty() {
            return Err(MuxError::Config(
                "pairing.output_suffix must not be empty, outputs would overwrite their inputs".to_string(),
            ));
        }
        if self.pairing.output_extension.trim_start_matches('.').is_empty() {
            return Err(MuxError::Config("pairing.output_extension must not be empty".to_string()));
        }
        if self.encoding.fallback.trim().is_empty() {
            return Err(MuxError::Config("encoding.fallback must not be empty".to_string()));
        }
        Ok(())
    }
}
