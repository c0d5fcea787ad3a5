use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{MediaCommandBuilder, MediaProcessorTrait};
use crate::config::MediaConfig;
use crate::error::{MuxError, Result};
use crate::pairing::Job;
use crate::progress::create_bar;
use crate::subtitle::format_hms;

/// Concrete implementation of media processor (FFmpeg-based)
pub struct MediaProcessorImpl {
    config: MediaConfig,
    command_builder: MediaCommandBuilder,
    show_progress: bool,
}

/// What ffprobe could tell about a video file
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VideoInfo {
    pub duration: Option<Duration>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub video_codec: Option<String>,
    /// Bits per second
    pub video_bitrate: Option<u64>,
    pub audio_codec: Option<String>,
    pub audio_bitrate: Option<u64>,
    pub audio_channels: Option<u32>,
}

impl fmt::Display for VideoInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unknown = || "unknown".to_string();
        let kbps = |bits: Option<u64>| bits.map(|b| format!("{} kb/s", b / 1000)).unwrap_or_else(unknown);

        let duration = self.duration.map(format_hms).unwrap_or_else(unknown);
        let resolution = match (self.width, self.height) {
            (Some(w), Some(h)) => format!("{}x{}", w, h),
            _ => unknown(),
        };
        let frame_rate = self.frame_rate.map(|r| format!("{:.3} fps", r)).unwrap_or_else(unknown);

        write!(
            f,
            "duration {}, {} at {}, video {} ({}), audio {} ({}, {} channels)",
            duration,
            resolution,
            frame_rate,
            self.video_codec.clone().unwrap_or_else(unknown),
            kbps(self.video_bitrate),
            self.audio_codec.clone().unwrap_or_else(unknown),
            kbps(self.audio_bitrate),
            self.audio_channels.map(|c| c.to_string()).unwrap_or_else(unknown),
        )
    }
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    bit_rate: Option<String>,
    channels: Option<u32>,
}

impl MediaProcessorImpl {
    pub fn new(config: MediaConfig, show_progress: bool) -> Self {
        let command_builder = MediaCommandBuilder::new(&config.binary_path, &config.probe_path);

        Self {
            config,
            command_builder,
            show_progress,
        }
    }
}

/// Turn `ffprobe -of json` output into a `VideoInfo`.
/// The first video and first audio stream win.
pub fn parse_probe_info(json: &[u8]) -> Result<VideoInfo> {
    let probe: ProbeOutput = serde_json::from_slice(json)?;

    let mut info = VideoInfo {
        duration: probe
            .format
            .duration
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs > 0.0)
            .map(Duration::from_secs_f64),
        ..Default::default()
    };

    let first = |kind: &str| {
        probe
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some(kind))
    };

    if let Some(video) = first("video") {
        info.width = video.width;
        info.height = video.height;
        info.frame_rate = video.r_frame_rate.as_deref().and_then(parse_frame_rate);
        info.video_codec = video.codec_name.clone();
        info.video_bitrate = video.bit_rate.as_deref().and_then(parse_bitrate);
    }
    if let Some(audio) = first("audio") {
        info.audio_codec = audio.codec_name.clone();
        info.audio_bitrate = audio.bit_rate.as_deref().and_then(parse_bitrate);
        info.audio_channels = audio.channels;
    }

    Ok(info)
}

// "24000/1001" or "25"; "0/0" means unknown
fn parse_frame_rate(rate: &str) -> Option<f64> {
    let value = match rate.split_once('/') {
        Some((num, den)) => {
            let den = den.trim().parse::<f64>().ok()?;
            if den == 0.0 {
                return None;
            }
            num.trim().parse::<f64>().ok()? / den
        }
        None => rate.trim().parse::<f64>().ok()?,
    };
    (value.is_finite() && value > 0.0).then_some(value)
}

fn parse_bitrate(bits: &str) -> Option<u64> {
    bits.trim().parse().ok()
}

/// Remove what an interrupted job left at its output path.
/// Returns whether a file was there.
pub fn remove_partial_output(output: &Path) -> Result<bool> {
    match std::fs::remove_file(output) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl MediaProcessorTrait for MediaProcessorImpl {
    async fn mux_subtitles(&self, job: &Job) -> Result<()> {
        info!(
            "Muxing {} into {} -> {}",
            job.subtitle.display(),
            job.video.display(),
            job.output.display()
        );

        let total = if self.show_progress {
            self.probe_info(&job.video).await.and_then(|info| info.duration)
        } else {
            None
        };
        let pb = create_bar(total, self.show_progress);

        let command = self
            .command_builder
            .mux_subtitles(job, &self.config.extra_options);
        let result = command.execute_with_progress(&pb).await;
        pb.finish_and_clear();

        // The output did not exist when the job started, so whatever is there now is ours
        if let Err(MuxError::Interrupted(_)) = &result {
            match remove_partial_output(&job.output) {
                Ok(true) => info!("Removed partial output: {}", job.output.display()),
                Ok(false) => {}
                Err(e) => warn!("Could not remove partial output {}: {}", job.output.display(), e),
            }
        }
        result?;

        info!("Subtitle muxing completed successfully");
        Ok(())
    }

    async fn probe_info(&self, media_path: &Path) -> Option<VideoInfo> {
        let command = self.command_builder.probe_info(media_path);
        let parsed = match command.execute().await {
            Ok(stdout) => parse_probe_info(&stdout),
            Err(e) => Err(e),
        };

        match parsed {
            Ok(info) => Some(info),
            Err(e) => {
                debug!("Media info probe failed for {}: {}", media_path.display(), e);
                None
            }
        }
    }

    async fn check_availability(&self) -> Result<()> {
        let stdout = self.command_builder.version_check().execute().await?;
        let version_info = String::from_utf8_lossy(&stdout);
        let first_line = version_info.lines().next().unwrap_or("unknown version");
        info!("Media processor is available: {}", first_line);
        Ok(())
    }
}
