// Media processing over the ffmpeg/ffprobe binaries
//
// - Commands: argument builders and process execution
// - Processor: the ffmpeg-backed implementation of the trait below

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::path::Path;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::Result;
use crate::pairing::Job;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaProcessorTrait: Send + Sync {
    /// Mux the job's subtitle into a copy of its video
    async fn mux_subtitles(&self, job: &Job) -> Result<()>;

    /// Duration, resolution and codec details, if the prober can tell
    async fn probe_info(&self, media_path: &Path) -> Option<VideoInfo>;

    /// Check if the media processor can be run
    async fn check_availability(&self) -> Result<()>;
}

pub struct MediaProcessorFactory;

impl MediaProcessorFactory {
    /// Create the default media processor implementation (FFmpeg-based)
    pub fn create_processor(config: MediaConfig, show_progress: bool) -> Box<dyn MediaProcessorTrait> {
        Box::new(processor::MediaProcessorImpl::new(config, show_progress))
    }
}
