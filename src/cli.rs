use clap::Parser;
use std::path::PathBuf;

/// Soft-mux a subtitle track into a video with ffmpeg
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Input video file
    #[arg(required_unless_present = "tv", conflicts_with = "tv")]
    pub video: Option<PathBuf>,

    /// Subtitle file to attach as a selectable track
    #[arg(required_unless_present = "tv", conflicts_with = "tv")]
    pub subtitle: Option<PathBuf>,

    /// Process every video/subtitle pair in a directory (non-recursive)
    #[arg(long, value_name = "DIRECTORY")]
    pub tv: Option<PathBuf>,

    /// Output file (single pair only)
    #[arg(short, long, conflicts_with_all = ["tv", "output_dir"])]
    pub output: Option<PathBuf>,

    /// Directory for generated files (defaults to each video's directory)
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Subtitle character encoding, skips auto-detection
    #[arg(short, long, value_parser = non_empty)]
    pub encoding: Option<String>,

    /// Language tag written to the subtitle track (e.g. eng, jpn)
    #[arg(short, long, value_parser = non_empty)]
    pub language: Option<String>,

    /// Replace existing output files without asking
    #[arg(long)]
    pub overwrite: bool,

    /// Enable verbose logging
    #[arg(short, long, conflicts_with = "silent")]
    pub verbose: bool,

    /// Suppress all log output
    #[arg(short, long)]
    pub silent: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

fn non_empty(s: &str) -> std::result::Result<String, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        Err("value must not be empty".to_string())
    } else {
        Ok(trimmed.to_string())
    }
}
