use std::path::PathBuf;

use crate::cli::Args;
use crate::error::{MuxError, Result};

/// What the run operates on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    Single { video: PathBuf, subtitle: PathBuf },
    Directory(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Normal,
    Verbose,
    Silent,
}

/// Run-wide settings taken from the command line
#[derive(Debug, Clone)]
pub struct Options {
    pub mode: Mode,
    pub output: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub encoding: Option<String>,
    pub language: Option<String>,
    pub overwrite: bool,
    pub verbosity: Verbosity,
}

impl Options {
    pub fn is_silent(&self) -> bool {
        self.verbosity == Verbosity::Silent
    }
}

impl TryFrom<&Args> for Options {
    type Error = MuxError;

    fn try_from(args: &Args) -> Result<Self> {
        let mode = match (&args.tv, &args.video, &args.subtitle) {
            (Some(dir), _, _) => Mode::Directory(dir.clone()),
            (None, Some(video), Some(subtitle)) => Mode::Single {
                video: video.clone(),
                subtitle: subtitle.clone(),
            },
            _ => {
                return Err(MuxError::InvalidInput(
                    "expected <video_file> <subtitle_file> or --tv <directory>".to_string(),
                ))
            }
        };

        let verbosity = match (args.verbose, args.silent) {
            (true, true) => {
                return Err(MuxError::InvalidInput(
                    "--verbose and --silent are mutually exclusive".to_string(),
                ))
            }
            (true, false) => Verbosity::Verbose,
            (false, true) => Verbosity::Silent,
            (false, false) => Verbosity::Normal,
        };

        Ok(Self {
            mode,
            output: args.output.clone(),
            output_dir: args.output_dir.clone(),
            encoding: args.encoding.clone(),
            language: args.language.clone(),
            overwrite: args.overwrite,
            verbosity,
        })
    }
}
