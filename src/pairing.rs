//! Resolution of the (video, subtitle, output) triples a run will process.
//!
//! Single mode takes the two paths as given. Directory mode scans one level
//! of a folder and pairs files whose stems match case-insensitively.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::PairingConfig;
use crate::error::{MuxError, Result};
use crate::options::{Mode, Options};

/// A matched video and subtitle plus where the result goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pair {
    pub video: PathBuf,
    pub subtitle: PathBuf,
    pub output: PathBuf,
}

/// One unit of work: a pair with everything needed to invoke ffmpeg
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub video: PathBuf,
    pub subtitle: PathBuf,
    pub output: PathBuf,
    pub encoding: String,
    pub language: Option<String>,
    /// Replace an existing output file
    pub overwrite: bool,
}

impl Job {
    pub fn new(pair: Pair, encoding: String, language: Option<String>, overwrite: bool) -> Self {
        Self {
            video: pair.video,
            subtitle: pair.subtitle,
            output: pair.output,
            encoding,
            language,
            overwrite,
        }
    }
}

/// Non-fatal problems found while pairing a directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingWarning {
    MissingSubtitle { stem: String, video: PathBuf },
    MissingVideo { stem: String, subtitle: PathBuf },
    Ambiguous { stem: String, chosen: PathBuf, ignored: Vec<PathBuf> },
    OutputCollides { stem: String, output: PathBuf },
}

impl fmt::Display for PairingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairingWarning::MissingSubtitle { stem, video } => {
                write!(f, "No subtitle found for '{}' ({})", stem, video.display())
            }
            PairingWarning::MissingVideo { stem, subtitle } => {
                write!(f, "No video found for '{}' ({})", stem, subtitle.display())
            }
            PairingWarning::Ambiguous { stem, chosen, ignored } => {
                let ignored = ignored
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "Several candidates for '{}', using {} and ignoring {}", stem, chosen.display(), ignored)
            }
            PairingWarning::OutputCollides { stem, output } => {
                write!(f, "Output for '{}' would overwrite an input ({})", stem, output.display())
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct Resolution {
    pub pairs: Vec<Pair>,
    pub warnings: Vec<PairingWarning>,
}

/// Resolve the pairs for this run
pub fn resolve(options: &Options, config: &PairingConfig) -> Result<Resolution> {
    match &options.mode {
        Mode::Single { video, subtitle } => {
            let pair = resolve_single(video, subtitle, options, config)?;
            Ok(Resolution {
                pairs: vec![pair],
                warnings: Vec::new(),
            })
        }
        Mode::Directory(dir) => resolve_directory(dir, options.output_dir.as_deref(), config),
    }
}

fn resolve_single(
    video: &Path,
    subtitle: &Path,
    options: &Options,
    config: &PairingConfig,
) -> Result<Pair> {
    for input in [video, subtitle] {
        if !input.is_file() {
            return Err(MuxError::MissingInput(input.to_path_buf()));
        }
    }

    let output = match &options.output {
        Some(output) => output.clone(),
        None => default_output_path(video, options.output_dir.as_deref(), config),
    };

    if same_file(&output, video) || same_file(&output, subtitle) {
        return Err(MuxError::InvalidInput(format!(
            "output {} would overwrite an input file",
            output.display()
        )));
    }

    Ok(Pair {
        video: video.to_path_buf(),
        subtitle: subtitle.to_path_buf(),
        output,
    })
}

#[derive(Default)]
struct StemGroup {
    name: String,
    videos: Vec<PathBuf>,
    subtitles: Vec<PathBuf>,
}

fn resolve_directory(dir: &Path, output_dir: Option<&Path>, config: &PairingConfig) -> Result<Resolution> {
    if !dir.is_dir() {
        return Err(MuxError::MissingInput(dir.to_path_buf()));
    }
    info!("Scanning directory: {}", dir.display());

    let suffix = config.output_suffix.to_lowercase();
    let mut groups: BTreeMap<String, StemGroup> = BTreeMap::new();

    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file());

    for entry in entries {
        let path = entry.path();
        let (Some(stem), Some(ext)) = (path.file_stem(), path.extension()) else {
            continue;
        };
        let stem = stem.to_string_lossy().to_string();
        let key = stem.to_lowercase();
        let ext = ext.to_string_lossy().to_lowercase();

        let is_video = has_extension(&config.video_extensions, &ext);
        let is_subtitle = has_extension(&config.subtitle_extensions, &ext);

        if !is_video && !is_subtitle {
            continue;
        }

        let group = groups.entry(key).or_insert_with(|| StemGroup {
            name: stem,
            ..Default::default()
        });
        if is_video {
            group.videos.push(path.to_path_buf());
        } else {
            group.subtitles.push(path.to_path_buf());
        }
    }

    for key in previous_outputs(&groups, &suffix) {
        if let Some(group) = groups.remove(&key) {
            for video in group.videos {
                debug!("Skipping previous output: {}", video.display());
            }
        }
    }

    let mut resolution = Resolution::default();
    for group in groups.into_values() {
        let StemGroup { name, mut videos, mut subtitles } = group;

        if subtitles.is_empty() {
            resolution.warnings.push(PairingWarning::MissingSubtitle {
                stem: name,
                video: videos.remove(0),
            });
            continue;
        }
        if videos.is_empty() {
            resolution.warnings.push(PairingWarning::MissingVideo {
                stem: name,
                subtitle: subtitles.remove(0),
            });
            continue;
        }

        let video = pick_first(&name, videos, &mut resolution.warnings);
        let subtitle = pick_first(&name, subtitles, &mut resolution.warnings);
        let output = default_output_path(&video, output_dir, config);

        if same_file(&output, &video) || same_file(&output, &subtitle) {
            resolution.warnings.push(PairingWarning::OutputCollides { stem: name, output });
            continue;
        }

        debug!("Paired {} with {}", video.display(), subtitle.display());
        resolution.pairs.push(Pair { video, subtitle, output });
    }

    for warning in &resolution.warnings {
        warn!("{}", warning);
    }

    if resolution.pairs.is_empty() {
        return Err(MuxError::NoPairsFound(dir.to_path_buf()));
    }

    info!("Found {} pair(s) in {}", resolution.pairs.len(), dir.display());
    Ok(resolution)
}

/// Groups that look like an earlier run's output: a suffixed stem with
/// videos only, next to a group holding the un-suffixed source video.
fn previous_outputs(groups: &BTreeMap<String, StemGroup>, suffix: &str) -> Vec<String> {
    groups
        .iter()
        .filter(|(_, group)| group.subtitles.is_empty())
        .filter(|(key, _)| {
            key.strip_suffix(suffix)
                .and_then(|base| groups.get(base))
                .is_some_and(|base| !base.videos.is_empty())
        })
        .map(|(key, _)| key.clone())
        .collect()
}

// Candidates arrive sorted by file name, so the first one is stable.
fn pick_first(stem: &str, mut candidates: Vec<PathBuf>, warnings: &mut Vec<PairingWarning>) -> PathBuf {
    let chosen = candidates.remove(0);
    if !candidates.is_empty() {
        warnings.push(PairingWarning::Ambiguous {
            stem: stem.to_string(),
            chosen: chosen.clone(),
            ignored: candidates,
        });
    }
    chosen
}

fn has_extension(extensions: &[String], ext: &str) -> bool {
    extensions
        .iter()
        .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
}

/// `<dir>/<video-stem><suffix>.<ext>`, where dir is `output_dir` or the video's own directory
pub fn default_output_path(video: &Path, output_dir: Option<&Path>, config: &PairingConfig) -> PathBuf {
    let stem = video
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let file_name = format!(
        "{}{}.{}",
        stem,
        config.output_suffix,
        config.output_extension.trim_start_matches('.')
    );

    match output_dir {
        Some(dir) => dir.join(file_name),
        None => video
            .parent()
            .map(|parent| parent.join(&file_name))
            .unwrap_or_else(|| PathBuf::from(&file_name)),
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::Verbosity;
    use assert_fs::prelude::*;
    use assert_fs::TempDir;

    fn options(mode: Mode) -> Options {
        Options {
            mode,
            output: None,
            output_dir: None,
            encoding: None,
            language: None,
            overwrite: false,
            verbosity: Verbosity::Normal,
        }
    }

    fn directory(dir: &TempDir) -> Options {
        options(Mode::Directory(dir.path().to_path_buf()))
    }

    #[test]
    fn test_single_video_pair_in_directory() {
        let dir = TempDir::new().unwrap();
        dir.child("video.mp4").touch().unwrap();
        dir.child("video.srt").touch().unwrap();

        let resolution = resolve(&directory(&dir), &PairingConfig::default()).unwrap();

        assert_eq!(resolution.pairs.len(), 1);
        assert!(resolution.warnings.is_empty());
        let pair = &resolution.pairs[0];
        assert_eq!(pair.video, dir.child("video.mp4").path());
        assert_eq!(pair.subtitle, dir.child("video.srt").path());
        assert_eq!(pair.output, dir.child("video-with-subs.mp4").path());
    }

    #[test]
    fn test_unmatched_stems_warn_once_each() {
        let dir = TempDir::new().unwrap();
        dir.child("E02.mkv").touch().unwrap();
        dir.child("e02.SRT").touch().unwrap();
        dir.child("e01.mp4").touch().unwrap();
        dir.child("e03.srt").touch().unwrap();
        dir.child("notes.txt").touch().unwrap();

        let resolution = resolve(&directory(&dir), &PairingConfig::default()).unwrap();

        assert_eq!(resolution.pairs.len(), 1);
        assert_eq!(resolution.pairs[0].video, dir.child("E02.mkv").path());
        assert_eq!(resolution.pairs[0].output, dir.child("E02-with-subs.mp4").path());
        assert_eq!(resolution.warnings.len(), 2);
        assert!(matches!(&resolution.warnings[0], PairingWarning::MissingSubtitle { stem, .. } if stem == "e01"));
        assert!(matches!(&resolution.warnings[1], PairingWarning::MissingVideo { stem, .. } if stem == "e03"));
    }

    #[test]
    fn test_pairs_are_ordered_by_stem() {
        let dir = TempDir::new().unwrap();
        for stem in ["s01e10", "s01e02", "s01e01"] {
            dir.child(format!("{}.mp4", stem)).touch().unwrap();
            dir.child(format!("{}.srt", stem)).touch().unwrap();
        }

        let resolution = resolve(&directory(&dir), &PairingConfig::default()).unwrap();
        let videos: Vec<_> = resolution
            .pairs
            .iter()
            .map(|p| p.video.file_name().unwrap().to_string_lossy().to_string())
            .collect();

        assert_eq!(videos, vec!["s01e01.mp4", "s01e02.mp4", "s01e10.mp4"]);
    }

    #[test]
    fn test_previous_outputs_are_ignored() {
        let dir = TempDir::new().unwrap();
        dir.child("ep.mp4").touch().unwrap();
        dir.child("ep.srt").touch().unwrap();
        dir.child("ep-with-subs.mp4").touch().unwrap();

        let resolution = resolve(&directory(&dir), &PairingConfig::default()).unwrap();

        assert_eq!(resolution.pairs.len(), 1);
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn test_suffixed_input_pair_is_processed() {
        let dir = TempDir::new().unwrap();
        dir.child("Pilot-With-Subs.mp4").touch().unwrap();
        dir.child("Pilot-With-Subs.srt").touch().unwrap();

        let resolution = resolve(&directory(&dir), &PairingConfig::default()).unwrap();

        assert_eq!(resolution.pairs.len(), 1);
        assert!(resolution.warnings.is_empty());
        assert_eq!(resolution.pairs[0].video, dir.child("Pilot-With-Subs.mp4").path());
        assert_eq!(
            resolution.pairs[0].output,
            dir.child("Pilot-With-Subs-with-subs.mp4").path()
        );
    }

    #[test]
    fn test_orphan_suffixed_video_still_warns() {
        let dir = TempDir::new().unwrap();
        dir.child("ep.mp4").touch().unwrap();
        dir.child("ep.srt").touch().unwrap();
        dir.child("extra-with-subs.mp4").touch().unwrap();

        let resolution = resolve(&directory(&dir), &PairingConfig::default()).unwrap();

        assert_eq!(resolution.pairs.len(), 1);
        assert!(matches!(
            &resolution.warnings[..],
            [PairingWarning::MissingSubtitle { stem, .. }] if stem == "extra-with-subs"
        ));
    }

    #[test]
    fn test_ambiguous_stem_uses_first_candidate() {
        let dir = TempDir::new().unwrap();
        dir.child("ep.mkv").touch().unwrap();
        dir.child("ep.mp4").touch().unwrap();
        dir.child("ep.srt").touch().unwrap();

        let resolution = resolve(&directory(&dir), &PairingConfig::default()).unwrap();

        assert_eq!(resolution.pairs[0].video, dir.child("ep.mkv").path());
        assert!(matches!(
            &resolution.warnings[0],
            PairingWarning::Ambiguous { ignored, .. } if ignored == &vec![dir.child("ep.mp4").path().to_path_buf()]
        ));
    }

    #[test]
    fn test_directory_without_pairs() {
        let dir = TempDir::new().unwrap();
        dir.child("lonely.mp4").touch().unwrap();

        let err = resolve(&directory(&dir), &PairingConfig::default()).unwrap_err();
        assert!(matches!(err, MuxError::NoPairsFound(_)));
    }

    #[test]
    fn test_directory_is_not_recursive() {
        let dir = TempDir::new().unwrap();
        dir.child("nested/ep.mp4").touch().unwrap();
        dir.child("nested/ep.srt").touch().unwrap();

        let err = resolve(&directory(&dir), &PairingConfig::default()).unwrap_err();
        assert!(matches!(err, MuxError::NoPairsFound(_)));
    }

    #[test]
    fn test_missing_directory() {
        let opts = options(Mode::Directory(PathBuf::from("/nonexistent/season")));
        let err = resolve(&opts, &PairingConfig::default()).unwrap_err();
        assert!(matches!(err, MuxError::MissingInput(_)));
    }

    #[test]
    fn test_explicit_output_is_used_verbatim() {
        let dir = TempDir::new().unwrap();
        dir.child("movie.mp4").touch().unwrap();
        dir.child("movie.en.srt").touch().unwrap();

        let mut opts = options(Mode::Single {
            video: dir.child("movie.mp4").path().to_path_buf(),
            subtitle: dir.child("movie.en.srt").path().to_path_buf(),
        });
        opts.output = Some(PathBuf::from("custom name.mkv"));
        opts.output_dir = Some(PathBuf::from("ignored"));

        let resolution = resolve(&opts, &PairingConfig::default()).unwrap();
        assert_eq!(resolution.pairs[0].output, PathBuf::from("custom name.mkv"));
    }

    #[test]
    fn test_single_default_output_and_output_dir() {
        let dir = TempDir::new().unwrap();
        dir.child("movie.mp4").touch().unwrap();
        dir.child("subs.srt").touch().unwrap();

        let mut opts = options(Mode::Single {
            video: dir.child("movie.mp4").path().to_path_buf(),
            subtitle: dir.child("subs.srt").path().to_path_buf(),
        });
        let resolution = resolve(&opts, &PairingConfig::default()).unwrap();
        assert_eq!(resolution.pairs[0].output, dir.child("movie-with-subs.mp4").path());

        opts.output_dir = Some(dir.child("out").path().to_path_buf());
        let resolution = resolve(&opts, &PairingConfig::default()).unwrap();
        assert_eq!(resolution.pairs[0].output, dir.child("out/movie-with-subs.mp4").path());
    }

    #[test]
    fn test_single_missing_input() {
        let dir = TempDir::new().unwrap();
        dir.child("movie.mp4").touch().unwrap();

        let opts = options(Mode::Single {
            video: dir.child("movie.mp4").path().to_path_buf(),
            subtitle: dir.child("missing.srt").path().to_path_buf(),
        });

        match resolve(&opts, &PairingConfig::default()) {
            Err(MuxError::MissingInput(path)) => assert_eq!(path, dir.child("missing.srt").path()),
            other => panic!("expected MissingInput, got {:?}", other),
        }
    }

    #[test]
    fn test_output_colliding_with_input() {
        let dir = TempDir::new().unwrap();
        dir.child("movie.mp4").touch().unwrap();
        dir.child("movie.srt").touch().unwrap();

        let mut opts = options(Mode::Single {
            video: dir.child("movie.mp4").path().to_path_buf(),
            subtitle: dir.child("movie.srt").path().to_path_buf(),
        });
        opts.output = Some(dir.child("movie.mp4").path().to_path_buf());

        let err = resolve(&opts, &PairingConfig::default()).unwrap_err();
        assert!(matches!(err, MuxError::InvalidInput(_)));
    }
}
