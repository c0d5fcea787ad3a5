use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::{debug, error, info, warn, Level};

use crate::config::Config;
use crate::encoding::resolve_encoding;
use crate::error::{MuxError, Result};
use crate::media::{MediaProcessorFactory, MediaProcessorTrait};
use crate::options::Options;
use crate::overwrite::{prepare_output, OutputState, Prompter, TerminalPrompter};
use crate::pairing::{self, Job, Pair};
use crate::subtitle::{count_cues, read_text};

/// Result of one job
#[derive(Debug)]
pub struct JobOutcome {
    pub video: PathBuf,
    pub result: Result<PathBuf>,
}

/// How a run ended, as far as the exit code is concerned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Success,
    JobsFailed,
    Interrupted,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<JobOutcome>,
    pub warnings: usize,
    /// Ctrl-C stopped the batch; later pairs were not attempted
    pub interrupted: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_ok())
    }

    pub fn failed(&self) -> impl Iterator<Item = &JobOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }

    /// Every job ran and succeeded
    pub fn is_success(&self) -> bool {
        !self.outcomes.is_empty() && self.failed().next().is_none()
    }

    pub fn status(&self) -> RunStatus {
        if self.interrupted {
            RunStatus::Interrupted
        } else if self.is_success() {
            RunStatus::Success
        } else {
            RunStatus::JobsFailed
        }
    }

    fn log_summary(&self) {
        let failed = self.failed().count();
        info!(
            "Processed {} job(s): {} succeeded, {} failed, {} pairing warning(s)",
            self.outcomes.len(),
            self.outcomes.len() - failed,
            failed,
            self.warnings
        );

        if failed > 0 {
            error!("Failed jobs:");
            for outcome in self.failed() {
                if let Err(e) = &outcome.result {
                    error!("  {}: {}", outcome.video.display(), e);
                }
            }
        }
    }
}

pub struct Workflow {
    config: Config,
    options: Options,
    media: Box<dyn MediaProcessorTrait>,
    prompter: Box<dyn Prompter>,
}

impl Workflow {
    pub fn new(config: Config, options: Options) -> Self {
        let show_progress = !options.is_silent() && std::io::stderr().is_terminal();
        let media = MediaProcessorFactory::create_processor(config.media.clone(), show_progress);
        let prompter = Box::new(TerminalPrompter::new(options.is_silent()));

        Self::with_parts(config, options, media, prompter)
    }

    pub fn with_parts(
        config: Config,
        options: Options,
        media: Box<dyn MediaProcessorTrait>,
        prompter: Box<dyn Prompter>,
    ) -> Self {
        Self {
            config,
            options,
            media,
            prompter,
        }
    }

    /// Resolve the pairs, then mux them one after another.
    ///
    /// Pairing errors and a missing ffmpeg abort the run before anything is
    /// invoked. Failures of individual jobs are collected in the report.
    pub async fn run(&mut self) -> Result<BatchReport> {
        let resolution = pairing::resolve(&self.options, &self.config.pairing)?;

        self.media.check_availability().await?;

        let mut report = BatchReport {
            outcomes: Vec::with_capacity(resolution.pairs.len()),
            warnings: resolution.warnings.len(),
            interrupted: false,
        };

        let total = resolution.pairs.len();
        for (index, pair) in resolution.pairs.into_iter().enumerate() {
            info!("[{}/{}] Processing {} with {}", index + 1, total, pair.video.display(), pair.subtitle.display());

            let video = pair.video.clone();
            let result = self.run_pair(pair).await;
            match &result {
                Ok(output) => info!("Subtitles mixed and saved to {}", output.display()),
                Err(e) => error!("Failed to process {}: {}", video.display(), e),
            }
            let interrupted = matches!(result, Err(MuxError::Interrupted(_)));
            report.outcomes.push(JobOutcome { video, result });

            if interrupted {
                warn!("Interrupted, skipping {} remaining pair(s)", total - index - 1);
                report.interrupted = true;
                break;
            }
        }

        report.log_summary();
        Ok(report)
    }

    async fn run_pair(&mut self, pair: Pair) -> Result<PathBuf> {
        let encoding = resolve_encoding(
            &pair.subtitle,
            self.options.encoding.as_deref(),
            &self.config.encoding.fallback,
        )?;

        if tracing::enabled!(Level::DEBUG) {
            self.describe_inputs(&pair, &encoding).await;
        }

        let state = prepare_output(&pair.output, self.options.overwrite, self.prompter.as_mut())?;

        if let Some(parent) = pair.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if !parent.exists() {
                tokio::fs::create_dir_all(parent).await?;
                info!("Created output folder: {}", parent.display());
            }
        }

        let job = Job::new(
            pair,
            encoding,
            self.options.language.clone(),
            self.options.overwrite || state == OutputState::Replaced,
        );
        self.media.mux_subtitles(&job).await?;

        Ok(job.output)
    }

    async fn describe_inputs(&self, pair: &Pair, encoding: &str) {
        match self.media.probe_info(&pair.video).await {
            Some(info) => debug!("Video: {} ({})", pair.video.display(), info),
            None => debug!("Video: {}", pair.video.display()),
        }

        match read_text(&pair.subtitle, encoding) {
            Ok(text) => debug!(
                "Subtitles: {} ({}, {} cues)",
                pair.subtitle.display(),
                encoding,
                count_cues(&text)
            ),
            Err(e) => warn!("Could not read {}: {}", pair.subtitle.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MockMediaProcessorTrait;
    use crate::options::{Mode, Verbosity};
    use crate::overwrite::tests::FixedPrompter;
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

    fn season(dir: &TempDir, stems: &[&str]) -> Options {
        for stem in stems {
            dir.child(format!("{}.mp4", stem)).write_str("video").unwrap();
            dir.child(format!("{}.srt", stem))
                .write_str("1\n00:00:01,000 --> 00:00:02,000\nHello\n")
                .unwrap();
        }
        options(Mode::Directory(dir.path().to_path_buf()))
    }

    fn available() -> MockMediaProcessorTrait {
        let mut media = MockMediaProcessorTrait::new();
        media.expect_check_availability().times(1).returning(|| Ok(()));
        media.expect_probe_info().returning(|_| None);
        media
    }

    fn workflow(options: Options, media: MockMediaProcessorTrait, answer: Option<bool>) -> Workflow {
        Workflow::with_parts(
            Config::default(),
            options,
            Box::new(media),
            Box::new(FixedPrompter::new(answer)),
        )
    }

    #[tokio::test]
    async fn test_single_pair_in_directory() {
        let dir = TempDir::new().unwrap();
        let opts = season(&dir, &["video"]);
        let expected_output = dir.child("video-with-subs.mp4").path().to_path_buf();

        let mut media = available();
        let output = expected_output.clone();
        media
            .expect_mux_subtitles()
            .withf(move |job| job.output == output && job.encoding == "UTF-8" && !job.overwrite)
            .times(1)
            .returning(|_| Ok(()));

        let report = workflow(opts, media, None).run().await.unwrap();

        assert!(report.is_success());
        assert_eq!(report.status(), RunStatus::Success);
        assert_eq!(report.outcomes.len(), 1);
        assert_eq!(report.outcomes[0].result.as_ref().unwrap(), &expected_output);
    }

    #[tokio::test]
    async fn test_failed_job_does_not_stop_batch() {
        let dir = TempDir::new().unwrap();
        let opts = season(&dir, &["ep1", "ep2", "ep3"]);

        let mut media = available();
        media.expect_mux_subtitles().times(3).returning(|job| {
            if job.video.ends_with("ep2.mp4") {
                Err(MuxError::ExternalProcess {
                    tool: "ffmpeg".to_string(),
                    status: "exit status: 1".to_string(),
                    stderr: "invalid codec".to_string(),
                })
            } else {
                Ok(())
            }
        });

        let report = workflow(opts, media, None).run().await.unwrap();

        assert!(!report.is_success());
        assert_eq!(report.status(), RunStatus::JobsFailed);
        assert_eq!(report.succeeded().count(), 2);
        let failed: Vec<_> = report.failed().collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].video.ends_with("ep2.mp4"));
        let message = failed[0].result.as_ref().unwrap_err().to_string();
        assert!(message.contains("invalid codec"));
        assert!(report.outcomes[2].result.is_ok());
    }

    #[tokio::test]
    async fn test_interrupt_stops_remaining_jobs() {
        let dir = TempDir::new().unwrap();
        let opts = season(&dir, &["ep1", "ep2", "ep3"]);

        let mut media = available();
        media
            .expect_mux_subtitles()
            .withf(|job| job.video.ends_with("ep1.mp4"))
            .times(1)
            .returning(|_| Ok(()));
        media
            .expect_mux_subtitles()
            .withf(|job| job.video.ends_with("ep2.mp4"))
            .times(1)
            .returning(|_| Err(MuxError::Interrupted("ffmpeg".to_string())));

        let report = workflow(opts, media, None).run().await.unwrap();

        assert!(report.interrupted);
        assert_eq!(report.status(), RunStatus::Interrupted);
        assert_eq!(report.outcomes.len(), 2);
        assert!(report.outcomes[0].result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_tool_aborts_before_any_job() {
        let dir = TempDir::new().unwrap();
        let opts = season(&dir, &["ep1"]);

        let mut media = MockMediaProcessorTrait::new();
        media
            .expect_check_availability()
            .returning(|| Err(MuxError::ToolNotFound("ffmpeg".to_string())));
        media.expect_mux_subtitles().never();

        let err = workflow(opts, media, None).run().await.unwrap_err();
        assert!(matches!(err, MuxError::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_missing_input_aborts_before_tool_check() {
        let dir = TempDir::new().unwrap();
        dir.child("movie.mp4").touch().unwrap();
        let opts = options(Mode::Single {
            video: dir.child("movie.mp4").path().to_path_buf(),
            subtitle: dir.child("movie.srt").path().to_path_buf(),
        });

        let mut media = MockMediaProcessorTrait::new();
        media.expect_check_availability().never();
        media.expect_mux_subtitles().never();

        let err = workflow(opts, media, None).run().await.unwrap_err();
        assert!(matches!(err, MuxError::MissingInput(_)));
    }

    #[tokio::test]
    async fn test_existing_output_non_interactive_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let opts = season(&dir, &["ep1"]);
        let existing = dir.child("ep1-with-subs.mp4");
        existing.write_str("previous run").unwrap();

        let mut media = available();
        media.expect_mux_subtitles().never();

        let report = workflow(opts, media, None).run().await.unwrap();

        assert!(matches!(
            report.outcomes[0].result,
            Err(MuxError::OutputExists(_))
        ));
        assert_eq!(std::fs::read_to_string(existing.path()).unwrap(), "previous run");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_without_prompt() {
        let dir = TempDir::new().unwrap();
        let mut opts = season(&dir, &["ep1"]);
        opts.overwrite = true;
        let existing = dir.child("ep1-with-subs.mp4");
        existing.write_str("previous run").unwrap();

        let mut media = available();
        media
            .expect_mux_subtitles()
            .withf(|job| job.overwrite && !job.output.exists())
            .times(1)
            .returning(|job| {
                std::fs::write(&job.output, "fresh").unwrap();
                Ok(())
            });

        // A prompter that would refuse proves it is never consulted
        let report = workflow(opts, media, Some(false)).run().await.unwrap();

        assert!(report.is_success());
        assert_eq!(std::fs::read_to_string(existing.path()).unwrap(), "fresh");
    }

    #[tokio::test]
    async fn test_explicit_output_encoding_and_language() {
        let dir = TempDir::new().unwrap();
        dir.child("movie.mp4").touch().unwrap();
        dir.child("movie.srt").write_str("1\n").unwrap();
        let output = dir.child("nested/dir/final.mkv").path().to_path_buf();

        let mut opts = options(Mode::Single {
            video: dir.child("movie.mp4").path().to_path_buf(),
            subtitle: dir.child("movie.srt").path().to_path_buf(),
        });
        opts.output = Some(output.clone());
        opts.encoding = Some("ISO-8859-7".to_string());
        opts.language = Some("ell".to_string());

        let mut media = available();
        let expected = output.clone();
        media
            .expect_mux_subtitles()
            .withf(move |job| {
                job.output == expected
                    && job.encoding == "ISO-8859-7"
                    && job.language.as_deref() == Some("ell")
            })
            .times(1)
            .returning(|_| Ok(()));

        let report = workflow(opts, media, None).run().await.unwrap();

        assert!(report.is_success());
        assert!(output.parent().unwrap().is_dir());
    }
}
