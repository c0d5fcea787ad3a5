use indicatif::ProgressBar;
use std::future::Future;
use std::io::ErrorKind;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MuxError, Result};
use crate::pairing::Job;
use crate::progress::{apply, parse_progress_line};

/// External tool invocation, built up one argument at a time
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Never overwrite output
    pub fn no_overwrite(self) -> Self {
        self.arg("-n")
    }

    /// Select a stream for the output
    pub fn map<S: Into<String>>(self, spec: S) -> Self {
        self.arg("-map").arg(spec)
    }

    /// Copy video streams without re-encoding
    pub fn copy_video(self) -> Self {
        self.arg("-c:v").arg("copy")
    }

    /// Copy audio streams without re-encoding
    pub fn copy_audio(self) -> Self {
        self.arg("-c:a").arg("copy")
    }

    /// Set subtitle codec
    pub fn subtitle_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:s").arg(codec)
    }

    /// Character encoding of the next text subtitle input
    pub fn subtitle_charset<S: Into<String>>(self, charset: S) -> Self {
        self.arg("-sub_charenc").arg(charset)
    }

    /// Errors only, no banner, no stdin
    pub fn quiet(self) -> Self {
        self.args(["-hide_banner", "-nostdin", "-loglevel", "error"])
    }

    /// Machine-readable progress on stdout
    pub fn report_progress(self) -> Self {
        self.args(["-progress", "pipe:1", "-nostats"])
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(&self.args).stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    fn spawn_error(&self, e: std::io::Error) -> MuxError {
        if e.kind() == ErrorKind::NotFound {
            MuxError::ToolNotFound(self.binary_path.clone())
        } else {
            MuxError::Io(e)
        }
    }

    fn failure(&self, status: std::process::ExitStatus, stderr: &[u8]) -> MuxError {
        MuxError::ExternalProcess {
            tool: self.binary_path.clone(),
            status: status.to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }

    /// Run to completion and return stdout
    pub async fn execute(&self) -> Result<Vec<u8>> {
        debug!("Executing: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = self
            .command()
            .output()
            .await
            .map_err(|e| self.spawn_error(e))?;

        if !output.status.success() {
            return Err(self.failure(output.status, &output.stderr));
        }

        Ok(output.stdout)
    }

    /// Run to completion, feeding `-progress` lines from stdout into the bar.
    /// Stderr is drained at the same time so a chatty tool cannot stall.
    /// Ctrl-C kills the child and yields `MuxError::Interrupted`.
    pub async fn execute_with_progress(&self, pb: &ProgressBar) -> Result<()> {
        self.execute_until(pb, ctrl_c()).await
    }

    /// Like `execute_with_progress`, stopping the child when `interrupt` resolves first
    pub async fn execute_until<F>(&self, pb: &ProgressBar, interrupt: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        debug!("Executing: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let mut child = self
            .command()
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| self.spawn_error(e))?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let read_progress = async {
            if let Some(stdout) = stdout {
                let mut lines = BufReader::new(stdout).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(event) = parse_progress_line(&line) {
                        apply(pb, event);
                    }
                }
            }
        };
        let read_errors = async {
            let mut buf = Vec::new();
            if let Some(mut stderr) = stderr {
                if let Err(e) = stderr.read_to_end(&mut buf).await {
                    debug!("Failed to read {} stderr: {}", self.binary_path, e);
                }
            }
            buf
        };

        // ffmpeg sees the same SIGINT and exits on its own; report the interrupt
        let finished = tokio::select! {
            biased;
            _ = interrupt => None,
            done = async {
                let ((), stderr) = tokio::join!(read_progress, read_errors);
                (stderr, child.wait().await)
            } => Some(done),
        };

        let Some((stderr, status)) = finished else {
            warn!("Interrupted, stopping {}", self.binary_path);
            if let Err(e) = child.kill().await {
                debug!("Failed to kill {}: {}", self.binary_path, e);
            }
            return Err(MuxError::Interrupted(self.binary_path.clone()));
        };

        let status = status?;
        if !status.success() {
            return Err(self.failure(status, &stderr));
        }

        Ok(())
    }
}

const PROBE_ENTRIES: &str =
    "format=duration:stream=codec_type,codec_name,width,height,r_frame_rate,bit_rate,channels";

// Resolves on Ctrl-C; never resolves when the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        debug!("Ctrl-C handler unavailable: {}", e);
        std::future::pending::<()>().await;
    }
}

/// Builder for the invocations this tool needs
pub struct MediaCommandBuilder {
    binary_path: String,
    probe_path: String,
}

impl MediaCommandBuilder {
    /// Create a builder for the given ffmpeg and ffprobe binaries
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, probe_path: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            probe_path: probe_path.into(),
        }
    }

    /// Copy video and audio, add the subtitle file as a selectable track
    pub fn mux_subtitles(&self, job: &Job, additional_options: &[String]) -> MediaCommand {
        let mut cmd = MediaCommand::new(&self.binary_path, "Subtitle muxing").quiet();
        cmd = if job.overwrite { cmd.overwrite() } else { cmd.no_overwrite() };

        cmd = cmd
            .input(&job.video)
            .subtitle_charset(&job.encoding)
            .input(&job.subtitle)
            .map("0:v")
            .map("0:a?")
            .map("1:0")
            .copy_video()
            .copy_audio()
            .subtitle_codec(subtitle_codec_for(&job.output, &job.subtitle));

        if let Some(language) = &job.language {
            cmd = cmd.arg("-metadata:s:s:0").arg(format!("language={}", language));
        }

        cmd.args(additional_options.iter().cloned())
            .report_progress()
            .output(&job.output)
    }

    /// Container duration and per-stream details as JSON
    pub fn probe_info(&self, media_path: &Path) -> MediaCommand {
        MediaCommand::new(&self.probe_path, "Media info probe")
            .args(["-v", "error", "-show_entries", PROBE_ENTRIES, "-of", "json"])
            .output(media_path)
    }

    /// Print the tool version
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.binary_path, "Version check").arg("-version")
    }
}

/// Subtitle codec the output container can hold
pub fn subtitle_codec_for(output_path: &Path, subtitle_path: &Path) -> &'static str {
    let ext = |p: &Path| {
        p.extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default()
    };

    match ext(output_path).as_str() {
        "mkv" | "mka" => match ext(subtitle_path).as_str() {
            "ass" | "ssa" => "ass",
            "vtt" => "webvtt",
            _ => "srt",
        },
        "webm" => "webvtt",
        // mp4, m4v, mov and anything unknown
        _ => "mov_text",
    }
}
