//! Rendering of ffmpeg's `-progress pipe:1` key/value stream.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Media time written so far
    OutTime(Duration),
    Finished,
}

pub fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" => value
            .parse::<u64>()
            .ok()
            .map(|us| ProgressEvent::OutTime(Duration::from_micros(us))),
        "progress" if value == "end" => Some(ProgressEvent::Finished),
        _ => None,
    }
}

/// Build a bar measured in milliseconds of media time, or a spinner when the
/// total is unknown
pub fn create_bar(total: Option<Duration>, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    match total {
        Some(total) => {
            let pb = ProgressBar::new(total.as_millis() as u64);
            if let Ok(style) = ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {percent}% ({eta}) {msg}")
            {
                pb.set_style(style.progress_chars("#>-"));
            }
            pb
        }
        None => {
            let pb = ProgressBar::new_spinner();
            pb.enable_steady_tick(Duration::from_millis(120));
            pb
        }
    }
}

pub fn apply(pb: &ProgressBar, event: ProgressEvent) {
    match event {
        ProgressEvent::OutTime(time) => {
            let position = time.as_millis() as u64;
            match pb.length() {
                Some(length) => pb.set_position(position.min(length)),
                None => pb.set_message(crate::subtitle::format_hms(time)),
            }
        }
        ProgressEvent::Finished => {
            if let Some(length) = pb.length() {
                pb.set_position(length);
            }
        }
    }
}
