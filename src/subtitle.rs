use encoding_rs::{Encoding, UTF_8};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Read a subtitle file as text using the given encoding label.
/// Unknown labels decode as UTF-8; malformed sequences become U+FFFD.
pub fn read_text<P: AsRef<Path>>(path: P, encoding_label: &str) -> Result<String> {
    let bytes = std::fs::read(path)?;
    let encoding = Encoding::for_label(encoding_label.as_bytes()).unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(&bytes);
    Ok(text.into_owned())
}

/// Count SRT cues by their numeric index lines
pub fn count_cues(text: &str) -> usize {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && line.chars().all(|c| c.is_ascii_digit()))
        .count()
}

/// Format a duration as HH:MM:SS
pub fn format_hms(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let secs = total % 60;

    format!("{:02}:{:02}:{:02}", hours, minutes, secs)
}
