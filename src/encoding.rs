use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};
use std::path::Path;
use tracing::debug;

use crate::error::Result;

/// Outcome of sniffing a subtitle's bytes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub encoding: &'static Encoding,
    pub confident: bool,
}

/// Pick the character encoding handed to ffmpeg's `-sub_charenc`.
///
/// An explicit name wins and is passed through untouched. Otherwise the
/// file is sniffed and `fallback` is used when the guess is weak.
pub fn resolve_encoding(subtitle: &Path, explicit: Option<&str>, fallback: &str) -> Result<String> {
    if let Some(name) = explicit {
        debug!("Using requested encoding {} for {}", name, subtitle.display());
        return Ok(name.to_string());
    }

    let bytes = std::fs::read(subtitle)?;
    let detection = detect(&bytes);

    if detection.confident {
        debug!("Detected encoding {} for {}", detection.encoding.name(), subtitle.display());
        Ok(detection.encoding.name().to_string())
    } else {
        debug!(
            "Low-confidence guess {} for {}, falling back to {}",
            detection.encoding.name(),
            subtitle.display(),
            fallback
        );
        Ok(fallback.to_string())
    }
}

pub fn detect(bytes: &[u8]) -> Detection {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return Detection { encoding, confident: true };
    }

    // Also covers plain ASCII
    if std::str::from_utf8(bytes).is_ok() {
        return Detection { encoding: UTF_8, confident: true };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let (encoding, confident) = detector.guess_assess(None, true);
    Detection { encoding, confident }
}
