//! submux - soft-mux subtitle files into videos
//!
//! Pairs videos with subtitle files (one explicit pair, or every matching
//! stem in a directory), detects each subtitle's character encoding and
//! hands the actual muxing to ffmpeg, one job at a time.

pub mod cli;
pub mod config;
pub mod encoding;
pub mod error;
pub mod media;
pub mod options;
pub mod overwrite;
pub mod pairing;
pub mod progress;
pub mod subtitle;
pub mod workflow;
