//! Batch audio mastering on top of FFmpeg.
//!
//! Nothing here touches samples. Each file is analyzed with an `astats` pass,
//! then mastered with a filter chain built from a [`settings::Settings`]
//! bundle, falling back to a fixed loud chain when analysis finds no levels or
//! the normal pass fails.

pub mod analysis;
pub mod app;
pub mod batch;
pub mod cli;
pub mod error;
pub mod ffmpeg;
pub mod filter_chain;
pub mod mastering;
pub mod preset;
pub mod settings;

#[cfg(all(test, unix))]
mod test_support;
