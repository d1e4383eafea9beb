//! Audio output, capture, and WAV export.
//!
//! `engine` owns the rodio attachment and the capture tap; `export` turns
//! captured chunks into WAV files.

pub mod engine;
pub mod export;

pub use engine::{AudioEngine, CaptureTap, CHANNELS, SAMPLE_RATE};
pub use export::{export_to_wav, write_wav, ExportError};
