//! pianotui - a terminal piano with recording and export.
//!
//! This library provides the core functionality for the piano app.

pub mod app;
pub mod audio;
pub mod config;
pub mod console;
pub mod midi;
pub mod rhythm;
pub mod synth;
pub mod ui;

// Re-export commonly used types
pub use app::App;
pub use audio::{engine::AudioEngine, export::export_to_wav};
pub use console::{ConsoleEvent, PerformanceConsole, Take};
pub use midi::{RecordedNote, TICKS_PER_BEAT};
pub use rhythm::{RhythmMachine, RhythmPattern};
pub use synth::{Instrument, PolySynth};
