//! Persisted console settings.
//!
//! The instrument, rhythm pattern, tempo, and octave offset survive restarts
//! via a small JSON dotfile in the working directory. Loading is tolerant:
//! a missing or unreadable file just yields the defaults.

use crate::rhythm::{RhythmPattern, DEFAULT_TEMPO, MAX_TEMPO, MIN_TEMPO};
use crate::synth::Instrument;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default settings file name, written to the working directory.
pub const SETTINGS_PATH: &str = ".pianotui.json";

/// User-tunable state restored on startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Active instrument preset.
    pub instrument: Instrument,
    /// Selected rhythm pattern.
    pub pattern: RhythmPattern,
    /// Rhythm tempo in beats per minute.
    pub tempo_bpm: u32,
    /// Keyboard octave shift.
    pub octave_offset: i8,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            instrument: Instrument::default(),
            pattern: RhythmPattern::default(),
            tempo_bpm: DEFAULT_TEMPO,
            octave_offset: 0,
        }
    }
}

impl Settings {
    /// Loads settings, falling back to defaults on any failure.
    ///
    /// Failures are logged rather than surfaced; stale or corrupt settings
    /// must never block startup.
    pub fn load<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path)
            .map_err(anyhow::Error::from)
            .and_then(|text| serde_json::from_str::<Settings>(&text).map_err(Into::into))
        {
            Ok(settings) => settings.sanitized(),
            Err(e) => {
                tracing::warn!("ignoring unreadable settings {}: {e:#}", path.display());
                Self::default()
            }
        }
    }

    /// Saves settings as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write {}", path.as_ref().display()))?;
        Ok(())
    }

    /// Clamps loaded values into their supported ranges.
    fn sanitized(mut self) -> Self {
        self.tempo_bpm = self.tempo_bpm.clamp(MIN_TEMPO, MAX_TEMPO);
        self.octave_offset = self.octave_offset.clamp(-3, 3);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_round_trip() {
        let settings = Settings {
            instrument: Instrument::Retro,
            pattern: RhythmPattern::Shuffle,
            tempo_bpm: 96,
            octave_offset: -1,
        };
        let json = serde_json::to_string(&settings).unwrap();
        let back: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(back, settings);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let back: Settings = serde_json::from_str(r#"{"tempo_bpm": 150}"#).unwrap();
        assert_eq!(back.tempo_bpm, 150);
        assert_eq!(back.instrument, Instrument::Classic);
        assert_eq!(back.octave_offset, 0);
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let settings = Settings::load("/nonexistent/definitely/not/here.json");
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join("pianotui_settings_test.json");
        let settings = Settings {
            instrument: Instrument::Organ,
            pattern: RhythmPattern::Funk,
            tempo_bpm: 3000, // Out of range on purpose
            octave_offset: 1,
        };
        settings.save(&path).unwrap();
        let back = Settings::load(&path);
        std::fs::remove_file(&path).ok();

        assert_eq!(back.instrument, Instrument::Organ);
        assert_eq!(back.pattern, RhythmPattern::Funk);
        // Loaded tempo is clamped into range
        assert_eq!(back.tempo_bpm, MAX_TEMPO);
    }
}
