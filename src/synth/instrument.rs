//! Instrument presets.
//!
//! Each preset is a fixed oscillator waveform plus an ADSR envelope. Switching
//! presets only changes how future voices sound.

use super::{Adsr, Waveform};
use serde::{Deserialize, Serialize};

/// The selectable instrument presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Instrument {
    /// Soft triangle lead, the startup default.
    #[default]
    Classic,
    /// Piano-like: percussive attack, no sustain, rings down on its own.
    Piano,
    /// Chiptune square with a snappy envelope.
    Retro,
    /// Organ-like: slow attack, full sustain while held.
    Organ,
}

impl Instrument {
    /// All presets in cycling order.
    pub const ALL: [Instrument; 4] = [
        Instrument::Classic,
        Instrument::Piano,
        Instrument::Retro,
        Instrument::Organ,
    ];

    /// Display name for the transport bar.
    pub fn name(self) -> &'static str {
        match self {
            Instrument::Classic => "Classic",
            Instrument::Piano => "Piano",
            Instrument::Retro => "Retro",
            Instrument::Organ => "Organ",
        }
    }

    /// Oscillator waveform for new voices.
    pub fn waveform(self) -> Waveform {
        match self {
            Instrument::Classic => Waveform::Triangle,
            Instrument::Piano => Waveform::Sine,
            Instrument::Retro => Waveform::Square,
            Instrument::Organ => Waveform::Sawtooth,
        }
    }

    /// Envelope parameters for new voices.
    pub fn envelope(self) -> Adsr {
        match self {
            Instrument::Classic => Adsr {
                attack: 0.01,
                decay: 0.25,
                sustain: 0.6,
                release: 0.4,
            },
            Instrument::Piano => Adsr {
                attack: 0.004,
                decay: 1.4,
                sustain: 0.0,
                release: 0.3,
            },
            Instrument::Retro => Adsr {
                attack: 0.002,
                decay: 0.06,
                sustain: 0.5,
                release: 0.08,
            },
            Instrument::Organ => Adsr {
                attack: 0.06,
                decay: 0.1,
                sustain: 0.9,
                release: 0.25,
            },
        }
    }

    /// General MIDI program number written into exported files.
    pub fn gm_program(self) -> u8 {
        match self {
            Instrument::Classic => 80, // Lead 1 (square)
            Instrument::Piano => 0,    // Acoustic Grand Piano
            Instrument::Retro => 81,   // Lead 2 (sawtooth)
            Instrument::Organ => 19,   // Church Organ
        }
    }

    /// Returns the next preset in cycling order, wrapping around.
    pub fn next(self) -> Instrument {
        let idx = Self::ALL.iter().position(|&i| i == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_visits_all_presets() {
        let mut seen = Vec::new();
        let mut current = Instrument::default();
        for _ in 0..Instrument::ALL.len() {
            seen.push(current);
            current = current.next();
        }
        assert_eq!(current, Instrument::default());
        for preset in Instrument::ALL {
            assert!(seen.contains(&preset));
        }
    }

    #[test]
    fn test_envelopes_are_sane() {
        for preset in Instrument::ALL {
            let env = preset.envelope();
            assert!(env.attack >= 0.0);
            assert!(env.decay >= 0.0);
            assert!((0.0..=1.0).contains(&env.sustain));
            assert!(env.release >= 0.0);
            assert!(preset.gm_program() < 128);
        }
    }
}
