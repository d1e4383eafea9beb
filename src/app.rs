//! Application state and event handling.
//!
//! This module wires terminal input to the performance console and holds the
//! presentation-side state: status messages, octave shift, the help overlay,
//! and the lazily attached audio output.

use crate::audio::{AudioEngine, SAMPLE_RATE};
use crate::config::Settings;
use crate::console::{ConsoleEvent, PerformanceConsole};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Keyboard key to MIDI note mapping for the computer keyboard.
/// Uses a piano-like layout on QWERTY keyboards.
pub const KEYBOARD_MAP: [(char, u8); 25] = [
    // Lower row (Z-M) = C3 to B3
    ('z', 48), // C3
    ('s', 49), // C#3
    ('x', 50), // D3
    ('d', 51), // D#3
    ('c', 52), // E3
    ('v', 53), // F3
    ('g', 54), // F#3
    ('b', 55), // G3
    ('h', 56), // G#3
    ('n', 57), // A3
    ('j', 58), // A#3
    ('m', 59), // B3
    // Upper row (Q-U) = C4 to B4
    ('q', 60), // C4 (Middle C)
    ('2', 61), // C#4
    ('w', 62), // D4
    ('3', 63), // D#4
    ('e', 64), // E4
    ('r', 65), // F4
    ('5', 66), // F#4
    ('t', 67), // G4
    ('6', 68), // G#4
    ('y', 69), // A4
    ('7', 70), // A#4
    ('u', 71), // B4
    ('i', 72), // C5
];

/// How long a held key keeps sounding after its last press event when the
/// terminal cannot report key releases. Auto-repeat keeps refreshing the
/// deadline, so the note ends shortly after the finger lifts.
const HOLD_TIMEOUT: Duration = Duration::from_millis(350);

/// How long status messages stay on screen.
const STATUS_TTL: Duration = Duration::from_secs(3);

/// Octave shift bounds.
const MAX_OCTAVE_SHIFT: i8 = 3;

/// Main application state.
pub struct App {
    /// The performance console (headless core).
    pub console: PerformanceConsole,
    /// Audio output, attached on first use.
    audio: Option<AudioEngine>,
    /// True once an attach attempt failed; no automatic retry.
    audio_failed: bool,
    /// Octave offset for keyboard input.
    pub octave_offset: i8,
    /// Status message to display.
    pub status_message: Option<(String, Instant)>,
    /// Whether the help overlay is visible.
    pub show_help: bool,
    /// Whether the terminal reports key release events.
    pub release_events_supported: bool,
    /// Keys currently held: key char to (sounding pitch, last press seen).
    held_keys: HashMap<char, (u8, Instant)>,
}

impl App {
    /// Creates the application from persisted settings.
    ///
    /// The audio device is not opened here; output attaches on the first
    /// interaction that needs sound.
    pub fn new(settings: &Settings) -> Self {
        Self {
            console: PerformanceConsole::new(
                SAMPLE_RATE,
                settings.instrument,
                settings.pattern,
                settings.tempo_bpm,
            ),
            audio: None,
            audio_failed: false,
            octave_offset: settings.octave_offset.clamp(-MAX_OCTAVE_SHIFT, MAX_OCTAVE_SHIFT),
            status_message: None,
            show_help: false,
            release_events_supported: false,
            held_keys: HashMap::new(),
        }
    }

    /// Snapshot of the user-tunable state for persistence.
    pub fn settings(&self) -> Settings {
        Settings {
            instrument: self.console.instrument(),
            pattern: self.console.pattern(),
            tempo_bpm: self.console.tempo(),
            octave_offset: self.octave_offset,
        }
    }

    /// Attaches the audio output if it is not attached yet.
    ///
    /// A failed attach is reported once and not retried; the console remains
    /// usable for silent note-event recording.
    ///
    /// # Returns
    ///
    /// true if output is available
    pub fn ensure_audio(&mut self) -> bool {
        if self.audio.is_some() {
            return true;
        }
        if self.audio_failed {
            return false;
        }
        match AudioEngine::new(
            self.console.synth_handle(),
            self.console.drum_handle(),
            self.console.tap(),
        ) {
            Ok(engine) => {
                self.audio = Some(engine);
                tracing::info!("audio output attached");
                true
            }
            Err(e) => {
                self.audio_failed = true;
                tracing::error!("audio output unavailable: {e:#}");
                self.set_status(format!("Audio unavailable: {e}"));
                false
            }
        }
    }

    /// Returns whether an audio attach attempt failed.
    pub fn audio_failed(&self) -> bool {
        self.audio_failed
    }

    /// Maps a physical key to a pitch under the current octave shift.
    pub fn note_for_key(&self, key: char) -> Option<u8> {
        let key = key.to_ascii_lowercase();
        KEYBOARD_MAP.iter().find(|(k, _)| *k == key).and_then(|(_, base)| {
            let note = *base as i16 + self.octave_offset as i16 * 12;
            u8::try_from(note).ok().filter(|n| *n <= 127)
        })
    }

    /// Handles a note key press.
    ///
    /// The first press of a held key attacks; auto-repeat presses of the same
    /// key only refresh the hold deadline.
    ///
    /// # Returns
    ///
    /// true if the key maps to a note
    pub fn key_down(&mut self, key: char, now: Instant) -> bool {
        let key = key.to_ascii_lowercase();
        if let Some(entry) = self.held_keys.get_mut(&key) {
            entry.1 = now;
            return true;
        }
        let Some(pitch) = self.note_for_key(key) else {
            return false;
        };
        self.ensure_audio();
        self.held_keys.insert(key, (pitch, now));
        self.console.handle_event(ConsoleEvent::PitchDown(pitch), now);
        true
    }

    /// Handles a note key release.
    ///
    /// # Returns
    ///
    /// true if the key was holding a note
    pub fn key_up(&mut self, key: char, now: Instant) -> bool {
        let key = key.to_ascii_lowercase();
        let Some((pitch, _)) = self.held_keys.remove(&key) else {
            return false;
        };
        self.console.handle_event(ConsoleEvent::PitchUp(pitch), now);
        true
    }

    /// Periodic work driven from the event loop.
    ///
    /// Fires due rhythm hits, expires the hold-timeout fallback when release
    /// events are unavailable, and clears stale status messages.
    pub fn on_tick(&mut self, now: Instant) {
        self.console.tick_at(now);

        if !self.release_events_supported {
            let stale: Vec<char> = self
                .held_keys
                .iter()
                .filter(|(_, (_, last_seen))| now.saturating_duration_since(*last_seen) > HOLD_TIMEOUT)
                .map(|(key, _)| *key)
                .collect();
            for key in stale {
                self.key_up(key, now);
            }
        }

        self.clear_expired_status();
    }

    /// Starts or stops the recording session.
    pub fn record_toggle(&mut self, now: Instant) {
        if self.console.is_recording() {
            self.console.handle_event(ConsoleEvent::RecordStop, now);
            let take = self.console.last_take();
            let notes = take.map(|t| t.notes.len()).unwrap_or(0);
            self.set_status(format!("Recording stopped ({notes} notes)"));
        } else {
            // The tap needs a running output source to produce chunks
            self.ensure_audio();
            self.console.handle_event(ConsoleEvent::RecordStart, now);
            self.set_status("Recording...");
        }
    }

    /// Cycles to the next instrument preset.
    pub fn cycle_instrument(&mut self, now: Instant) {
        let next = self.console.instrument().next();
        self.console.handle_event(ConsoleEvent::InstrumentChange(next), now);
        self.set_status(format!("Instrument: {}", next.name()));
    }

    /// Starts or stops the rhythm loop.
    pub fn toggle_rhythm(&mut self, now: Instant) {
        self.ensure_audio();
        self.console.handle_event(ConsoleEvent::RhythmToggle, now);
        if self.console.rhythm_running() {
            self.set_status(format!("Rhythm: {} on", self.console.pattern().name()));
        } else {
            self.set_status("Rhythm off");
        }
    }

    /// Cycles to the next rhythm pattern.
    pub fn cycle_pattern(&mut self, now: Instant) {
        let next = self.console.pattern().next();
        self.console.handle_event(ConsoleEvent::PatternChange(next), now);
        self.set_status(format!("Pattern: {}", next.name()));
    }

    /// Adjusts the rhythm tempo.
    ///
    /// # Arguments
    ///
    /// * `delta` - BPM change (negative to slow down)
    pub fn adjust_tempo(&mut self, delta: i32, now: Instant) {
        let bpm = (self.console.tempo() as i32 + delta).max(1) as u32;
        self.console.handle_event(ConsoleEvent::TempoChange(bpm), now);
        self.set_status(format!("Tempo: {} BPM", self.console.tempo()));
    }

    /// Shifts the keyboard by whole octaves.
    pub fn change_octave(&mut self, delta: i8) {
        self.octave_offset =
            (self.octave_offset + delta).clamp(-MAX_OCTAVE_SHIFT, MAX_OCTAVE_SHIFT);
        self.set_status(format!("Octave: {:+}", self.octave_offset));
    }

    /// Sets a status message to display temporarily.
    pub fn set_status(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    /// Clears expired status messages.
    pub fn clear_expired_status(&mut self) {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed() > STATUS_TTL {
                self.status_message = None;
            }
        }
    }

    /// Elapsed-session display string, updated every frame while recording.
    pub fn elapsed_string(&self, now: Instant) -> Option<String> {
        let elapsed = self.console.elapsed_at(now)?;
        let total = elapsed.as_secs();
        let tenths = elapsed.subsec_millis() / 100;
        Some(format!("{}:{:02}.{}", total / 60, total % 60, tenths))
    }
}
