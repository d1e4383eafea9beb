//! The performance console: note triggering, session recording, and export.
//!
//! This is the headless core of the application. It owns the synthesizer and
//! drum kit handles, the active-note table, the Idle/Recording session state
//! machine, and the rhythm scheduler; the TUI layer only translates input
//! into [`ConsoleEvent`]s and renders the resulting state. Nothing here
//! touches the terminal or the audio device, so the whole controller is unit
//! testable.

use crate::audio::{self, CaptureTap, CHANNELS};
use crate::midi::{self, RecordedNote};
use crate::rhythm::{RhythmMachine, RhythmPattern};
use crate::synth::{DrumKit, Instrument, PolySynth};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Velocity used for all performed notes.
pub const DEFAULT_VELOCITY: u8 = 100;

/// Input events consumed by the console.
///
/// The TUI maps keys and mouse input onto these; tests feed them directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleEvent {
    /// A pitch was pressed (attack).
    PitchDown(u8),
    /// A pitch was released.
    PitchUp(u8),
    /// Begin a recording session.
    RecordStart,
    /// End the open recording session.
    RecordStop,
    /// Select an instrument preset.
    InstrumentChange(Instrument),
    /// Start or stop the rhythm loop.
    RhythmToggle,
    /// Select a rhythm pattern.
    PatternChange(RhythmPattern),
    /// Set the rhythm tempo in beats per minute.
    TempoChange(u32),
}

/// Recording session state.
#[derive(Clone, Copy)]
enum SessionState {
    /// Not recording.
    Idle,
    /// A session is open.
    Recording {
        /// When the session started; onsets are measured from here.
        started_at: Instant,
    },
}

/// A completed recording, frozen at `stop()` and kept until the next session
/// starts producing a new one.
pub struct Take {
    /// Completed press/release pairs, in completion order.
    pub notes: Vec<RecordedNote>,
    /// Captured interleaved stereo chunks.
    pub chunks: Vec<Vec<f32>>,
    /// Capture sample rate in Hz.
    pub sample_rate: u32,
    /// Session length in seconds.
    pub duration: f64,
}

impl Take {
    /// Returns whether any audio was captured.
    pub fn has_audio(&self) -> bool {
        self.chunks.iter().any(|c| !c.is_empty())
    }
}

/// The performance console.
pub struct PerformanceConsole {
    /// The melodic synthesizer, shared with the audio output source.
    synth: Arc<Mutex<PolySynth>>,
    /// Percussion voices, shared with the audio output source.
    drums: Arc<Mutex<DrumKit>>,
    /// Capture point on the synth's rendered stream.
    tap: CaptureTap,
    /// Sounding pitches and when they were attacked.
    active: HashMap<u8, Instant>,
    /// Session state machine.
    session: SessionState,
    /// Notes completed during the open session.
    buffer: Vec<RecordedNote>,
    /// The most recent completed session.
    last_take: Option<Take>,
    /// Accompaniment scheduler.
    rhythm: RhythmMachine,
    sample_rate: u32,
}

impl PerformanceConsole {
    /// Creates a console with fresh synth and drum instances.
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Render rate shared by synth, drums, and capture
    /// * `instrument` - Initial instrument preset
    /// * `pattern` - Initial rhythm pattern
    /// * `tempo_bpm` - Initial rhythm tempo
    pub fn new(
        sample_rate: u32,
        instrument: Instrument,
        pattern: RhythmPattern,
        tempo_bpm: u32,
    ) -> Self {
        Self {
            synth: Arc::new(Mutex::new(PolySynth::new(sample_rate, instrument))),
            drums: Arc::new(Mutex::new(DrumKit::new(sample_rate))),
            tap: CaptureTap::new(),
            active: HashMap::new(),
            session: SessionState::Idle,
            buffer: Vec::new(),
            last_take: None,
            rhythm: RhythmMachine::new(pattern, tempo_bpm),
            sample_rate,
        }
    }

    // ==================== Audio wiring ====================

    /// Returns the synth handle for the audio output source.
    pub fn synth_handle(&self) -> Arc<Mutex<PolySynth>> {
        Arc::clone(&self.synth)
    }

    /// Returns the drum kit handle for the audio output source.
    pub fn drum_handle(&self) -> Arc<Mutex<DrumKit>> {
        Arc::clone(&self.drums)
    }

    /// Returns the capture tap the audio output source feeds.
    pub fn tap(&self) -> CaptureTap {
        self.tap.clone()
    }

    // ==================== Event interface ====================

    /// Applies one input event at the given time.
    pub fn handle_event(&mut self, event: ConsoleEvent, now: Instant) {
        match event {
            ConsoleEvent::PitchDown(pitch) => {
                self.press_at(pitch, now);
            }
            ConsoleEvent::PitchUp(pitch) => {
                self.release_at(pitch, now);
            }
            ConsoleEvent::RecordStart => {
                self.start_recording_at(now);
            }
            ConsoleEvent::RecordStop => {
                self.stop_recording_at(now);
            }
            ConsoleEvent::InstrumentChange(instrument) => self.set_instrument(instrument),
            ConsoleEvent::RhythmToggle => {
                self.toggle_rhythm_at(now);
            }
            ConsoleEvent::PatternChange(pattern) => self.rhythm.set_pattern(pattern),
            ConsoleEvent::TempoChange(bpm) => self.rhythm.set_tempo(bpm),
        }
    }

    // ==================== Note triggering ====================

    /// Attacks a pitch.
    ///
    /// A pitch that is already sounding is left alone, so key auto-repeat and
    /// duplicate press events cannot double-attack or leak table entries.
    ///
    /// # Returns
    ///
    /// true if a new attack was triggered
    pub fn press_at(&mut self, pitch: u8, now: Instant) -> bool {
        if pitch > 127 || self.active.contains_key(&pitch) {
            return false;
        }
        self.active.insert(pitch, now);
        if let Ok(mut synth) = self.synth.lock() {
            synth.note_on(pitch, DEFAULT_VELOCITY);
        }
        true
    }

    /// Releases a pitch.
    ///
    /// Releasing a silent pitch is a no-op. While a session is open, the
    /// completed pair is appended to the performance buffer with its onset
    /// relative to the session start.
    ///
    /// # Returns
    ///
    /// true if a sounding note was released
    pub fn release_at(&mut self, pitch: u8, now: Instant) -> bool {
        let Some(pressed_at) = self.active.remove(&pitch) else {
            return false;
        };
        if let Ok(mut synth) = self.synth.lock() {
            synth.note_off(pitch);
        }

        if let SessionState::Recording { started_at } = self.session {
            let onset = pressed_at.saturating_duration_since(started_at);
            let duration = now.saturating_duration_since(pressed_at);
            self.buffer.push(RecordedNote::new(
                pitch,
                DEFAULT_VELOCITY,
                onset.as_secs_f64(),
                duration.as_secs_f64(),
            ));
        }
        true
    }

    /// Attacks a pitch at the current time.
    pub fn press(&mut self, pitch: u8) -> bool {
        self.press_at(pitch, Instant::now())
    }

    /// Releases a pitch at the current time.
    pub fn release(&mut self, pitch: u8) -> bool {
        self.release_at(pitch, Instant::now())
    }

    /// Releases every sounding pitch.
    pub fn release_all_at(&mut self, now: Instant) {
        let sounding: Vec<u8> = self.active.keys().copied().collect();
        for pitch in sounding {
            self.release_at(pitch, now);
        }
    }

    /// Returns whether a pitch is currently sounding.
    pub fn is_active(&self, pitch: u8) -> bool {
        self.active.contains_key(&pitch)
    }

    /// Returns how many pitches are currently sounding.
    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    // ==================== Instrument ====================

    /// Returns the active instrument preset.
    pub fn instrument(&self) -> Instrument {
        self.synth
            .lock()
            .map(|s| s.instrument())
            .unwrap_or_default()
    }

    /// Switches the instrument preset.
    ///
    /// Held notes keep fading with the old timbre; only notes pressed after
    /// the switch use the new one. An open session keeps its buffers.
    pub fn set_instrument(&mut self, instrument: Instrument) {
        if let Ok(mut synth) = self.synth.lock() {
            tracing::debug!(from = synth.instrument().name(), to = instrument.name(), "instrument switch");
            synth.set_instrument(instrument);
        }
    }

    // ==================== Recording session ====================

    /// Opens a recording session.
    ///
    /// Valid only from Idle; calling while already recording changes
    /// nothing. Clears the performance buffer and arms the capture tap.
    ///
    /// # Returns
    ///
    /// true if a session was opened
    pub fn start_recording_at(&mut self, now: Instant) -> bool {
        if matches!(self.session, SessionState::Recording { .. }) {
            return false;
        }
        self.buffer.clear();
        self.tap.arm();
        self.session = SessionState::Recording { started_at: now };
        tracing::info!("recording started");
        true
    }

    /// Closes the open recording session and freezes it into a take.
    ///
    /// Valid only while Recording; calling from Idle changes nothing and
    /// leaves the previous take intact.
    ///
    /// # Returns
    ///
    /// true if a session was closed
    pub fn stop_recording_at(&mut self, now: Instant) -> bool {
        let SessionState::Recording { started_at } = self.session else {
            return false;
        };
        let chunks = self.tap.disarm();
        let duration = now.saturating_duration_since(started_at).as_secs_f64();
        self.last_take = Some(Take {
            notes: std::mem::take(&mut self.buffer),
            chunks,
            sample_rate: self.sample_rate,
            duration,
        });
        self.session = SessionState::Idle;
        tracing::info!(seconds = duration, "recording stopped");
        true
    }

    /// Opens a session at the current time.
    pub fn start_recording(&mut self) -> bool {
        self.start_recording_at(Instant::now())
    }

    /// Closes the session at the current time.
    pub fn stop_recording(&mut self) -> bool {
        self.stop_recording_at(Instant::now())
    }

    /// Returns whether a session is open.
    pub fn is_recording(&self) -> bool {
        matches!(self.session, SessionState::Recording { .. })
    }

    /// Time since the session opened, if one is open.
    pub fn elapsed_at(&self, now: Instant) -> Option<Duration> {
        match self.session {
            SessionState::Recording { started_at } => {
                Some(now.saturating_duration_since(started_at))
            }
            SessionState::Idle => None,
        }
    }

    /// Notes completed so far in the open session.
    pub fn recorded_count(&self) -> usize {
        self.buffer.len()
    }

    /// The most recent completed session, if any.
    pub fn last_take(&self) -> Option<&Take> {
        self.last_take.as_ref()
    }

    // ==================== Rhythm ====================

    /// Starts or stops the rhythm loop.
    pub fn toggle_rhythm_at(&mut self, now: Instant) -> bool {
        self.rhythm.toggle_at(now)
    }

    /// Returns whether the rhythm loop is running.
    pub fn rhythm_running(&self) -> bool {
        self.rhythm.is_running()
    }

    /// Returns the rhythm tempo in beats per minute.
    pub fn tempo(&self) -> u32 {
        self.rhythm.tempo()
    }

    /// Returns the selected rhythm pattern.
    pub fn pattern(&self) -> RhythmPattern {
        self.rhythm.pattern()
    }

    /// Advances time-driven work: fires due rhythm hits into the drum kit.
    /// Called from the event loop on every iteration.
    pub fn tick_at(&mut self, now: Instant) {
        let hits = self.rhythm.tick_at(now);
        if hits.is_empty() {
            return;
        }
        if let Ok(mut drums) = self.drums.lock() {
            for hit in hits {
                drums.trigger(hit);
            }
        }
    }

    // ==================== Export ====================

    /// Exports the last take as a Standard MIDI File.
    ///
    /// # Arguments
    ///
    /// * `path` - Output file path
    ///
    /// # Returns
    ///
    /// The number of notes written
    ///
    /// # Errors
    ///
    /// Fails when no take exists, the take has no notes, or the file cannot
    /// be written; console state is unaffected either way
    pub fn export_midi<P: AsRef<Path>>(&self, path: P) -> Result<usize> {
        let take = self
            .last_take
            .as_ref()
            .context("nothing to export: record a performance first")?;
        anyhow::ensure!(
            !take.notes.is_empty(),
            "nothing to export: the last take has no notes"
        );
        midi::export_to_midi(&take.notes, self.instrument().gm_program(), &path)
            .with_context(|| format!("failed to write {}", path.as_ref().display()))?;
        Ok(take.notes.len())
    }

    /// Exports the last take's captured audio as a WAV file.
    ///
    /// # Arguments
    ///
    /// * `path` - Output file path
    ///
    /// # Returns
    ///
    /// The exported length in seconds
    ///
    /// # Errors
    ///
    /// Fails when no take exists, nothing was captured, or the file cannot
    /// be written; console state is unaffected either way
    pub fn export_wav<P: AsRef<Path>>(&self, path: P) -> Result<f64> {
        let take = self
            .last_take
            .as_ref()
            .context("nothing to export: record a performance first")?;
        audio::export_to_wav(&take.chunks, take.sample_rate, CHANNELS, &path)
            .with_context(|| format!("failed to write {}", path.as_ref().display()))?;

        let frames: usize = take.chunks.iter().map(|c| c.len()).sum::<usize>() / CHANNELS as usize;
        Ok(frames as f64 / take.sample_rate as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 44100;

    fn console() -> (PerformanceConsole, Instant) {
        (
            PerformanceConsole::new(SR, Instrument::Classic, RhythmPattern::Rock, 120),
            Instant::now(),
        )
    }

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    #[test]
    fn test_double_press_attacks_once() {
        let (mut console, t0) = console();
        assert!(console.press_at(60, t0));
        assert!(!console.press_at(60, t0 + secs(0.1)));
        assert_eq!(console.active_count(), 1);
        assert_eq!(console.synth_handle().lock().unwrap().active_voice_count(), 1);
    }

    #[test]
    fn test_release_without_press_is_noop() {
        let (mut console, t0) = console();
        console.start_recording_at(t0);
        assert!(!console.release_at(60, t0 + secs(0.5)));
        assert_eq!(console.recorded_count(), 0);
    }

    #[test]
    fn test_session_records_completed_pairs() {
        let (mut console, t0) = console();
        console.start_recording_at(t0);

        console.press_at(60, t0 + secs(0.0));
        console.release_at(60, t0 + secs(0.5));
        console.press_at(64, t0 + secs(0.5));
        console.release_at(64, t0 + secs(1.0));
        // A pitch still held at stop time yields no entry
        console.press_at(67, t0 + secs(1.0));

        console.stop_recording_at(t0 + secs(1.5));
        let take = console.last_take().unwrap();
        assert_eq!(take.notes.len(), 2);
        assert_eq!(take.notes[0].pitch, 60);
        assert!((take.notes[0].onset - 0.0).abs() < 1e-9);
        assert!((take.notes[0].duration - 0.5).abs() < 1e-9);
        assert!((take.notes[1].onset - 0.5).abs() < 1e-9);
        assert!((take.duration - 1.5).abs() < 1e-9);
        assert!(take.notes.iter().all(|n| n.duration >= 0.0 && n.onset >= 0.0));
    }

    #[test]
    fn test_note_held_across_start_gets_clamped_onset() {
        let (mut console, t0) = console();
        console.press_at(60, t0);
        console.start_recording_at(t0 + secs(1.0));
        console.release_at(60, t0 + secs(1.5));
        console.stop_recording_at(t0 + secs(2.0));

        let take = console.last_take().unwrap();
        assert_eq!(take.notes.len(), 1);
        assert_eq!(take.notes[0].onset, 0.0);
    }

    #[test]
    fn test_release_outside_session_is_not_recorded() {
        let (mut console, t0) = console();
        console.start_recording_at(t0);
        console.press_at(60, t0 + secs(0.2));
        console.stop_recording_at(t0 + secs(1.0));
        // Released after the session closed
        console.release_at(60, t0 + secs(1.2));

        assert_eq!(console.last_take().unwrap().notes.len(), 0);
        assert_eq!(console.active_count(), 0);
    }

    #[test]
    fn test_start_while_recording_is_noop() {
        let (mut console, t0) = console();
        assert!(console.start_recording_at(t0));
        console.press_at(60, t0 + secs(0.1));
        console.release_at(60, t0 + secs(0.2));
        assert!(!console.start_recording_at(t0 + secs(0.3)));
        // The open session's buffer survived the spurious start
        assert_eq!(console.recorded_count(), 1);
    }

    #[test]
    fn test_stop_while_idle_keeps_last_take() {
        let (mut console, t0) = console();
        console.start_recording_at(t0);
        console.press_at(60, t0);
        console.release_at(60, t0 + secs(0.3));
        console.stop_recording_at(t0 + secs(0.5));

        assert!(!console.stop_recording_at(t0 + secs(1.0)));
        let take = console.last_take().unwrap();
        assert_eq!(take.notes.len(), 1);
        assert!((take.duration - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_instrument_switch_keeps_session_buffer() {
        let (mut console, t0) = console();
        console.start_recording_at(t0);
        console.press_at(60, t0);
        console.release_at(60, t0 + secs(0.2));

        console.handle_event(
            ConsoleEvent::InstrumentChange(Instrument::Organ),
            t0 + secs(0.3),
        );
        assert_eq!(console.recorded_count(), 1);
        assert!(console.is_recording());
        assert_eq!(console.instrument(), Instrument::Organ);

        console.press_at(64, t0 + secs(0.4));
        console.release_at(64, t0 + secs(0.6));
        console.stop_recording_at(t0 + secs(1.0));
        assert_eq!(console.last_take().unwrap().notes.len(), 2);
    }

    #[test]
    fn test_new_session_replaces_take_buffers() {
        let (mut console, t0) = console();
        console.start_recording_at(t0);
        console.press_at(60, t0);
        console.release_at(60, t0 + secs(0.2));
        console.stop_recording_at(t0 + secs(0.5));

        console.start_recording_at(t0 + secs(1.0));
        console.press_at(62, t0 + secs(1.1));
        console.release_at(62, t0 + secs(1.3));
        console.stop_recording_at(t0 + secs(1.5));

        let take = console.last_take().unwrap();
        assert_eq!(take.notes.len(), 1);
        assert_eq!(take.notes[0].pitch, 62);
    }

    #[test]
    fn test_capture_tap_follows_session() {
        let (mut console, t0) = console();
        let tap = console.tap();
        assert!(!tap.is_armed());
        console.start_recording_at(t0);
        assert!(tap.is_armed());
        tap.push_chunk(vec![0.1, 0.2]);
        console.stop_recording_at(t0 + secs(1.0));
        assert!(!tap.is_armed());
        let take = console.last_take().unwrap();
        assert!(take.has_audio());
        assert_eq!(take.chunks.len(), 1);
    }

    #[test]
    fn test_export_without_take_fails() {
        let (console, _) = console();
        assert!(console.export_midi(std::env::temp_dir().join("no.mid")).is_err());
        assert!(console.export_wav(std::env::temp_dir().join("no.wav")).is_err());
    }

    #[test]
    fn test_export_empty_capture_fails_cleanly() {
        let (mut console, t0) = console();
        console.start_recording_at(t0);
        console.stop_recording_at(t0 + secs(0.5));

        let path = std::env::temp_dir().join("pianotui_empty_capture.wav");
        assert!(console.export_wav(&path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_export_midi_round_trips() {
        let (mut console, t0) = console();
        console.start_recording_at(t0);
        console.press_at(60, t0);
        console.release_at(60, t0 + secs(0.5));
        console.press_at(64, t0 + secs(0.5));
        console.release_at(64, t0 + secs(1.0));
        console.stop_recording_at(t0 + secs(1.0));

        let path = std::env::temp_dir().join("pianotui_round_trip.mid");
        assert_eq!(console.export_midi(&path).unwrap(), 2);

        let notes = crate::midi::import_from_midi(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].pitch, 60);
        assert_eq!(notes[1].pitch, 64);
        assert!((notes[1].onset - 0.5).abs() < 0.002);
        assert!((notes[1].duration - 0.5).abs() < 0.002);
    }

    #[test]
    fn test_rhythm_toggle_twice_goes_silent() {
        let (mut console, t0) = console();
        assert!(console.toggle_rhythm_at(t0));
        console.tick_at(t0);
        assert!(console.drum_handle().lock().unwrap().active_voice_count() > 0);

        assert!(!console.toggle_rhythm_at(t0));
        // Drain the sounding hits, then advance well past the next downbeat
        {
            let drums_handle = console.drum_handle();
            let mut drums = drums_handle.lock().unwrap();
            let mut l = vec![0.0; SR as usize / 2];
            let mut r = vec![0.0; SR as usize / 2];
            drums.render_mix(&mut l, &mut r);
            assert_eq!(drums.active_voice_count(), 0);
        }
        console.tick_at(t0 + secs(4.0));
        assert_eq!(console.drum_handle().lock().unwrap().active_voice_count(), 0);
    }

    #[test]
    fn test_event_interface_drives_session() {
        let (mut console, t0) = console();
        console.handle_event(ConsoleEvent::RecordStart, t0);
        console.handle_event(ConsoleEvent::PitchDown(60), t0);
        console.handle_event(ConsoleEvent::PitchUp(60), t0 + secs(0.25));
        console.handle_event(ConsoleEvent::TempoChange(90), t0 + secs(0.25));
        console.handle_event(ConsoleEvent::RecordStop, t0 + secs(0.5));

        assert!(!console.is_recording());
        assert_eq!(console.tempo(), 90);
        assert_eq!(console.last_take().unwrap().notes.len(), 1);
    }

    #[test]
    fn test_release_all_completes_pairs() {
        let (mut console, t0) = console();
        console.start_recording_at(t0);
        console.press_at(60, t0);
        console.press_at(64, t0);
        console.release_all_at(t0 + secs(0.4));
        assert_eq!(console.active_count(), 0);
        assert_eq!(console.recorded_count(), 2);
    }
}
