//! Standard MIDI File (SMF) import functionality.
//!
//! Reads .mid files back into recorded notes, primarily for replaying a
//! previously exported performance.
//!
//! # Limitations
//!
//! - Only note on/off events become notes; other channel messages are ignored
//! - A single tempo is assumed (the first tempo meta event wins)
//! - Multi-track files are merged into one note stream

use super::RecordedNote;
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during MIDI import.
#[derive(Debug, Error)]
pub enum MidiImportError {
    /// File could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// MIDI parsing failed
    #[error("MIDI parse error: {0}")]
    Parse(String),
    /// Unsupported MIDI format or timing
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// State for pairing note-on events with their note-off.
/// Key is (channel, pitch), value is (onset_ticks, velocity).
type ActiveNotes = HashMap<(u8, u8), (u32, u8)>;

/// Parses Standard MIDI File bytes into recorded notes.
///
/// All tracks are merged and note times are converted to seconds using the
/// file's division and the first tempo meta event (default 120 BPM).
///
/// # Arguments
///
/// * `data` - Raw SMF bytes
///
/// # Returns
///
/// Notes sorted by onset time
///
/// # Errors
///
/// Returns error if the data cannot be parsed or uses SMPTE timing
pub fn read_midi(data: &[u8]) -> Result<Vec<RecordedNote>, MidiImportError> {
    let smf = Smf::parse(data).map_err(|e| MidiImportError::Parse(e.to_string()))?;

    let ticks_per_beat = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int() as u32,
        Timing::Timecode(_, _) => {
            return Err(MidiImportError::UnsupportedFormat(
                "SMPTE timecode timing not supported".to_string(),
            ))
        }
    };
    if ticks_per_beat == 0 {
        return Err(MidiImportError::UnsupportedFormat(
            "zero ticks per beat".to_string(),
        ));
    }

    let mut tempo_bpm: f64 = 120.0;
    let mut tempo_seen = false;
    let mut notes = Vec::new();

    for track in &smf.tracks {
        let mut tick = 0u32;
        let mut active: ActiveNotes = HashMap::new();

        for event in track {
            tick = tick.saturating_add(event.delta.as_int());

            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(us_per_beat)) => {
                    if !tempo_seen {
                        tempo_bpm = 60_000_000.0 / us_per_beat.as_int() as f64;
                        tempo_seen = true;
                    }
                }
                TrackEventKind::Midi { channel, message } => match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        // A re-struck pitch replaces the dangling entry
                        active.insert((channel.as_int(), key.as_int()), (tick, vel.as_int()));
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        if let Some((onset_tick, velocity)) =
                            active.remove(&(channel.as_int(), key.as_int()))
                        {
                            notes.push(raw_note(
                                key.as_int(),
                                velocity,
                                onset_tick,
                                tick,
                            ));
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        // Dangling note-ons end at the final tick of their track
        for ((_, pitch), (onset_tick, velocity)) in active {
            notes.push(raw_note(pitch, velocity, onset_tick, tick));
        }
    }

    // Second pass converts ticks to seconds once the tempo is known
    let seconds_per_tick = 60.0 / (tempo_bpm * ticks_per_beat as f64);
    for note in &mut notes {
        note.onset *= seconds_per_tick;
        note.duration *= seconds_per_tick;
    }
    notes.sort_by(|a, b| a.onset.total_cmp(&b.onset).then(a.pitch.cmp(&b.pitch)));
    Ok(notes)
}

/// Builds a note still timed in ticks; the caller rescales to seconds.
fn raw_note(pitch: u8, velocity: u8, onset_tick: u32, end_tick: u32) -> RecordedNote {
    RecordedNote::new(
        pitch,
        velocity,
        onset_tick as f64,
        end_tick.saturating_sub(onset_tick) as f64,
    )
}

/// Imports a MIDI file from disk.
///
/// # Arguments
///
/// * `path` - Path to the .mid or .midi file
///
/// # Errors
///
/// Returns error if the file cannot be read or parsed
pub fn import_from_midi<P: AsRef<Path>>(path: P) -> Result<Vec<RecordedNote>, MidiImportError> {
    let data = fs::read(path)?;
    read_midi(&data)
}
