//! Standard MIDI File (SMF) export functionality.
//!
//! Serializes a captured performance to a .mid file compatible with any MIDI
//! sequencer or player.
//!
//! # Format Details
//!
//! Exports as SMF Format 0: a single track carrying the tempo and time
//! signature meta events, a program change for the active instrument, and the
//! note on/off pairs. Note times are quantized from seconds to ticks at the
//! fixed 480 TPQN / 120 BPM container time base.

use super::{seconds_to_ticks, RecordedNote, EXPORT_TEMPO, TICKS_PER_BEAT};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// MIDI channel all performance notes are written on.
const CHANNEL: u8 = 0;

/// Writes a variable-length quantity (VLQ) used for delta times in MIDI.
///
/// VLQ encodes values using 7 bits per byte, with the MSB indicating
/// whether more bytes follow (1 = more bytes, 0 = last byte).
///
/// # Arguments
///
/// * `value` - The value to encode (max 0x0FFFFFFF for MIDI)
/// * `buffer` - Output buffer to write to
fn write_vlq(value: u32, buffer: &mut Vec<u8>) {
    // MIDI delta times fit in 1-4 VLQ bytes
    let mut bytes = [0u8; 4];
    let mut len = 0;
    let mut remaining = value;
    loop {
        bytes[len] = (remaining & 0x7F) as u8;
        len += 1;
        remaining >>= 7;
        if remaining == 0 {
            break;
        }
    }

    // Emit most-significant group first, continuation bit on all but the last
    for i in (0..len).rev() {
        if i == 0 {
            buffer.push(bytes[i]);
        } else {
            buffer.push(bytes[i] | 0x80);
        }
    }
}

/// MIDI event types for track data.
enum MidiEvent {
    /// Note on: pitch, velocity
    NoteOn { pitch: u8, velocity: u8 },
    /// Note off: pitch (release velocity written as 0)
    NoteOff { pitch: u8 },
    /// Program change: program number
    ProgramChange { program: u8 },
    /// Set tempo: microseconds per quarter note
    SetTempo { microseconds_per_beat: u32 },
    /// Time signature: fixed 4/4
    TimeSignature,
    /// Track name (meta event)
    TrackName { name: String },
    /// End of track (meta event)
    EndOfTrack,
}

/// Represents a timed MIDI event for sorting and writing.
struct TimedEvent {
    /// Absolute tick position
    tick: u32,
    /// The MIDI event
    event: MidiEvent,
    /// Priority for sorting events at the same tick (lower = first).
    /// Ensures meta/setup events precede notes and note offs precede
    /// note ons of the same pitch at the same tick.
    priority: u8,
}

impl TimedEvent {
    fn new(tick: u32, event: MidiEvent, priority: u8) -> Self {
        Self {
            tick,
            event,
            priority,
        }
    }
}

/// Writes a single MIDI event to the buffer (without delta time).
fn write_event(event: &MidiEvent, buffer: &mut Vec<u8>) {
    match event {
        MidiEvent::NoteOn { pitch, velocity } => {
            buffer.push(0x90 | (CHANNEL & 0x0F));
            buffer.push(*pitch);
            buffer.push(*velocity);
        }
        MidiEvent::NoteOff { pitch } => {
            buffer.push(0x80 | (CHANNEL & 0x0F));
            buffer.push(*pitch);
            buffer.push(0);
        }
        MidiEvent::ProgramChange { program } => {
            buffer.push(0xC0 | (CHANNEL & 0x0F));
            buffer.push(*program);
        }
        MidiEvent::SetTempo {
            microseconds_per_beat,
        } => {
            // Meta event: FF 51 03 tt tt tt
            buffer.push(0xFF);
            buffer.push(0x51);
            buffer.push(0x03);
            buffer.push((microseconds_per_beat >> 16) as u8);
            buffer.push((microseconds_per_beat >> 8) as u8);
            buffer.push(*microseconds_per_beat as u8);
        }
        MidiEvent::TimeSignature => {
            // Meta event: FF 58 04 nn dd cc bb
            // 4/4, 24 MIDI clocks per metronome click, 8 32nds per quarter
            buffer.push(0xFF);
            buffer.push(0x58);
            buffer.push(0x04);
            buffer.push(4);
            buffer.push(2); // denominator as power of 2
            buffer.push(24);
            buffer.push(8);
        }
        MidiEvent::TrackName { name } => {
            // Meta event: FF 03 len text
            buffer.push(0xFF);
            buffer.push(0x03);
            let name_bytes = name.as_bytes();
            write_vlq(name_bytes.len() as u32, buffer);
            buffer.extend_from_slice(name_bytes);
        }
        MidiEvent::EndOfTrack => {
            // Meta event: FF 2F 00
            buffer.push(0xFF);
            buffer.push(0x2F);
            buffer.push(0x00);
        }
    }
}

/// Builds the track chunk data from a list of timed events.
///
/// Events are sorted by tick position and converted to delta times.
fn build_track_data(events: &mut [TimedEvent]) -> Vec<u8> {
    let mut buffer = Vec::new();
    events.sort_by(|a, b| a.tick.cmp(&b.tick).then(a.priority.cmp(&b.priority)));

    let mut last_tick = 0u32;
    for timed_event in events.iter() {
        let delta = timed_event.tick.saturating_sub(last_tick);
        write_vlq(delta, &mut buffer);
        write_event(&timed_event.event, &mut buffer);
        last_tick = timed_event.tick;
    }

    buffer
}

/// Writes a track chunk to the output.
fn write_track_chunk<W: Write>(writer: &mut W, track_data: &[u8]) -> std::io::Result<()> {
    // MTrk header
    writer.write_all(b"MTrk")?;
    // Length as big-endian u32
    let length = track_data.len() as u32;
    writer.write_all(&length.to_be_bytes())?;
    // Track data
    writer.write_all(track_data)?;
    Ok(())
}

/// Serializes a performance to Standard MIDI File bytes.
///
/// # Arguments
///
/// * `notes` - The recorded notes, timed in seconds from session start
/// * `program` - MIDI program number written before the first note
/// * `writer` - Output sink
///
/// # Format
///
/// Creates a Format 0 MIDI file: one track containing tempo, time signature,
/// program change, and the note events.
///
/// # Errors
///
/// Returns error if writing fails
pub fn write_midi<W: Write>(
    notes: &[RecordedNote],
    program: u8,
    writer: &mut W,
) -> std::io::Result<()> {
    // Write header chunk (MThd)
    writer.write_all(b"MThd")?;
    writer.write_all(&6u32.to_be_bytes())?; // Header length (always 6)
    writer.write_all(&0u16.to_be_bytes())?; // Format 0 (single track)
    writer.write_all(&1u16.to_be_bytes())?;
    writer.write_all(&(TICKS_PER_BEAT as u16).to_be_bytes())?; // Division

    let mut events = Vec::with_capacity(notes.len() * 2 + 5);

    events.push(TimedEvent::new(
        0,
        MidiEvent::TrackName {
            name: "Performance".to_string(),
        },
        0,
    ));
    events.push(TimedEvent::new(0, MidiEvent::TimeSignature, 1));

    // Convert BPM to microseconds per beat: 60,000,000 / BPM
    let microseconds_per_beat = 60_000_000 / EXPORT_TEMPO;
    events.push(TimedEvent::new(
        0,
        MidiEvent::SetTempo {
            microseconds_per_beat,
        },
        2,
    ));
    events.push(TimedEvent::new(0, MidiEvent::ProgramChange { program }, 3));

    let mut last_tick = 0u32;
    for note in notes {
        let start_tick = seconds_to_ticks(note.onset, EXPORT_TEMPO);
        // Zero-length notes still need a note-off after the note-on
        let end_tick = seconds_to_ticks(note.end(), EXPORT_TEMPO).max(start_tick + 1);
        last_tick = last_tick.max(end_tick);

        events.push(TimedEvent::new(
            start_tick,
            MidiEvent::NoteOn {
                pitch: note.pitch,
                velocity: note.velocity,
            },
            10, // Notes after setup events
        ));
        events.push(TimedEvent::new(
            end_tick,
            MidiEvent::NoteOff { pitch: note.pitch },
            9, // Note offs before note ons at the same tick
        ));
    }

    events.push(TimedEvent::new(last_tick, MidiEvent::EndOfTrack, 255));

    let track_data = build_track_data(&mut events);
    write_track_chunk(writer, &track_data)?;
    writer.flush()?;
    Ok(())
}

/// Exports a performance to a Standard MIDI File on disk.
///
/// # Arguments
///
/// * `notes` - The recorded notes
/// * `program` - MIDI program number for the instrument
/// * `path` - Output file path
///
/// # Errors
///
/// Returns error if file creation or writing fails
pub fn export_to_midi<P: AsRef<Path>>(
    notes: &[RecordedNote],
    program: u8,
    path: P,
) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    write_midi(notes, program, &mut writer)
}
