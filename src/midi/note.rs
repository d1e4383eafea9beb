//! Recorded note representation.
//!
//! A recorded note is one completed press/release pair captured during a
//! session, timed in seconds relative to the session start.

/// A single note from a captured performance.
///
/// Onset and duration are wall-clock seconds measured from the start of the
/// recording session, so a take is self-contained regardless of when it was
/// recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedNote {
    /// MIDI note number (0-127). 60 = Middle C (C4).
    pub pitch: u8,

    /// Note velocity (0-127). Controls volume/intensity.
    pub velocity: u8,

    /// Seconds from session start to the attack.
    pub onset: f64,

    /// Seconds the note was held.
    pub duration: f64,
}

impl RecordedNote {
    /// Creates a new recorded note.
    ///
    /// Pitch and velocity are clamped to the MIDI range; onset and duration
    /// are clamped non-negative.
    ///
    /// # Arguments
    ///
    /// * `pitch` - MIDI note number (0-127)
    /// * `velocity` - Note velocity (0-127)
    /// * `onset` - Seconds from session start
    /// * `duration` - Seconds held
    pub fn new(pitch: u8, velocity: u8, onset: f64, duration: f64) -> Self {
        Self {
            pitch: pitch.min(127),
            velocity: velocity.min(127),
            onset: onset.max(0.0),
            duration: duration.max(0.0),
        }
    }

    /// Returns the end of the note in seconds from session start.
    pub fn end(&self) -> f64 {
        self.onset + self.duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_creation() {
        let note = RecordedNote::new(60, 100, 0.5, 0.25);
        assert_eq!(note.pitch, 60);
        assert_eq!(note.velocity, 100);
        assert!((note.end() - 0.75).abs() < f64::EPSILON);
    }

    #[test]
    fn test_note_clamping() {
        let note = RecordedNote::new(200, 200, -1.0, -0.5);
        assert_eq!(note.pitch, 127);
        assert_eq!(note.velocity, 127);
        assert_eq!(note.onset, 0.0);
        assert_eq!(note.duration, 0.0);
    }
}
