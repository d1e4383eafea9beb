//! Rhythm accompaniment scheduling.
//!
//! A one-measure loop of percussion hits, driven from the event loop. The
//! machine is pure scheduling: callers pass the current time in, collect the
//! hits that came due, and forward them to the drum kit. Stopping the machine
//! drops its schedule, so nothing can fire afterwards.

use crate::synth::Percussion;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Sixteenth-note steps in the one-measure (4/4) loop.
pub const STEPS_PER_MEASURE: u32 = 16;

/// Tempo bounds in beats per minute.
pub const MIN_TEMPO: u32 = 40;
pub const MAX_TEMPO: u32 = 240;

/// Default tempo in beats per minute.
pub const DEFAULT_TEMPO: u32 = 120;

/// The selectable accompaniment patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RhythmPattern {
    /// Straight backbeat: kick on 1 and 3, snare on 2 and 4, eighth hats.
    #[default]
    Rock,
    /// Syncopated kick with sixteenth hats.
    Funk,
    /// Triplet-feel swing on the hats.
    Shuffle,
}

impl RhythmPattern {
    /// All patterns in cycling order.
    pub const ALL: [RhythmPattern; 3] = [
        RhythmPattern::Rock,
        RhythmPattern::Funk,
        RhythmPattern::Shuffle,
    ];

    /// Display name for the transport bar.
    pub fn name(self) -> &'static str {
        match self {
            RhythmPattern::Rock => "Rock",
            RhythmPattern::Funk => "Funk",
            RhythmPattern::Shuffle => "Shuffle",
        }
    }

    /// Returns the next pattern in cycling order, wrapping around.
    pub fn next(self) -> RhythmPattern {
        let idx = Self::ALL.iter().position(|&p| p == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    /// The fixed hit table: (sixteenth step, voice) pairs within one measure.
    fn hits(self) -> &'static [(u32, Percussion)] {
        use Percussion::{HiHat, Kick, Snare};
        match self {
            RhythmPattern::Rock => &[
                (0, Kick),
                (0, HiHat),
                (2, HiHat),
                (4, Snare),
                (4, HiHat),
                (6, HiHat),
                (8, Kick),
                (8, HiHat),
                (10, HiHat),
                (12, Snare),
                (12, HiHat),
                (14, HiHat),
            ],
            RhythmPattern::Funk => &[
                (0, Kick),
                (0, HiHat),
                (2, HiHat),
                (3, Kick),
                (4, Snare),
                (4, HiHat),
                (6, HiHat),
                (7, Kick),
                (8, HiHat),
                (10, Kick),
                (10, HiHat),
                (12, Snare),
                (12, HiHat),
                (14, HiHat),
                (15, Snare),
            ],
            RhythmPattern::Shuffle => &[
                (0, Kick),
                (0, HiHat),
                (3, HiHat),
                (4, Snare),
                (4, HiHat),
                (7, HiHat),
                (8, Kick),
                (8, HiHat),
                (11, HiHat),
                (12, Snare),
                (12, HiHat),
                (15, HiHat),
            ],
        }
    }
}

/// Position within the running loop.
struct LoopState {
    /// When the current step comes due.
    next_due: Instant,
    /// Current sixteenth step (0-15).
    step: u32,
}

/// The accompaniment scheduler.
///
/// Tempo changes apply to the very next step; pattern changes apply when the
/// measure wraps, so the current bar finishes in the old feel.
pub struct RhythmMachine {
    pattern: RhythmPattern,
    pending_pattern: Option<RhythmPattern>,
    tempo_bpm: u32,
    state: Option<LoopState>,
}

impl RhythmMachine {
    /// Creates a stopped machine.
    pub fn new(pattern: RhythmPattern, tempo_bpm: u32) -> Self {
        Self {
            pattern,
            pending_pattern: None,
            tempo_bpm: tempo_bpm.clamp(MIN_TEMPO, MAX_TEMPO),
            state: None,
        }
    }

    /// Returns whether the loop is running.
    pub fn is_running(&self) -> bool {
        self.state.is_some()
    }

    /// Returns the current tempo in beats per minute.
    pub fn tempo(&self) -> u32 {
        self.tempo_bpm
    }

    /// Returns the selected pattern (the pending one if a swap is queued).
    pub fn pattern(&self) -> RhythmPattern {
        self.pending_pattern.unwrap_or(self.pattern)
    }

    /// Duration of one sixteenth step at the current tempo.
    fn step_duration(&self) -> Duration {
        Duration::from_secs_f64(60.0 / self.tempo_bpm as f64 / 4.0)
    }

    /// Starts or stops the loop.
    ///
    /// # Arguments
    ///
    /// * `now` - Current time; the first step is due immediately on start
    ///
    /// # Returns
    ///
    /// true if the loop is running after the toggle
    pub fn toggle_at(&mut self, now: Instant) -> bool {
        if self.state.is_some() {
            self.state = None;
            // A queued pattern swap still applies to the next start
            if let Some(pattern) = self.pending_pattern.take() {
                self.pattern = pattern;
            }
            false
        } else {
            self.state = Some(LoopState {
                next_due: now,
                step: 0,
            });
            true
        }
    }

    /// Sets the tempo, clamped to the supported range.
    /// Takes effect from the next scheduled step, even mid-measure.
    pub fn set_tempo(&mut self, bpm: u32) {
        self.tempo_bpm = bpm.clamp(MIN_TEMPO, MAX_TEMPO);
    }

    /// Selects a pattern.
    /// While running, the swap is deferred to the next measure boundary.
    pub fn set_pattern(&mut self, pattern: RhythmPattern) {
        if self.state.is_some() {
            self.pending_pattern = Some(pattern);
        } else {
            self.pattern = pattern;
        }
    }

    /// Collects every percussion hit that came due by `now`.
    ///
    /// Steps are advanced one sixteenth at a time so a short stall replays
    /// the missed steps in order; after a stall longer than one measure the
    /// schedule resynchronizes to `now` instead of bursting.
    pub fn tick_at(&mut self, now: Instant) -> Vec<Percussion> {
        let mut fired = Vec::new();
        let step_duration = self.step_duration();
        let measure = step_duration * STEPS_PER_MEASURE;

        let Some(state) = &mut self.state else {
            return fired;
        };

        if now.saturating_duration_since(state.next_due) > measure {
            state.next_due = now;
        }

        while now >= state.next_due {
            let step = state.step;
            fired.extend(
                self.pattern
                    .hits()
                    .iter()
                    .filter(|(s, _)| *s == step)
                    .map(|(_, voice)| *voice),
            );

            state.step = (state.step + 1) % STEPS_PER_MEASURE;
            state.next_due += step_duration;

            // Pattern swaps land on the downbeat
            if state.step == 0 {
                if let Some(pattern) = self.pending_pattern.take() {
                    self.pattern = pattern;
                }
            }
        }

        fired
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine() -> (RhythmMachine, Instant) {
        (RhythmMachine::new(RhythmPattern::Rock, 120), Instant::now())
    }

    #[test]
    fn test_stopped_machine_never_fires() {
        let (mut m, t0) = machine();
        assert!(m.tick_at(t0).is_empty());
        assert!(m.tick_at(t0 + Duration::from_secs(10)).is_empty());
    }

    #[test]
    fn test_downbeat_fires_on_start() {
        let (mut m, t0) = machine();
        assert!(m.toggle_at(t0));
        let hits = m.tick_at(t0);
        assert!(hits.contains(&Percussion::Kick));
        assert!(hits.contains(&Percussion::HiHat));
    }

    #[test]
    fn test_toggle_twice_stops_firing() {
        let (mut m, t0) = machine();
        m.toggle_at(t0);
        m.tick_at(t0);
        assert!(!m.toggle_at(t0));
        assert!(!m.is_running());

        // Simulated time advance: nothing fires after stop
        assert!(m.tick_at(t0 + Duration::from_secs(4)).is_empty());
    }

    #[test]
    fn test_backbeat_lands_on_step_four() {
        let (mut m, t0) = machine();
        m.toggle_at(t0);
        m.tick_at(t0);

        // At 120 BPM a sixteenth is 125 ms; step 4 is due at 500 ms
        let hits = m.tick_at(t0 + Duration::from_millis(500));
        assert!(hits.contains(&Percussion::Snare));
    }

    #[test]
    fn test_tempo_change_applies_immediately() {
        let (mut m, t0) = machine();
        m.toggle_at(t0);
        m.tick_at(t0); // consume step 0

        m.set_tempo(240);
        // Step 1 was already scheduled 125 ms out; at 240 BPM the following
        // sixteenths land every 62.5 ms, putting the step-4 snare at 312.5 ms
        let hits = m.tick_at(t0 + Duration::from_millis(340));
        assert!(hits.contains(&Percussion::Snare));
    }

    #[test]
    fn test_tempo_is_clamped() {
        let (mut m, _) = machine();
        m.set_tempo(10_000);
        assert_eq!(m.tempo(), MAX_TEMPO);
        m.set_tempo(1);
        assert_eq!(m.tempo(), MIN_TEMPO);
    }

    #[test]
    fn test_pattern_swap_waits_for_measure_boundary() {
        let (mut m, t0) = machine();
        m.toggle_at(t0);
        m.tick_at(t0);
        m.set_pattern(RhythmPattern::Shuffle);

        // Mid-measure the old pattern still reports hits on step 2
        let hits = m.tick_at(t0 + Duration::from_millis(250));
        assert!(hits.contains(&Percussion::HiHat));

        // After the wrap the shuffle table is live: step 2 is now silent
        let step = Duration::from_millis(125);
        m.tick_at(t0 + step * 16);
        assert_eq!(m.pattern(), RhythmPattern::Shuffle);
        let hits = m.tick_at(t0 + step * 18);
        assert!(hits.is_empty());
    }

    #[test]
    fn test_long_stall_resynchronizes() {
        let (mut m, t0) = machine();
        m.toggle_at(t0);
        m.tick_at(t0);

        // Two full measures of silence: the backlog is dropped, not replayed
        let hits = m.tick_at(t0 + Duration::from_secs(4));
        assert!(hits.len() <= 3);
    }
}
