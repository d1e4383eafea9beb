//! Oscillator and envelope based polyphonic synthesis.
//!
//! The synthesizer is pure DSP with no audio-device dependency: voices are
//! spawned by `note_on`, advanced through an ADSR envelope, and rendered into
//! stereo sample buffers by whoever owns the output stream. Instrument presets
//! only affect voices spawned after the switch; sounding voices keep the
//! waveform and envelope they were born with and fade out on their own.

mod drums;
mod instrument;

pub use drums::{DrumKit, Percussion};
pub use instrument::Instrument;

/// Reference pitch: A4 (MIDI note 69) at concert tuning.
const A4_MIDI: f32 = 69.0;
const A4_HZ: f32 = 440.0;

/// Upper bound on simultaneously sounding voices.
/// The oldest voice is stolen when the pool is full.
const MAX_VOICES: usize = 32;

/// Returns the equal-tempered frequency of a MIDI note number.
pub fn pitch_to_hz(pitch: u8) -> f32 {
    A4_HZ * 2.0f32.powf((pitch as f32 - A4_MIDI) / 12.0)
}

/// Oscillator waveform shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

impl Waveform {
    /// Samples the waveform at a phase in [0, 1).
    fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * std::f32::consts::TAU).sin(),
            Waveform::Triangle => {
                // Rises 0..0.5, falls 0.5..1
                if phase < 0.5 {
                    4.0 * phase - 1.0
                } else {
                    3.0 - 4.0 * phase
                }
            }
            Waveform::Square => {
                if phase < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * phase - 1.0,
        }
    }
}

/// Attack/decay/sustain/release envelope parameters.
/// Times are in seconds, sustain is a level in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Adsr {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

/// Envelope progression for one voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EnvStage {
    Attack,
    Decay,
    Sustain,
    Release,
    Done,
}

/// Per-voice envelope state.
///
/// Tracks the current output level so that a release started mid-attack ramps
/// down from wherever the level actually was, with no discontinuity.
#[derive(Debug, Clone, Copy)]
struct Envelope {
    params: Adsr,
    stage: EnvStage,
    level: f32,
    /// Level per second subtracted during release, fixed at note-off.
    release_rate: f32,
}

impl Envelope {
    fn new(params: Adsr) -> Self {
        Self {
            params,
            stage: EnvStage::Attack,
            level: 0.0,
            release_rate: 0.0,
        }
    }

    /// Advances the envelope by `dt` seconds and returns the new level.
    fn next(&mut self, dt: f32) -> f32 {
        match self.stage {
            EnvStage::Attack => {
                self.level += if self.params.attack > 0.0 {
                    dt / self.params.attack
                } else {
                    1.0
                };
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvStage::Decay;
                }
            }
            EnvStage::Decay => {
                let drop = 1.0 - self.params.sustain;
                self.level -= if self.params.decay > 0.0 {
                    dt * drop / self.params.decay
                } else {
                    drop
                };
                if self.level <= self.params.sustain {
                    self.level = self.params.sustain;
                    self.stage = EnvStage::Sustain;
                }
                // A zero-sustain preset rings out without a note-off
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = EnvStage::Done;
                }
            }
            EnvStage::Sustain => {
                self.level = self.params.sustain;
                if self.level <= 0.0 {
                    self.stage = EnvStage::Done;
                }
            }
            EnvStage::Release => {
                self.level -= self.release_rate * dt;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = EnvStage::Done;
                }
            }
            EnvStage::Done => {}
        }
        self.level
    }

    /// Begins the release ramp from the current level.
    fn note_off(&mut self) {
        if self.stage == EnvStage::Done || self.stage == EnvStage::Release {
            return;
        }
        self.release_rate = if self.params.release > 0.0 {
            (self.level / self.params.release).max(f32::EPSILON)
        } else {
            f32::INFINITY
        };
        self.stage = EnvStage::Release;
    }

    fn is_done(&self) -> bool {
        self.stage == EnvStage::Done
    }
}

/// One sounding note.
///
/// The waveform and envelope are copied from the active instrument at spawn
/// time, so an instrument switch never retunes a voice that is already
/// fading.
#[derive(Debug, Clone)]
struct Voice {
    pitch: u8,
    waveform: Waveform,
    phase: f32,
    phase_inc: f32,
    env: Envelope,
    gain: f32,
    /// Monotonic spawn order, used for voice stealing.
    serial: u64,
}

impl Voice {
    fn render(&mut self, dt: f32) -> f32 {
        let amp = self.env.next(dt);
        let sample = self.waveform.sample(self.phase) * amp * self.gain;
        self.phase += self.phase_inc;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }
        sample
    }
}

/// Polyphonic oscillator synthesizer.
///
/// Renders interleavable stereo buffers on demand; all methods are cheap
/// enough to call from the audio pull path under a mutex.
pub struct PolySynth {
    sample_rate: u32,
    instrument: Instrument,
    voices: Vec<Voice>,
    next_serial: u64,
    /// Output scale applied to the voice mix.
    master_gain: f32,
}

impl PolySynth {
    /// Creates a synthesizer rendering at the given sample rate.
    pub fn new(sample_rate: u32, instrument: Instrument) -> Self {
        Self {
            sample_rate,
            instrument,
            voices: Vec::with_capacity(MAX_VOICES),
            next_serial: 0,
            master_gain: 0.25,
        }
    }

    /// Returns the sample rate the synth renders at.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the active instrument preset.
    pub fn instrument(&self) -> Instrument {
        self.instrument
    }

    /// Switches the preset used for subsequently spawned voices.
    ///
    /// Voices already sounding keep their waveform and envelope and fade out
    /// with the old timbre.
    pub fn set_instrument(&mut self, instrument: Instrument) {
        self.instrument = instrument;
    }

    /// Starts a note.
    ///
    /// # Arguments
    ///
    /// * `pitch` - MIDI note number (0-127)
    /// * `velocity` - Note velocity (0-127)
    pub fn note_on(&mut self, pitch: u8, velocity: u8) {
        if self.voices.len() >= MAX_VOICES {
            // Steal the oldest voice
            if let Some(oldest) = self
                .voices
                .iter()
                .enumerate()
                .min_by_key(|(_, v)| v.serial)
                .map(|(i, _)| i)
            {
                self.voices.swap_remove(oldest);
            }
        }

        let serial = self.next_serial;
        self.next_serial += 1;
        self.voices.push(Voice {
            pitch,
            waveform: self.instrument.waveform(),
            phase: 0.0,
            phase_inc: pitch_to_hz(pitch) / self.sample_rate as f32,
            env: Envelope::new(self.instrument.envelope()),
            gain: velocity.min(127) as f32 / 127.0,
            serial,
        });
    }

    /// Releases every sounding voice of a pitch.
    pub fn note_off(&mut self, pitch: u8) {
        for voice in self.voices.iter_mut().filter(|v| v.pitch == pitch) {
            voice.env.note_off();
        }
    }

    /// Stops all voices.
    ///
    /// # Arguments
    ///
    /// * `immediate` - If true, voices are dropped without a release ramp
    pub fn all_notes_off(&mut self, immediate: bool) {
        if immediate {
            self.voices.clear();
        } else {
            for voice in &mut self.voices {
                voice.env.note_off();
            }
        }
    }

    /// Returns how many voices are currently sounding.
    pub fn active_voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Renders one block of audio into the left and right buffers.
    ///
    /// Both buffers must have the same length. Output is mono duplicated to
    /// both channels; finished voices are reaped after the block.
    pub fn render(&mut self, left: &mut [f32], right: &mut [f32]) {
        debug_assert_eq!(left.len(), right.len());
        let dt = 1.0 / self.sample_rate as f32;

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let mut mix = 0.0f32;
            for voice in &mut self.voices {
                mix += voice.render(dt);
            }
            let sample = (mix * self.master_gain).clamp(-1.0, 1.0);
            *l = sample;
            *r = sample;
        }

        self.voices.retain(|v| !v.env.is_done());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render_seconds(synth: &mut PolySynth, seconds: f32) -> Vec<f32> {
        let samples = (seconds * synth.sample_rate() as f32) as usize;
        let mut left = vec![0.0; samples];
        let mut right = vec![0.0; samples];
        synth.render(&mut left, &mut right);
        left
    }

    fn peak(buf: &[f32]) -> f32 {
        buf.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    #[test]
    fn test_pitch_to_hz() {
        assert!((pitch_to_hz(69) - 440.0).abs() < 0.01);
        assert!((pitch_to_hz(57) - 220.0).abs() < 0.01);
        assert!((pitch_to_hz(81) - 880.0).abs() < 0.01);
    }

    #[test]
    fn test_note_produces_sound_and_release_decays() {
        let mut synth = PolySynth::new(44100, Instrument::Classic);
        synth.note_on(60, 100);
        let attack = render_seconds(&mut synth, 0.2);
        assert!(peak(&attack) > 0.01);

        synth.note_off(60);
        // Well past the longest release of any preset
        render_seconds(&mut synth, 3.0);
        let tail = render_seconds(&mut synth, 0.1);
        assert!(peak(&tail) < 1e-4);
        assert_eq!(synth.active_voice_count(), 0);
    }

    #[test]
    fn test_release_without_attack_is_harmless() {
        let mut synth = PolySynth::new(44100, Instrument::Classic);
        synth.note_off(60);
        assert_eq!(synth.active_voice_count(), 0);
    }

    #[test]
    fn test_instrument_switch_keeps_old_voices() {
        let mut synth = PolySynth::new(44100, Instrument::Retro);
        synth.note_on(60, 100);
        synth.set_instrument(Instrument::Organ);
        assert_eq!(synth.active_voice_count(), 1);
        synth.note_on(64, 100);
        assert_eq!(synth.active_voice_count(), 2);

        // The pre-switch voice still renders with its own waveform
        let block = render_seconds(&mut synth, 0.05);
        assert!(peak(&block) > 0.0);
        assert_eq!(synth.instrument(), Instrument::Organ);
    }

    #[test]
    fn test_voice_stealing_bounds_pool() {
        let mut synth = PolySynth::new(44100, Instrument::Organ);
        for i in 0..(MAX_VOICES as u8 + 10) {
            synth.note_on(30 + i, 100);
        }
        assert!(synth.active_voice_count() <= MAX_VOICES);
    }

    #[test]
    fn test_all_notes_off_immediate() {
        let mut synth = PolySynth::new(44100, Instrument::Classic);
        synth.note_on(60, 100);
        synth.note_on(64, 100);
        synth.all_notes_off(true);
        assert_eq!(synth.active_voice_count(), 0);
        let block = render_seconds(&mut synth, 0.01);
        assert!(peak(&block) == 0.0);
    }

    #[test]
    fn test_output_stays_in_range() {
        let mut synth = PolySynth::new(44100, Instrument::Retro);
        for pitch in [48, 52, 55, 60, 64, 67, 72] {
            synth.note_on(pitch, 127);
        }
        let block = render_seconds(&mut synth, 0.1);
        assert!(peak(&block) <= 1.0);
    }
}
