//! One-shot percussion voices for the rhythm accompaniment.
//!
//! Each hit is a short self-terminating voice: a pitch-swept sine for the
//! kick, filtered noise bursts for the snare and hi-hat. The kit renders
//! additively into buffers that have already been filled by the melodic
//! synth, downstream of the capture tap.

/// Percussive voice kinds triggered by the rhythm machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Percussion {
    Kick,
    Snare,
    HiHat,
}

impl Percussion {
    /// Voice lifetime in seconds.
    fn decay(self) -> f32 {
        match self {
            Percussion::Kick => 0.25,
            Percussion::Snare => 0.18,
            Percussion::HiHat => 0.05,
        }
    }

    fn gain(self) -> f32 {
        match self {
            Percussion::Kick => 0.8,
            Percussion::Snare => 0.5,
            Percussion::HiHat => 0.3,
        }
    }
}

/// A single sounding hit.
struct DrumVoice {
    kind: Percussion,
    /// Seconds elapsed since the trigger.
    age: f32,
    /// Oscillator phase for tonal components.
    phase: f32,
    /// Previous noise sample, for the hi-hat's differencing filter.
    last_noise: f32,
}

impl DrumVoice {
    fn new(kind: Percussion) -> Self {
        Self {
            kind,
            age: 0.0,
            phase: 0.0,
            last_noise: 0.0,
        }
    }

    fn render(&mut self, dt: f32) -> f32 {
        let decay = self.kind.decay();
        let env = (1.0 - self.age / decay).max(0.0);
        // Squared envelope gives the punchy exponential-ish falloff
        let env = env * env;

        let sample = match self.kind {
            Percussion::Kick => {
                // Frequency sweeps down from 110 Hz toward 45 Hz
                let hz = 45.0 + 65.0 * (1.0 - self.age / decay).max(0.0);
                self.phase += hz * dt;
                if self.phase >= 1.0 {
                    self.phase -= 1.0;
                }
                (self.phase * std::f32::consts::TAU).sin()
            }
            Percussion::Snare => {
                // Noise body over a 180 Hz shell tone
                let noise = fastrand::f32() * 2.0 - 1.0;
                self.phase += 180.0 * dt;
                if self.phase >= 1.0 {
                    self.phase -= 1.0;
                }
                let tone = (self.phase * std::f32::consts::TAU).sin();
                0.7 * noise + 0.3 * tone
            }
            Percussion::HiHat => {
                // First difference of noise keeps only the brightest content
                let noise = fastrand::f32() * 2.0 - 1.0;
                let bright = noise - self.last_noise;
                self.last_noise = noise;
                bright * 0.5
            }
        };

        self.age += dt;
        sample * env * self.kind.gain()
    }

    fn is_done(&self) -> bool {
        self.age >= self.kind.decay()
    }
}

/// Mixer for all currently sounding percussion hits.
pub struct DrumKit {
    sample_rate: u32,
    voices: Vec<DrumVoice>,
}

impl DrumKit {
    /// Creates a kit rendering at the given sample rate.
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            voices: Vec::with_capacity(8),
        }
    }

    /// Starts one percussion hit.
    pub fn trigger(&mut self, kind: Percussion) {
        self.voices.push(DrumVoice::new(kind));
    }

    /// Returns how many hits are currently sounding.
    pub fn active_voice_count(&self) -> usize {
        self.voices.len()
    }

    /// Renders the kit additively into an already-filled stereo block.
    pub fn render_mix(&mut self, left: &mut [f32], right: &mut [f32]) {
        if self.voices.is_empty() {
            return;
        }
        debug_assert_eq!(left.len(), right.len());
        let dt = 1.0 / self.sample_rate as f32;

        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let mut mix = 0.0f32;
            for voice in &mut self.voices {
                mix += voice.render(dt);
            }
            *l = (*l + mix).clamp(-1.0, 1.0);
            *r = (*r + mix).clamp(-1.0, 1.0);
        }

        self.voices.retain(|v| !v.is_done());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(kit: &mut DrumKit, seconds: f32) -> Vec<f32> {
        let samples = (seconds * kit.sample_rate as f32) as usize;
        let mut left = vec![0.0; samples];
        let mut right = vec![0.0; samples];
        kit.render_mix(&mut left, &mut right);
        left
    }

    fn peak(buf: &[f32]) -> f32 {
        buf.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    #[test]
    fn test_hit_sounds_then_dies() {
        let mut kit = DrumKit::new(44100);
        kit.trigger(Percussion::Kick);
        let block = render(&mut kit, 0.1);
        assert!(peak(&block) > 0.01);

        // Past the decay the voice is reaped and the kit is silent
        render(&mut kit, 0.3);
        assert_eq!(kit.active_voice_count(), 0);
        let tail = render(&mut kit, 0.05);
        assert_eq!(peak(&tail), 0.0);
    }

    #[test]
    fn test_render_is_additive() {
        let mut kit = DrumKit::new(44100);
        kit.trigger(Percussion::Snare);
        let mut left = vec![0.5; 64];
        let mut right = vec![0.5; 64];
        kit.render_mix(&mut left, &mut right);
        // The pre-existing signal is still present under the added hit
        let mean = left.iter().sum::<f32>() / left.len() as f32;
        assert!(mean > 0.2);
    }

    #[test]
    fn test_all_kinds_render_in_range() {
        let mut kit = DrumKit::new(44100);
        kit.trigger(Percussion::Kick);
        kit.trigger(Percussion::Snare);
        kit.trigger(Percussion::HiHat);
        let block = render(&mut kit, 0.2);
        assert!(peak(&block) <= 1.0);
    }
}
