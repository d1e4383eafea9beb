//! Audio output and capture plumbing.
//!
//! Attaches the synthesizer to a rodio output stream via a pull-based source,
//! and exposes a capture tap: while armed, every block the melodic synth
//! renders is also copied into a chunk list for later WAV export. Percussion
//! is mixed in after the tap copy, so accompaniment is audible but never
//! captured.

use crate::synth::{DrumKit, PolySynth};
use anyhow::{Context, Result};
use rodio::{OutputStream, OutputStreamHandle, Source};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Sample rate for audio synthesis (44.1 kHz standard).
pub const SAMPLE_RATE: u32 = 44100;

/// Number of output channels (interleaved stereo).
pub const CHANNELS: u16 = 2;

/// Audio buffer size for low-latency playback.
/// Smaller = lower latency but higher CPU usage.
const BUFFER_SIZE: usize = 256;

/// State shared between the capture tap handle and the audio source.
struct TapShared {
    /// True while a recording session wants the rendered stream.
    armed: AtomicBool,
    /// Interleaved stereo chunks accumulated while armed.
    chunks: Mutex<Vec<Vec<f32>>>,
}

/// Handle to the capture point on the synth's output.
///
/// Cheap to clone; the audio source holds the same shared state and pushes a
/// chunk per rendered block while the tap is armed.
#[derive(Clone)]
pub struct CaptureTap {
    shared: Arc<TapShared>,
}

impl CaptureTap {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(TapShared {
                armed: AtomicBool::new(false),
                chunks: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Clears any previous chunks and starts capturing.
    pub fn arm(&self) {
        if let Ok(mut chunks) = self.shared.chunks.lock() {
            chunks.clear();
        }
        self.shared.armed.store(true, Ordering::Release);
    }

    /// Stops capturing and returns the frozen chunk sequence.
    pub fn disarm(&self) -> Vec<Vec<f32>> {
        self.shared.armed.store(false, Ordering::Release);
        match self.shared.chunks.lock() {
            Ok(mut chunks) => std::mem::take(&mut *chunks),
            Err(_) => Vec::new(),
        }
    }

    /// Returns whether capture is currently armed.
    pub fn is_armed(&self) -> bool {
        self.shared.armed.load(Ordering::Acquire)
    }

    /// Appends one interleaved stereo chunk if armed.
    ///
    /// Called from the audio pull path; also usable directly when no output
    /// stream exists (tests, headless runs).
    pub fn push_chunk(&self, chunk: Vec<f32>) {
        if !self.is_armed() {
            return;
        }
        if let Ok(mut chunks) = self.shared.chunks.lock() {
            chunks.push(chunk);
        }
    }
}

impl Default for CaptureTap {
    fn default() -> Self {
        Self::new()
    }
}

/// Audio source that generates samples from the synthesizer.
/// Implements rodio's Source trait for playback.
struct SynthSource {
    /// The melodic synthesizer.
    synth: Arc<Mutex<PolySynth>>,
    /// Percussion, mixed in after the capture copy.
    drums: Arc<Mutex<DrumKit>>,
    /// Capture state shared with the tap handle.
    tap: CaptureTap,
    /// Left channel buffer.
    left_buf: Vec<f32>,
    /// Right channel buffer.
    right_buf: Vec<f32>,
    /// Current position in the buffer.
    buf_pos: usize,
    /// Current channel (0 = left, 1 = right).
    channel: usize,
}

impl SynthSource {
    fn new(synth: Arc<Mutex<PolySynth>>, drums: Arc<Mutex<DrumKit>>, tap: CaptureTap) -> Self {
        Self {
            synth,
            drums,
            tap,
            left_buf: vec![0.0; BUFFER_SIZE],
            right_buf: vec![0.0; BUFFER_SIZE],
            buf_pos: BUFFER_SIZE, // Start at end to trigger first render
            channel: 0,
        }
    }

    /// Renders the next block: synth, tap copy, then drum overlay.
    fn refill(&mut self) {
        if let Ok(mut synth) = self.synth.lock() {
            synth.render(&mut self.left_buf, &mut self.right_buf);
        } else {
            self.left_buf.fill(0.0);
            self.right_buf.fill(0.0);
        }

        if self.tap.is_armed() {
            let mut chunk = Vec::with_capacity(BUFFER_SIZE * 2);
            for i in 0..BUFFER_SIZE {
                chunk.push(self.left_buf[i]);
                chunk.push(self.right_buf[i]);
            }
            self.tap.push_chunk(chunk);
        }

        if let Ok(mut drums) = self.drums.lock() {
            drums.render_mix(&mut self.left_buf, &mut self.right_buf);
        }
    }
}

impl Iterator for SynthSource {
    type Item = f32;

    fn next(&mut self) -> Option<f32> {
        // Render a new block when the current one is exhausted. The synth
        // outputs silence when no voices are sounding, so the stream can run
        // continuously.
        if self.buf_pos >= BUFFER_SIZE {
            self.refill();
            self.buf_pos = 0;
        }

        // Interleave stereo samples: L, R, L, R, ...
        let sample = if self.channel == 0 {
            self.left_buf[self.buf_pos]
        } else {
            self.right_buf[self.buf_pos]
        };

        // Advance to next channel/sample
        self.channel = 1 - self.channel;
        if self.channel == 0 {
            self.buf_pos += 1;
        }

        Some(sample)
    }
}

impl Source for SynthSource {
    fn current_frame_len(&self) -> Option<usize> {
        None // Continuous stream
    }

    fn channels(&self) -> u16 {
        CHANNELS
    }

    fn sample_rate(&self) -> u32 {
        SAMPLE_RATE
    }

    fn total_duration(&self) -> Option<Duration> {
        None // Infinite stream
    }
}

/// The audio output attachment.
///
/// Owns the OS audio stream and keeps it alive; all note triggering happens
/// through the shared synth handle, not through this type. Construction opens
/// the output device and can fail, which is why it is deferred until the
/// first interaction that needs sound.
pub struct AudioEngine {
    /// Audio output stream (must be kept alive).
    _stream: OutputStream,
    /// Audio output handle for playback.
    _stream_handle: OutputStreamHandle,
}

impl AudioEngine {
    /// Opens the default output device and starts pulling from the synth.
    ///
    /// # Arguments
    ///
    /// * `synth` - The melodic synthesizer to render
    /// * `drums` - Percussion mixed in downstream of the capture tap
    /// * `tap` - Capture tap fed with each rendered block
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available or playback cannot
    /// start
    pub fn new(
        synth: Arc<Mutex<PolySynth>>,
        drums: Arc<Mutex<DrumKit>>,
        tap: CaptureTap,
    ) -> Result<Self> {
        let (stream, stream_handle) =
            OutputStream::try_default().context("Failed to open audio output")?;

        let source = SynthSource::new(synth, drums, tap);
        stream_handle
            .play_raw(source)
            .context("Failed to start audio playback")?;

        Ok(Self {
            _stream: stream,
            _stream_handle: stream_handle,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::synth::Instrument;

    #[test]
    fn test_tap_collects_only_while_armed() {
        let tap = CaptureTap::new();
        tap.push_chunk(vec![0.1, 0.1]);
        assert!(tap.disarm().is_empty());

        tap.arm();
        tap.push_chunk(vec![0.1, 0.2]);
        tap.push_chunk(vec![0.3, 0.4]);
        let chunks = tap.disarm();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], vec![0.1, 0.2]);

        // Disarm froze the sequence; later pushes are dropped
        tap.push_chunk(vec![0.5, 0.6]);
        assert!(tap.disarm().is_empty());
    }

    #[test]
    fn test_arm_clears_previous_session() {
        let tap = CaptureTap::new();
        tap.arm();
        tap.push_chunk(vec![0.1, 0.2]);
        tap.arm();
        tap.push_chunk(vec![0.3, 0.4]);
        let chunks = tap.disarm();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0], vec![0.3, 0.4]);
    }

    #[test]
    fn test_source_interleaves_and_taps() {
        let synth = Arc::new(Mutex::new(PolySynth::new(SAMPLE_RATE, Instrument::Organ)));
        let drums = Arc::new(Mutex::new(DrumKit::new(SAMPLE_RATE)));
        let tap = CaptureTap::new();
        synth.lock().unwrap().note_on(69, 127);

        let mut source = SynthSource::new(Arc::clone(&synth), drums, tap.clone());
        tap.arm();
        let pulled: Vec<f32> = source.by_ref().take(BUFFER_SIZE * 2).collect();
        let chunks = tap.disarm();

        // One full block was rendered and one chunk captured
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), BUFFER_SIZE * 2);
        // The captured chunk is exactly what the stream played
        assert_eq!(chunks[0], pulled);
        assert!(pulled.iter().any(|&s| s != 0.0));
    }

    #[test]
    fn test_drums_are_not_captured() {
        let synth = Arc::new(Mutex::new(PolySynth::new(SAMPLE_RATE, Instrument::Organ)));
        let drums = Arc::new(Mutex::new(DrumKit::new(SAMPLE_RATE)));
        let tap = CaptureTap::new();
        drums.lock().unwrap().trigger(crate::synth::Percussion::Kick);

        let mut source = SynthSource::new(synth, Arc::clone(&drums), tap.clone());
        tap.arm();
        let pulled: Vec<f32> = source.by_ref().take(BUFFER_SIZE * 2).collect();
        let chunks = tap.disarm();

        // The played stream carries the kick, the captured chunk is silent
        assert!(pulled.iter().any(|&s| s != 0.0));
        assert!(chunks[0].iter().all(|&s| s == 0.0));
    }
}
