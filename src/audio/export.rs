//! Audio export functionality.
//!
//! Turns the chunk sequence captured during a recording session into an
//! uncompressed 16-bit PCM WAV file.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::{Seek, Write};
use std::path::Path;
use thiserror::Error;

/// Errors that can occur while exporting captured audio.
#[derive(Debug, Error)]
pub enum ExportError {
    /// Nothing was captured, so there is nothing to write
    #[error("nothing to export: no audio was captured")]
    EmptyRecording,
    /// The WAV container could not be written
    #[error("WAV write error: {0}")]
    Wav(#[from] hound::Error),
}

/// Writes captured chunks as a 16-bit PCM WAV stream.
///
/// Chunks are concatenated in capture order. Samples are f32 in [-1, 1] and
/// already interleaved; they are clamped and scaled to i16.
///
/// # Arguments
///
/// * `chunks` - The captured interleaved sample chunks
/// * `sample_rate` - Capture sample rate in Hz
/// * `channels` - Interleaved channel count
/// * `writer` - Output sink
///
/// # Errors
///
/// Returns [`ExportError::EmptyRecording`] when every chunk is empty, or a
/// container error from `hound`.
pub fn write_wav<W: Write + Seek>(
    chunks: &[Vec<f32>],
    sample_rate: u32,
    channels: u16,
    writer: W,
) -> Result<(), ExportError> {
    if chunks.iter().all(|c| c.is_empty()) {
        return Err(ExportError::EmptyRecording);
    }

    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };
    let mut wav = WavWriter::new(writer, spec)?;

    for chunk in chunks {
        for &sample in chunk {
            // Convert f32 (-1.0 to 1.0) to i16
            let scaled = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            wav.write_sample(scaled)?;
        }
    }

    wav.finalize()?;
    Ok(())
}

/// Exports captured chunks to a WAV file on disk.
///
/// The file is only created once the chunk sequence is known to be
/// non-empty.
///
/// # Arguments
///
/// * `chunks` - The captured interleaved sample chunks
/// * `sample_rate` - Capture sample rate in Hz
/// * `channels` - Interleaved channel count
/// * `path` - Output file path
///
/// # Errors
///
/// Returns [`ExportError::EmptyRecording`] on an empty capture, or a
/// creation/write error
pub fn export_to_wav<P: AsRef<Path>>(
    chunks: &[Vec<f32>],
    sample_rate: u32,
    channels: u16,
    path: P,
) -> Result<(), ExportError> {
    if chunks.iter().all(|c| c.is_empty()) {
        return Err(ExportError::EmptyRecording);
    }
    let file = std::fs::File::create(path).map_err(hound::Error::IoError)?;
    write_wav(chunks, sample_rate, channels, std::io::BufWriter::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_empty_capture_is_refused() {
        let err = write_wav(&[], 44100, 2, Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, ExportError::EmptyRecording));

        let err = write_wav(&[Vec::new()], 44100, 2, Cursor::new(Vec::new())).unwrap_err();
        assert!(matches!(err, ExportError::EmptyRecording));
    }

    #[test]
    fn test_chunks_concatenate_in_order() {
        let chunks = vec![vec![0.0, 0.5], vec![-0.5, 1.0]];
        let mut cursor = Cursor::new(Vec::new());
        write_wav(&chunks, 44100, 2, &mut cursor).unwrap();

        cursor.set_position(0);
        let mut reader = hound::WavReader::new(cursor).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 2);
        assert_eq!(spec.sample_rate, 44100);
        assert_eq!(spec.bits_per_sample, 16);

        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples.len(), 4);
        assert_eq!(samples[0], 0);
        assert_eq!(samples[1], 16383); // 0.5 scaled
        assert_eq!(samples[2], -16383);
        assert_eq!(samples[3], 32767);
    }

    #[test]
    fn test_out_of_range_samples_are_clamped() {
        let chunks = vec![vec![2.0, -2.0]];
        let mut cursor = Cursor::new(Vec::new());
        write_wav(&chunks, 22050, 1, &mut cursor).unwrap();

        cursor.set_position(0);
        let mut reader = hound::WavReader::new(cursor).unwrap();
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![32767, -32768]);
    }
}
