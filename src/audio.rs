//! Minimal WAV access for the transcription capability.
//!
//! Producers hand the worker 16 kHz mono WAV files; anything heavier
//! (format conversion, resampling) happens upstream. This module only
//! probes the header for the duration and decodes PCM samples to the f32
//! mono buffer whisper.cpp expects.

use std::path::Path;

// ── Error ──────────────────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum AudioError {
    /// The audio file does not exist at the given path.
    FileNotFound(String),
    /// The file exists but is not a readable WAV stream.
    Open(String),
    /// Sample data failed to decode.
    Decode(String),
}

impl std::fmt::Display for AudioError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FileNotFound(p) => write!(f, "audio file not found: {p}"),
            Self::Open(msg) => write!(f, "failed to open wav: {msg}"),
            Self::Decode(msg) => write!(f, "failed to decode wav samples: {msg}"),
        }
    }
}

impl std::error::Error for AudioError {}

// ── Public API ─────────────────────────────────────────────────────────────────

/// Audio duration in seconds, derived from the WAV header alone.
///
/// No sample data is read, so a file that exceeds the duration ceiling costs
/// one header read and nothing else.
pub fn probe_duration(path: &Path) -> Result<f64, AudioError> {
    let reader = open(path)?;
    let spec = reader.spec();
    Ok(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

/// Decode the full file into mono f32 PCM samples.
///
/// Integer PCM is scaled into `[-1.0, 1.0]`; multi-channel audio is averaged
/// down to mono.
pub fn read_samples(path: &Path) -> Result<Vec<f32>, AudioError> {
    let mut reader = open(path)?;
    let spec = reader.spec();
    let channels = usize::from(spec.channels.max(1));

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| AudioError::Decode(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| AudioError::Decode(e.to_string()))?
        }
    };

    if channels == 1 {
        return Ok(interleaved);
    }

    let mono = interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect();

    Ok(mono)
}

// ── Internals ──────────────────────────────────────────────────────────────────

fn open(path: &Path) -> Result<hound::WavReader<std::io::BufReader<std::fs::File>>, AudioError> {
    if !path.exists() {
        return Err(AudioError::FileNotFound(path.display().to_string()));
    }

    hound::WavReader::open(path).map_err(|e| AudioError::Open(e.to_string()))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    /// Write a mono 16 kHz WAV holding `secs` seconds of silence.
    fn write_wav(path: &Path, secs: f64) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..(secs * 16_000.0) as usize {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn probe_reports_header_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("two-seconds.wav");
        write_wav(&path, 2.0);

        let duration = probe_duration(&path).unwrap();
        assert!((duration - 2.0).abs() < 1e-6);
    }

    #[test]
    fn missing_file_is_reported_as_such() {
        let err = probe_duration(Path::new("/nonexistent/audio.wav")).unwrap_err();
        assert!(matches!(err, AudioError::FileNotFound(_)));
    }

    #[test]
    fn non_wav_bytes_fail_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-audio.wav");
        std::fs::write(&path, b"definitely not riff").unwrap();

        let err = probe_duration(&path).unwrap_err();
        assert!(matches!(err, AudioError::Open(_)));
    }

    #[test]
    fn int_samples_are_scaled_to_unit_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        writer.write_sample(i16::MAX).unwrap();
        writer.write_sample(i16::MIN).unwrap();
        writer.finalize().unwrap();

        let samples = read_samples(&path).unwrap();
        assert_eq!(samples.len(), 2);
        assert!(samples.iter().all(|s| (-1.0..=1.0).contains(s)));
    }

    #[test]
    fn stereo_is_averaged_to_mono() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");

        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 16_000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..4 {
            writer.write_sample(1000i16).unwrap();
            writer.write_sample(-1000i16).unwrap();
        }
        writer.finalize().unwrap();

        let samples = read_samples(&path).unwrap();
        assert_eq!(samples.len(), 4);
        assert!(samples.iter().all(|s| s.abs() < 1e-6));
    }
}
