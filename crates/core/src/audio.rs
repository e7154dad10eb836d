//! Audio preparation for speech recognition.
//!
//! Uploaded WAV files are decoded, mixed down to mono, resampled to the
//! recognizer's 16 kHz rate and padded or trimmed to its fixed 30 second
//! window before being re-encoded as 16-bit PCM WAV.

use anyhow::{Context, Result, bail};
use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use std::io::Cursor;

/// Sample rate expected by Whisper-family models.
pub const WHISPER_SAMPLE_RATE: u32 = 16_000;
/// Length of the model's input window in seconds.
pub const WHISPER_WINDOW_SECS: usize = 30;
/// Number of samples in one full input window.
pub const WHISPER_WINDOW_SAMPLES: usize = WHISPER_SAMPLE_RATE as usize * WHISPER_WINDOW_SECS;

const RESAMPLER_CHUNK_SIZE: usize = 1024;

/// Creates a resampler to convert between audio sample rates.
pub fn create_resampler(
    in_sampling_rate: f64,
    out_sampling_rate: f64,
    chunk_size: usize,
) -> Result<FastFixedIn<f32>> {
    let resampler = FastFixedIn::<f32>::new(
        out_sampling_rate / in_sampling_rate,
        1.0,
        PolynomialDegree::Cubic,
        chunk_size,
        1, // mono
    )?;
    Ok(resampler)
}

/// Converts a slice of f32 samples to a vector of i16 samples.
pub fn convert_f32_to_i16(pcm32: &[f32]) -> Vec<i16> {
    pcm32
        .iter()
        .map(|&sample| (sample * i16::MAX as f32).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
        .collect()
}

/// Decoded mono audio.
#[derive(Debug, Clone)]
pub struct MonoAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decodes a WAV buffer into mono f32 samples in `[-1.0, 1.0]`.
pub fn decode_wav(bytes: &[u8]) -> Result<MonoAudio> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).context("Unsupported or corrupt WAV audio")?;
    let spec = reader.spec();
    if spec.channels == 0 || spec.sample_rate == 0 {
        bail!("WAV header declares no channels or a zero sample rate");
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .context("Failed to read float WAV samples")?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .context("Failed to read integer WAV samples")?
        }
    };

    let channels = spec.channels as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks_exact(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect()
    };

    Ok(MonoAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}

/// Resamples mono audio to `target_rate`.
pub fn resample(audio: &MonoAudio, target_rate: u32) -> Result<Vec<f32>> {
    if audio.sample_rate == target_rate || audio.samples.is_empty() {
        return Ok(audio.samples.clone());
    }

    let mut resampler = create_resampler(
        audio.sample_rate as f64,
        target_rate as f64,
        RESAMPLER_CHUNK_SIZE,
    )?;
    let expected = (audio.samples.len() as u64 * target_rate as u64
        / audio.sample_rate as u64) as usize;
    let mut output = Vec::with_capacity(expected + RESAMPLER_CHUNK_SIZE);

    let mut position = 0;
    while audio.samples.len() - position >= resampler.input_frames_next() {
        let frames = resampler.input_frames_next();
        let chunk: [&[f32]; 1] = [&audio.samples[position..position + frames]];
        let resampled = resampler.process(&chunk[..], None)?;
        output.extend_from_slice(&resampled[0]);
        position += frames;
    }
    if position < audio.samples.len() {
        let tail: [&[f32]; 1] = [&audio.samples[position..]];
        let resampled = resampler.process_partial(Some(&tail[..]), None)?;
        output.extend_from_slice(&resampled[0]);
    }

    Ok(output)
}

/// Pads with silence or trims so the buffer is exactly `length` samples.
pub fn pad_or_trim(mut samples: Vec<f32>, length: usize) -> Vec<f32> {
    samples.resize(length, 0.0);
    samples
}

/// Encodes mono f32 samples as a 16-bit PCM WAV file.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut buffer = Vec::new();
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut buffer), spec)?;
        for sample in convert_f32_to_i16(samples) {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(buffer)
}

/// Normalizes an uploaded WAV file into one 16 kHz mono window.
pub fn prepare_for_whisper(bytes: &[u8]) -> Result<Vec<u8>> {
    let audio = decode_wav(bytes)?;
    if audio.samples.is_empty() {
        bail!("Audio contains no samples");
    }
    let resampled = resample(&audio, WHISPER_SAMPLE_RATE)?;
    let window = pad_or_trim(resampled, WHISPER_WINDOW_SAMPLES);
    encode_wav(&window, WHISPER_SAMPLE_RATE)
}
