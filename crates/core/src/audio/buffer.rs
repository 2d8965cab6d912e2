use std::io::Cursor;

use hound::{SampleFormat, WavReader};

use crate::{Result, StemPlayerError};

/// Decoded stem audio: interleaved stereo at the mixing context's rate.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    source_sample_rate: u32,
    samples: Vec<f32>,
}

impl AudioBuffer {
    /// Wraps already interleaved stereo samples.
    pub fn from_stereo(sample_rate: u32, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            source_sample_rate: sample_rate,
            samples,
        }
    }

    /// Decodes a RIFF/WAVE payload and converts it for a `target_rate` context.
    pub fn decode_wav(bytes: &[u8], target_rate: u32) -> Result<Self> {
        let reader = WavReader::new(Cursor::new(bytes)).map_err(decode_error)?;
        let spec = reader.spec();
        if spec.channels == 0 || spec.sample_rate == 0 {
            return Err(StemPlayerError::msg("WAV declares no channels or no sample rate"));
        }

        let raw: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .into_samples::<f32>()
                .collect::<std::result::Result<_, _>>()
                .map_err(decode_error)?,
            SampleFormat::Int => {
                let scale = 1.0 / (1_i64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|sample| sample.map(|s| s as f32 * scale))
                    .collect::<std::result::Result<_, _>>()
                    .map_err(decode_error)?
            }
        };

        let stereo = fold_to_stereo(&raw, usize::from(spec.channels));
        let samples = resample_linear_stereo(&stereo, spec.sample_rate, target_rate);
        Ok(Self {
            sample_rate: target_rate,
            source_sample_rate: spec.sample_rate,
            samples,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Rate of the file before conversion.
    pub fn source_sample_rate(&self) -> u32 {
        self.source_sample_rate
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / 2
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / f64::from(self.sample_rate)
        }
    }

    /// `(left, right)` for a frame index, `None` past the end.
    pub fn frame(&self, index: usize) -> Option<(f32, f32)> {
        let base = index.checked_mul(2)?;
        Some((*self.samples.get(base)?, *self.samples.get(base + 1)?))
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }
}

fn decode_error(err: hound::Error) -> StemPlayerError {
    StemPlayerError::msg(format!("invalid WAV data: {err}"))
}

/// Mono is duplicated, more than two channels keep the first pair.
fn fold_to_stereo(interleaved: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        2 => interleaved.to_vec(),
        1 => interleaved.iter().flat_map(|&s| [s, s]).collect(),
        _ => interleaved
            .chunks_exact(channels)
            .flat_map(|frame| [frame[0], frame[1]])
            .collect(),
    }
}

fn resample_linear_stereo(input: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || input.is_empty() {
        return input.to_vec();
    }
    let frames = input.len() / 2;
    let duration = frames as f64 / f64::from(src_rate);
    let out_frames = (duration * f64::from(dst_rate)).round() as usize;
    let mut out = vec![0.0f32; out_frames * 2];
    for i in 0..out_frames {
        let pos = i as f64 * f64::from(src_rate) / f64::from(dst_rate);
        let idx = (pos.floor() as usize).min(frames - 1);
        let frac = pos - idx as f64;
        let idx2 = if idx + 1 < frames { idx + 1 } else { idx };
        for ch in 0..2 {
            let x0 = f64::from(input[idx * 2 + ch]);
            let x1 = f64::from(input[idx2 * 2 + ch]);
            out[i * 2 + ch] = ((1.0 - frac) * x0 + frac * x1) as f32;
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::io::Cursor;

    use hound::{SampleFormat, WavSpec, WavWriter};

    /// 16-bit WAV bytes holding a constant-amplitude square wave.
    pub fn wav(seconds: f64, sample_rate: u32, channels: u16) -> Vec<u8> {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut cursor, spec).unwrap();
            let frames = (seconds * f64::from(sample_rate)).round() as usize;
            for i in 0..frames {
                let value: i16 = if (i / 8) % 2 == 0 { 16_000 } else { -16_000 };
                for _ in 0..channels {
                    writer.write_sample(value).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }
}
