use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{config::AudioConfig, Result, StemPlayerError};

/// Fraction of bins, from the bottom, that make up the bass band.
const BASS_FRACTION: f32 = 0.1;
/// Upper edge of the mid band as a fraction of all bins.
const MID_FRACTION: f32 = 0.4;

/// Band-energy summary for one stem. Every field lies in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StemAnalysis {
    pub energy: f32,
    pub bass: f32,
    pub mid: f32,
    pub treble: f32,
    pub peak: f32,
}

/// Reduces normalized bin magnitudes to bass/mid/treble means, overall mean
/// and peak.
pub fn summarize_bins(bins: &[f32]) -> StemAnalysis {
    if bins.is_empty() {
        return StemAnalysis::default();
    }

    let count = bins.len();
    let bass_end = (count as f32 * BASS_FRACTION).floor() as usize;
    let mid_end = (count as f32 * MID_FRACTION).floor() as usize;

    StemAnalysis {
        energy: mean(bins),
        bass: mean(&bins[..bass_end]),
        mid: mean(&bins[bass_end..mid_end]),
        treble: mean(&bins[mid_end..]),
        peak: bins.iter().copied().fold(0.0, f32::max).clamp(0.0, 1.0),
    }
}

fn mean(values: &[f32]) -> f32 {
    if values.is_empty() {
        0.0
    } else {
        (values.iter().sum::<f32>() / values.len() as f32).clamp(0.0, 1.0)
    }
}

/// Per-stem analyser memory: the smoothed spectrum and the latest
/// normalized bins derived from it.
#[derive(Debug, Clone, Default)]
pub struct AnalyserState {
    smoothed: Vec<f32>,
    frequency_data: Vec<f32>,
}

impl AnalyserState {
    pub fn new(bins: usize) -> Self {
        Self {
            smoothed: vec![0.0; bins],
            frequency_data: vec![0.0; bins],
        }
    }

    pub fn frequency_data(&self) -> &[f32] {
        &self.frequency_data
    }

    /// Zeroes the bins, as seen while nothing is playing.
    pub fn clear(&mut self) {
        self.smoothed.fill(0.0);
        self.frequency_data.fill(0.0);
    }
}

/// Turns a time-domain window into normalized frequency bins the way a
/// browser analyser node does: Blackman window, magnitude spectrum,
/// exponential smoothing over time, then a decibel window mapped onto `[0, 1]`.
pub struct FrequencyAnalyzer {
    fft_size: usize,
    smoothing: f32,
    min_decibels: f32,
    max_decibels: f32,
    window: Vec<f32>,
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl FrequencyAnalyzer {
    pub fn new(config: &AudioConfig) -> Self {
        let fft_size = config.fft_size.max(2);
        let (min_decibels, max_decibels) = if config.max_decibels > config.min_decibels {
            (config.min_decibels, config.max_decibels)
        } else {
            (-100.0, -30.0)
        };
        Self {
            fft_size,
            smoothing: config.smoothing.clamp(0.0, 1.0),
            min_decibels,
            max_decibels,
            window: (0..fft_size).map(|n| blackman_value(n, fft_size)).collect(),
            fft_planner: RealFftPlanner::new(),
            fft: None,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size / 2
    }

    pub fn new_state(&self) -> AnalyserState {
        AnalyserState::new(self.bin_count())
    }

    /// Refreshes `state` from the most recent `fft_size` samples of a stem.
    pub fn process(&mut self, time_domain: &[f32], state: &mut AnalyserState) -> Result<()> {
        let bins = self.bin_count();
        if state.smoothed.len() != bins {
            *state = AnalyserState::new(bins);
        }

        let size = self.fft_size;
        let range_db = self.max_decibels - self.min_decibels;
        let fft = prepare_fft(&mut self.fft, &mut self.fft_planner, size);

        // Align the newest samples to the end of the window.
        let skip = time_domain.len().saturating_sub(size);
        let pad = size.saturating_sub(time_domain.len());
        fft.input[..pad].fill(0.0);
        for (i, sample) in time_domain[skip..].iter().enumerate() {
            fft.input[pad + i] = sample * self.window[pad + i];
        }
        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)
            .map_err(|err| StemPlayerError::msg(format!("spectrum analysis failed: {err}")))?;

        for (k, bin) in fft.spectrum.iter().take(bins).enumerate() {
            let magnitude = bin.norm() / size as f32;
            let smoothed = self.smoothing * state.smoothed[k] + (1.0 - self.smoothing) * magnitude;
            state.smoothed[k] = smoothed;
            state.frequency_data[k] = if smoothed > 0.0 {
                ((20.0 * smoothed.log10() - self.min_decibels) / range_db).clamp(0.0, 1.0)
            } else {
                0.0
            };
        }
        Ok(())
    }
}

fn prepare_fft<'a>(
    slot: &'a mut Option<FftResources>,
    planner: &mut RealFftPlanner<f32>,
    size: usize,
) -> &'a mut FftResources {
    if slot.as_ref().map(|fft| fft.size != size).unwrap_or(true) {
        *slot = None;
    }

    slot.get_or_insert_with(|| {
        let plan = planner.plan_fft_forward(size);
        FftResources {
            size,
            scratch: plan.make_scratch_vec(),
            spectrum: plan.make_output_vec(),
            input: plan.make_input_vec(),
            plan,
        }
    })
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
}

impl fmt::Debug for FrequencyAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrequencyAnalyzer")
            .field("fft_size", &self.fft_size)
            .field("smoothing", &self.smoothing)
            .field("min_decibels", &self.min_decibels)
            .field("max_decibels", &self.max_decibels)
            .finish()
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    let phase = 2.0 * PI * index as f32 / len as f32;
    0.42 - 0.5 * phase.cos() + 0.08 * (2.0 * phase).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn analyzer(smoothing: f32) -> FrequencyAnalyzer {
        FrequencyAnalyzer::new(&AudioConfig {
            smoothing,
            ..AudioConfig::default()
        })
    }

    fn sine(cycles: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * cycles * i as f32 / len as f32).sin())
            .collect()
    }

    #[test]
    fn splits_bins_into_bands() {
        // 128 bins: bass = 0..12, mid = 12..51, treble = 51..128.
        let mut bins = vec![0.0f32; 128];
        bins[..12].fill(1.0);
        bins[60] = 0.5;

        let analysis = summarize_bins(&bins);
        assert!((analysis.bass - 1.0).abs() < 1e-6);
        assert_eq!(analysis.mid, 0.0);
        assert!((analysis.treble - 0.5 / 77.0).abs() < 1e-6);
        assert!((analysis.energy - 12.5 / 128.0).abs() < 1e-6);
        assert_eq!(analysis.peak, 1.0);
    }

    #[test]
    fn empty_and_tiny_bin_sets_stay_in_range() {
        assert_eq!(summarize_bins(&[]), StemAnalysis::default());

        let analysis = summarize_bins(&[0.3, 0.9]);
        assert_eq!(analysis.bass, 0.0);
        assert_eq!(analysis.mid, 0.0);
        assert!((analysis.treble - 0.6).abs() < 1e-6);
        assert!((analysis.peak - 0.9).abs() < 1e-6);
    }

    #[test]
    fn silence_produces_zero_bins() {
        let mut analyzer = analyzer(0.0);
        let mut state = analyzer.new_state();
        analyzer.process(&[0.0; 256], &mut state).unwrap();

        assert_eq!(state.frequency_data().len(), 128);
        assert!(state.frequency_data().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let mut analyzer = analyzer(0.0);
        let mut state = analyzer.new_state();
        analyzer.process(&sine(8.0, 256), &mut state).unwrap();

        let data = state.frequency_data();
        assert_eq!(data[8], 1.0);
        assert!(data.iter().all(|v| (0.0..=1.0).contains(v)));
        assert!(data[100] < data[8]);
        assert_eq!(summarize_bins(data).peak, 1.0);
    }

    #[test]
    fn smoothing_decays_instead_of_dropping() {
        let mut analyzer = analyzer(0.8);
        let mut state = analyzer.new_state();
        analyzer.process(&sine(8.0, 256), &mut state).unwrap();
        let loud = state.frequency_data()[8];

        analyzer.process(&[0.0; 256], &mut state).unwrap();
        let decayed = state.frequency_data()[8];
        assert!(decayed > 0.0);
        assert!(decayed <= loud);

        state.clear();
        assert!(state.frequency_data().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn short_windows_are_zero_padded() {
        let mut analyzer = analyzer(0.0);
        let mut state = analyzer.new_state();
        analyzer.process(&[0.5; 10], &mut state).unwrap();
        assert!(state.frequency_data().iter().all(|v| (0.0..=1.0).contains(v)));
    }
}
