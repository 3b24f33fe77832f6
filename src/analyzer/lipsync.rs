use crate::core::audio::AudioBuffer;
use crate::core::error::{AnalyzerError, Result};
use log::{debug, info};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::time::Duration;

/// 两个提示音频率（Hz）
pub const LIPSYNC_FREQ1: u32 = 547;
pub const LIPSYNC_FREQ2: u32 = 1823;
pub const LIPSYNC_THRESHOLD: i64 = 1000;
pub const LIPSYNC_HYSTERESIS: i64 = 100;
/// Sliding DFT window length in samples.
pub const LIPSYNC_WINDOW: usize = 500;

const START_THRESHOLD: i64 = LIPSYNC_THRESHOLD + LIPSYNC_HYSTERESIS;
const END_THRESHOLD: i64 = LIPSYNC_THRESHOLD - LIPSYNC_HYSTERESIS;

/// One detected beep. Sample positions count from the start of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LipsyncMarker {
    pub start_sample: u64,
    pub end_sample: u64,
    pub start_time: Duration,
}

impl LipsyncMarker {
    pub fn start_ms(&self) -> f64 {
        self.start_time.as_nanos() as f64 / 1_000_000.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BeepState {
    Idle,
    InBeep { start_sample: u64, max_score: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum BeepAction {
    None,
    Started,
    Finished { start_sample: u64, max_score: f64 },
}

impl BeepState {
    pub fn new() -> Self {
        BeepState::Idle
    }

    /// `consumed` is the number of samples fed so far, including the one
    /// that produced `score`.
    pub fn transition(&self, score: f64, consumed: u64) -> (BeepState, BeepAction) {
        match self {
            BeepState::Idle => {
                if score > START_THRESHOLD as f64 {
                    (
                        BeepState::InBeep {
                            start_sample: consumed,
                            max_score: score,
                        },
                        BeepAction::Started,
                    )
                } else {
                    (BeepState::Idle, BeepAction::None)
                }
            }

            BeepState::InBeep {
                start_sample,
                max_score,
            } => {
                let max_score = max_score.max(score);
                if score < END_THRESHOLD as f64 {
                    (
                        BeepState::Idle,
                        BeepAction::Finished {
                            start_sample: *start_sample,
                            max_score,
                        },
                    )
                } else {
                    (
                        BeepState::InBeep {
                            start_sample: *start_sample,
                            max_score,
                        },
                        BeepAction::None,
                    )
                }
            }
        }
    }
}

impl Default for BeepState {
    fn default() -> Self {
        Self::new()
    }
}

/// Incremental two-tone beep detector over a stream of audio buffers.
///
/// Keeps a rolling window of the last [`LIPSYNC_WINDOW`] samples and the DFT
/// terms at both frequencies, updated in O(1) per sample.
pub struct LipsyncBeepDetector {
    sample_rate: u32,
    sample_index: u64,
    past_samples: Vec<i16>,
    freq1_dft: Complex64,
    freq2_dft: Complex64,
    state: BeepState,
    markers: Vec<LipsyncMarker>,
}

impl LipsyncBeepDetector {
    pub fn new(sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AnalyzerError::InvalidSampleRate(sample_rate));
        }

        Ok(Self {
            sample_rate,
            sample_index: 0,
            past_samples: vec![0; LIPSYNC_WINDOW],
            freq1_dft: Complex64::new(0.0, 0.0),
            freq2_dft: Complex64::new(0.0, 0.0),
            state: BeepState::new(),
            markers: Vec::new(),
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn samples_consumed(&self) -> u64 {
        self.sample_index
    }

    fn dft_term(&self, index: u64, sample: i16, freq: u32) -> Complex64 {
        // phase reduced modulo the rate so it stays exact on long streams
        let rate = self.sample_rate as u64;
        let step = (index % rate) * freq as u64 % rate;
        let angle = -2.0 * PI * step as f64 / rate as f64;
        Complex64::from_polar(sample as f64, angle)
    }

    fn add_sample(&mut self, sample: i16) {
        let slot = (self.sample_index % LIPSYNC_WINDOW as u64) as usize;
        let index = self.sample_index;

        if index >= LIPSYNC_WINDOW as u64 {
            let old_index = index - LIPSYNC_WINDOW as u64;
            let old_sample = self.past_samples[slot];
            self.freq1_dft -= self.dft_term(old_index, old_sample, LIPSYNC_FREQ1);
            self.freq2_dft -= self.dft_term(old_index, old_sample, LIPSYNC_FREQ2);
        }

        self.past_samples[slot] = sample;
        self.sample_index += 1;

        self.freq1_dft += self.dft_term(index, sample, LIPSYNC_FREQ1);
        self.freq2_dft += self.dft_term(index, sample, LIPSYNC_FREQ2);
    }

    fn score(&self) -> f64 {
        (self.freq1_dft.norm() * self.freq2_dft.norm()).sqrt() / LIPSYNC_WINDOW as f64
    }

    /// Feeds one buffer. Markers finished inside it are timed against the
    /// buffer's own timestamp, so gaps between buffers do not drift.
    pub fn process(&mut self, buffer: &AudioBuffer) {
        let buffer_start_sample = self.sample_index;

        for &sample in &buffer.samples {
            self.add_sample(sample);
            let score = self.score();

            let (next, action) = self.state.transition(score, self.sample_index);
            self.state = next;

            match action {
                BeepAction::None => {}
                BeepAction::Started => {
                    debug!("Beep rising edge at sample {}", self.sample_index);
                }
                BeepAction::Finished {
                    start_sample,
                    max_score,
                } => {
                    if let Some(marker) = self.finish_beep(
                        start_sample,
                        max_score,
                        buffer.timestamp,
                        buffer_start_sample,
                    ) {
                        info!(
                            "🔔 Beep detected: samples {}..{} at {:.1} ms",
                            marker.start_sample,
                            marker.end_sample,
                            marker.start_ms()
                        );
                        self.markers.push(marker);
                    }
                }
            }
        }
    }

    fn finish_beep(
        &self,
        start_sample: u64,
        max_score: f64,
        buffer_timestamp: Duration,
        buffer_start_sample: u64,
    ) -> Option<LipsyncMarker> {
        let m = max_score.trunc() as i64;
        if m <= 0 {
            return None;
        }

        // undo the delay the window adds to both edges
        let window = LIPSYNC_WINDOW as i64;
        let start = (start_sample as i64 - window * START_THRESHOLD / m).max(0);
        let end = (self.sample_index as i64 - window * (m - END_THRESHOLD) / m).max(0);

        let offset_ns = (start - buffer_start_sample as i64) as i128 * 1_000_000_000
            / self.sample_rate as i128;
        let start_ns = (buffer_timestamp.as_nanos() as i128 + offset_ns).max(0);

        Some(LipsyncMarker {
            start_sample: start as u64,
            end_sample: end as u64,
            start_time: Duration::from_nanos(start_ns as u64),
        })
    }

    pub fn markers(&self) -> &[LipsyncMarker] {
        &self.markers
    }

    pub fn into_markers(self) -> Vec<LipsyncMarker> {
        self.markers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 44100;

    fn beep_stream(silence_before: usize, burst: usize, silence_after: usize) -> Vec<i16> {
        let mut samples = vec![0i16; silence_before];
        for p in 0..burst {
            let t = p as f64 / RATE as f64;
            let v = 16384.0
                * ((2.0 * PI * LIPSYNC_FREQ1 as f64 * t).sin()
                    + (2.0 * PI * LIPSYNC_FREQ2 as f64 * t).sin());
            samples.push(v.clamp(-32767.0, 32767.0) as i16);
        }
        samples.extend(std::iter::repeat(0i16).take(silence_after));
        samples
    }

    fn run(samples: &[i16], chunk: usize) -> Vec<LipsyncMarker> {
        let mut detector = LipsyncBeepDetector::new(RATE).unwrap();
        for (i, part) in samples.chunks(chunk).enumerate() {
            let ts = Duration::from_nanos((i * chunk) as u64 * 1_000_000_000 / RATE as u64);
            detector.process(&AudioBuffer::new(part.to_vec(), ts));
        }
        detector.into_markers()
    }

    #[test]
    fn test_zero_sample_rate_rejected() {
        assert!(matches!(
            LipsyncBeepDetector::new(0),
            Err(AnalyzerError::InvalidSampleRate(0))
        ));
    }

    #[test]
    fn test_silence_has_no_beeps() {
        assert!(run(&vec![0i16; RATE as usize * 2], 1024).is_empty());
    }

    #[test]
    fn test_single_burst_edges() {
        let samples = beep_stream(44100, 4410, 20000);
        let markers = run(&samples, samples.len());

        assert_eq!(markers.len(), 1);
        let m = markers[0];
        assert!((m.start_sample as i64 - 44100).abs() <= 10, "start {}", m.start_sample);
        assert!((m.end_sample as i64 - 48510).abs() <= 10, "end {}", m.end_sample);
        assert!((m.start_ms() - 1000.0).abs() < 1.0);
    }

    #[test]
    fn test_chunked_buffers_keep_timing() {
        let samples = beep_stream(30000, 2000, 20000);
        let whole = run(&samples, samples.len());
        let chunked = run(&samples, 1024);

        assert_eq!(chunked.len(), 1);
        assert_eq!(whole[0].start_sample, chunked[0].start_sample);
        assert_eq!(whole[0].end_sample, chunked[0].end_sample);
        let diff = whole[0].start_time.as_nanos() as i128 - chunked[0].start_time.as_nanos() as i128;
        assert!(diff.abs() < 1000);
    }

    #[test]
    fn test_state_machine_hysteresis() {
        let state = BeepState::new();
        let (state, action) = state.transition(1050.0, 10);
        assert_eq!(state, BeepState::Idle);
        assert_eq!(action, BeepAction::None);

        let (state, action) = state.transition(1200.0, 11);
        assert_eq!(action, BeepAction::Started);

        // between the two thresholds the beep stays on
        let (state, action) = state.transition(950.0, 12);
        assert_eq!(action, BeepAction::None);
        assert!(matches!(state, BeepState::InBeep { start_sample: 11, .. }));

        let (state, action) = state.transition(10.0, 13);
        assert_eq!(state, BeepState::Idle);
        assert_eq!(
            action,
            BeepAction::Finished {
                start_sample: 11,
                max_score: 1200.0
            }
        );
    }
}
