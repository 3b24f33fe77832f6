use crate::core::error::{AnalyzerError, Result};
use std::collections::VecDeque;
use std::time::Duration;

/// One decoded chunk of mono 16-bit PCM with its presentation time.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    pub samples: Vec<i16>,
    pub timestamp: Duration,
}

impl AudioBuffer {
    pub fn new(samples: Vec<i16>, timestamp: Duration) -> Self {
        Self { samples, timestamp }
    }
}

/// Pull source of decoded audio buffers in presentation order.
pub trait AudioSource {
    fn sample_rate(&self) -> u32;

    fn next_buffer(&mut self) -> Result<Option<AudioBuffer>>;
}

pub struct MemoryAudioSource {
    sample_rate: u32,
    buffers: VecDeque<AudioBuffer>,
}

impl MemoryAudioSource {
    pub fn new(sample_rate: u32, buffers: Vec<AudioBuffer>) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AnalyzerError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            sample_rate,
            buffers: buffers.into(),
        })
    }

    /// Splits a contiguous sample stream into `chunk_size` buffers with
    /// timestamps derived from the sample position.
    pub fn from_samples(sample_rate: u32, samples: &[i16], chunk_size: usize) -> Result<Self> {
        if sample_rate == 0 {
            return Err(AnalyzerError::InvalidSampleRate(sample_rate));
        }
        if chunk_size == 0 {
            return Err(AnalyzerError::InvalidConfig(
                "audio chunk size must be non-zero".into(),
            ));
        }

        let buffers = samples
            .chunks(chunk_size)
            .enumerate()
            .map(|(i, chunk)| {
                let offset = (i * chunk_size) as u64;
                let timestamp =
                    Duration::from_nanos(offset * 1_000_000_000 / sample_rate as u64);
                AudioBuffer::new(chunk.to_vec(), timestamp)
            })
            .collect();

        Self::new(sample_rate, buffers)
    }
}

impl AudioSource for MemoryAudioSource {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn next_buffer(&mut self) -> Result<Option<AudioBuffer>> {
        Ok(self.buffers.pop_front())
    }
}
