use super::buffer::{AudioBuffer, AudioSource, MemoryAudioSource};
use crate::core::error::{AnalyzerError, Result};
use hound::{SampleFormat, WavReader};
use log::info;
use std::path::Path;

/// Default buffer length handed to the lipsync detector (about 23 ms at 44.1 kHz).
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Loads a 16-bit PCM WAV file and down-mixes it to mono.
///
/// Returns the samples together with the file's sample rate.
pub fn load_wav_mono_i16(path: impl AsRef<Path>) -> Result<(Vec<i16>, u32)> {
    let path = path.as_ref();
    let mut reader = WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    info!(
        "📊 WAV spec: {} Hz, {} channels, {} bits",
        spec.sample_rate, spec.channels, spec.bits_per_sample
    );

    if spec.sample_rate == 0 {
        return Err(AnalyzerError::InvalidSampleRate(spec.sample_rate));
    }
    if spec.sample_format != SampleFormat::Int || spec.bits_per_sample != 16 {
        return Err(AnalyzerError::Wav(hound::Error::Unsupported));
    }

    let estimated_samples = reader.duration() as usize;
    let mut samples = Vec::with_capacity(estimated_samples.max(128));

    if channels == 1 {
        for s in reader.samples::<i16>() {
            samples.push(s?);
        }
    } else {
        let mut frame_sum = 0i32;
        let mut in_frame = 0usize;
        for s in reader.samples::<i16>() {
            frame_sum += s? as i32;
            in_frame += 1;
            if in_frame == channels {
                samples.push((frame_sum / channels as i32) as i16);
                frame_sum = 0;
                in_frame = 0;
            }
        }
    }

    info!("✓ Loaded {} mono samples from {:?}", samples.len(), path);
    Ok((samples, spec.sample_rate))
}

/// WAV file played back as a sequence of fixed-size buffers.
pub struct WavAudioSource {
    inner: MemoryAudioSource,
}

impl WavAudioSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_chunk_size(path, DEFAULT_CHUNK_SIZE)
    }

    pub fn open_with_chunk_size(path: impl AsRef<Path>, chunk_size: usize) -> Result<Self> {
        let (samples, sample_rate) = load_wav_mono_i16(path)?;
        Ok(Self {
            inner: MemoryAudioSource::from_samples(sample_rate, &samples, chunk_size)?,
        })
    }
}

impl AudioSource for WavAudioSource {
    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn next_buffer(&mut self) -> Result<Option<AudioBuffer>> {
        self.inner.next_buffer()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{WavSpec, WavWriter};

    fn write_wav(path: &Path, channels: u16, samples: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_stereo_is_downmixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_wav(&path, 2, &[100, 300, -200, -400, 7, 7]);

        let (samples, rate) = load_wav_mono_i16(&path).unwrap();
        assert_eq!(rate, 8000);
        assert_eq!(samples, vec![200, -300, 7]);
    }

    #[test]
    fn test_wav_source_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mono.wav");
        write_wav(&path, 1, &vec![5i16; 2500]);

        let mut source = WavAudioSource::open_with_chunk_size(&path, 1000).unwrap();
        assert_eq!(source.sample_rate(), 8000);

        let mut total = 0;
        let mut count = 0;
        while let Some(buffer) = source.next_buffer().unwrap() {
            total += buffer.samples.len();
            count += 1;
        }
        assert_eq!(total, 2500);
        assert_eq!(count, 3);
    }
}
