pub mod buffer;
pub mod utils;

pub use buffer::{AudioBuffer, AudioSource, MemoryAudioSource};
pub use utils::{load_wav_mono_i16, WavAudioSource, DEFAULT_CHUNK_SIZE};
