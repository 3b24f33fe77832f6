pub mod frame;
pub mod source;

pub use frame::{Frame, PixelFormat, RawFrame, BYTES_PER_PIXEL};
pub use source::{ImageSequenceSource, MemoryVideoSource, VideoHeader, VideoSource};
