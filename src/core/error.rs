use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyzerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("WAV format error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
    #[error(
        "Frame size mismatch: expected {expected_width}x{expected_height}, got {width}x{height}"
    )]
    FrameSizeMismatch {
        expected_width: u32,
        expected_height: u32,
        width: u32,
        height: u32,
    },
    #[error("Invalid sample rate: {0}Hz")]
    InvalidSampleRate(u32),
    #[error("Video stream contains no frames")]
    NoVideo,
    #[error("Marker color table is empty")]
    EmptyFrameTable,
    #[error("Frame {frame} has {len} marker codes, expected {expected}")]
    InconsistentRow {
        frame: usize,
        len: usize,
        expected: usize,
    },
}

pub type Result<T> = std::result::Result<T, AnalyzerError>;
