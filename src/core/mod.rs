pub mod audio;
pub mod error;
pub mod video;

pub use error::{AnalyzerError, Result};
