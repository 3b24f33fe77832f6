//! 标记分析 - 两遍扫描定位并识别测试视频中的同步标记

pub mod color_reader;
pub mod lipsync;
pub mod marker_type;
pub mod pipeline;
pub mod pixel_stats;
pub mod region_finder;
pub mod sync_stats;

pub use color_reader::{sample_average_color, ColorCode, FrameColorRow, MarkerColorReader};
pub use lipsync::{BeepAction, BeepState, LipsyncBeepDetector, LipsyncMarker};
pub use marker_type::{
    MarkerInfo, MarkerKind, MarkerSequenceClassifier, VideoInfo, VideoStructure,
};
pub use pipeline::{AnalysisConfig, AnalysisResult, ChangeProbe, MarkerAnalyzer};
pub use pixel_stats::{AccumulatorConfig, PixelStatAccumulator, SignatureMask};
pub use region_finder::{Marker, MarkerRegionFinder, RegionConfig};
pub use sync_stats::{SyncPair, SyncStats, VideoLipsyncEvent};
