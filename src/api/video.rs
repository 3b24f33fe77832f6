//! 测试视频分析器

use crate::analyzer::{AnalysisConfig, MarkerAnalyzer};
use crate::api::models::AnalysisReport;
use crate::core::audio::{AudioSource, WavAudioSource};
use crate::core::error::Result;
use crate::core::video::{ImageSequenceSource, VideoSource};
use log::info;
use std::path::Path;

/// 测试视频分析器 - 定位标记、识别类型、测量音画同步
///
/// ```no_run
/// use avsync_lib::api::video::VideoAnalyzer;
///
/// let analyzer = VideoAnalyzer::create();
/// let report = analyzer.analyze_directory("frames/", 25.0, Some("audio.wav".as_ref()))?;
/// println!("{}", report.to_json()?);
/// # Ok::<(), avsync_lib::core::AnalyzerError>(())
/// ```
pub struct VideoAnalyzer {
    analyzer: MarkerAnalyzer,
}

impl VideoAnalyzer {
    pub fn create() -> Self {
        Self::with_config(AnalysisConfig::default())
    }

    /// 使用自定义配置（例如摄像机翻拍）
    pub fn with_config(config: AnalysisConfig) -> Self {
        info!("🎬 VideoAnalyzer: created");
        Self {
            analyzer: MarkerAnalyzer::with_config(config),
        }
    }

    /// Analyzes a directory of still frames and an optional WAV track.
    pub fn analyze_directory(
        &self,
        dir: impl AsRef<Path>,
        framerate: f64,
        wav: Option<&Path>,
    ) -> Result<AnalysisReport> {
        let mut video = ImageSequenceSource::open(dir, framerate)?;
        match wav {
            Some(path) => {
                let mut audio = WavAudioSource::open(path)?;
                self.analyze_sources(&mut video, Some(&mut audio))
            }
            None => self.analyze_sources(&mut video, None),
        }
    }

    pub fn analyze_sources(
        &self,
        video: &mut dyn VideoSource,
        audio: Option<&mut dyn AudioSource>,
    ) -> Result<AnalysisReport> {
        let result = self.analyzer.run(video, audio)?;
        let report = AnalysisReport::from_result(&result);
        info!(
            "📋 Report: {} markers, {} warnings",
            report.markers_found,
            report.warnings.len()
        );
        Ok(report)
    }
}

impl Default for VideoAnalyzer {
    fn default() -> Self {
        Self::create()
    }
}

impl Drop for VideoAnalyzer {
    fn drop(&mut self) {
        info!("🗑️ VideoAnalyzer: released");
    }
}
