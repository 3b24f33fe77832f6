use crate::analyzer::color_reader::{sample_average_color, FrameColorRow, MarkerColorReader};
use crate::analyzer::lipsync::{LipsyncBeepDetector, LipsyncMarker};
use crate::analyzer::marker_type::{self, VideoInfo};
use crate::analyzer::pixel_stats::{AccumulatorConfig, PixelStatAccumulator};
use crate::analyzer::region_finder::{Marker, MarkerRegionFinder, RegionConfig};
use crate::analyzer::sync_stats::{
    estimate_framerate, pair_events, video_lipsync_events, SyncStats, VideoLipsyncEvent,
};
use crate::core::audio::AudioSource;
use crate::core::error::{AnalyzerError, Result};
use crate::core::video::{VideoHeader, VideoSource};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub accumulator: AccumulatorConfig,
    pub regions: RegionConfig,
}

impl AnalysisConfig {
    pub fn for_camera_capture() -> Self {
        Self {
            accumulator: AccumulatorConfig::for_camera_capture(),
            regions: RegionConfig::default(),
        }
    }

    /// Loads a config from JSON; missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        if config.accumulator.saturation_low >= config.accumulator.saturation_high {
            return Err(AnalyzerError::InvalidConfig(format!(
                "saturation band {}..{} is empty",
                config.accumulator.saturation_low, config.accumulator.saturation_high
            )));
        }
        Ok(config)
    }
}

/// Most-changing pixel of the recording with its color on the first frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeProbe {
    pub x: u32,
    pub y: u32,
    pub color: String,
}

#[derive(Debug, Clone)]
pub struct AnalysisResult {
    pub header: VideoHeader,
    pub markers: Vec<Marker>,
    pub rows: Vec<FrameColorRow>,
    pub video_info: VideoInfo,
    pub audio_markers: Vec<LipsyncMarker>,
    pub sample_rate: Option<u32>,
    pub video_events: Vec<VideoLipsyncEvent>,
    pub sync: SyncStats,
    pub frame_count: usize,
    pub framerate: Option<f64>,
    pub probe: Option<ChangeProbe>,
}

/// Two-pass analysis of one recording.
pub struct MarkerAnalyzer {
    config: AnalysisConfig,
}

impl MarkerAnalyzer {
    pub fn new() -> Self {
        Self::with_config(AnalysisConfig::default())
    }

    pub fn with_config(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn run(
        &self,
        video: &mut dyn VideoSource,
        audio: Option<&mut dyn AudioSource>,
    ) -> Result<AnalysisResult> {
        let header = video.header();
        info!(
            "🎬 Analyzing {}x{} video ({:?}, stride {})",
            header.width, header.height, header.format, header.stride
        );

        // 第一遍：像素统计
        let mut accumulator = PixelStatAccumulator::with_config(
            header.width,
            header.height,
            self.config.accumulator.clone(),
        );
        while let Some(frame) = video.next_frame()? {
            accumulator.observe(&frame)?;
        }
        if accumulator.frames_seen() == 0 {
            return Err(AnalyzerError::NoVideo);
        }
        info!(
            "✓ Pass 1 done: {} frames, {} stable pixels",
            accumulator.frames_seen(),
            accumulator.stable_count()
        );

        let mask = accumulator.finalize();
        debug!("{} candidate marker pixels", mask.candidate_count());
        let markers =
            MarkerRegionFinder::with_config(self.config.regions.clone()).find_regions(&mask);

        // 第二遍：读取每帧的标记颜色
        video.rewind()?;
        let reader = MarkerColorReader::with_threshold(self.config.accumulator.color_threshold);
        let probe_pixel = accumulator.most_changing_pixel();
        let mut probe = None;
        let mut rows = Vec::with_capacity(accumulator.frames_seen() as usize);

        while let Some(frame) = video.next_frame()? {
            if probe.is_none() {
                probe = probe_pixel.map(|(x, y)| ChangeProbe {
                    x,
                    y,
                    color: sample_average_color(&frame, x, y),
                });
            }
            rows.push(reader.read_row(&frame, &markers));
        }
        if rows.is_empty() {
            return Err(AnalyzerError::NoVideo);
        }
        if rows.len() as u64 != accumulator.frames_seen() {
            warn!(
                "⚠️ Second pass saw {} frames, first pass saw {}",
                rows.len(),
                accumulator.frames_seen()
            );
        }
        info!("✓ Pass 2 done: read {} markers on {} frames", markers.len(), rows.len());

        let (audio_markers, sample_rate) = match audio {
            Some(source) => {
                let mut detector = LipsyncBeepDetector::new(source.sample_rate())?;
                while let Some(buffer) = source.next_buffer()? {
                    detector.process(&buffer);
                }
                info!(
                    "🎵 Audio done: {} samples, {} beeps",
                    detector.samples_consumed(),
                    detector.markers().len()
                );
                (detector.into_markers(), Some(source.sample_rate()))
            }
            None => (Vec::new(), None),
        };

        let video_info = marker_type::analyze(&rows)?;
        let video_events = video_lipsync_events(&rows, &video_info);
        let sync = pair_events(&audio_markers, &video_events);

        let framerate = header.framerate.or_else(|| {
            let timestamps: Vec<Duration> = rows.iter().map(|r| r.timestamp).collect();
            estimate_framerate(&timestamps)
        });

        Ok(AnalysisResult {
            header,
            markers,
            frame_count: rows.len(),
            rows,
            video_info,
            audio_markers,
            sample_rate,
            video_events,
            sync,
            framerate,
            probe,
        })
    }
}

impl Default for MarkerAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}
