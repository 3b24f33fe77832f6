use super::color_reader::{ColorCode, FrameColorRow};
use super::lipsync::LipsyncMarker;
use super::marker_type::{MarkerKind, VideoInfo};
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A content frame on which the RGB6 marker was replaced by black.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoLipsyncEvent {
    pub frame_index: usize,
    pub timestamp: Duration,
}

impl VideoLipsyncEvent {
    pub fn timestamp_ms(&self) -> f64 {
        self.timestamp.as_nanos() as f64 / 1_000_000.0
    }
}

/// Black frames of the first RGB6 marker inside the content run.
pub fn video_lipsync_events(rows: &[FrameColorRow], info: &VideoInfo) -> Vec<VideoLipsyncEvent> {
    let Some(marker) = info.first_of_kind(MarkerKind::Rgb6) else {
        return Vec::new();
    };

    let range = info.structure.content_range();
    let end = range.end.min(rows.len());
    let start = range.start.min(end);

    rows[start..end]
        .iter()
        .enumerate()
        .filter(|(_, row)| row.get(marker) == Some(ColorCode::Black))
        .map(|(offset, row)| VideoLipsyncEvent {
            frame_index: start + offset,
            timestamp: row.timestamp,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncPair {
    pub frame_index: usize,
    pub video_ms: f64,
    pub audio_ms: f64,
    /// 正值表示音频晚于画面
    pub delay_ms: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncStats {
    pub pairs: Vec<SyncPair>,
    pub mean_ms: Option<f64>,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

impl SyncStats {
    pub fn delays_ms(&self) -> Vec<f64> {
        self.pairs.iter().map(|p| p.delay_ms).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// Pairs every video event with the audio beep whose start is closest in time.
pub fn pair_events(audio: &[LipsyncMarker], video: &[VideoLipsyncEvent]) -> SyncStats {
    if audio.is_empty() {
        return SyncStats::default();
    }

    let pairs: Vec<SyncPair> = video
        .iter()
        .filter_map(|event| {
            let video_ms = event.timestamp_ms();
            audio
                .iter()
                .map(|m| m.start_ms())
                .min_by(|a, b| (a - video_ms).abs().total_cmp(&(b - video_ms).abs()))
                .map(|audio_ms| SyncPair {
                    frame_index: event.frame_index,
                    video_ms,
                    audio_ms,
                    delay_ms: audio_ms - video_ms,
                })
        })
        .collect();

    if pairs.is_empty() {
        return SyncStats::default();
    }

    let delays: Vec<f64> = pairs.iter().map(|p| p.delay_ms).collect();
    let mean = delays.iter().sum::<f64>() / delays.len() as f64;
    let min = delays.iter().copied().fold(f64::INFINITY, f64::min);
    let max = delays.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    debug!(
        "Paired {} lipsync events: mean {:.2} ms, min {:.2} ms, max {:.2} ms",
        pairs.len(),
        mean,
        min,
        max
    );

    SyncStats {
        pairs,
        mean_ms: Some(mean),
        min_ms: Some(min),
        max_ms: Some(max),
    }
}

/// Frame rate from the mean spacing of presentation timestamps.
pub fn estimate_framerate(timestamps: &[Duration]) -> Option<f64> {
    let (first, last) = (timestamps.first()?, timestamps.last()?);
    if timestamps.len() < 2 || last <= first {
        return None;
    }
    let span = (*last - *first).as_secs_f64();
    Some((timestamps.len() - 1) as f64 / span)
}
