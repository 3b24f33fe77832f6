use crate::analyzer::{AnalysisResult, ChangeProbe, MarkerKind, SyncStats, VideoStructure};
use crate::core::error::Result;
use crate::core::video::PixelFormat;
use serde::{Deserialize, Serialize};

/// 单个标记的报告条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerReport {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
    pub kind: MarkerKind,
    pub interval: u32,
    pub chromatic: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LipsyncReport {
    pub audio_markers: usize,
    pub video_markers: usize,
    /// 每对事件的延迟（音频 - 画面，毫秒）
    pub delays_ms: Vec<f64>,
    pub mean_ms: Option<f64>,
    pub min_ms: Option<f64>,
    pub max_ms: Option<f64>,
}

impl LipsyncReport {
    fn new(audio_markers: usize, video_markers: usize, sync: &SyncStats) -> Self {
        Self {
            audio_markers,
            video_markers,
            delays_ms: sync.delays_ms(),
            mean_ms: sync.mean_ms,
            min_ms: sync.min_ms,
            max_ms: sync.max_ms,
        }
    }
}

/// Serializable summary of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub markers_found: usize,
    pub resolution: [u32; 2],
    pub stride: usize,
    pub pixel_format: PixelFormat,
    pub framerate: Option<f64>,
    pub frame_count: usize,
    pub sample_rate: Option<u32>,
    pub video_structure: VideoStructure,
    pub markers: Vec<MarkerReport>,
    pub lipsync: LipsyncReport,
    pub change_probe: Option<ChangeProbe>,
    pub warnings: Vec<String>,
}

impl AnalysisReport {
    pub fn from_result(result: &AnalysisResult) -> Self {
        let markers: Vec<MarkerReport> = result
            .markers
            .iter()
            .zip(&result.video_info.markers)
            .map(|(marker, info)| MarkerReport {
                x1: marker.x1,
                y1: marker.y1,
                x2: marker.x2,
                y2: marker.y2,
                kind: info.kind,
                interval: info.interval,
                chromatic: marker.chromatic,
            })
            .collect();

        let lipsync = LipsyncReport::new(
            result.audio_markers.len(),
            result.video_events.len(),
            &result.sync,
        );

        Self {
            markers_found: result.markers.len(),
            resolution: [result.header.width, result.header.height],
            stride: result.header.stride,
            pixel_format: result.header.format,
            framerate: result.framerate,
            frame_count: result.frame_count,
            sample_rate: result.sample_rate,
            video_structure: result.video_info.structure,
            warnings: collect_warnings(result, &markers, &lipsync),
            markers,
            lipsync,
            change_probe: result.probe.clone(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn collect_warnings(
    result: &AnalysisResult,
    markers: &[MarkerReport],
    lipsync: &LipsyncReport,
) -> Vec<String> {
    let mut warnings = Vec::new();

    for (i, marker) in markers.iter().enumerate() {
        if marker.kind == MarkerKind::Unknown {
            warnings.push(format!(
                "Marker {} at ({}, {}) has an unknown type",
                i, marker.x1, marker.y1
            ));
        }
    }

    if result.sample_rate.is_some() && lipsync.audio_markers != lipsync.video_markers {
        warnings.push(format!(
            "Found {} audio lipsync markers but {} video lipsync markers",
            lipsync.audio_markers, lipsync.video_markers
        ));
    }

    let covered = result.video_info.structure.total_frames();
    if covered < result.frame_count {
        warnings.push(format!(
            "Trailer ends at frame {} but the video has {} frames",
            covered, result.frame_count
        ));
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{marker_type, FrameColorRow, LipsyncMarker, Marker};
    use crate::core::video::VideoHeader;
    use std::time::Duration;

    fn result_from_symbols(symbols: &[&str], audio_markers: Vec<LipsyncMarker>) -> AnalysisResult {
        let rows: Vec<FrameColorRow> = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| FrameColorRow::from_symbols(i as u64, Duration::from_millis(i as u64 * 40), s).unwrap())
            .collect();
        let video_info = marker_type::analyze(&rows).unwrap();
        let markers = (0..rows[0].len() as u32)
            .map(|i| Marker {
                x1: i * 20,
                y1: 0,
                x2: i * 20 + 17,
                y2: 17,
                chromatic: false,
                signature: i + 1,
            })
            .collect();

        AnalysisResult {
            header: VideoHeader {
                width: 64,
                height: 32,
                stride: 256,
                format: PixelFormat::Rgbx,
                framerate: Some(25.0),
            },
            markers,
            frame_count: rows.len(),
            rows,
            video_info,
            sample_rate: Some(48000),
            audio_markers,
            video_events: Vec::new(),
            sync: SyncStats::default(),
            framerate: Some(25.0),
            probe: None,
        }
    }

    #[test]
    fn test_clean_report_has_no_warnings() {
        let result = result_from_symbols(&["ww", "kk", "wk", "kw", "ww"], Vec::new());
        let report = AnalysisReport::from_result(&result);

        assert_eq!(report.markers_found, 2);
        assert_eq!(report.resolution, [64, 32]);
        assert_eq!(report.pixel_format, PixelFormat::Rgbx);
        assert_eq!(report.markers[0].kind, MarkerKind::SyncMark);
        assert_eq!(report.markers[1].interval, 2);
        assert_eq!(report.video_structure.content_frames, 3);
        assert!(report.warnings.is_empty(), "{:?}", report.warnings);

        let json = report.to_json().unwrap();
        assert!(json.contains("\"markers_found\": 2"));
        assert!(json.contains("\"sync_mark\""));
        assert!(json.contains("\"pixel_format\": \"Rgbx\""));

        let parsed: AnalysisReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.pixel_format, PixelFormat::Rgbx);
    }

    #[test]
    fn test_warnings_for_unknown_mismatch_and_trailer() {
        let beep = LipsyncMarker {
            start_sample: 4800,
            end_sample: 9600,
            start_time: Duration::from_millis(100),
        };
        // marker 1 breaks both patterns and the trailer is interrupted
        let result = result_from_symbols(&["ww", "kk", "wr", "kw", "ww", "kk"], vec![beep]);
        let report = AnalysisReport::from_result(&result);

        assert_eq!(report.markers[1].kind, MarkerKind::Unknown);
        assert_eq!(report.warnings.len(), 3, "{:?}", report.warnings);
        assert!(report.warnings[0].contains("unknown type"));
        assert!(report.warnings[1].contains("1 audio lipsync markers but 0 video"));
        assert!(report.warnings[2].contains("Trailer ends at frame 5"));
    }
}
