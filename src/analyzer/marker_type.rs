use super::color_reader::{ColorCode, FrameColorRow};
use crate::core::error::{AnalyzerError, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::ops::Range;

const RGB6_SEQUENCE: [ColorCode; 6] = [
    ColorCode::Red,
    ColorCode::Yellow,
    ColorCode::Green,
    ColorCode::Cyan,
    ColorCode::Blue,
    ColorCode::Magenta,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Unknown,
    /// 黑白交替的同步标记
    SyncMark,
    /// 帧编号位
    FrameId,
    /// 六色循环标记，黑帧表示口型同步事件
    Rgb6,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerInfo {
    pub kind: MarkerKind,
    /// Frames per half period; 1 changes every frame.
    pub interval: u32,
}

impl MarkerInfo {
    pub fn unknown() -> Self {
        Self {
            kind: MarkerKind::Unknown,
            interval: 0,
        }
    }
}

/// Segmentation of the recording into its four phases, in frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoStructure {
    pub header_frames: usize,
    pub locator_frames: usize,
    pub content_frames: usize,
    pub trailer_frames: usize,
}

impl VideoStructure {
    pub fn content_range(&self) -> Range<usize> {
        let start = self.header_frames + self.locator_frames;
        start..start + self.content_frames
    }

    pub fn total_frames(&self) -> usize {
        self.header_frames + self.locator_frames + self.content_frames + self.trailer_frames
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub structure: VideoStructure,
    pub markers: Vec<MarkerInfo>,
}

impl VideoInfo {
    pub fn first_of_kind(&self, kind: MarkerKind) -> Option<usize> {
        self.markers.iter().position(|m| m.kind == kind)
    }
}

/// Classifies every marker column of a frame color table.
pub struct MarkerSequenceClassifier<'a> {
    rows: &'a [FrameColorRow],
    num_markers: usize,
    structure: VideoStructure,
}

impl<'a> MarkerSequenceClassifier<'a> {
    pub fn new(rows: &'a [FrameColorRow]) -> Result<Self> {
        let first = rows.first().ok_or(AnalyzerError::EmptyFrameTable)?;
        let num_markers = first.len();

        if let Some((frame, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != num_markers)
        {
            return Err(AnalyzerError::InconsistentRow {
                frame,
                len: row.len(),
                expected: num_markers,
            });
        }

        let mut classifier = Self {
            rows,
            num_markers,
            structure: VideoStructure::default(),
        };
        classifier.structure = classifier.segment();
        Ok(classifier)
    }

    pub fn structure(&self) -> VideoStructure {
        self.structure
    }

    fn segment(&self) -> VideoStructure {
        let rows = self.rows;
        let white = |row: &FrameColorRow| row.is_all(ColorCode::White);

        let header_frames = rows.iter().take_while(|r| white(r)).count();

        // locator rows are recognized by being identical to their successor
        let mut locator_frames = 0;
        for i in header_frames..rows.len().saturating_sub(1) {
            if rows[i].codes() != rows[i + 1].codes() {
                if locator_frames > 0 {
                    locator_frames += 1;
                }
                break;
            }
            locator_frames += 1;
        }

        let content_start = header_frames + locator_frames;
        let content_frames = rows[content_start..]
            .iter()
            .take_while(|r| !white(r))
            .count();

        let trailer_start = content_start + content_frames;
        let trailer_frames = rows[trailer_start..]
            .iter()
            .take_while(|r| white(r))
            .count();

        VideoStructure {
            header_frames,
            locator_frames,
            content_frames,
            trailer_frames,
        }
    }

    fn column(&self, marker: usize) -> impl Iterator<Item = ColorCode> + 'a {
        self.rows.iter().map(move |row| row.codes()[marker])
    }

    fn detect_bw_mark(&self, marker: usize) -> Option<MarkerInfo> {
        let s = self.structure;
        let mut frames = self.column(marker);

        if !frames
            .by_ref()
            .take(s.header_frames)
            .all(|c| c == ColorCode::White)
        {
            return None;
        }

        // the first locator frame tells a frame id bit from a sync mark
        let kind = if s.locator_frames > 0 {
            match frames.next()? {
                ColorCode::White => MarkerKind::SyncMark,
                ColorCode::Black => MarkerKind::FrameId,
                _ => return None,
            }
        } else {
            MarkerKind::SyncMark
        };

        let locator_color = if kind == MarkerKind::SyncMark {
            ColorCode::White
        } else {
            ColorCode::Black
        };
        if !frames
            .by_ref()
            .take(s.locator_frames.saturating_sub(1))
            .all(|c| c == locator_color)
        {
            return None;
        }

        let mut interval = 0usize;
        {
            let mut content = frames.by_ref().take(s.content_frames).enumerate();

            for (i, c) in content.by_ref() {
                match c {
                    ColorCode::White => {
                        if i == 0 {
                            return None;
                        }
                        interval = i;
                        break;
                    }
                    ColorCode::Black => {}
                    _ => return None,
                }
            }

            for (i, c) in content {
                let expected = if i % (interval * 2) < interval {
                    ColorCode::Black
                } else {
                    ColorCode::White
                };
                if c != expected {
                    return None;
                }
            }
        }

        if !frames
            .take(s.trailer_frames)
            .all(|c| c == ColorCode::White)
        {
            return None;
        }

        Some(MarkerInfo {
            kind,
            interval: interval as u32,
        })
    }

    fn detect_rgb6_mark(&self, marker: usize) -> Option<MarkerInfo> {
        let s = self.structure;
        let mut frames = self.column(marker);

        if !frames
            .by_ref()
            .take(s.header_frames + s.locator_frames)
            .all(|c| c == ColorCode::White)
        {
            return None;
        }

        // one black frame may stand in for the expected color, never two in a row
        let mut was_black = false;
        for (i, c) in frames.by_ref().take(s.content_frames).enumerate() {
            if c == ColorCode::Black && !was_black {
                was_black = true;
            } else if c == RGB6_SEQUENCE[i % RGB6_SEQUENCE.len()] {
                was_black = false;
            } else {
                return None;
            }
        }

        if !frames
            .take(s.trailer_frames)
            .all(|c| c == ColorCode::White)
        {
            return None;
        }

        Some(MarkerInfo {
            kind: MarkerKind::Rgb6,
            interval: 1,
        })
    }

    pub fn classify_marker(&self, marker: usize) -> MarkerInfo {
        if marker >= self.num_markers {
            return MarkerInfo::unknown();
        }
        self.detect_bw_mark(marker)
            .or_else(|| self.detect_rgb6_mark(marker))
            .unwrap_or_else(MarkerInfo::unknown)
    }

    pub fn analyze(&self) -> VideoInfo {
        let s = self.structure;
        debug!(
            "Video structure: {} header, {} locator, {} content, {} trailer frames",
            s.header_frames, s.locator_frames, s.content_frames, s.trailer_frames
        );

        let markers: Vec<MarkerInfo> = (0..self.num_markers)
            .map(|i| self.classify_marker(i))
            .collect();

        let unknown = markers
            .iter()
            .filter(|m| m.kind == MarkerKind::Unknown)
            .count();
        info!(
            "🏷️ Classified {} markers ({} unknown)",
            markers.len(),
            unknown
        );

        VideoInfo {
            structure: s,
            markers,
        }
    }
}

pub fn analyze(rows: &[FrameColorRow]) -> Result<VideoInfo> {
    Ok(MarkerSequenceClassifier::new(rows)?.analyze())
}
