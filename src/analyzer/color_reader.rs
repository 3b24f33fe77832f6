use super::pixel_stats::{color_bits, DEFAULT_COLOR_THRESHOLD};
use super::region_finder::Marker;
use crate::core::video::Frame;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Marker color after thresholding each channel; the discriminant is the
/// 3-bit code (bit 0 = red, bit 1 = green, bit 2 = blue).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorCode {
    Black = 0,
    Red = 1,
    Green = 2,
    Yellow = 3,
    Blue = 4,
    Magenta = 5,
    Cyan = 6,
    White = 7,
}

const PALETTE: [ColorCode; 8] = [
    ColorCode::Black,
    ColorCode::Red,
    ColorCode::Green,
    ColorCode::Yellow,
    ColorCode::Blue,
    ColorCode::Magenta,
    ColorCode::Cyan,
    ColorCode::White,
];

const SYMBOLS: [char; 8] = ['k', 'r', 'g', 'y', 'b', 'm', 'c', 'w'];

impl ColorCode {
    pub fn from_bits(bits: u8) -> Self {
        PALETTE[(bits & 7) as usize]
    }

    pub fn from_rgb(rgb: [u8; 3], threshold: u8) -> Self {
        Self::from_bits(color_bits(rgb, threshold))
    }

    pub fn symbol(self) -> char {
        SYMBOLS[self as usize]
    }

    pub fn from_symbol(symbol: char) -> Option<Self> {
        SYMBOLS
            .iter()
            .position(|&s| s == symbol)
            .map(|i| PALETTE[i])
    }
}

impl fmt::Display for ColorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// Color of every marker on one frame, in marker-list order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameColorRow {
    pub frame_number: u64,
    pub timestamp: Duration,
    codes: Vec<ColorCode>,
}

impl FrameColorRow {
    pub fn new(frame_number: u64, timestamp: Duration, codes: Vec<ColorCode>) -> Self {
        Self {
            frame_number,
            timestamp,
            codes,
        }
    }

    /// Parses a row written in symbol form, e.g. `"kwry"`.
    pub fn from_symbols(frame_number: u64, timestamp: Duration, symbols: &str) -> Option<Self> {
        let codes = symbols
            .chars()
            .map(ColorCode::from_symbol)
            .collect::<Option<Vec<_>>>()?;
        Some(Self::new(frame_number, timestamp, codes))
    }

    pub fn codes(&self) -> &[ColorCode] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn get(&self, marker: usize) -> Option<ColorCode> {
        self.codes.get(marker).copied()
    }

    pub fn is_all(&self, code: ColorCode) -> bool {
        self.codes.iter().all(|&c| c == code)
    }
}

impl fmt::Display for FrameColorRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for code in &self.codes {
            write!(f, "{}", code)?;
        }
        Ok(())
    }
}

pub struct MarkerColorReader {
    threshold: u8,
}

impl MarkerColorReader {
    pub fn new() -> Self {
        Self::with_threshold(DEFAULT_COLOR_THRESHOLD)
    }

    pub fn with_threshold(threshold: u8) -> Self {
        Self { threshold }
    }

    /// Samples the center pixel of every marker.
    pub fn read_row(&self, frame: &Frame, markers: &[Marker]) -> FrameColorRow {
        let codes = markers
            .iter()
            .map(|marker| {
                let (x, y) = marker.center();
                frame
                    .get_rgb(x, y)
                    .map(|rgb| ColorCode::from_rgb(rgb, self.threshold))
                    .unwrap_or(ColorCode::Black)
            })
            .collect();

        FrameColorRow::new(frame.frame_number, frame.timestamp, codes)
    }
}

impl Default for MarkerColorReader {
    fn default() -> Self {
        Self::new()
    }
}

/// Average color of the 5x5 box around `(x, y)` as `#rrggbb`, clipped to the frame.
pub fn sample_average_color(frame: &Frame, x: u32, y: u32) -> String {
    let mut sum = [0u32; 3];
    let mut count = 0u32;

    for py in y.saturating_sub(2)..=y.saturating_add(2) {
        for px in x.saturating_sub(2)..=x.saturating_add(2) {
            if let Some(rgb) = frame.get_rgb(px, py) {
                for c in 0..3 {
                    sum[c] += rgb[c] as u32;
                }
                count += 1;
            }
        }
    }

    if count == 0 {
        return "#000000".to_string();
    }
    format!(
        "#{:02x}{:02x}{:02x}",
        sum[0] / count,
        sum[1] / count,
        sum[2] / count
    )
}
