//! Per-pixel statistics gathered over the first pass.
//!
//! Marker pixels are recognised by three properties that hold over the whole
//! recording:
//! - every sample has at least one channel at an extreme (saturated colors);
//! - all pixels of one marker share the same sequence of 3-bit color codes;
//! - each channel of a marker pixel changes at least once.

use crate::core::error::{AnalyzerError, Result};
use crate::core::video::Frame;
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

pub const DEFAULT_COLOR_THRESHOLD: u8 = 200;

/// Starting value of every pixel signature.
pub const INITIAL_SIGNATURE: u32 = 0x0101_0101;

/// Pixels this close to the frame edge are ignored by the change probe.
const PROBE_BORDER: u32 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccumulatorConfig {
    /// 通道 "亮" 的阈值 (0-255)
    pub color_threshold: u8,
    /// 所有通道都高于此值且低于 `saturation_high` 时视为非饱和
    pub saturation_low: u8,
    pub saturation_high: u8,
    /// 颜色代码不变时允许的 RGB 总变化量，None 表示不检查
    pub slow_change_limit: Option<u32>,
}

impl Default for AccumulatorConfig {
    fn default() -> Self {
        Self {
            color_threshold: DEFAULT_COLOR_THRESHOLD,
            saturation_low: 5,
            saturation_high: 250,
            slow_change_limit: Some(32),
        }
    }
}

impl AccumulatorConfig {
    /// Camera re-recordings never reach full saturation and drift slowly.
    pub fn for_camera_capture() -> Self {
        Self {
            color_threshold: DEFAULT_COLOR_THRESHOLD,
            saturation_low: 20,
            saturation_high: 235,
            slow_change_limit: None,
        }
    }
}

/// 3-bit code of one sample: bit 0 = red, bit 1 = green, bit 2 = blue.
pub fn color_bits(rgb: [u8; 3], threshold: u8) -> u8 {
    let mut code = 0;
    if rgb[0] > threshold {
        code |= 1;
    }
    if rgb[1] > threshold {
        code |= 2;
    }
    if rgb[2] > threshold {
        code |= 4;
    }
    code
}

fn rgb_delta(a: [u8; 3], b: [u8; 3]) -> u32 {
    a.iter()
        .zip(b.iter())
        .map(|(&x, &y)| (x as i32 - y as i32).unsigned_abs())
        .sum()
}

fn fold_signature(signature: u32, code: u8) -> u32 {
    let mut hasher = crc32fast::Hasher::new_with_initial(signature);
    hasher.update(&[code]);
    hasher.finalize()
}

#[derive(Debug, Clone, Copy)]
struct PixelState {
    min: [u8; 3],
    max: [u8; 3],
    stable: bool,
    achromatic: bool,
    signature: u32,
    /// Sample and code at the last change of color code, black before the first frame.
    reference: ([u8; 3], u8),
    previous: [u8; 3],
    change_sum: u64,
}

impl PixelState {
    fn new() -> Self {
        Self {
            min: [u8::MAX; 3],
            max: [0; 3],
            stable: true,
            achromatic: true,
            signature: INITIAL_SIGNATURE,
            reference: ([0; 3], 0),
            previous: [0; 3],
            change_sum: 0,
        }
    }

    fn observe(&mut self, rgb: [u8; 3], config: &AccumulatorConfig) {
        self.change_sum += rgb_delta(self.previous, rgb) as u64;
        self.previous = rgb;

        if !self.stable {
            return;
        }

        for c in 0..3 {
            self.min[c] = self.min[c].min(rgb[c]);
            self.max[c] = self.max[c].max(rgb[c]);
        }

        let lowest = rgb[0].min(rgb[1]).min(rgb[2]);
        let highest = rgb[0].max(rgb[1]).max(rgb[2]);
        if lowest > config.saturation_low && highest < config.saturation_high {
            self.stable = false;
        }

        let code = color_bits(rgb, config.color_threshold);
        self.signature = fold_signature(self.signature, code);
        if code != 0 && code != 7 {
            self.achromatic = false;
        }

        if let Some(limit) = config.slow_change_limit {
            let (reference, reference_code) = self.reference;
            if reference_code != code {
                self.reference = (rgb, code);
            } else if rgb_delta(reference, rgb) > limit {
                self.stable = false;
            }
        }
    }

    fn filtered_signature(&self) -> u32 {
        if !self.stable || (0..3).any(|c| self.min[c] == self.max[c]) {
            return 0;
        }
        // 0 marks background, so an accidental zero checksum is remapped
        if self.signature == 0 {
            1
        } else {
            self.signature
        }
    }
}

/// Finalized per-pixel signatures; 0 marks a pixel that cannot be part of a marker.
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureMask {
    width: u32,
    height: u32,
    signatures: Vec<u32>,
    chromatic: Vec<bool>,
}

impl SignatureMask {
    pub fn new(width: u32, height: u32, signatures: Vec<u32>, chromatic: Vec<bool>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if signatures.len() != expected || chromatic.len() != expected {
            return Err(AnalyzerError::InvalidFrame(format!(
                "mask of {}x{} needs {} entries, got {} signatures and {} flags",
                width,
                height,
                expected,
                signatures.len(),
                chromatic.len()
            )));
        }
        Ok(Self {
            width,
            height,
            signatures,
            chromatic,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn signatures(&self) -> &[u32] {
        &self.signatures
    }

    pub fn chromatic(&self) -> &[bool] {
        &self.chromatic
    }

    pub fn signature(&self, x: u32, y: u32) -> u32 {
        self.signatures[y as usize * self.width as usize + x as usize]
    }

    pub fn candidate_count(&self) -> usize {
        self.signatures.iter().filter(|&&s| s != 0).count()
    }
}

pub struct PixelStatAccumulator {
    width: u32,
    height: u32,
    config: AccumulatorConfig,
    pixels: Vec<PixelState>,
    frames_seen: u64,
}

impl PixelStatAccumulator {
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_config(width, height, AccumulatorConfig::default())
    }

    pub fn with_config(width: u32, height: u32, config: AccumulatorConfig) -> Self {
        Self {
            width,
            height,
            config,
            pixels: vec![PixelState::new(); width as usize * height as usize],
            frames_seen: 0,
        }
    }

    /// Folds one frame into the statistics. Frames must arrive in
    /// presentation order; the signatures are order-sensitive.
    pub fn observe(&mut self, frame: &Frame) -> Result<()> {
        if frame.width != self.width || frame.height != self.height {
            return Err(AnalyzerError::FrameSizeMismatch {
                expected_width: self.width,
                expected_height: self.height,
                width: frame.width,
                height: frame.height,
            });
        }

        let config = &self.config;
        // 每个像素只由一个线程更新，结果与串行一致
        self.pixels
            .par_chunks_mut(self.width as usize)
            .enumerate()
            .for_each(|(y, row_state)| {
                for (state, rgb) in row_state.iter_mut().zip(frame.row_pixels(y as u32)) {
                    state.observe(rgb, config);
                }
            });

        self.frames_seen += 1;
        if self.frames_seen % 100 == 0 {
            debug!(
                "Accumulated {} frames, {} stable pixels left",
                self.frames_seen,
                self.stable_count()
            );
        }
        Ok(())
    }

    pub fn finalize(&self) -> SignatureMask {
        SignatureMask {
            width: self.width,
            height: self.height,
            signatures: self.pixels.iter().map(PixelState::filtered_signature).collect(),
            chromatic: self.pixels.iter().map(|p| !p.achromatic).collect(),
        }
    }

    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    pub fn is_stable(&self, x: u32, y: u32) -> bool {
        self.pixels[self.index(x, y)].stable
    }

    pub fn is_achromatic(&self, x: u32, y: u32) -> bool {
        self.pixels[self.index(x, y)].achromatic
    }

    pub fn raw_signature(&self, x: u32, y: u32) -> u32 {
        self.pixels[self.index(x, y)].signature
    }

    pub fn stable_count(&self) -> usize {
        self.pixels.iter().filter(|p| p.stable).count()
    }

    /// Pixel with the largest accumulated frame-to-frame change, ignoring a
    /// 5 px border. Ties go to the later pixel in scan order.
    pub fn most_changing_pixel(&self) -> Option<(u32, u32)> {
        if self.width <= 2 * PROBE_BORDER || self.height <= 2 * PROBE_BORDER {
            return None;
        }

        let mut best = None;
        let mut largest = 0u64;
        for y in PROBE_BORDER..self.height - PROBE_BORDER {
            for x in PROBE_BORDER..self.width - PROBE_BORDER {
                let sum = self.pixels[self.index(x, y)].change_sum;
                if sum >= largest {
                    largest = sum;
                    best = Some((x, y));
                }
            }
        }
        best
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }
}
