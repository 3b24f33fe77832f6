use crate::core::error::{AnalyzerError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const BYTES_PER_PIXEL: usize = 4;

/// 4 字节像素的通道排列，在流格式确定时选定一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    #[default]
    Rgbx,
    Bgrx,
    Xrgb,
    Xbgr,
}

impl PixelFormat {
    /// Byte offsets of the R, G and B channels inside one pixel.
    pub const fn channel_offsets(self) -> [usize; 3] {
        match self {
            PixelFormat::Rgbx => [0, 1, 2],
            PixelFormat::Bgrx => [2, 1, 0],
            PixelFormat::Xrgb => [1, 2, 3],
            PixelFormat::Xbgr => [3, 2, 1],
        }
    }
}

/// 解码后的视频帧（4 字节/像素，带行跨度）
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub format: PixelFormat,
    pub timestamp: Duration,
    pub frame_number: u64,
    data: Vec<u8>,
}

impl Frame {
    /// Tightly packed RGBx frame.
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Result<Self> {
        Self::with_layout(
            width,
            height,
            width as usize * BYTES_PER_PIXEL,
            PixelFormat::Rgbx,
            data,
            Duration::from_millis(timestamp_ms),
            frame_number,
        )
    }

    pub fn with_layout(
        width: u32,
        height: u32,
        stride: usize,
        format: PixelFormat,
        data: Vec<u8>,
        timestamp: Duration,
        frame_number: u64,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(AnalyzerError::InvalidFrame(format!(
                "empty frame {}x{}",
                width, height
            )));
        }

        let row_bytes = width as usize * BYTES_PER_PIXEL;
        if stride < row_bytes {
            return Err(AnalyzerError::InvalidFrame(format!(
                "stride {} is shorter than a row of {} bytes",
                stride, row_bytes
            )));
        }

        let required = stride * (height as usize - 1) + row_bytes;
        if data.len() < required {
            return Err(AnalyzerError::InvalidFrame(format!(
                "buffer holds {} bytes, {}x{} with stride {} needs {}",
                data.len(),
                width,
                height,
                stride,
                required
            )));
        }

        Ok(Self {
            width,
            height,
            stride,
            format,
            timestamp,
            frame_number,
            data,
        })
    }

    /// Builds a frame from a decoded still image.
    pub fn from_image(image: image::RgbaImage, timestamp: Duration, frame_number: u64) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::with_layout(
            width,
            height,
            width as usize * BYTES_PER_PIXEL,
            PixelFormat::Rgbx,
            image.into_raw(),
            timestamp,
            frame_number,
        )
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp.as_millis() as u64
    }

    /// Raw bytes of row `y`, without the stride padding.
    ///
    /// # Panics
    /// Panics if `y >= height`.
    pub fn row(&self, y: u32) -> &[u8] {
        debug_assert!(y < self.height, "row {} outside frame of height {}", y, self.height);
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * BYTES_PER_PIXEL]
    }

    /// RGB values of every pixel in row `y`, left to right.
    pub fn row_pixels(&self, y: u32) -> impl Iterator<Item = [u8; 3]> + '_ {
        let [r, g, b] = self.format.channel_offsets();
        self.row(y)
            .chunks_exact(BYTES_PER_PIXEL)
            .map(move |px| [px[r], px[g], px[b]])
    }

    pub fn get_rgb(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let [r, g, b] = self.format.channel_offsets();
        let base = y as usize * self.stride + x as usize * BYTES_PER_PIXEL;
        let px = &self.data[base..base + BYTES_PER_PIXEL];
        Some([px[r], px[g], px[b]])
    }
}

/// 从原生解码层传递的 I420 原始帧数据
#[derive(Debug)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    pub y_plane: Vec<u8>,
    pub u_plane: Vec<u8>,
    pub v_plane: Vec<u8>,
    pub timestamp_ms: u64,
    pub frame_number: u64,
}

impl RawFrame {
    pub fn to_frame(&self) -> Result<Frame> {
        let w = self.width as usize;
        let h = self.height as usize;
        let chroma_w = (w + 1) / 2;
        let chroma_h = (h + 1) / 2;

        if self.y_plane.len() < w * h
            || self.u_plane.len() < chroma_w * chroma_h
            || self.v_plane.len() < chroma_w * chroma_h
        {
            return Err(AnalyzerError::InvalidFrame(format!(
                "I420 planes too small for {}x{}",
                self.width, self.height
            )));
        }

        let mut rgbx = vec![0u8; w * h * BYTES_PER_PIXEL];

        for y in 0..h {
            for x in 0..w {
                let y_idx = y * w + x;
                let uv_idx = (y / 2) * chroma_w + x / 2;

                let y_val = self.y_plane[y_idx] as f32;
                let u_val = self.u_plane[uv_idx] as f32 - 128.0;
                let v_val = self.v_plane[uv_idx] as f32 - 128.0;

                let r = (y_val + 1.402 * v_val).clamp(0.0, 255.0) as u8;
                let g = (y_val - 0.344136 * u_val - 0.714136 * v_val).clamp(0.0, 255.0) as u8;
                let b = (y_val + 1.772 * u_val).clamp(0.0, 255.0) as u8;

                let idx = y_idx * BYTES_PER_PIXEL;
                rgbx[idx] = r;
                rgbx[idx + 1] = g;
                rgbx[idx + 2] = b;
                rgbx[idx + 3] = 255;
            }
        }

        Frame::new(
            self.width,
            self.height,
            rgbx,
            self.timestamp_ms,
            self.frame_number,
        )
    }
}
