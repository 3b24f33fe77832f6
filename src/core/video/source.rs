//! 视频帧来源 - 解码层的抽象

use super::frame::{Frame, PixelFormat, RawFrame, BYTES_PER_PIXEL};
use crate::core::error::{AnalyzerError, Result};
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::Duration;

const IMAGE_EXTENSIONS: [&str; 4] = ["png", "bmp", "jpg", "jpeg"];

/// Stream layout, known before the first frame is processed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoHeader {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub format: PixelFormat,
    pub framerate: Option<f64>,
}

/// Pull source of decoded frames in presentation order.
///
/// The analyzer needs two full passes, so sources must be able to rewind.
pub trait VideoSource {
    fn header(&self) -> VideoHeader;

    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn rewind(&mut self) -> Result<()>;
}

/// Replayable in-memory frame list.
pub struct MemoryVideoSource {
    frames: Vec<Frame>,
    position: usize,
    framerate: Option<f64>,
}

impl MemoryVideoSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            position: 0,
            framerate: None,
        }
    }

    pub fn with_framerate(mut self, framerate: f64) -> Self {
        self.framerate = Some(framerate);
        self
    }

    pub fn from_raw_frames(raw_frames: &[RawFrame]) -> Result<Self> {
        let frames = raw_frames
            .iter()
            .map(RawFrame::to_frame)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(frames))
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl VideoSource for MemoryVideoSource {
    fn header(&self) -> VideoHeader {
        match self.frames.first() {
            Some(frame) => VideoHeader {
                width: frame.width,
                height: frame.height,
                stride: frame.stride,
                format: frame.format,
                framerate: self.framerate,
            },
            None => VideoHeader {
                width: 0,
                height: 0,
                stride: 0,
                format: PixelFormat::default(),
                framerate: self.framerate,
            },
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let frame = self.frames.get(self.position).cloned();
        if frame.is_some() {
            self.position += 1;
        }
        Ok(frame)
    }

    fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }
}

/// 按文件名排序的图片序列（每个文件一帧）
pub struct ImageSequenceSource {
    paths: Vec<PathBuf>,
    position: usize,
    framerate: f64,
    width: u32,
    height: u32,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>, framerate: f64) -> Result<Self> {
        let dir = dir.as_ref();
        if !framerate.is_finite() || framerate <= 0.0 {
            return Err(AnalyzerError::InvalidConfig(format!(
                "framerate must be positive, got {}",
                framerate
            )));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let is_image = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_image {
                paths.push(path);
            }
        }
        paths.sort();

        let first = paths.first().ok_or(AnalyzerError::NoVideo)?;
        let (width, height) = image::image_dimensions(first)?;

        info!(
            "🎞️ Image sequence {:?}: {} frames, {}x{} @ {:.2} fps",
            dir,
            paths.len(),
            width,
            height,
            framerate
        );

        Ok(Self {
            paths,
            position: 0,
            framerate,
            width,
            height,
        })
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl VideoSource for ImageSequenceSource {
    fn header(&self) -> VideoHeader {
        VideoHeader {
            width: self.width,
            height: self.height,
            stride: self.width as usize * BYTES_PER_PIXEL,
            format: PixelFormat::Rgbx,
            framerate: Some(self.framerate),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.position) else {
            return Ok(None);
        };

        debug!("Decoding frame {} from {:?}", self.position, path);
        let image = image::open(path)?.to_rgba8();
        let timestamp = Duration::from_secs_f64(self.position as f64 / self.framerate);
        let frame = Frame::from_image(image, timestamp, self.position as u64)?;
        self.position += 1;

        Ok(Some(frame))
    }

    fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_frame(width: u32, height: u32, fill: u8, frame_number: u64) -> Frame {
        let data = vec![fill; (width * height * 4) as usize];
        Frame::new(width, height, data, frame_number * 40, frame_number).unwrap()
    }

    #[test]
    fn test_memory_source_replays_after_rewind() {
        let mut source = MemoryVideoSource::new(vec![
            create_test_frame(8, 8, 0, 0),
            create_test_frame(8, 8, 255, 1),
        ]);

        assert_eq!(source.header().width, 8);
        assert_eq!(source.next_frame().unwrap().unwrap().frame_number, 0);
        assert_eq!(source.next_frame().unwrap().unwrap().frame_number, 1);
        assert!(source.next_frame().unwrap().is_none());

        source.rewind().unwrap();
        assert_eq!(source.next_frame().unwrap().unwrap().frame_number, 0);
    }

    #[test]
    fn test_image_sequence_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for (name, value) in [("frame_002.png", 200u8), ("frame_001.png", 100u8)] {
            let img = image::RgbaImage::from_pixel(4, 3, image::Rgba([value, 0, 0, 255]));
            img.save(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequenceSource::open(dir.path(), 25.0).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.header().width, 4);
        assert_eq!(source.header().height, 3);

        let first = source.next_frame().unwrap().unwrap();
        assert_eq!(first.get_rgb(0, 0), Some([100, 0, 0]));
        let second = source.next_frame().unwrap().unwrap();
        assert_eq!(second.get_rgb(0, 0), Some([200, 0, 0]));
        assert_eq!(second.timestamp_ms(), 40);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_memory_source_from_i420() {
        let raw = |n: u64, luma: u8| RawFrame {
            width: 4,
            height: 2,
            y_plane: vec![luma; 8],
            u_plane: vec![128; 2],
            v_plane: vec![128; 2],
            timestamp_ms: n * 40,
            frame_number: n,
        };
        let mut source = MemoryVideoSource::from_raw_frames(&[raw(0, 16), raw(1, 235)]).unwrap();

        assert_eq!(source.len(), 2);
        assert_eq!(source.header().stride, 16);
        assert_eq!(source.next_frame().unwrap().unwrap().get_rgb(3, 1), Some([16, 16, 16]));
        assert_eq!(source.next_frame().unwrap().unwrap().get_rgb(0, 0), Some([235, 235, 235]));

        let short = RawFrame {
            y_plane: vec![0; 3],
            ..raw(2, 0)
        };
        assert!(MemoryVideoSource::from_raw_frames(&[short]).is_err());
    }

    #[test]
    fn test_image_sequence_empty_dir() {
        let dir = tempfile::tempdir().unwrap();
        let result = ImageSequenceSource::open(dir.path(), 25.0);
        assert!(matches!(result, Err(AnalyzerError::NoVideo)));
    }

    #[test]
    fn test_image_sequence_rejects_bad_framerate() {
        let dir = tempfile::tempdir().unwrap();
        for framerate in [f64::NAN, 0.0, -25.0, f64::INFINITY] {
            let result = ImageSequenceSource::open(dir.path(), framerate);
            assert!(
                matches!(result, Err(AnalyzerError::InvalidConfig(_))),
                "framerate {} accepted",
                framerate
            );
        }
    }
}
