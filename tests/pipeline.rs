use avsync_lib::analyzer::{MarkerAnalyzer, MarkerKind};
use avsync_lib::api::models::AnalysisReport;
use avsync_lib::api::video::VideoAnalyzer;
use avsync_lib::core::audio::MemoryAudioSource;
use avsync_lib::core::video::{Frame, MemoryVideoSource, VideoSource};
use std::f64::consts::PI;

const WIDTH: u32 = 64;
const HEIGHT: u32 = 48;
const SAMPLE_RATE: u32 = 44100;
const HEADER: usize = 3;
const LOCATOR: usize = 2;
const CONTENT: usize = 24;
const TRAILER: usize = 3;
/// Content offsets where the RGB6 marker turns black.
const LIPSYNC_AT: [usize; 2] = [5, 17];

const WHITE: [u8; 3] = [255, 255, 255];
const BLACK: [u8; 3] = [0, 0, 0];

fn rgb6(i: usize) -> [u8; 3] {
    match i % 6 {
        0 => [255, 0, 0],
        1 => [255, 255, 0],
        2 => [0, 255, 0],
        3 => [0, 255, 255],
        4 => [0, 0, 255],
        _ => [255, 0, 255],
    }
}

/// Colors of the sync mark, the frame-id bit and the RGB6 marker on frame `n`.
fn marker_colors(n: usize) -> [[u8; 3]; 3] {
    if n < HEADER || n >= HEADER + LOCATOR + CONTENT {
        return [WHITE; 3];
    }
    if n < HEADER + LOCATOR {
        return [WHITE, BLACK, WHITE];
    }
    let i = n - HEADER - LOCATOR;
    let sync = if i % 2 < 1 { BLACK } else { WHITE };
    let frame_id = if i % 4 < 2 { BLACK } else { WHITE };
    let color = if LIPSYNC_AT.contains(&i) { BLACK } else { rgb6(i) };
    [sync, frame_id, color]
}

fn create_test_frame(n: usize) -> Frame {
    let colors = marker_colors(n);
    let mut data = Vec::with_capacity((WIDTH * HEIGHT * 4) as usize);
    for y in 0..HEIGHT {
        for x in 0..WIDTH {
            let rgb = match (x, y) {
                (4..=23, 4..=23) => colors[0],
                (28..=47, 4..=23) => colors[1],
                (4..=23, 26..=45) => colors[2],
                _ => [128, 128, 128],
            };
            data.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]);
        }
    }
    Frame::new(WIDTH, HEIGHT, data, n as u64 * 40, n as u64).unwrap()
}

fn recording() -> MemoryVideoSource {
    let total = HEADER + LOCATOR + CONTENT + TRAILER;
    MemoryVideoSource::new((0..total).map(create_test_frame).collect()).with_framerate(25.0)
}

/// Beeps start 20 ms after each video lipsync frame.
fn soundtrack() -> MemoryAudioSource {
    let total = (HEADER + LOCATOR + CONTENT + TRAILER) * SAMPLE_RATE as usize / 25;
    let mut samples = vec![0i16; total];
    for &i in &LIPSYNC_AT {
        let frame = HEADER + LOCATOR + i;
        let start = (frame * 40 + 20) * SAMPLE_RATE as usize / 1000;
        for p in 0..4410 {
            let t = p as f64 / SAMPLE_RATE as f64;
            let v = 16384.0 * ((2.0 * PI * 547.0 * t).sin() + (2.0 * PI * 1823.0 * t).sin());
            samples[start + p] = v.clamp(-32767.0, 32767.0) as i16;
        }
    }
    MemoryAudioSource::from_samples(SAMPLE_RATE, &samples, 1024).unwrap()
}

fn analyze_once() -> AnalysisReport {
    let mut video = recording();
    let mut audio = soundtrack();
    VideoAnalyzer::create()
        .analyze_sources(&mut video, Some(&mut audio))
        .unwrap()
}

#[test]
fn test_full_recording() {
    avsync_lib::init_logging();
    let report = analyze_once();

    assert_eq!(report.markers_found, 3);
    assert_eq!(report.resolution, [WIDTH, HEIGHT]);
    assert_eq!(report.framerate, Some(25.0));
    assert_eq!(report.sample_rate, Some(SAMPLE_RATE));

    let s = report.video_structure;
    assert_eq!(
        (s.header_frames, s.locator_frames, s.content_frames, s.trailer_frames),
        (HEADER, LOCATOR, CONTENT, TRAILER)
    );

    let kinds: Vec<(MarkerKind, u32)> = report.markers.iter().map(|m| (m.kind, m.interval)).collect();
    assert_eq!(
        kinds,
        vec![
            (MarkerKind::SyncMark, 1),
            (MarkerKind::FrameId, 2),
            (MarkerKind::Rgb6, 1),
        ]
    );
    assert!(report.markers[2].chromatic);
    assert!(!report.markers[0].chromatic);

    assert_eq!(report.lipsync.audio_markers, 2);
    assert_eq!(report.lipsync.video_markers, 2);
    assert_eq!(report.lipsync.delays_ms.len(), 2);
    for delay in &report.lipsync.delays_ms {
        assert!((delay - 20.0).abs() < 1.0, "delay {}", delay);
    }
    assert!(report.warnings.is_empty(), "{:?}", report.warnings);
}

#[test]
fn test_rerun_is_identical() {
    let first = analyze_once();
    let second = analyze_once();
    assert_eq!(first, second);

    // the same analyzer instance is reusable across runs
    let analyzer = MarkerAnalyzer::new();
    let mut video = recording();
    let a = analyzer.run(&mut video, None).unwrap();
    video.rewind().unwrap();
    let b = analyzer.run(&mut video, None).unwrap();
    assert_eq!(a.rows, b.rows);
    assert_eq!(a.markers, b.markers);
    assert_eq!(a.video_info, b.video_info);
}
