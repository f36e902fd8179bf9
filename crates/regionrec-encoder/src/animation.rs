//! Animated GIF assembly from in-memory frames.

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;

use gif::{Encoder, Frame, Repeat};
use image::{imageops, RgbaImage};
use tracing::{debug, instrument, warn};

use regionrec_capture::CapturedFrame;

use crate::error::EncoderError;
use crate::{EncoderResult, VideoSummary};

/// NeuQuant sampling speed; 1 is best quality, 30 is fastest.
pub const DEFAULT_GIF_SPEED: i32 = 10;

const BYTES_PER_PIXEL: usize = 4;

/// Shortest frame delay, in centiseconds, that viewers honour. Browsers
/// stretch anything shorter to 10 cs.
const MIN_FRAME_DELAY: u16 = 2;

/// Highest frame rate a GIF plays back in real time.
const MAX_REALTIME_GIF_FPS: u32 = 100 / MIN_FRAME_DELAY as u32;

/// Pixel rectangle inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rect {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Holds every captured frame until the recording stops.
///
/// Frames after the first are written as the sub-rectangle that changed
/// since the previous frame; an unchanged frame becomes a 1x1 sub-frame so
/// frame count and timing are preserved.
#[derive(Debug)]
pub struct GifAssembler {
    fps: u32,
    speed: i32,
    size: Option<(u32, u32)>,
    frames: Vec<CapturedFrame>,
}

impl GifAssembler {
    pub fn new(fps: u32) -> Self {
        Self {
            fps,
            speed: DEFAULT_GIF_SPEED,
            size: None,
            frames: Vec::new(),
        }
    }

    /// Set the quantizer speed, clamped to 1..=30.
    pub fn with_speed(mut self, speed: i32) -> Self {
        self.speed = speed.clamp(1, 30);
        self
    }

    /// Buffer a frame. The first frame fixes the geometry.
    pub fn push(&mut self, frame: CapturedFrame) -> EncoderResult<()> {
        if !frame.is_valid() {
            return Err(EncoderError::InvalidInput(format!(
                "frame {} has {} bytes for {}x{}",
                frame.sequence,
                frame.data.len(),
                frame.width,
                frame.height
            )));
        }
        match self.size {
            None => {
                if frame.width > u16::MAX as u32 || frame.height > u16::MAX as u32 {
                    return Err(EncoderError::InvalidInput(format!(
                        "{}x{} exceeds the GIF size limit",
                        frame.width, frame.height
                    )));
                }
                self.size = Some((frame.width, frame.height));
            }
            Some((w, h)) if (w, h) != (frame.width, frame.height) => {
                return Err(EncoderError::InvalidInput(format!(
                    "frame is {}x{}, animation is {w}x{h}",
                    frame.width, frame.height
                )));
            }
            Some(_) => {}
        }
        self.frames.push(frame);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Encode all buffered frames to `path`. A partial file is removed on failure.
    #[instrument(name = "gif_encode", skip(self, path), fields(frames = self.frames.len()))]
    pub fn encode(self, path: &Path) -> EncoderResult<VideoSummary> {
        let result = self.write_file(path);
        if result.is_err() && path.exists() {
            if let Err(e) = fs::remove_file(path) {
                warn!(error = %e, "Failed to remove partial GIF");
            }
        }
        result
    }

    fn write_file(&self, path: &Path) -> EncoderResult<VideoSummary> {
        let (width, height) = self.size.ok_or(EncoderError::NoFrames)?;
        if self.fps == 0 {
            return Err(EncoderError::InvalidInput("fps must be positive".to_string()));
        }
        if self.fps > MAX_REALTIME_GIF_FPS {
            warn!(
                fps = self.fps,
                max = MAX_REALTIME_GIF_FPS,
                "GIF frame delays clamped, playback will run slower than the capture"
            );
        }

        let writer = BufWriter::new(File::create(path)?);
        let mut encoder = Encoder::new(writer, width as u16, height as u16, &[])?;
        encoder.set_repeat(Repeat::Infinite)?;

        let mut previous: Option<&CapturedFrame> = None;
        let mut partial_frames = 0u64;
        for (index, frame) in self.frames.iter().enumerate() {
            let rect = match previous {
                None => full_rect(width, height),
                Some(prev) => {
                    partial_frames += 1;
                    changed_rect(&prev.data, &frame.data, width, height).unwrap_or(Rect {
                        x: 0,
                        y: 0,
                        width: 1,
                        height: 1,
                    })
                }
            };

            let mut pixels = crop(frame, rect)?;
            let mut gif_frame = Frame::from_rgba_speed(
                rect.width as u16,
                rect.height as u16,
                &mut pixels,
                self.speed,
            );
            gif_frame.left = rect.x as u16;
            gif_frame.top = rect.y as u16;
            gif_frame.delay = frame_delay(index as u64, self.fps);
            encoder.write_frame(&gif_frame)?;

            previous = Some(frame);
        }

        debug!(
            frames = self.frames.len(),
            partial_frames,
            path = %path.display(),
            "GIF written"
        );

        Ok(VideoSummary {
            path: path.to_path_buf(),
            frames: self.frames.len() as u64,
            fps: self.fps,
        })
    }
}

fn full_rect(width: u32, height: u32) -> Rect {
    Rect {
        x: 0,
        y: 0,
        width,
        height,
    }
}

/// Bounding box of the pixels that differ between two equally sized RGBA buffers.
fn changed_rect(prev: &[u8], curr: &[u8], width: u32, height: u32) -> Option<Rect> {
    let row_bytes = width as usize * BYTES_PER_PIXEL;
    let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
    let (mut max_x, mut max_y) = (0u32, 0u32);

    for y in 0..height {
        let start = y as usize * row_bytes;
        let prev_row = &prev[start..start + row_bytes];
        let curr_row = &curr[start..start + row_bytes];
        if prev_row == curr_row {
            continue;
        }
        for (x, (a, b)) in prev_row
            .chunks_exact(BYTES_PER_PIXEL)
            .zip(curr_row.chunks_exact(BYTES_PER_PIXEL))
            .enumerate()
        {
            if a != b {
                let x = x as u32;
                min_x = min_x.min(x);
                max_x = max_x.max(x);
                min_y = min_y.min(y);
                max_y = max_y.max(y);
            }
        }
    }

    if min_x == u32::MAX {
        return None;
    }
    Some(Rect {
        x: min_x,
        y: min_y,
        width: max_x - min_x + 1,
        height: max_y - min_y + 1,
    })
}

fn crop(frame: &CapturedFrame, rect: Rect) -> EncoderResult<Vec<u8>> {
    let image = RgbaImage::from_raw(frame.width, frame.height, frame.data.to_vec())
        .ok_or_else(|| EncoderError::InvalidInput(format!("frame {} is truncated", frame.sequence)))?;
    if rect == full_rect(frame.width, frame.height) {
        return Ok(image.into_raw());
    }
    Ok(imageops::crop_imm(&image, rect.x, rect.y, rect.width, rect.height)
        .to_image()
        .into_raw())
}

/// Delay of frame `index` in centiseconds, distributing rounding so the
/// total stays at `frames / fps` seconds.
fn frame_delay(index: u64, fps: u32) -> u16 {
    let at = |i: u64| ((i * 100) as f64 / fps as f64).round() as u64;
    (at(index + 1) - at(index)).clamp(MIN_FRAME_DELAY as u64, u16::MAX as u64) as u16
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use regionrec_capture::CaptureTimestamp;
    use std::time::Instant;

    fn solid(width: u32, height: u32, rgba: [u8; 4], sequence: u64) -> CapturedFrame {
        let data: Vec<u8> = rgba
            .iter()
            .copied()
            .cycle()
            .take((width * height * 4) as usize)
            .collect();
        CapturedFrame::new(
            Bytes::from(data),
            width,
            height,
            CaptureTimestamp::now(Instant::now()),
            sequence,
        )
    }

    fn paint(frame: &CapturedFrame, x: u32, y: u32, rgba: [u8; 4]) -> CapturedFrame {
        let mut data = frame.data.to_vec();
        let offset = ((y * frame.width + x) * 4) as usize;
        data[offset..offset + 4].copy_from_slice(&rgba);
        CapturedFrame::new(
            Bytes::from(data),
            frame.width,
            frame.height,
            frame.timestamp,
            frame.sequence + 1,
        )
    }

    fn decoded_frames(path: &Path) -> Vec<(u16, u16, u16, u16)> {
        let mut options = gif::DecodeOptions::new();
        options.set_color_output(gif::ColorOutput::RGBA);
        let mut decoder = options.read_info(File::open(path).unwrap()).unwrap();
        let mut frames = Vec::new();
        while let Some(frame) = decoder.read_next_frame().unwrap() {
            frames.push((frame.left, frame.top, frame.width, frame.height));
        }
        frames
    }

    #[test]
    fn test_frame_count_and_subrectangles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.gif");

        let first = solid(16, 12, [10, 20, 30, 255], 0);
        let same = solid(16, 12, [10, 20, 30, 255], 1);
        let changed = paint(&same, 5, 7, [200, 0, 0, 255]);

        let mut gif = GifAssembler::new(15);
        gif.push(first).unwrap();
        gif.push(same).unwrap();
        gif.push(changed).unwrap();
        assert_eq!(gif.len(), 3);

        let summary = gif.encode(&path).unwrap();
        assert_eq!(summary.frames, 3);

        let frames = decoded_frames(&path);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0], (0, 0, 16, 12));
        assert_eq!(frames[1], (0, 0, 1, 1));
        assert_eq!(frames[2], (5, 7, 1, 1));
    }

    #[test]
    fn test_empty_assembler_fails_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.gif");
        let err = GifAssembler::new(30).encode(&path).unwrap_err();
        assert!(matches!(err, EncoderError::NoFrames));
        assert!(!path.exists());
    }

    #[test]
    fn test_mismatched_frame_rejected() {
        let mut gif = GifAssembler::new(30);
        gif.push(solid(8, 8, [0, 0, 0, 255], 0)).unwrap();
        assert!(gif.push(solid(9, 8, [0, 0, 0, 255], 1)).is_err());
        assert_eq!(gif.len(), 1);
    }

    #[test]
    fn test_changed_rect_bounds() {
        let a = solid(10, 10, [0, 0, 0, 255], 0);
        let b = paint(&paint(&a, 2, 3, [1, 1, 1, 255]), 6, 8, [1, 1, 1, 255]);
        let rect = changed_rect(&a.data, &b.data, 10, 10).unwrap();
        assert_eq!(
            rect,
            Rect {
                x: 2,
                y: 3,
                width: 5,
                height: 6
            }
        );
        assert!(changed_rect(&a.data, &a.data, 10, 10).is_none());
    }

    #[test]
    fn test_frame_delay_keeps_total_duration() {
        let total: u64 = (0..30).map(|i| frame_delay(i, 30) as u64).sum();
        assert_eq!(total, 100);
        let total: u64 = (0..50).map(|i| frame_delay(i, 50) as u64).sum();
        assert_eq!(total, 100);
        let total: u64 = (0..24).map(|i| frame_delay(i, 24) as u64).sum();
        assert_eq!(total, 100);
        assert_eq!(frame_delay(0, 10), 10);
    }

    #[test]
    fn test_frame_delay_never_below_viewer_minimum() {
        for fps in [60, 120, 240] {
            assert!((0..fps as u64).all(|i| frame_delay(i, fps) >= MIN_FRAME_DELAY));
        }
        assert_eq!(MAX_REALTIME_GIF_FPS, 50);
    }
}
