//! Capture counters shared between the capture threads and observers.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use regionrec_ipc::SessionStats;

/// Lock-free counters updated by the capture threads.
#[derive(Debug, Default)]
pub struct CaptureStats {
    start_time: RwLock<Option<Instant>>,
    frozen_elapsed: RwLock<Option<Duration>>,
    frames: AtomicU64,
    frame_errors: AtomicU64,
    audio_blocks: AtomicU64,
    audio_errors: AtomicU64,
    target_fps: AtomicU32,
}

impl CaptureStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the counters and start the clock.
    pub fn start(&self, target_fps: u32) {
        self.frames.store(0, Ordering::Relaxed);
        self.frame_errors.store(0, Ordering::Relaxed);
        self.audio_blocks.store(0, Ordering::Relaxed);
        self.audio_errors.store(0, Ordering::Relaxed);
        self.target_fps.store(target_fps, Ordering::Relaxed);
        *self.frozen_elapsed.write() = None;
        *self.start_time.write() = Some(Instant::now());
    }

    /// Freeze elapsed time at its current value.
    pub fn stop(&self) {
        let elapsed = self.start_time.read().map(|s| s.elapsed());
        *self.frozen_elapsed.write() = elapsed;

        let snapshot = self.snapshot();
        debug!(
            frames = snapshot.frames_captured,
            frame_errors = snapshot.frame_errors,
            audio_blocks = snapshot.audio_blocks,
            audio_errors = snapshot.audio_errors,
            fps = snapshot.fps,
            "Capture stopped"
        );
    }

    pub fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_error(&self) {
        self.frame_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audio_block(&self) {
        self.audio_blocks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audio_error(&self) {
        self.audio_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counters.
    pub fn snapshot(&self) -> SessionStats {
        let elapsed = match *self.frozen_elapsed.read() {
            Some(elapsed) => elapsed,
            None => self
                .start_time
                .read()
                .map(|s| s.elapsed())
                .unwrap_or_default(),
        };

        let frames = self.frames.load(Ordering::Relaxed);
        let fps = if elapsed.as_secs_f32() > 0.0 {
            frames as f32 / elapsed.as_secs_f32()
        } else {
            0.0
        };

        SessionStats {
            frames_captured: frames,
            frame_errors: self.frame_errors.load(Ordering::Relaxed),
            audio_blocks: self.audio_blocks.load(Ordering::Relaxed),
            audio_errors: self.audio_errors.load(Ordering::Relaxed),
            fps,
            target_fps: self.target_fps.load(Ordering::Relaxed),
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }
}
