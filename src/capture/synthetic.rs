// SPDX-License-Identifier: GPL-3.0-only

//! Synthetic capture stream
//!
//! Generates moving-gradient YUV 4:2:0 frames on a ticker thread. Stands in
//! for real hardware in the CLI demo and in end-to-end tests; goes through
//! the same open/configure/close lifecycle as a real stream would.

use crate::capture::types::{
    CaptureFrame, CaptureStream, FrameFormat, FramePlane, StreamContext, StreamEvent,
};
use crate::errors::CameraError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct SyntheticConfig {
    pub width: u32,
    pub height: u32,
    /// Delay between delivered frames
    pub frame_interval: Duration,
    /// Stop delivering after this many frames; None runs until close
    pub frame_limit: Option<u64>,
    /// Reported sensor mounting angle
    pub sensor_orientation: u32,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            width: 64,
            height: 48,
            frame_interval: Duration::from_millis(33),
            frame_limit: None,
            sensor_orientation: 90,
        }
    }
}

/// Capture stream backed by generated frames
pub struct SyntheticStream {
    config: SyntheticConfig,
    ctx: Option<StreamContext>,
    stop: Arc<AtomicBool>,
    ticker: Option<JoinHandle<()>>,
}

impl SyntheticStream {
    pub fn new(config: SyntheticConfig) -> Self {
        Self {
            config,
            ctx: None,
            stop: Arc::new(AtomicBool::new(false)),
            ticker: None,
        }
    }
}

impl CaptureStream for SyntheticStream {
    fn sensor_orientation(&self) -> u32 {
        self.config.sensor_orientation
    }

    fn request_open(&mut self, ctx: StreamContext) -> Result<(), CameraError> {
        info!(
            width = self.config.width,
            height = self.config.height,
            "Opening synthetic stream"
        );
        (ctx.events)(StreamEvent::Opened);
        self.ctx = Some(ctx);
        Ok(())
    }

    fn configure(&mut self) -> Result<(), CameraError> {
        let ctx = self
            .ctx
            .clone()
            .ok_or_else(|| CameraError::OpenFailed("configure before open".into()))?;
        (ctx.events)(StreamEvent::Configured);

        let config = self.config.clone();
        let stop = Arc::clone(&self.stop);
        let ticker = std::thread::Builder::new()
            .name("synthetic-camera".into())
            .spawn(move || {
                let mut index = 0u64;
                loop {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    if let Some(limit) = config.frame_limit {
                        if index >= limit {
                            debug!(frames = index, "Synthetic frame limit reached");
                            break;
                        }
                    }
                    (ctx.frames)(generate_frame(config.width, config.height, index));
                    index += 1;
                    std::thread::sleep(config.frame_interval);
                }
                debug!(frames = index, "Synthetic stream ticker exiting");
            })
            .map_err(|e| CameraError::OpenFailed(format!("ticker spawn: {}", e)))?;

        self.ticker = Some(ticker);
        Ok(())
    }

    fn close(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(ticker) = self.ticker.take() {
            let _ = ticker.join();
        }
        self.ctx = None;
    }
}

/// Build one gradient frame. The luma plane drifts with the frame index so
/// consecutive frames differ.
pub fn generate_frame(width: u32, height: u32, index: u64) -> CaptureFrame {
    let w = width as usize;
    let h = height as usize;
    let cw = w / 2;
    let ch = h / 2;

    let mut y = vec![0u8; w * h];
    for row in 0..h {
        for col in 0..w {
            y[row * w + col] = ((row + col + index as usize * 4) & 0xFF) as u8;
        }
    }
    let u = vec![128u8; cw * ch];
    let v = vec![128u8; cw * ch];

    CaptureFrame {
        width,
        height,
        format: FrameFormat::Yuv420Planar,
        planes: [
            FramePlane::packed(y, w),
            FramePlane::packed(u, cw),
            FramePlane::packed(v, cw),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_frame_geometry() {
        let frame = generate_frame(64, 48, 0);
        assert_eq!(frame.planes[0].data.len(), 64 * 48);
        assert_eq!(frame.planes[1].data.len(), 32 * 24);
        assert_eq!(frame.planes[2].data.len(), 32 * 24);
        assert_eq!(frame.planes[0].row_stride, 64);
        assert_eq!(frame.planes[1].pixel_stride, 1);
    }

    #[test]
    fn test_consecutive_frames_differ() {
        let a = generate_frame(16, 16, 0);
        let b = generate_frame(16, 16, 1);
        assert_ne!(a.planes[0].data, b.planes[0].data);
    }
}
