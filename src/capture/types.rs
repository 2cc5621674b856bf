// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for the capture boundary

use std::fmt;
use std::sync::Arc;

/// Pixel format tag for delivered frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameFormat {
    /// Planar YUV 4:2:0: full-resolution luma plane plus two subsampled
    /// chroma planes, each with its own row stride and pixel stride
    Yuv420Planar,
}

/// One plane of a planar frame buffer.
///
/// `row_stride` is the byte distance between rows (may include padding);
/// `pixel_stride` is the byte distance between samples within a row.
#[derive(Debug, Clone)]
pub struct FramePlane {
    pub data: Vec<u8>,
    pub row_stride: usize,
    pub pixel_stride: usize,
}

impl FramePlane {
    /// Tightly packed plane, stride equal to the row width
    pub fn packed(data: Vec<u8>, width: usize) -> Self {
        Self {
            data,
            row_stride: width,
            pixel_stride: 1,
        }
    }
}

/// A single frame handed to the pipeline by the capture stream.
///
/// The frame is exclusively owned by the delivering callback and dropped
/// before the callback returns; the pipeline copies the bytes out if the
/// frame is selected for persistence and never retains the frame itself.
#[derive(Debug, Clone)]
pub struct CaptureFrame {
    pub width: u32,
    pub height: u32,
    pub format: FrameFormat,
    /// Luma plane followed by the two chroma planes (U then V)
    pub planes: [FramePlane; 3],
}

/// Device and capture-session state transitions delivered by the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEvent {
    /// Device opened; the capture session will be configured next
    Opened,
    /// Device went away
    Disconnected,
    /// Unrecoverable device error with a backend-specific code
    Error(i32),
    /// Capture session configured; frames will start flowing
    Configured,
    /// Capture session could not be configured
    ConfigureFailed,
}

/// Sink for frames, invoked by the stream for every delivered frame
pub type FrameSink = Arc<dyn Fn(CaptureFrame) + Send + Sync>;

/// Sink for device state events
pub type EventSink = Arc<dyn Fn(StreamEvent) + Send + Sync>;

/// Handles a stream uses to talk back to the pipeline.
///
/// Both sinks post onto the dedicated background executor, so frame delivery
/// and lifecycle events are never concurrent with each other.
#[derive(Clone)]
pub struct StreamContext {
    pub events: EventSink,
    pub frames: FrameSink,
}

impl fmt::Debug for StreamContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamContext").finish_non_exhaustive()
    }
}

/// Boundary to the platform camera service.
///
/// The device handle, capture session, and frame-acquisition endpoint share
/// one lifecycle behind this trait: `request_open` brings all of them up
/// (asynchronously, completion signalled via `StreamEvent::Opened` and
/// `StreamEvent::Configured`), `close` tears all of them down and must be
/// safe to call more than once.
pub trait CaptureStream: Send {
    /// Clockwise angle the sensor is mounted at relative to the device's
    /// natural orientation
    fn sensor_orientation(&self) -> u32;

    /// Begin opening the device; events and frames flow through `ctx`
    fn request_open(&mut self, ctx: StreamContext) -> Result<(), crate::errors::CameraError>;

    /// Configure the capture session once the device has opened. Completion
    /// is signalled via `Configured` / `ConfigureFailed`, after which frames
    /// start flowing.
    fn configure(&mut self) -> Result<(), crate::errors::CameraError>;

    /// Close the device, the capture session, and the acquisition endpoint
    fn close(&mut self);
}

/// Current rotation of the display the capture UI lives on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayRotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl DisplayRotation {
    pub fn degrees(&self) -> u32 {
        match self {
            DisplayRotation::Deg0 => 0,
            DisplayRotation::Deg90 => 90,
            DisplayRotation::Deg180 => 180,
            DisplayRotation::Deg270 => 270,
        }
    }
}

/// Source of the current display rotation.
///
/// Queried per sampled frame, not cached at session start, so stored
/// orientation tracks device rotation during recording.
pub trait RotationSource: Send + Sync {
    fn display_rotation(&self) -> DisplayRotation;
}

/// Rotation source pinned to a fixed value, for demos and tests
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedRotation(pub DisplayRotation);

impl RotationSource for FixedRotation {
    fn display_rotation(&self) -> DisplayRotation {
        self.0
    }
}

/// Platform permission state checked before the capture flow starts.
///
/// A missing grant is fatal to pipeline startup, mirroring the host
/// application aborting when the user declines.
#[derive(Debug, Clone, Copy)]
pub struct Permissions {
    pub camera: bool,
    pub location: bool,
}

impl Permissions {
    pub fn granted() -> Self {
        Self {
            camera: true,
            location: true,
        }
    }

    pub fn ensure(&self) -> Result<(), crate::errors::CameraError> {
        if !self.camera {
            return Err(crate::errors::CameraError::PermissionDenied("camera"));
        }
        if !self.location {
            return Err(crate::errors::CameraError::PermissionDenied("location"));
        }
        Ok(())
    }
}

/// Pick the smallest stream size at the requested aspect ratio that still
/// covers the target, falling back to the last advertised size.
pub fn choose_optimal_size(choices: &[(u32, u32)], width: u32, height: u32) -> (u32, u32) {
    let big_enough: Vec<(u32, u32)> = choices
        .iter()
        .copied()
        .filter(|(w, h)| *h == w * height / width && *w >= width && *h >= height)
        .collect();

    if let Some(best) = big_enough
        .iter()
        .min_by_key(|(w, h)| u64::from(*w) * u64::from(*h))
    {
        *best
    } else {
        choices.last().copied().unwrap_or((1280, 720))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_rotation_degrees() {
        assert_eq!(DisplayRotation::Deg0.degrees(), 0);
        assert_eq!(DisplayRotation::Deg90.degrees(), 90);
        assert_eq!(DisplayRotation::Deg180.degrees(), 180);
        assert_eq!(DisplayRotation::Deg270.degrees(), 270);
    }

    #[test]
    fn test_permissions() {
        assert!(Permissions::granted().ensure().is_ok());
        let denied = Permissions {
            camera: false,
            location: true,
        };
        assert!(denied.ensure().is_err());
    }

    #[test]
    fn test_choose_optimal_size_prefers_smallest_cover() {
        let choices = [(640, 360), (1280, 720), (1920, 1080), (3840, 2160)];
        assert_eq!(choose_optimal_size(&choices, 1280, 720), (1280, 720));
        assert_eq!(choose_optimal_size(&choices, 1600, 900), (1920, 1080));
    }

    #[test]
    fn test_choose_optimal_size_falls_back_to_last() {
        // No 16:9 candidate covers the target
        let choices = [(640, 480), (800, 600)];
        assert_eq!(choose_optimal_size(&choices, 1280, 720), (800, 600));
    }

    #[test]
    fn test_choose_optimal_size_empty() {
        assert_eq!(choose_optimal_size(&[], 1280, 720), (1280, 720));
    }
}
