// SPDX-License-Identifier: GPL-3.0-only

//! Capture boundary: frame types, the stream trait, the dedicated background
//! executor, and the resource lifecycle state machine.

pub mod executor;
pub mod lifecycle;
pub mod synthetic;
pub mod types;

pub use executor::{BackgroundExecutor, ExecutorHandle};
pub use lifecycle::{CameraController, DeviceState};
pub use types::{
    CaptureFrame, CaptureStream, DisplayRotation, FrameFormat, FramePlane, Permissions,
    RotationSource, StreamContext, StreamEvent,
};
