// SPDX-License-Identifier: GPL-3.0-only

//! Geoframe - periodic geotagged frame capture
//!
//! Records periodic still frames from a camera stream while a session is
//! active, tags each stored frame with orientation, capture time, and
//! geolocation metadata, and writes it to a per-session directory.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`capture`]: the hardware boundary - frame types, the stream trait, the
//!   dedicated background executor, and the resource lifecycle state machine
//! - [`media`]: color-space conversion, JPEG encoding, metadata tagging
//! - [`pipeline`]: session state, frame sampling, save jobs, and the
//!   persistence pool, wired together by [`pipeline::RecorderPipeline`]
//! - [`location`]: the location service boundary
//! - [`storage`]: session directory and file naming
//! - [`config`]: pipeline configuration

pub mod capture;
pub mod config;
pub mod constants;
pub mod errors;
pub mod location;
pub mod media;
pub mod pipeline;
pub mod storage;

// Re-export commonly used types
pub use capture::synthetic::{SyntheticConfig, SyntheticStream};
pub use capture::{CaptureFrame, CaptureStream, DisplayRotation, Permissions, RotationSource};
pub use config::Config;
pub use location::{LocationFix, LocationProvider};
pub use pipeline::{PipelineDeps, RecorderPipeline};
