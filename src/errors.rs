// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture pipeline

use std::fmt;

/// Result type alias using PipelineError
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Top-level error type
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Camera resource errors
    Camera(CameraError),
    /// Recording session errors
    Session(SessionError),
    /// Frame save errors
    Save(SaveError),
    /// Configuration errors
    Config(String),
    /// Generic error with message
    Other(String),
}

/// Camera resource lifecycle errors
#[derive(Debug, Clone)]
pub enum CameraError {
    /// Required permission was not granted; fatal to the capture flow
    PermissionDenied(&'static str),
    /// A capture stream is already open
    AlreadyOpen,
    /// Hardware open or configure failed
    OpenFailed(String),
    /// Device went away during operation
    Disconnected,
    /// Device reported an unrecoverable error code
    DeviceError(i32),
}

/// Recording session errors
#[derive(Debug, Clone)]
pub enum SessionError {
    /// A recording session is already active
    AlreadyRecording,
    /// Session directory could not be created
    DirectoryCreate(String),
}

/// Per-frame conversion errors; contained at the frame boundary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// Plane byte ranges are inconsistent with the declared geometry
    PlaneGeometry {
        plane: &'static str,
        needed: usize,
        available: usize,
    },
}

/// Per-job save errors; contained at the job boundary
#[derive(Debug, Clone)]
pub enum SaveError {
    /// The codec produced no output for this frame
    NoImage,
    /// Encoding failed
    Encode(String),
    /// Filesystem write failed
    Io(String),
    /// Metadata block could not be written
    Tag(String),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Camera(e) => write!(f, "Camera error: {}", e),
            PipelineError::Session(e) => write!(f, "Session error: {}", e),
            PipelineError::Save(e) => write!(f, "Save error: {}", e),
            PipelineError::Config(msg) => write!(f, "Configuration error: {}", msg),
            PipelineError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::PermissionDenied(which) => {
                write!(f, "{} permission not granted", which)
            }
            CameraError::AlreadyOpen => write!(f, "Capture stream already open"),
            CameraError::OpenFailed(msg) => write!(f, "Open failed: {}", msg),
            CameraError::Disconnected => write!(f, "Camera disconnected"),
            CameraError::DeviceError(code) => write!(f, "Device error {}", code),
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::AlreadyRecording => write!(f, "Recording already in progress"),
            SessionError::DirectoryCreate(msg) => {
                write!(f, "Failed to create session directory: {}", msg)
            }
        }
    }
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::PlaneGeometry {
                plane,
                needed,
                available,
            } => write!(
                f,
                "{} plane too small: need {} bytes, have {}",
                plane, needed, available
            ),
        }
    }
}

impl fmt::Display for SaveError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaveError::NoImage => write!(f, "Codec produced no image"),
            SaveError::Encode(msg) => write!(f, "Encoding failed: {}", msg),
            SaveError::Io(msg) => write!(f, "I/O failed: {}", msg),
            SaveError::Tag(msg) => write!(f, "Metadata write failed: {}", msg),
        }
    }
}

impl std::error::Error for PipelineError {}
impl std::error::Error for CameraError {}
impl std::error::Error for SessionError {}
impl std::error::Error for ConvertError {}
impl std::error::Error for SaveError {}

impl From<CameraError> for PipelineError {
    fn from(err: CameraError) -> Self {
        PipelineError::Camera(err)
    }
}

impl From<SessionError> for PipelineError {
    fn from(err: SessionError) -> Self {
        PipelineError::Session(err)
    }
}

impl From<SaveError> for PipelineError {
    fn from(err: SaveError) -> Self {
        PipelineError::Save(err)
    }
}

impl From<std::io::Error> for SaveError {
    fn from(err: std::io::Error) -> Self {
        SaveError::Io(err.to_string())
    }
}
