// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Every Nth delivered frame is persisted while recording.
pub const SAMPLING_PERIOD: u64 = 6;

/// Quality of the intermediate JPEG pass (the YUV buffer is compressed at
/// this quality, then decoded again before the final encode).
pub const INTERMEDIATE_JPEG_QUALITY: u8 = 100;

/// Quality of the JPEG actually written to disk.
pub const STORED_JPEG_QUALITY: u8 = 95;

/// Default number of persistence pool workers.
pub const DEFAULT_SAVE_WORKERS: usize = 4;

/// Default depth of the bounded save-job queue. A full queue drops the frame.
pub const DEFAULT_SAVE_QUEUE_DEPTH: usize = 16;

/// How long the persistence pool waits for in-flight jobs on shutdown before
/// abandoning whatever is still queued.
pub const POOL_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Default bound on waiting for a location fix at recording start.
pub const DEFAULT_LOCATION_TIMEOUT: Duration = Duration::from_secs(5);

/// Upper bound on how long close() waits for a pending open to resolve
/// before tearing resources down anyway.
pub const CLOSE_WAIT_CAP: Duration = Duration::from_secs(5);

/// Session directories are named `Session_<timestamp>`.
pub const SESSION_DIR_PREFIX: &str = "Session_";
pub const SESSION_DIR_TIME_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Persisted frames are named `frame_NNN.jpg`, 3-digit, 1-based.
pub const FRAME_FILE_PREFIX: &str = "frame_";
pub const FRAME_FILE_EXTENSION: &str = "jpg";

/// EXIF date/time formats, always rendered in UTC.
pub const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";
pub const EXIF_GPS_DATESTAMP_FORMAT: &str = "%Y:%m:%d";
