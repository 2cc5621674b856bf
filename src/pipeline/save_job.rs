// SPDX-License-Identifier: GPL-3.0-only

//! Save jobs
//!
//! An immutable unit of work handed to the persistence pool: the interleaved
//! frame bytes plus everything needed to encode, name, and tag the stored
//! file. Created by the sampler, consumed exactly once by a pool worker.

use crate::errors::SaveError;
use crate::location::LocationFix;
use crate::media::{exif, jpeg};
use crate::storage;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct SaveJob {
    /// Interleaved NV21 bytes, already copied out of the source frame
    pub nv21: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Session directory the file lands in
    pub directory: PathBuf,
    /// 1-based target index, `frame_NNN.jpg`
    pub file_index: u64,
    pub latitude: f64,
    pub longitude: f64,
    /// Capture instant, epoch milliseconds
    pub timestamp_ms: i64,
    /// Rotation recorded in the orientation tag
    pub rotation_degrees: u32,
}

/// Encoding qualities a worker applies; copied from the pipeline config so
/// jobs stay self-contained.
#[derive(Debug, Clone, Copy)]
pub struct SaveQualities {
    pub intermediate: u8,
    pub stored: u8,
}

/// Execute one save job: encode, write the file, then tag it.
///
/// A metadata failure is degraded, not fatal: the image stays on disk
/// untagged and the job still counts as saved.
pub fn run(job: &SaveJob, qualities: SaveQualities) -> Result<PathBuf, SaveError> {
    let jpeg_bytes = jpeg::encode_nv21(
        &job.nv21,
        job.width,
        job.height,
        qualities.intermediate,
        qualities.stored,
    )?;

    let path = storage::frame_path(&job.directory, job.file_index);
    std::fs::write(&path, &jpeg_bytes)?;

    let info = exif::ExifInfo {
        timestamp_ms: job.timestamp_ms,
        rotation_degrees: job.rotation_degrees,
        location: LocationFix::new(job.latitude, job.longitude),
    };
    if let Err(e) = exif::tag_file(&path, &info) {
        warn!(path = %path.display(), error = %e, "Image saved without metadata");
    }

    debug!(path = %path.display(), "Frame persisted");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic::generate_frame;
    use crate::media::yuv;

    fn temp_dir(label: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "geoframe-test-{}-{}",
            label,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn test_job(dir: PathBuf, index: u64) -> SaveJob {
        let frame = generate_frame(32, 24, index);
        SaveJob {
            nv21: yuv::frame_to_nv21(&frame).unwrap(),
            width: 32,
            height: 24,
            directory: dir,
            file_index: index,
            latitude: 37.0,
            longitude: -122.0,
            timestamp_ms: 1_700_000_000_000,
            rotation_degrees: 90,
        }
    }

    #[test]
    fn test_run_writes_tagged_file() {
        let dir = temp_dir("save-job");
        let job = test_job(dir.clone(), 6);

        let path = run(
            &job,
            SaveQualities {
                intermediate: 100,
                stored: 95,
            },
        )
        .unwrap();
        assert_eq!(path.file_name().unwrap(), "frame_006.jpg");

        let file = std::fs::File::open(&path).unwrap();
        let mut reader = std::io::BufReader::new(&file);
        let parsed = ::exif::Reader::new()
            .read_from_container(&mut reader)
            .unwrap();
        let orientation = parsed
            .get_field(::exif::Tag::Orientation, ::exif::In::PRIMARY)
            .unwrap();
        assert_eq!(orientation.value.get_uint(0), Some(6));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_run_fails_on_missing_directory() {
        let mut job = test_job(PathBuf::from("/nonexistent-geoframe-dir"), 1);
        job.directory = PathBuf::from("/nonexistent-geoframe-dir");
        assert!(run(
            &job,
            SaveQualities {
                intermediate: 100,
                stored: 95,
            },
        )
        .is_err());
    }
}
