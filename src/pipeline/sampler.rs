// SPDX-License-Identifier: GPL-3.0-only

//! Frame sampling
//!
//! Counts every delivered frame and selects every Nth one for persistence
//! while a session is active. The counter advances unconditionally, recording
//! or not, and is re-zeroed only when a new session starts; counter values
//! consumed while idle are meaningless by design.

use crate::capture::types::{CaptureFrame, DisplayRotation, RotationSource};
use crate::media::yuv;
use crate::pipeline::save_job::SaveJob;
use crate::pipeline::session::Session;
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

/// Pure sampling decision: the frame at this counter value is kept iff it
/// closes a period (the Nth, 2Nth, ... delivered frame) while recording.
pub fn should_sample(counter: u64, period: u64, recording: bool) -> bool {
    recording && period > 0 && counter % period == period - 1
}

/// Stored rotation for a sampled frame: sensor mounting angle corrected by
/// the display rotation at the moment of sampling.
pub fn jpeg_rotation(sensor_orientation: u32, display: DisplayRotation) -> u32 {
    (sensor_orientation + 360 - display.degrees()) % 360
}

/// Per-frame sampling state and job construction
pub struct FrameSampler {
    counter: u64,
    period: u64,
    sensor_orientation: u32,
    rotation_source: Arc<dyn RotationSource>,
}

impl FrameSampler {
    pub fn new(period: u64, rotation_source: Arc<dyn RotationSource>) -> Self {
        Self {
            counter: 0,
            period,
            sensor_orientation: 0,
            rotation_source,
        }
    }

    /// Record the sensor mounting angle reported by the opened stream
    pub fn set_sensor_orientation(&mut self, degrees: u32) {
        self.sensor_orientation = degrees;
    }

    /// Re-zero the counter; called when a session starts
    pub fn reset(&mut self) {
        self.counter = 0;
    }

    pub fn counter(&self) -> u64 {
        self.counter
    }

    /// Process one delivered frame.
    ///
    /// Always advances the counter. Returns a save job only when the frame
    /// closes a sampling period while a session is active and conversion
    /// succeeds; conversion failures drop the frame and keep the pipeline
    /// running.
    pub fn on_frame(&mut self, frame: &CaptureFrame, session: Option<&Session>) -> Option<SaveJob> {
        let counter = self.counter;
        self.counter += 1;

        let session = match session {
            Some(session) if should_sample(counter, self.period, true) => session,
            _ => return None,
        };

        let nv21 = match yuv::frame_to_nv21(frame) {
            Ok(nv21) => nv21,
            Err(e) => {
                warn!(error = %e, counter, "Frame conversion failed, dropping");
                return None;
            }
        };

        // Display rotation is re-read per sampled frame so stored orientation
        // follows device rotation during recording
        let display = self.rotation_source.display_rotation();
        let rotation_degrees = jpeg_rotation(self.sensor_orientation, display);

        let job = SaveJob {
            nv21,
            width: frame.width,
            height: frame.height,
            directory: session.directory.clone(),
            file_index: counter + 1,
            latitude: session.location.latitude,
            longitude: session.location.longitude,
            timestamp_ms: Utc::now().timestamp_millis(),
            rotation_degrees,
        };
        debug!(
            index = job.file_index,
            rotation = rotation_degrees,
            "Frame sampled"
        );
        Some(job)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::synthetic::generate_frame;
    use crate::capture::types::FixedRotation;
    use crate::location::LocationFix;
    use std::path::PathBuf;
    use std::sync::Mutex;

    fn test_session() -> Session {
        Session {
            started_at: Utc::now(),
            directory: PathBuf::from("/tmp/session"),
            location: LocationFix::new(37.0, -122.0),
        }
    }

    #[test]
    fn test_should_sample_pattern() {
        // With a period of 6, the 6th, 12th, 18th delivered frames are kept
        let sampled: Vec<u64> = (0..20).filter(|&c| should_sample(c, 6, true)).collect();
        assert_eq!(sampled, vec![5, 11, 17]);
        assert!(!should_sample(5, 6, false));
    }

    #[test]
    fn test_sampled_count_over_k_frames() {
        for k in [0u64, 5, 6, 11, 12, 13, 36] {
            let count = (0..k).filter(|&c| should_sample(c, 6, true)).count() as u64;
            assert_eq!(count, k / 6, "k = {}", k);
        }
    }

    #[test]
    fn test_jpeg_rotation_formula() {
        assert_eq!(jpeg_rotation(90, DisplayRotation::Deg0), 90);
        assert_eq!(jpeg_rotation(90, DisplayRotation::Deg90), 0);
        assert_eq!(jpeg_rotation(90, DisplayRotation::Deg270), 180);
        assert_eq!(jpeg_rotation(0, DisplayRotation::Deg90), 270);
        assert_eq!(jpeg_rotation(270, DisplayRotation::Deg180), 90);
    }

    #[test]
    fn test_counter_advances_while_idle() {
        let mut sampler = FrameSampler::new(6, Arc::new(FixedRotation::default()));
        let frame = generate_frame(16, 16, 0);

        for _ in 0..7 {
            assert!(sampler.on_frame(&frame, None).is_none());
        }
        assert_eq!(sampler.counter(), 7);
    }

    #[test]
    fn test_indices_are_one_based_and_period_aligned() {
        let mut sampler = FrameSampler::new(6, Arc::new(FixedRotation::default()));
        sampler.set_sensor_orientation(90);
        let session = test_session();
        let frame = generate_frame(16, 16, 0);

        let mut indices = Vec::new();
        for _ in 0..12 {
            if let Some(job) = sampler.on_frame(&frame, Some(&session)) {
                indices.push(job.file_index);
            }
        }
        assert_eq!(indices, vec![6, 12]);
    }

    #[test]
    fn test_reset_rezeroes_counter() {
        let mut sampler = FrameSampler::new(6, Arc::new(FixedRotation::default()));
        let frame = generate_frame(16, 16, 0);
        for _ in 0..4 {
            sampler.on_frame(&frame, None);
        }
        sampler.reset();
        assert_eq!(sampler.counter(), 0);

        let session = test_session();
        let mut first_index = None;
        for _ in 0..6 {
            if let Some(job) = sampler.on_frame(&frame, Some(&session)) {
                first_index = Some(job.file_index);
            }
        }
        assert_eq!(first_index, Some(6));
    }

    #[test]
    fn test_rotation_tracked_per_frame() {
        struct SwitchingRotation {
            current: Mutex<DisplayRotation>,
        }
        impl RotationSource for SwitchingRotation {
            fn display_rotation(&self) -> DisplayRotation {
                *self.current.lock().unwrap()
            }
        }

        let source = Arc::new(SwitchingRotation {
            current: Mutex::new(DisplayRotation::Deg0),
        });
        let mut sampler = FrameSampler::new(6, Arc::clone(&source) as Arc<dyn RotationSource>);
        sampler.set_sensor_orientation(90);
        let session = test_session();
        let frame = generate_frame(16, 16, 0);

        let mut rotations = Vec::new();
        for i in 0..12 {
            if i == 6 {
                // Device rotates mid-session
                *source.current.lock().unwrap() = DisplayRotation::Deg90;
            }
            if let Some(job) = sampler.on_frame(&frame, Some(&session)) {
                rotations.push(job.rotation_degrees);
            }
        }
        assert_eq!(rotations, vec![90, 0]);
    }

    #[test]
    fn test_conversion_failure_drops_frame() {
        let mut sampler = FrameSampler::new(1, Arc::new(FixedRotation::default()));
        let session = test_session();
        let mut frame = generate_frame(16, 16, 0);
        frame.planes[0].data.truncate(3);

        assert!(sampler.on_frame(&frame, Some(&session)).is_none());
        // Counter still advanced
        assert_eq!(sampler.counter(), 1);
    }
}
