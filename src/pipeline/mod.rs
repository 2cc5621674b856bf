// SPDX-License-Identifier: GPL-3.0-only

//! Recording pipeline
//!
//! Wires the pieces together: frames arrive on the dedicated background
//! executor, the sampler picks every Nth one while a session is active, and
//! selected frames become save jobs on the persistence pool. The inbound
//! command surface is `start_recording` / `stop_recording`; resource
//! teardown is `shutdown`, which stops frame intake, closes the camera,
//! drains the pool, and finally stops the executor, in that order.

pub mod pool;
pub mod sampler;
pub mod save_job;
pub mod session;

use crate::capture::executor::BackgroundExecutor;
use crate::capture::lifecycle::CameraController;
use crate::capture::types::{CaptureFrame, CaptureStream, Permissions, RotationSource};
use crate::config::Config;
use crate::errors::{CameraError, SessionError};
use crate::location::{CancelToken, LocationFix, LocationProvider};
use crate::pipeline::pool::SavePool;
use crate::pipeline::sampler::FrameSampler;
use crate::pipeline::save_job::SaveQualities;
use crate::pipeline::session::{Effect, SessionState};
use crate::storage;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// External collaborators the pipeline is built over
pub struct PipelineDeps {
    pub location: Arc<dyn LocationProvider>,
    pub rotation: Arc<dyn RotationSource>,
    pub permissions: Permissions,
}

struct RecorderState {
    session: SessionState,
    sampler: FrameSampler,
}

struct PipelineInner {
    config: Config,
    pictures_root: PathBuf,
    state: Mutex<RecorderState>,
    pool: Mutex<SavePool>,
    camera: CameraController,
    location: Arc<dyn LocationProvider>,
    fatal: Arc<AtomicBool>,
}

/// The frame sampling and durable-image pipeline
pub struct RecorderPipeline {
    inner: Arc<PipelineInner>,
    executor: Option<BackgroundExecutor>,
}

impl RecorderPipeline {
    /// Build the pipeline. Fails up front when a required permission is
    /// missing; nothing is opened in that case.
    pub fn new(config: Config, deps: PipelineDeps) -> Result<Self, CameraError> {
        deps.permissions.ensure()?;

        let pictures_root = storage::pictures_root(config.pictures_root.as_deref());
        let qualities = SaveQualities {
            intermediate: config.intermediate_jpeg_quality,
            stored: config.stored_jpeg_quality,
        };
        let pool = SavePool::new(
            config.save_workers,
            config.save_queue_depth,
            qualities,
            config.pool_shutdown_grace(),
        );
        let sampler = FrameSampler::new(config.sampling_period, deps.rotation);

        let fatal = Arc::new(AtomicBool::new(false));
        let fatal_flag = Arc::clone(&fatal);
        let camera = CameraController::new(Arc::new(move |err| {
            error!(error = %err, "Unrecoverable camera failure, capture flow ends");
            fatal_flag.store(true, Ordering::SeqCst);
        }));

        let inner = Arc::new(PipelineInner {
            config,
            pictures_root,
            state: Mutex::new(RecorderState {
                session: SessionState::Idle,
                sampler,
            }),
            pool: Mutex::new(pool),
            camera,
            location: deps.location,
            fatal,
        });

        Ok(Self {
            inner,
            executor: Some(BackgroundExecutor::start("camera-bg")),
        })
    }

    /// Open the capture stream; frames start arriving once the device
    /// reports opened and its session configures.
    pub fn open_camera(&self, stream: Box<dyn CaptureStream>) -> Result<(), CameraError> {
        let handle = self
            .executor
            .as_ref()
            .expect("executor alive until shutdown")
            .handle();

        let frame_inner = Arc::clone(&self.inner);
        let frame_handle = handle.clone();
        let frames: crate::capture::types::FrameSink = Arc::new(move |frame: CaptureFrame| {
            let inner = Arc::clone(&frame_inner);
            // Posting fails only once the executor stopped during shutdown;
            // the frame is simply dropped then
            let _ = frame_handle.post(move || on_frame(&inner, frame));
        });

        let sensor_orientation = self.inner.camera.open(stream, handle, frames)?;
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        state.sampler.set_sensor_orientation(sensor_orientation);
        Ok(())
    }

    /// Start a recording session.
    ///
    /// Resolves a location fix first (bounded by the configured timeout;
    /// failure and timeout degrade to the unknown sentinel), then creates
    /// the session directory and re-zeroes the frame counter. Returns the
    /// session directory.
    pub async fn start_recording(&self) -> Result<PathBuf, SessionError> {
        {
            let state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            if state.session.is_recording() {
                return Err(SessionError::AlreadyRecording);
            }
        }

        let fix = resolve_location(&self.inner).await;

        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        let (next, effects) = session::start(
            &state.session,
            fix,
            chrono::Local::now(),
            chrono::Utc::now(),
            &self.inner.pictures_root,
        )?;

        let mut directory = None;
        for effect in effects {
            match effect {
                Effect::ResetFrameCounter => state.sampler.reset(),
                Effect::CreateSessionDir(path) => {
                    storage::create_session_dir(&path)?;
                    directory = Some(path);
                }
                Effect::AnnounceStarted { with_location } => {
                    if with_location {
                        info!("Recording started.");
                    } else {
                        info!("Recording started (no location)");
                    }
                }
                Effect::AnnounceStopped => {}
            }
        }
        state.session = next;

        Ok(directory.unwrap_or_else(|| self.inner.pictures_root.clone()))
    }

    /// Stop the active session. A pure flag flip: in-flight save jobs keep
    /// running and the session directory stays as it is. No-op while Idle.
    pub fn stop_recording(&self) {
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        let (next, effects) = session::stop(&state.session);
        state.session = next;
        for effect in effects {
            if effect == Effect::AnnounceStopped {
                info!("Recording stopped");
            }
        }
    }

    pub fn is_recording(&self) -> bool {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .session
            .is_recording()
    }

    /// Directory of the active session, if recording
    pub fn session_directory(&self) -> Option<PathBuf> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .session
            .session()
            .map(|s| s.directory.clone())
    }

    /// Frames delivered since the pipeline came up (or the last session start)
    pub fn frame_counter(&self) -> u64 {
        self.inner
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .sampler
            .counter()
    }

    /// True once the device reported an unrecoverable error
    pub fn fatal_error_occurred(&self) -> bool {
        self.inner.fatal.load(Ordering::SeqCst)
    }

    /// Close the capture stream without tearing the pipeline down.
    /// Blocks briefly; idempotent.
    pub fn close_camera(&self) {
        self.inner.camera.close();
    }

    /// Tear everything down: stop frame intake by closing the camera, drain
    /// the persistence pool under its grace period, then stop the background
    /// executor. Reversing any of these steps would risk touching a closed
    /// resource.
    pub async fn shutdown(mut self) {
        let camera = self.inner.camera.clone();
        let _ = tokio::task::spawn_blocking(move || camera.close()).await;

        let pool_inner = Arc::clone(&self.inner);
        let _ = tokio::task::spawn_blocking(move || {
            pool_inner
                .pool
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .shutdown();
        })
        .await;

        if let Some(mut executor) = self.executor.take() {
            let _ = tokio::task::spawn_blocking(move || executor.quit()).await;
        }
        info!("Pipeline shut down");
    }
}

/// Per-frame entry point, runs on the background executor. The frame is
/// dropped when this returns; selected frames have their bytes copied into
/// the save job first.
fn on_frame(inner: &Arc<PipelineInner>, frame: CaptureFrame) {
    let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
    let RecorderState { session, sampler } = &mut *state;

    if let Some(job) = sampler.on_frame(&frame, session.session()) {
        drop(state);
        // A rejected submit is already logged; sampling is best-effort
        let _ = inner
            .pool
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .submit(job);
    }
}

/// Resolve the session location with a bounded wait. Every failure mode
/// (provider error, cancelled, timeout) degrades to the unknown sentinel.
async fn resolve_location(inner: &Arc<PipelineInner>) -> LocationFix {
    let provider = Arc::clone(&inner.location);
    let cancel = CancelToken::new();
    let task_cancel = cancel.clone();
    let task = tokio::task::spawn_blocking(move || provider.current_location(&task_cancel));

    match tokio::time::timeout(inner.config.location_timeout(), task).await {
        Ok(Ok(Ok(fix))) => fix,
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "Location unavailable, recording without fix");
            LocationFix::UNKNOWN
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Location task failed, recording without fix");
            LocationFix::UNKNOWN
        }
        Err(_) => {
            cancel.cancel();
            warn!("Location resolution timed out, recording without fix");
            LocationFix::UNKNOWN
        }
    }
}
