// SPDX-License-Identifier: GPL-3.0-only

//! Capture resource lifecycle
//!
//! The device handle, capture session, and acquisition endpoint live and die
//! together behind a single state machine: Closed → Opening → Open → Closing
//! → Closed. Open and close both acquire the same mutex, so they can never
//! race; close() during Opening parks on the condition variable until the
//! pending open resolves (opened, disconnected, or error), then proceeds.

use crate::capture::executor::ExecutorHandle;
use crate::capture::types::{CaptureStream, EventSink, StreamContext, StreamEvent};
use crate::constants::CLOSE_WAIT_CAP;
use crate::errors::CameraError;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Lifecycle states of the camera resource set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeviceState {
    #[default]
    Closed,
    Opening,
    Open,
    Closing,
}

/// Callback invoked when the device reports an unrecoverable error.
/// The embedder decides what "terminate" means (the host UI exits).
pub type FatalHandler = Arc<dyn Fn(CameraError) + Send + Sync>;

struct ControllerInner {
    state: Mutex<DeviceState>,
    cond: Condvar,
    stream: Mutex<Option<Box<dyn CaptureStream>>>,
    on_fatal: FatalHandler,
}

/// Owns the capture resource set and serializes its lifecycle transitions
#[derive(Clone)]
pub struct CameraController {
    inner: Arc<ControllerInner>,
}

impl CameraController {
    pub fn new(on_fatal: FatalHandler) -> Self {
        Self {
            inner: Arc::new(ControllerInner {
                state: Mutex::new(DeviceState::Closed),
                cond: Condvar::new(),
                stream: Mutex::new(None),
                on_fatal,
            }),
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> DeviceState {
        *self.inner.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Open the capture stream.
    ///
    /// Transitions Closed → Opening and kicks off the asynchronous hardware
    /// open; completion arrives as `StreamEvent`s on the background executor.
    /// Returns the stream's sensor orientation for rotation bookkeeping.
    pub fn open(
        &self,
        stream: Box<dyn CaptureStream>,
        executor: ExecutorHandle,
        frames: crate::capture::types::FrameSink,
    ) -> Result<u32, CameraError> {
        let sensor_orientation = stream.sensor_orientation();

        {
            let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
            if *state != DeviceState::Closed {
                return Err(CameraError::AlreadyOpen);
            }
            *state = DeviceState::Opening;
        }

        info!(sensor_orientation, "Opening capture stream");

        let events = self.event_sink(executor);
        let ctx = StreamContext { events, frames };

        let mut slot = self.inner.stream.lock().unwrap_or_else(|e| e.into_inner());
        *slot = Some(stream);
        if let Some(stream) = slot.as_mut() {
            if let Err(e) = stream.request_open(ctx) {
                *slot = None;
                drop(slot);
                let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
                *state = DeviceState::Closed;
                self.inner.cond.notify_all();
                return Err(e);
            }
        }

        Ok(sensor_orientation)
    }

    /// Close the capture stream.
    ///
    /// Idempotent: closing an already-closed controller is a no-op. Blocks
    /// the calling thread briefly while resources tear down, and while a
    /// pending open resolves, capped at `CLOSE_WAIT_CAP`.
    pub fn close(&self) {
        let deadline = Instant::now() + CLOSE_WAIT_CAP;
        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());

        loop {
            match *state {
                DeviceState::Closed => return,
                DeviceState::Open => break,
                DeviceState::Opening | DeviceState::Closing => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero() {
                        warn!(state = ?*state, "Close wait cap elapsed, tearing down anyway");
                        break;
                    }
                    let (guard, _timeout) = self
                        .inner
                        .cond
                        .wait_timeout(state, remaining)
                        .unwrap_or_else(|e| e.into_inner());
                    state = guard;
                }
            }
        }

        *state = DeviceState::Closing;
        drop(state);

        debug!("Closing capture stream");
        let stream = self
            .inner
            .stream
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(mut stream) = stream {
            stream.close();
        }

        let mut state = self.inner.state.lock().unwrap_or_else(|e| e.into_inner());
        *state = DeviceState::Closed;
        self.inner.cond.notify_all();
        info!("Capture stream closed");
    }

    /// Build the event sink the stream reports through. Events are posted
    /// onto the background executor so they serialize with frame delivery.
    fn event_sink(&self, executor: ExecutorHandle) -> EventSink {
        let inner = Arc::clone(&self.inner);
        Arc::new(move |event: StreamEvent| {
            let inner = Arc::clone(&inner);
            let posted = executor.post(move || handle_event(&inner, event));
            if !posted {
                debug!(?event, "Dropping stream event, executor has quit");
            }
        })
    }
}

fn handle_event(inner: &Arc<ControllerInner>, event: StreamEvent) {
    match event {
        StreamEvent::Opened => {
            {
                let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
                if *state != DeviceState::Opening {
                    debug!(state = ?*state, "Stale opened event ignored");
                    return;
                }
                *state = DeviceState::Open;
                inner.cond.notify_all();
            }
            info!("Capture device opened, configuring session");

            let mut slot = inner.stream.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(stream) = slot.as_mut() {
                if let Err(e) = stream.configure() {
                    warn!(error = %e, "Unable to configure capture session");
                }
            }
        }
        StreamEvent::Configured => {
            info!("Capture session configured");
        }
        StreamEvent::ConfigureFailed => {
            warn!("Capture session configuration failed");
        }
        StreamEvent::Disconnected => {
            warn!("Capture device disconnected");
            teardown_after_loss(inner);
        }
        StreamEvent::Error(code) => {
            error!(code, "Capture device error");
            teardown_after_loss(inner);
            (inner.on_fatal)(CameraError::DeviceError(code));
        }
    }
}

/// Device-initiated teardown: the handle is gone, release our side too.
fn teardown_after_loss(inner: &Arc<ControllerInner>) {
    let stream = inner
        .stream
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .take();
    if let Some(mut stream) = stream {
        stream.close();
    }
    let mut state = inner.state.lock().unwrap_or_else(|e| e.into_inner());
    *state = DeviceState::Closed;
    inner.cond.notify_all();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::executor::BackgroundExecutor;
    use crate::capture::types::FrameSink;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::time::Duration;

    /// Stream whose opened event is emitted manually by the test
    struct ScriptedStream {
        ctx: Arc<Mutex<Option<StreamContext>>>,
        closed: Arc<AtomicU32>,
    }

    impl CaptureStream for ScriptedStream {
        fn sensor_orientation(&self) -> u32 {
            90
        }

        fn request_open(&mut self, ctx: StreamContext) -> Result<(), CameraError> {
            *self.ctx.lock().unwrap() = Some(ctx);
            Ok(())
        }

        fn configure(&mut self) -> Result<(), CameraError> {
            if let Some(ctx) = self.ctx.lock().unwrap().as_ref() {
                (ctx.events)(StreamEvent::Configured);
            }
            Ok(())
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn null_frames() -> FrameSink {
        Arc::new(|_frame| {})
    }

    fn fatal_flag() -> (FatalHandler, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = Arc::clone(&flag);
        let handler: FatalHandler = Arc::new(move |_err| {
            flag_clone.store(true, Ordering::SeqCst);
        });
        (handler, flag)
    }

    #[test]
    fn test_open_then_events_reach_open_state() {
        let executor = BackgroundExecutor::start("lifecycle-test");
        let (fatal, _) = fatal_flag();
        let controller = CameraController::new(fatal);
        let ctx = Arc::new(Mutex::new(None));
        let closed = Arc::new(AtomicU32::new(0));

        let stream = Box::new(ScriptedStream {
            ctx: Arc::clone(&ctx),
            closed: Arc::clone(&closed),
        });
        let orientation = controller
            .open(stream, executor.handle(), null_frames())
            .unwrap();
        assert_eq!(orientation, 90);
        assert_eq!(controller.state(), DeviceState::Opening);

        let event_ctx = ctx.lock().unwrap().clone().unwrap();
        (event_ctx.events)(StreamEvent::Opened);

        // Wait for the executor to process the event
        let deadline = Instant::now() + Duration::from_secs(2);
        while controller.state() != DeviceState::Open && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(controller.state(), DeviceState::Open);

        controller.close();
        assert_eq!(controller.state(), DeviceState::Closed);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_before_opened_event_does_not_deadlock() {
        let executor = BackgroundExecutor::start("lifecycle-race");
        let (fatal, _) = fatal_flag();
        let controller = CameraController::new(fatal);
        let ctx = Arc::new(Mutex::new(None));
        let closed = Arc::new(AtomicU32::new(0));

        let stream = Box::new(ScriptedStream {
            ctx: Arc::clone(&ctx),
            closed: Arc::clone(&closed),
        });
        controller
            .open(stream, executor.handle(), null_frames())
            .unwrap();

        // Fire the opened event only after close() has started waiting
        let event_ctx = ctx.lock().unwrap().clone().unwrap();
        let late_open = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(100));
            (event_ctx.events)(StreamEvent::Opened);
        });

        controller.close();
        late_open.join().unwrap();

        assert_eq!(controller.state(), DeviceState::Closed);
        assert_eq!(closed.load(Ordering::SeqCst), 1);

        // The state machine stays usable: a fresh open succeeds
        let stream = Box::new(ScriptedStream {
            ctx: Arc::new(Mutex::new(None)),
            closed: Arc::new(AtomicU32::new(0)),
        });
        assert!(controller
            .open(stream, executor.handle(), null_frames())
            .is_ok());
    }

    #[test]
    fn test_close_is_idempotent() {
        let (fatal, _) = fatal_flag();
        let controller = CameraController::new(fatal);
        controller.close();
        controller.close();
        assert_eq!(controller.state(), DeviceState::Closed);
    }

    #[test]
    fn test_device_error_invokes_fatal_handler() {
        let executor = BackgroundExecutor::start("lifecycle-error");
        let (fatal, flag) = fatal_flag();
        let controller = CameraController::new(fatal);
        let ctx = Arc::new(Mutex::new(None));
        let closed = Arc::new(AtomicU32::new(0));

        let stream = Box::new(ScriptedStream {
            ctx: Arc::clone(&ctx),
            closed: Arc::clone(&closed),
        });
        controller
            .open(stream, executor.handle(), null_frames())
            .unwrap();

        let event_ctx = ctx.lock().unwrap().clone().unwrap();
        (event_ctx.events)(StreamEvent::Opened);
        (event_ctx.events)(StreamEvent::Error(3));

        let deadline = Instant::now() + Duration::from_secs(2);
        while !flag.load(Ordering::SeqCst) && Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(controller.state(), DeviceState::Closed);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_second_open_rejected() {
        let executor = BackgroundExecutor::start("lifecycle-double");
        let (fatal, _) = fatal_flag();
        let controller = CameraController::new(fatal);

        let stream = Box::new(ScriptedStream {
            ctx: Arc::new(Mutex::new(None)),
            closed: Arc::new(AtomicU32::new(0)),
        });
        controller
            .open(stream, executor.handle(), null_frames())
            .unwrap();

        let second = Box::new(ScriptedStream {
            ctx: Arc::new(Mutex::new(None)),
            closed: Arc::new(AtomicU32::new(0)),
        });
        match controller.open(second, executor.handle(), null_frames()) {
            Err(CameraError::AlreadyOpen) => {}
            other => panic!("expected AlreadyOpen, got {:?}", other.map(|_| ())),
        }
    }
}
