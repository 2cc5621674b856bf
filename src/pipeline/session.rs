// SPDX-License-Identifier: GPL-3.0-only

//! Recording session state
//!
//! The session is an explicit value, not a set of shared flags. Transitions
//! are pure functions returning the next state plus descriptions of the side
//! effects to apply, so the decision logic is testable without touching the
//! filesystem or a location service.

use crate::constants::{SESSION_DIR_PREFIX, SESSION_DIR_TIME_FORMAT};
use crate::errors::SessionError;
use crate::location::LocationFix;
use chrono::{DateTime, Local, Utc};
use std::path::{Path, PathBuf};

/// One recording run: a directory and the location resolved at start.
///
/// Destroyed conceptually on stop; the directory is never cleaned up and
/// in-flight saves keep writing into it.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub started_at: DateTime<Utc>,
    pub directory: PathBuf,
    pub location: LocationFix,
}

/// Recording state machine: Idle or Recording exactly one session
#[derive(Debug, Clone, PartialEq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Recording(Session),
}

impl SessionState {
    pub fn is_recording(&self) -> bool {
        matches!(self, SessionState::Recording(_))
    }

    pub fn session(&self) -> Option<&Session> {
        match self {
            SessionState::Idle => None,
            SessionState::Recording(session) => Some(session),
        }
    }
}

/// Side effects a transition asks the caller to apply
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Create the session directory (idempotent)
    CreateSessionDir(PathBuf),
    /// Re-zero the frame counter
    ResetFrameCounter,
    /// Surface the start to the user, noting whether a fix was obtained
    AnnounceStarted { with_location: bool },
    /// Surface the stop to the user
    AnnounceStopped,
}

/// Begin recording with an already-resolved location outcome.
///
/// Both fix outcomes enter Recording; they differ only in whether the
/// session carries a usable location. Starting while already Recording is
/// rejected rather than restarting the session.
pub fn start(
    state: &SessionState,
    fix: LocationFix,
    now_local: DateTime<Local>,
    now_utc: DateTime<Utc>,
    pictures_root: &Path,
) -> Result<(SessionState, Vec<Effect>), SessionError> {
    if state.is_recording() {
        return Err(SessionError::AlreadyRecording);
    }

    let directory = session_directory(pictures_root, now_local);
    let session = Session {
        started_at: now_utc,
        directory: directory.clone(),
        location: fix,
    };

    Ok((
        SessionState::Recording(session),
        vec![
            Effect::ResetFrameCounter,
            Effect::CreateSessionDir(directory),
            Effect::AnnounceStarted {
                with_location: !fix.is_unknown(),
            },
        ],
    ))
}

/// Stop recording: a pure flag flip. In-flight saves are neither awaited nor
/// cancelled. Stopping while Idle is a no-op with no effects.
pub fn stop(state: &SessionState) -> (SessionState, Vec<Effect>) {
    match state {
        SessionState::Idle => (SessionState::Idle, Vec::new()),
        SessionState::Recording(_) => (SessionState::Idle, vec![Effect::AnnounceStopped]),
    }
}

/// Timestamp-suffixed session directory under the pictures root.
pub fn session_directory(pictures_root: &Path, at: DateTime<Local>) -> PathBuf {
    pictures_root.join(format!(
        "{}{}",
        SESSION_DIR_PREFIX,
        at.format(SESSION_DIR_TIME_FORMAT)
    ))
}
