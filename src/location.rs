// SPDX-License-Identifier: GPL-3.0-only

//! Location boundary
//!
//! A fix is resolved once per recording session, at start time. Resolution is
//! the one inherently asynchronous, cancellable operation in the start path,
//! so providers receive an explicit cancellation token.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Geolocation snapshot taken once per session.
///
/// The all-zero value is the "unknown" sentinel: it suppresses GPS metadata
/// in the stored frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationFix {
    pub const UNKNOWN: LocationFix = LocationFix {
        latitude: 0.0,
        longitude: 0.0,
    };

    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// True for the (0, 0) sentinel; such fixes carry no GPS tags.
    pub fn is_unknown(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

impl fmt::Display for LocationFix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unknown() {
            write!(f, "unknown")
        } else {
            write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
        }
    }
}

/// Cancellation token handed to location providers.
///
/// Cloned tokens share the same flag; cancelling any clone cancels all.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Location resolution errors; never fatal to recording
#[derive(Debug, Clone)]
pub enum LocationError {
    /// Provider could not produce a fix
    Unavailable(String),
    /// Resolution was cancelled via the token
    Cancelled,
}

impl fmt::Display for LocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocationError::Unavailable(msg) => write!(f, "Location unavailable: {}", msg),
            LocationError::Cancelled => write!(f, "Location resolution cancelled"),
        }
    }
}

impl std::error::Error for LocationError {}

/// Boundary to the platform location service.
///
/// `current_location` may block; the pipeline drives it from a blocking task
/// under a bounded timeout and fires the token when the bound elapses.
pub trait LocationProvider: Send + Sync {
    fn current_location(&self, cancel: &CancelToken) -> Result<LocationFix, LocationError>;
}

/// Provider returning a fixed coordinate, for demos and tests
#[derive(Debug, Clone, Copy)]
pub struct FixedLocation(pub LocationFix);

impl LocationProvider for FixedLocation {
    fn current_location(&self, _cancel: &CancelToken) -> Result<LocationFix, LocationError> {
        Ok(self.0)
    }
}

/// Provider that always fails, for running without a location service
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLocation;

impl LocationProvider for NoLocation {
    fn current_location(&self, _cancel: &CancelToken) -> Result<LocationFix, LocationError> {
        Err(LocationError::Unavailable("no provider configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_sentinel() {
        assert!(LocationFix::UNKNOWN.is_unknown());
        assert!(LocationFix::new(0.0, 0.0).is_unknown());
        assert!(!LocationFix::new(37.0, -122.0).is_unknown());
        // A fix on a zero meridian or equator alone is still valid
        assert!(!LocationFix::new(0.0, 11.5).is_unknown());
        assert!(!LocationFix::new(51.3, 0.0).is_unknown());
    }

    #[test]
    fn test_cancel_token_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_fixed_provider() {
        let provider = FixedLocation(LocationFix::new(37.0, -122.0));
        let fix = provider.current_location(&CancelToken::new()).unwrap();
        assert_eq!(fix.latitude, 37.0);
        assert_eq!(fix.longitude, -122.0);
    }
}
