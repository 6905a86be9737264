//! Per-instance fetch lifecycle used as a single-flight guard.
//!
//! State machine: Idle -> InFlight -> {Loaded | Failed}
//!
//! The transition into `InFlight` is the guard itself: it happens before the
//! request is issued, so a duplicate trigger arriving while the first request
//! is outstanding observes `InFlight` and is dropped.

use std::fmt;

/// Lightweight discriminant of a [`FetchState`], handy for logging and views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Idle,
    InFlight,
    Loaded,
    Failed,
}

impl FetchPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::InFlight => "in_flight",
            Self::Loaded => "loaded",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a fetch could not begin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FetchRejected {
    #[error("a fetch is already in flight")]
    InFlight,
    #[error("the fetch already ran for this instance")]
    AlreadyRan,
}

/// Lifecycle of one kind of fetch owned by one renderer instance.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FetchState<T> {
    /// Nothing requested yet.
    #[default]
    Idle,
    /// A request has been issued and not yet settled.
    InFlight,
    /// The last request succeeded.
    Loaded(T),
    /// The last request failed; carries the logged reason.
    Failed(String),
}

impl<T> FetchState<T> {
    #[must_use]
    pub fn phase(&self) -> FetchPhase {
        match self {
            Self::Idle => FetchPhase::Idle,
            Self::InFlight => FetchPhase::InFlight,
            Self::Loaded(_) => FetchPhase::Loaded,
            Self::Failed(_) => FetchPhase::Failed,
        }
    }

    /// Begins a fetch that may run at most once per instance.
    ///
    /// Only `Idle` may transition; any other state means the fetch is running
    /// or already happened.
    ///
    /// # Errors
    ///
    /// Returns [`FetchRejected`] when the state is not `Idle`.
    pub fn begin_once(&mut self) -> Result<(), FetchRejected> {
        match self {
            Self::Idle => {
                *self = Self::InFlight;
                Ok(())
            }
            Self::InFlight => Err(FetchRejected::InFlight),
            Self::Loaded(_) | Self::Failed(_) => Err(FetchRejected::AlreadyRan),
        }
    }

    /// Begins a repeatable fetch. Rejected only while another is in flight.
    ///
    /// # Errors
    ///
    /// Returns [`FetchRejected::InFlight`] when a request is outstanding.
    pub fn begin(&mut self) -> Result<(), FetchRejected> {
        if self.is_in_flight() {
            return Err(FetchRejected::InFlight);
        }
        *self = Self::InFlight;
        Ok(())
    }

    /// Settles an in-flight fetch. Returns `false` (and changes nothing) when
    /// no fetch was in flight, e.g. after a [`reset`](Self::reset).
    pub fn finish(&mut self, result: Result<T, String>) -> bool {
        if !self.is_in_flight() {
            return false;
        }
        *self = match result {
            Ok(value) => Self::Loaded(value),
            Err(reason) => Self::Failed(reason),
        };
        true
    }

    /// Returns to `Idle`, abandoning any outstanding request.
    pub fn reset(&mut self) {
        *self = Self::Idle;
    }

    #[must_use]
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::InFlight)
    }

    /// Whether the fetch has settled either way.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Loaded(_) | Self::Failed(_))
    }

    #[must_use]
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Self::Loaded(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn failure(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) => Some(reason),
            _ => None,
        }
    }
}
