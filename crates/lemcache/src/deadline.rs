//! Per-call deadlines for store operations

use std::time::{Duration, Instant};

/// Point in time by which a store call must finish
///
/// Passed explicitly into every [`KvStore`](crate::KvStore) call. An
/// unbounded deadline leaves timeouts to the store client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    /// No deadline; the call may block until the store answers
    pub fn none() -> Self {
        Self { at: None }
    }

    /// Deadline at a fixed instant
    pub fn at(instant: Instant) -> Self {
        Self { at: Some(instant) }
    }

    /// Deadline `timeout` from now
    pub fn after(timeout: Duration) -> Self {
        Self::at(Instant::now() + timeout)
    }

    /// The instant this deadline expires, if bounded
    pub fn instant(&self) -> Option<Instant> {
        self.at
    }

    /// Time left before expiry
    ///
    /// # Returns
    /// * `None` - Unbounded deadline
    /// * `Some(Duration::ZERO)` - Already expired
    pub fn remaining(&self) -> Option<Duration> {
        self.at
            .map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Check whether the deadline has passed
    pub fn is_expired(&self) -> bool {
        self.remaining().is_some_and(|left| left.is_zero())
    }
}
