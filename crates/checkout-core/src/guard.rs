//! Attempt Guard
//!
//! Collapses duplicate activation triggers into a single in-flight attempt
//! and hands out the generation tag that identifies it. Staleness is
//! structural: an outcome carrying any generation other than the current
//! one is discarded by the flow, so late results from superseded attempts
//! can never overwrite newer state.

use thiserror::Error;

/// Returned by [`AttemptGuard::begin`] while an attempt is in flight
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq)]
#[error("An activation attempt is already in progress")]
pub struct AlreadyInProgress;

/// In-flight flag plus a monotonically increasing attempt generation
#[derive(Debug, Default)]
pub struct AttemptGuard {
    in_flight: bool,
    generation: u64,
}

impl AttemptGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the right to run one attempt.
    ///
    /// A second call while in flight is a no-op error, so near-simultaneous
    /// triggers collapse into one attempt. On success the returned
    /// generation tags everything the new attempt produces.
    pub fn begin(&mut self) -> Result<u64, AlreadyInProgress> {
        if self.in_flight {
            return Err(AlreadyInProgress);
        }
        self.in_flight = true;
        self.generation += 1;
        Ok(self.generation)
    }

    /// Release the guard once the attempt reached any outcome, timeout
    /// included. Idempotent.
    pub fn end(&mut self) {
        self.in_flight = false;
    }

    /// Whether an attempt currently holds the guard
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Generation of the most recently started attempt
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
