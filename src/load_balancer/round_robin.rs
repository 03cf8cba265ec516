//! Smooth weighted round-robin scheduling.
//!
//! The scheduler walks the pool slot by slot. Once per full lap it lowers a
//! shared threshold by the gcd of all weights and refills it with the
//! maximum weight when it runs out. A backend is picked whenever its weight
//! reaches the current threshold, so heavy backends are picked on every lap
//! while light ones only join in the lower laps. With weights `a=3, b=2` a
//! cycle looks like `[a, a, b, a, b]` rather than `[a, a, a, b, b]`.

use crate::load_balancer::{backend::Backend, LbError};

/// Cursor state carried between picks.
///
/// Only valid for the pool snapshot it was last [`reset`](Self::reset)
/// with; every pool mutation must reset it.
#[derive(Debug, Default)]
pub struct SmoothRoundRobin {
    /// Last selected slot. `None` before the first pick of a cycle.
    index: Option<usize>,
    /// Current weight threshold.
    current_weight: usize,
    /// Greatest common divisor of all weights.
    gcd: usize,
    /// Largest weight in the pool.
    max_weight: usize,
    /// Pool size the cached values were computed for.
    len: usize,
}

impl SmoothRoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh cycle over `backends`.
    pub fn reset(&mut self, backends: &[Backend]) {
        self.index = None;
        self.current_weight = 0;
        self.gcd = backends.iter().map(Backend::weight).fold(0, gcd);
        self.max_weight = backends.iter().map(Backend::weight).max().unwrap_or(0);
        self.len = backends.len();
    }

    /// Pick the next backend.
    ///
    /// Fails with [`LbError::NoAvailableServers`] when the pool is empty or
    /// every weight is zero; the cursor is left untouched in that case.
    pub fn next<'a>(&mut self, backends: &'a [Backend]) -> Result<&'a Backend, LbError> {
        assert_eq!(
            self.len,
            backends.len(),
            "scheduler state out of sync with pool"
        );

        if self.len == 0 || self.max_weight == 0 {
            return Err(LbError::NoAvailableServers);
        }

        loop {
            let index = self.index.map_or(0, |i| (i + 1) % self.len);
            self.index = Some(index);

            if index == 0 {
                self.current_weight = self.current_weight.saturating_sub(self.gcd);
                if self.current_weight == 0 {
                    self.current_weight = self.max_weight;
                }
            }

            if backends[index].weight() >= self.current_weight {
                return Ok(&backends[index]);
            }
        }
    }
}

fn gcd(a: usize, b: usize) -> usize {
    if b == 0 {
        a
    } else {
        gcd(b, a % b)
    }
}
