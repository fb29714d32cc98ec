//! Process-wide monotonic id counter
//!
//! Watch ids and generated thread ids come from the same counter. The counter
//! never wraps: once it has handed out [`MAX_SAFE_INTEGER`] every further call
//! fails with [`DomesticatedError::MaxIdExhausted`].

use crate::error::{DomesticatedError, Result};
use std::sync::atomic::{AtomicU64, Ordering};

/// Largest integer a JSON number can carry without losing precision (2^53 - 1)
pub const MAX_SAFE_INTEGER: u64 = (1 << 53) - 1;

static GLOBAL_IDS: IdGenerator = IdGenerator::new();

/// Stateful counter yielding strictly increasing ids
#[derive(Debug)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    /// Create a counter whose first id is 1
    pub const fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create a counter whose first id is `initial + 1`
    pub const fn starting_at(initial: u64) -> Self {
        Self {
            last: AtomicU64::new(initial),
        }
    }

    /// Hand out the next id
    pub fn next_id(&self) -> Result<u64> {
        self.last
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |id| {
                (id < MAX_SAFE_INTEGER).then_some(id + 1)
            })
            .map(|previous| previous + 1)
            .map_err(|_| DomesticatedError::MaxIdExhausted)
    }

    /// Last id handed out (0 if none yet)
    pub fn last_id(&self) -> u64 {
        self.last.load(Ordering::SeqCst)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// The counter shared by every component in the process
pub fn global_ids() -> &'static IdGenerator {
    &GLOBAL_IDS
}

/// Next id from the process-wide counter
pub fn next_global_id() -> Result<u64> {
    GLOBAL_IDS.next_id()
}
