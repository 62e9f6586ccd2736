use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic call counter.
///
/// Only ever goes up by one. A `u64` does not wrap within any realistic
/// process lifetime.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub const fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Decimal rendering of the current value.
    pub fn render(&self) -> String {
        self.get().to_string()
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}
