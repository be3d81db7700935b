//! Wall-clock source for audit timestamps and cache expiry.
//!
//! Production code reads the system clock. Tests swap in a manual clock
//! so TTL boundaries can be crossed without sleeping. Clones of a manual
//! clock share the same instant.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Source of "now".
#[derive(Debug, Clone, Default)]
pub enum Clock {
    /// The system wall clock.
    #[default]
    System,
    /// A manually driven instant, in milliseconds since the Unix epoch.
    Manual(Arc<AtomicI64>),
}

impl Clock {
    /// A manual clock frozen at `start`.
    pub fn manual(start: DateTime<Utc>) -> Self {
        Self::Manual(Arc::new(AtomicI64::new(start.timestamp_millis())))
    }

    /// The current instant.
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Self::System => Utc::now(),
            Self::Manual(millis) => Utc
                .timestamp_millis_opt(millis.load(Ordering::SeqCst))
                .single()
                .unwrap_or(DateTime::<Utc>::MIN_UTC),
        }
    }

    /// Move a manual clock forward by `by`. No effect on the system clock.
    pub fn advance(&self, by: Duration) {
        if let Self::Manual(millis) = self {
            millis.fetch_add(by.num_milliseconds(), Ordering::SeqCst);
        }
    }

    /// Set a manual clock to `at`. No effect on the system clock.
    pub fn set(&self, at: DateTime<Utc>) {
        if let Self::Manual(millis) = self {
            millis.store(at.timestamp_millis(), Ordering::SeqCst);
        }
    }
}
