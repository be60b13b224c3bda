// Clock Port (for testability)

use chrono::{DateTime, Local};

/// Wall clock interface (allows fixed timestamps in tests)
pub trait Clock: Send + Sync {
    /// Current local time
    fn now(&self) -> DateTime<Local>;
}

/// System clock (production)
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Clock returning a settable instant
    pub struct FixedClock {
        now: Mutex<DateTime<Local>>,
    }

    impl FixedClock {
        pub fn new(now: DateTime<Local>) -> Self {
            Self {
                now: Mutex::new(now),
            }
        }

        pub fn set(&self, now: DateTime<Local>) {
            *self.now.lock().unwrap() = now;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Local> {
            *self.now.lock().unwrap()
        }
    }
}
