use chrono::Local;
use parkgate_types::Timestamp;

/// Source of entry and exit stamps.
pub trait Clock {
    fn now(&self) -> Timestamp;
}

/// Local wall clock.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Local::now()
    }
}
