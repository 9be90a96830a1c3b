use chrono::{Local, NaiveDateTime};
#[cfg(test)]
use mockall::automock;

/// Represents an entity responsible for providing the local wall-clock time across the
/// application. This allows it to be replaced during testing.
#[cfg_attr(test, automock)]
pub trait Clock: Sync + Send + 'static {
    fn now(&self) -> NaiveDateTime;
}

pub struct DefaultClock;

impl Clock for DefaultClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}
