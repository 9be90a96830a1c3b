use chrono::{Duration, NaiveTime};

use crate::storage::ProjectId;

use super::duration::{format_clock, parse_clock, InvalidFormat};

/// Last representable moment of a day at second resolution. Sessions left running past
/// midnight are closed at this time.
pub const END_OF_DAY: NaiveTime = match NaiveTime::from_hms_opt(23, 59, 59) {
    Some(v) => v,
    None => panic!("23:59:59 is a valid time"),
};

/// Time accumulated by a single project during a day, plus the moment it was started if it's
/// currently running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeRecord {
    name: String,
    accumulated: Duration,
    active_since: Option<NaiveTime>,
    id: Option<ProjectId>,
}

impl TimeRecord {
    /// A freshly created project with nothing logged.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_duration(name, Duration::zero())
    }

    /// A record reconstructed from storage.
    pub fn with_duration(name: impl Into<String>, accumulated: Duration) -> Self {
        Self {
            name: name.into(),
            accumulated: accumulated.max(Duration::zero()),
            active_since: None,
            id: None,
        }
    }

    pub fn with_id(self, id: ProjectId) -> Self {
        Self {
            id: Some(id),
            ..self
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Option<ProjectId> {
        self.id
    }

    /// Assigned once, when the store first persists the project.
    pub fn set_id(&mut self, id: ProjectId) {
        debug_assert!(self.id.map_or(true, |v| v == id));
        self.id = Some(id);
    }

    /// Time logged before the current activation.
    pub fn accumulated(&self) -> Duration {
        self.accumulated
    }

    pub fn active_since(&self) -> Option<NaiveTime> {
        self.active_since
    }

    pub fn is_active(&self) -> bool {
        self.active_since.is_some()
    }

    /// Starts the clock. Does nothing if the record is already running.
    pub fn activate(&mut self, now: NaiveTime) {
        if self.active_since.is_none() {
            self.active_since = Some(now);
        }
    }

    /// Stops the clock and adds the elapsed session to the accumulated time.
    pub fn deactivate(&mut self, now: NaiveTime) {
        if let Some(start) = self.active_since.take() {
            self.accumulated += elapsed(start, now);
        }
    }

    /// Closes a session that was still running at the end of its day. The session up to
    /// `day_end` is added to the accumulated time, the same way [TimeRecord::deactivate] does.
    pub fn end_of_day(&mut self, day_end: NaiveTime) {
        self.deactivate(day_end);
    }

    /// Legacy variant of [TimeRecord::end_of_day]: the accumulated time is replaced by the
    /// session length instead of being added to.
    pub fn end_of_day_replacing(&mut self, day_end: NaiveTime) {
        if let Some(start) = self.active_since.take() {
            self.accumulated = elapsed(start, day_end);
        }
    }

    /// Overwrites the logged time with a user supplied `HH:MM:SS` value. The running state is
    /// kept as is. On error the record is left untouched.
    pub fn edit_duration(&mut self, text: &str) -> Result<(), InvalidFormat> {
        let duration = parse_clock(text)?;
        self.set_accumulated(duration);
        Ok(())
    }

    pub fn set_accumulated(&mut self, duration: Duration) {
        self.accumulated = duration.max(Duration::zero());
    }

    /// Forgets the running session without logging its time.
    pub fn discard_session(&mut self) {
        self.active_since = None;
    }

    /// Renames the record. The caller keeps names unique within a day.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Restores a running session read from storage.
    pub fn resume(&mut self, since: NaiveTime) {
        self.active_since = Some(since);
    }

    pub fn current_duration(&self, now: NaiveTime) -> Duration {
        match self.active_since {
            Some(start) => self.accumulated + elapsed(start, now),
            None => self.accumulated,
        }
    }

    /// `HH:MM:SS` rendering of [TimeRecord::current_duration].
    pub fn display_duration(&self, now: NaiveTime) -> String {
        format_clock(self.current_duration(now))
    }
}

/// Time between two moments of the same day, truncated to seconds. A clock that went
/// backwards counts as no time at all.
fn elapsed(start: NaiveTime, end: NaiveTime) -> Duration {
    Duration::seconds((end - start).num_seconds().max(0))
}
