use std::{collections::BTreeMap, fmt::Display};

use chrono::{Duration, NaiveDate, NaiveTime};
use clap::ValueEnum;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::storage::{entities::ProjectEntity, StoreError, TimexStore};

use super::record::{TimeRecord, END_OF_DAY};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Active project {0:?} has no entry in the ledger")]
    UnknownActiveProject(String),
    #[error("Project {0:?} is marked active but isn't running")]
    InactiveProject(String),
}

/// How a session left running on a past day is closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum RolloverPolicy {
    /// The session up to the end of the day is added to the logged time.
    #[default]
    Accumulate,
    /// The logged time is replaced by the session up to the end of the day.
    Replace,
}

impl Display for RolloverPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RolloverPolicy::Accumulate => write!(f, "accumulate"),
            RolloverPolicy::Replace => write!(f, "replace"),
        }
    }
}

impl RolloverPolicy {
    pub fn close(self, record: &mut TimeRecord) {
        match self {
            RolloverPolicy::Accumulate => record.end_of_day(END_OF_DAY),
            RolloverPolicy::Replace => record.end_of_day_replacing(END_OF_DAY),
        }
    }
}

/// The project that was running when a ledger was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub project: String,
    pub started_at: NaiveTime,
}

/// Snapshot of the time logged for every project on one date.
///
/// The durations never include a running session: the running project stores the time it had
/// before it was started, and the session is described by [ActiveSession].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayLedger {
    date: NaiveDate,
    durations: BTreeMap<String, Duration>,
    active: Option<ActiveSession>,
}

impl DayLedger {
    pub fn new(
        date: NaiveDate,
        durations: BTreeMap<String, Duration>,
        active: Option<ActiveSession>,
    ) -> Result<Self, LedgerError> {
        if let Some(session) = &active {
            if !durations.contains_key(&session.project) {
                return Err(LedgerError::UnknownActiveProject(session.project.clone()));
            }
        }
        Ok(Self {
            date,
            durations,
            active,
        })
    }

    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            durations: BTreeMap::new(),
            active: None,
        }
    }

    /// Builds the ledger persisted for a working set. `active` has to name one of the records
    /// and that record has to be running.
    pub fn from_records<'a>(
        date: NaiveDate,
        records: impl IntoIterator<Item = &'a TimeRecord>,
        active: Option<&str>,
    ) -> Result<Self, LedgerError> {
        let mut durations = BTreeMap::new();
        let mut session = None;
        for record in records {
            durations.insert(record.name().to_string(), record.accumulated());
            if Some(record.name()) == active {
                let started_at = record
                    .active_since()
                    .ok_or_else(|| LedgerError::InactiveProject(record.name().to_string()))?;
                session = Some(ActiveSession {
                    project: record.name().to_string(),
                    started_at,
                });
            }
        }

        match (active, session) {
            (Some(name), None) => Err(LedgerError::UnknownActiveProject(name.to_string())),
            (_, active) => Ok(Self {
                date,
                durations,
                active,
            }),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn durations(&self) -> &BTreeMap<String, Duration> {
        &self.durations
    }

    pub fn duration_of(&self, name: &str) -> Option<Duration> {
        self.durations.get(name).copied()
    }

    pub fn active(&self) -> Option<&ActiveSession> {
        self.active.as_ref()
    }

    /// Merges the ledger into a working set by name. Known records are updated in place,
    /// unknown ones are appended.
    ///
    /// For today the running session is resumed and its project name returned. For any other
    /// day the session is unfinished business from a previous run, so it gets closed using
    /// `policy` and nothing is returned.
    ///
    /// The ledger decides what is running: a session on any other record of the working set
    /// is dropped without adding its time.
    pub fn apply_to(
        &self,
        projects: &mut ProjectList,
        is_today: bool,
        policy: RolloverPolicy,
    ) -> Option<String> {
        let running = self.active.as_ref().map(|v| v.project.as_str());
        for record in projects.iter_mut() {
            if record.is_active() && Some(record.name()) != running {
                debug!("Dropping session of {} not present in ledger", record.name());
                record.discard_session();
            }
        }

        let mut active = None;
        for (name, duration) in &self.durations {
            let record = projects.get_or_insert(name);
            record.set_accumulated(*duration);

            let Some(session) = self.active.as_ref().filter(|v| &v.project == name) else {
                continue;
            };
            record.resume(session.started_at);
            if is_today {
                debug!("Resuming {name} started at {}", session.started_at);
                active = Some(name.clone());
            } else {
                info!("Closing {name} left running on {}", self.date);
                policy.close(record);
            }
        }
        active
    }
}

/// The working set of records shown and edited for one day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProjectList {
    records: Vec<TimeRecord>,
}

impl ProjectList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Idle records for every known project.
    pub fn from_entities(entities: impl IntoIterator<Item = ProjectEntity>) -> Self {
        entities
            .into_iter()
            .map(|v| TimeRecord::new(v.name).with_id(v.id))
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&TimeRecord> {
        self.records.iter().find(|v| v.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TimeRecord> {
        self.records.iter_mut().find(|v| v.name() == name)
    }

    pub fn get_or_insert(&mut self, name: &str) -> &mut TimeRecord {
        let index = match self.records.iter().position(|v| v.name() == name) {
            Some(index) => index,
            None => {
                self.records.push(TimeRecord::new(name));
                self.records.len() - 1
            }
        };
        &mut self.records[index]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn remove(&mut self, name: &str) -> Option<TimeRecord> {
        let index = self.records.iter().position(|v| v.name() == name)?;
        Some(self.records.remove(index))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TimeRecord> {
        self.records.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, TimeRecord> {
        self.records.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl FromIterator<TimeRecord> for ProjectList {
    fn from_iter<T: IntoIterator<Item = TimeRecord>>(iter: T) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a ProjectList {
    type Item = &'a TimeRecord;
    type IntoIter = std::slice::Iter<'a, TimeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Persists the working set as the ledger for `date`, replacing whatever was stored before.
#[instrument(skip(store, projects))]
pub async fn save_ledger(
    store: &impl TimexStore,
    date: NaiveDate,
    projects: &ProjectList,
    active: Option<&str>,
) -> Result<(), StoreError> {
    let ledger = DayLedger::from_records(date, projects, active)?;
    store.save_ledger(&ledger).await
}

/// Reads the ledger for `date` into `projects`. Returns the project that should keep running,
/// which is only ever the case when `is_today` is set.
#[instrument(skip(store, projects))]
pub async fn load_ledger(
    store: &impl TimexStore,
    date: NaiveDate,
    projects: &mut ProjectList,
    is_today: bool,
    policy: RolloverPolicy,
) -> Result<Option<String>, StoreError> {
    match store.get_ledger(date).await? {
        Some(ledger) => Ok(ledger.apply_to(projects, is_today, policy)),
        None => {
            debug!("No ledger stored for {date}");
            Ok(None)
        }
    }
}
