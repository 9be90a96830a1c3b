use std::time::Duration as StdDuration;

use chrono::{Duration, NaiveDate};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::{
    storage::{ProjectId, StoreError, TimexStore},
    utils::clock::Clock,
};

use super::{
    duration::InvalidFormat,
    ledger::{load_ledger, save_ledger, LedgerError, ProjectList, RolloverPolicy},
    record::TimeRecord,
};

const SAVE_ATTEMPTS: usize = 3;
const SAVE_RETRY_DELAY: StdDuration = StdDuration::from_millis(100);

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Project {0:?} doesn't exist")]
    UnknownProject(String),
    #[error("Project {0:?} already exists")]
    DuplicateProject(String),
    #[error("Project name can't be empty")]
    EmptyName,
    #[error("Only today's projects can be tracked, this session is for {0}")]
    NotToday(NaiveDate),
    #[error(transparent)]
    InvalidFormat(#[from] InvalidFormat),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Row of [Session::statuses].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectStatus {
    pub name: String,
    pub id: Option<ProjectId>,
    pub duration: Duration,
    pub active: bool,
}

/// Owns the working set of one day and the project currently running in it. Every change is
/// written to the store as a full ledger for that day.
///
/// A session opened for today tracks time and follows the clock into the next day. A session
/// opened for any other day only allows editing logged durations.
pub struct Session<S> {
    store: S,
    clock: Box<dyn Clock>,
    policy: RolloverPolicy,
    date: NaiveDate,
    tracking: bool,
    projects: ProjectList,
    active: Option<String>,
}

impl<S: TimexStore> Session<S> {
    /// Loads today's projects and resumes whatever was running.
    pub async fn open(
        store: S,
        clock: Box<dyn Clock>,
        policy: RolloverPolicy,
    ) -> Result<Self, SessionError> {
        let today = clock.now().date();
        Self::open_day(store, clock, policy, today).await
    }

    /// Loads the working set for `date`. Days other than today only contain the projects
    /// found in their ledger.
    #[instrument(skip(store, clock))]
    pub async fn open_day(
        store: S,
        clock: Box<dyn Clock>,
        policy: RolloverPolicy,
        date: NaiveDate,
    ) -> Result<Self, SessionError> {
        let tracking = date == clock.now().date();
        if tracking {
            close_previous_day(&store, date, policy).await?;
        }
        let mut projects = if tracking {
            ProjectList::from_entities(store.list_projects().await?)
        } else {
            ProjectList::new()
        };
        let active = load_ledger(&store, date, &mut projects, tracking, policy).await?;

        Ok(Self {
            store,
            clock,
            policy,
            date,
            tracking,
            projects,
            active,
        })
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn is_tracking(&self) -> bool {
        self.tracking
    }

    pub fn projects(&self) -> &ProjectList {
        &self.projects
    }

    pub fn active(&self) -> Option<&TimeRecord> {
        self.active.as_deref().and_then(|v| self.projects.get(v))
    }

    /// Live durations of every project, computed without touching the store.
    pub fn statuses(&self) -> Vec<ProjectStatus> {
        let now = self.clock.now().time();
        self.projects
            .iter()
            .map(|record| ProjectStatus {
                name: record.name().to_string(),
                id: record.id(),
                duration: record.current_duration(now),
                active: self.active.as_deref() == Some(record.name()),
            })
            .collect()
    }

    /// Current duration of the running project.
    pub fn tick(&self) -> Option<(&str, Duration)> {
        let now = self.clock.now().time();
        self.active()
            .map(|record| (record.name(), record.current_duration(now)))
    }

    /// Moves a tracking session into the current day once the clock has passed midnight. The
    /// old day is closed as the store has it, so changes written by other invocations since
    /// this session loaded it are kept. Whatever was running is closed at the end of the old
    /// day, which is stored without an active marker. Returns whether the day changed.
    pub async fn roll_over(&mut self) -> Result<bool, SessionError> {
        let today = self.clock.now().date();
        if !self.tracking || today <= self.date {
            return Ok(false);
        }

        match self.store.get_ledger(self.date).await? {
            Some(ledger) => {
                let mut projects = ProjectList::from_entities(self.store.list_projects().await?);
                ledger.apply_to(&mut projects, false, self.policy);
                self.projects = projects;
            }
            None => {
                let running = self.active.as_deref();
                if let Some(record) = running.and_then(|v| self.projects.get_mut(v)) {
                    self.policy.close(record);
                }
            }
        }
        self.active = None;
        self.persist().await?;
        info!("Rolled over from {} to {today}", self.date);

        self.date = today;
        for record in self.projects.iter_mut() {
            record.set_accumulated(Duration::zero());
        }
        self.active = load_ledger(&self.store, today, &mut self.projects, true, self.policy).await?;
        Ok(true)
    }

    #[instrument(skip(self))]
    pub async fn add_project(&mut self, name: &str) -> Result<ProjectId, SessionError> {
        self.prepare_tracking().await?;
        let name = name.trim();
        if name.is_empty() {
            return Err(SessionError::EmptyName);
        }
        if self.projects.get(name).is_some_and(|v| v.id().is_some()) {
            return Err(SessionError::DuplicateProject(name.to_string()));
        }

        let id = self.store.add_project(name).await?;
        self.projects.get_or_insert(name).set_id(id);
        self.persist().await?;
        Ok(id)
    }

    #[instrument(skip(self))]
    pub async fn remove_project(&mut self, name: &str) -> Result<(), SessionError> {
        self.prepare_tracking().await?;
        let record = self
            .projects
            .get(name)
            .ok_or_else(|| SessionError::UnknownProject(name.to_string()))?;

        match record.id() {
            Some(id) => self.store.remove_project(id).await?,
            None => warn!("Project {name} isn't registered, dropping it from the ledger only"),
        }
        if self.active.as_deref() == Some(name) {
            self.active = None;
        }
        self.projects.remove(name);
        self.persist().await
    }

    /// Starts `name`, stopping whatever ran before it.
    #[instrument(skip(self))]
    pub async fn activate(&mut self, name: &str) -> Result<(), SessionError> {
        self.prepare_tracking().await?;
        if !self.projects.contains(name) {
            return Err(SessionError::UnknownProject(name.to_string()));
        }
        if self.active.as_deref() == Some(name) {
            return Ok(());
        }

        let now = self.clock.now().time();
        if let Some(previous) = self.active.take() {
            if let Some(record) = self.projects.get_mut(&previous) {
                record.deactivate(now);
                info!("Deactivated project {previous}");
            }
        }
        if let Some(record) = self.projects.get_mut(name) {
            record.activate(now);
            info!("Activated project {name}");
        }
        self.active = Some(name.to_string());
        self.persist().await
    }

    /// Stops the running project and returns its name.
    #[instrument(skip(self))]
    pub async fn deactivate(&mut self) -> Result<Option<String>, SessionError> {
        self.prepare_tracking().await?;
        let Some(name) = self.active.take() else {
            return Ok(None);
        };

        let now = self.clock.now().time();
        if let Some(record) = self.projects.get_mut(&name) {
            record.deactivate(now);
            info!("Deactivated project {name}");
        }
        self.persist().await?;
        Ok(Some(name))
    }

    /// Renames a project in the session's day. Registered projects are renamed in the store
    /// as well, ledgers of other days keep the old name.
    #[instrument(skip(self))]
    pub async fn rename_project(&mut self, old: &str, new: &str) -> Result<(), SessionError> {
        self.roll_over().await?;
        let new = new.trim();
        if new.is_empty() {
            return Err(SessionError::EmptyName);
        }
        if !self.projects.contains(old) {
            return Err(SessionError::UnknownProject(old.to_string()));
        }
        if old == new {
            return Ok(());
        }
        if self.projects.contains(new) {
            return Err(SessionError::DuplicateProject(new.to_string()));
        }

        let Some(record) = self.projects.get_mut(old) else {
            return Err(SessionError::UnknownProject(old.to_string()));
        };
        if let Some(id) = record.id() {
            self.store.rename_project(id, new).await?;
        }
        record.rename(new);
        if self.active.as_deref() == Some(old) {
            self.active = Some(new.to_string());
        }
        info!("Renamed project {old} to {new}");
        self.persist().await
    }

    /// Overwrites the logged time of `name` with a `HH:MM:SS` value.
    #[instrument(skip(self))]
    pub async fn edit_duration(&mut self, name: &str, text: &str) -> Result<(), SessionError> {
        self.roll_over().await?;
        let record = self
            .projects
            .get_mut(name)
            .ok_or_else(|| SessionError::UnknownProject(name.to_string()))?;
        record.edit_duration(text)?;
        info!("Set duration of {name} to {text}");
        self.persist().await
    }

    async fn prepare_tracking(&mut self) -> Result<(), SessionError> {
        if !self.tracking {
            return Err(SessionError::NotToday(self.date));
        }
        self.roll_over().await?;
        Ok(())
    }

    /// Writes the working set, retrying a few times before giving up. In-memory state is kept
    /// either way.
    async fn persist(&self) -> Result<(), SessionError> {
        let active = if self.tracking {
            self.active.as_deref()
        } else {
            None
        };

        let mut attempt = 1;
        loop {
            match save_ledger(&self.store, self.date, &self.projects, active).await {
                Ok(()) => return Ok(()),
                Err(StoreError::Ledger(e)) => return Err(e.into()),
                Err(e) if attempt < SAVE_ATTEMPTS => {
                    warn!(
                        "Failed to save ledger for {} (attempt {attempt}): {e:?}",
                        self.date
                    );
                    attempt += 1;
                    tokio::time::sleep(SAVE_RETRY_DELAY).await;
                }
                Err(e) => {
                    error!("Giving up on saving ledger for {}: {e:?}", self.date);
                    return Err(e.into());
                }
            }
        }
    }
}

/// Closes a session left running on the last day tracked before `today`, which happens when a
/// project is started on one day and the next command only runs on a later one.
async fn close_previous_day(
    store: &impl TimexStore,
    today: NaiveDate,
    policy: RolloverPolicy,
) -> Result<(), SessionError> {
    let Some(ledger) = store.last_ledger_before(today).await? else {
        return Ok(());
    };
    if ledger.active().is_none() {
        return Ok(());
    }

    let mut projects = ProjectList::new();
    ledger.apply_to(&mut projects, false, policy);
    save_ledger(store, ledger.date(), &projects, None).await?;
    info!("Closed session left running on {}", ledger.date());
    Ok(())
}
