//!  Storage is organized behind the [TimexStore] capability trait.
//!  The basic idea is:
//!   - Projects are a flat list of names with identifiers assigned by the store.
//!   - Every calendar date has at most one [DayLedger], which is always replaced as a whole.
//!   - [file_store::FileStore] keeps one JSON file per date, [memory_store::MemoryStore] keeps
//!     everything in memory and is used for testing.

pub mod entities;
pub mod file_store;
pub mod memory_store;

use std::{fmt::Display, future::Future, io, ops::Deref, path::PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::tracker::ledger::{DayLedger, LedgerError};

use entities::{EntityError, ProjectEntity};

/// Identifier of a project, assigned once by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

impl Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// The store couldn't be opened. Startup can't continue.
    #[error("Failed to initialize store at {path:?}")]
    Initialization {
        path: PathBuf,
        #[source]
        source: Box<StoreError>,
    },
    /// Schema setup found something it would have created. Not fatal.
    #[error("{0} already exists")]
    ConstraintAlreadyExists(String),
    #[error("Project {0} not found")]
    NotFound(ProjectId),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("Corrupt data in {path:?}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Failed to decode ledger for {date}")]
    Decode {
        date: NaiveDate,
        #[source]
        source: EntityError,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Interface for abstracting storage of projects and day ledgers.
pub trait TimexStore {
    fn list_projects(&self) -> impl Future<Output = Result<Vec<ProjectEntity>, StoreError>>;

    /// Creates a project and returns the identifier assigned to it.
    fn add_project(&self, name: &str) -> impl Future<Output = Result<ProjectId, StoreError>>;

    /// Fails with [StoreError::NotFound] when there is no such project.
    fn remove_project(&self, id: ProjectId) -> impl Future<Output = Result<(), StoreError>>;

    /// Fails with [StoreError::NotFound] when there is no such project.
    fn rename_project(
        &self,
        id: ProjectId,
        name: &str,
    ) -> impl Future<Output = Result<(), StoreError>>;

    /// Replaces the ledger stored for `ledger.date()`. Nothing of a previous save for the same
    /// date survives.
    fn save_ledger(&self, ledger: &DayLedger) -> impl Future<Output = Result<(), StoreError>>;

    fn get_ledger(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<DayLedger>, StoreError>>;

    /// The most recent ledger stored for a date before `date`.
    fn last_ledger_before(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<DayLedger>, StoreError>>;

    /// All stored ledgers from `start` to `end` (both inclusive) in ascending date order, read
    /// as one consistent snapshot. Dates without a ledger are skipped.
    fn ledgers_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<Vec<DayLedger>, StoreError>>;
}

impl<T: Deref> TimexStore for T
where
    T::Target: TimexStore,
{
    fn list_projects(&self) -> impl Future<Output = Result<Vec<ProjectEntity>, StoreError>> {
        self.deref().list_projects()
    }

    fn add_project(&self, name: &str) -> impl Future<Output = Result<ProjectId, StoreError>> {
        self.deref().add_project(name)
    }

    fn remove_project(&self, id: ProjectId) -> impl Future<Output = Result<(), StoreError>> {
        self.deref().remove_project(id)
    }

    fn rename_project(
        &self,
        id: ProjectId,
        name: &str,
    ) -> impl Future<Output = Result<(), StoreError>> {
        self.deref().rename_project(id, name)
    }

    fn save_ledger(&self, ledger: &DayLedger) -> impl Future<Output = Result<(), StoreError>> {
        self.deref().save_ledger(ledger)
    }

    fn last_ledger_before(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<DayLedger>, StoreError>> {
        self.deref().last_ledger_before(date)
    }

    fn get_ledger(
        &self,
        date: NaiveDate,
    ) -> impl Future<Output = Result<Option<DayLedger>, StoreError>> {
        self.deref().get_ledger(date)
    }

    fn ledgers_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> impl Future<Output = Result<Vec<DayLedger>, StoreError>> {
        self.deref().ledgers_between(start, end)
    }
}
