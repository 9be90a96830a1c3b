use std::{
    future,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use futures::{StreamExt, TryStreamExt};
use tokio::fs;
use tokio_stream::wrappers::ReadDirStream;
use tracing::{debug, info, instrument, warn};

use crate::{
    fs::operations::{write_atomically, DirLock},
    tracker::ledger::DayLedger,
    utils::time::{date_range, date_to_record_name, record_name_to_date},
};

use super::{
    entities::{DayLedgerEntity, ProjectEntity, ProjectsEntity},
    ProjectId, StoreError, TimexStore,
};

const RECORDS_DIR: &str = "records";
const PROJECTS_FILE: &str = "projects.json";
const LOCK_FILE: &str = ".lock";

/// How many ledger files a range read keeps in flight.
const READ_AHEAD: usize = 4;

/// The main realization of [TimexStore]. Layout of the store directory:
///  - `records/<YYYY-MM-DD>`: one JSON ledger per date.
///  - `projects.json`: known projects and the next identifier to hand out.
///  - `.lock`: advisory lock taken by every operation, exclusively by writers.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    records_dir: PathBuf,
}

impl FileStore {
    /// Opens the store in `dir`, creating it on first use. Any failure is reported as
    /// [StoreError::Initialization].
    pub async fn open(dir: PathBuf) -> Result<Self, StoreError> {
        match Self::initialize(&dir).await {
            Ok(store) => Ok(store),
            Err(e) => Err(StoreError::Initialization {
                path: dir,
                source: Box::new(e),
            }),
        }
    }

    async fn initialize(dir: &Path) -> Result<Self, StoreError> {
        fs::create_dir_all(dir).await?;
        let store = Self {
            dir: dir.to_owned(),
            records_dir: dir.join(RECORDS_DIR),
        };

        match store.create_date_index().await {
            Ok(()) => info!("Created date index in {:?}", store.records_dir),
            Err(StoreError::ConstraintAlreadyExists(what)) => debug!("{what} already exists"),
            Err(e) => return Err(e),
        }

        // Refuse to start on top of an unreadable project file.
        let lock = DirLock::shared(&store.lock_path()).await?;
        let projects = store.read_projects().await;
        lock.release().await?;
        projects?;

        Ok(store)
    }

    /// Ledgers are looked up by date through their file names, so the records directory is the
    /// index.
    async fn create_date_index(&self) -> Result<(), StoreError> {
        match fs::create_dir(&self.records_dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(
                StoreError::ConstraintAlreadyExists(format!("Date index {:?}", self.records_dir)),
            ),
            Err(e) => Err(e.into()),
        }
    }

    fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    fn projects_path(&self) -> PathBuf {
        self.dir.join(PROJECTS_FILE)
    }

    fn ledger_path(&self, date: NaiveDate) -> PathBuf {
        self.records_dir.join(date_to_record_name(date))
    }

    async fn read_projects(&self) -> Result<ProjectsEntity, StoreError> {
        let path = self.projects_path();
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(ProjectsEntity::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&raw).map_err(|source| StoreError::Corrupt { path, source })
    }

    async fn write_projects(&self, projects: &ProjectsEntity) -> Result<(), StoreError> {
        let path = self.projects_path();
        let raw = serde_json::to_vec_pretty(projects)
            .map_err(|source| StoreError::Corrupt { path: path.clone(), source })?;
        write_atomically(&path, &raw).await?;
        Ok(())
    }

    async fn read_ledger(&self, date: NaiveDate) -> Result<Option<DayLedger>, StoreError> {
        let path = self.ledger_path(date);
        let raw = match fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entity: DayLedgerEntity = serde_json::from_slice(&raw)
            .map_err(|source| StoreError::Corrupt { path: path.clone(), source })?;
        if entity.date != date {
            warn!("Ledger {path:?} claims to be for {}", entity.date);
        }
        DayLedger::try_from(entity)
            .map(Some)
            .map_err(|source| StoreError::Decode { date, source })
    }

    async fn write_ledger(&self, ledger: &DayLedger) -> Result<(), StoreError> {
        let path = self.ledger_path(ledger.date());
        let raw = serde_json::to_vec_pretty(&DayLedgerEntity::from(ledger))
            .map_err(|source| StoreError::Corrupt { path: path.clone(), source })?;
        write_atomically(&path, &raw).await?;
        Ok(())
    }

    async fn add_project_inner(&self, name: &str) -> Result<ProjectId, StoreError> {
        let mut projects = self.read_projects().await?;
        projects.next_id += 1;
        let id = ProjectId(projects.next_id);
        projects.projects.push(ProjectEntity {
            id,
            name: name.to_string(),
        });
        self.write_projects(&projects).await?;
        Ok(id)
    }

    async fn remove_project_inner(&self, id: ProjectId) -> Result<(), StoreError> {
        let mut projects = self.read_projects().await?;
        let index = projects
            .projects
            .iter()
            .position(|v| v.id == id)
            .ok_or(StoreError::NotFound(id))?;
        projects.projects.remove(index);
        self.write_projects(&projects).await
    }

    async fn rename_project_inner(&self, id: ProjectId, name: &str) -> Result<(), StoreError> {
        let mut projects = self.read_projects().await?;
        let project = projects
            .projects
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or(StoreError::NotFound(id))?;
        project.name = name.to_string();
        self.write_projects(&projects).await
    }

    async fn last_ledger_before_inner(
        &self,
        date: NaiveDate,
    ) -> Result<Option<DayLedger>, StoreError> {
        let latest = ReadDirStream::new(fs::read_dir(&self.records_dir).await?)
            .try_filter_map(|entry| future::ready(Ok(record_name_to_date(&entry.file_name()))))
            .try_fold(None, |latest: Option<NaiveDate>, found| {
                future::ready(Ok::<_, io::Error>(if found < date {
                    latest.max(Some(found))
                } else {
                    latest
                }))
            })
            .await?;
        match latest {
            Some(found) => self.read_ledger(found).await,
            None => Ok(None),
        }
    }

    async fn ledgers_between_inner(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DayLedger>, StoreError> {
        date_range(start, end)
            .map(|date| self.read_ledger(date))
            .buffered(READ_AHEAD)
            .try_filter_map(|v| future::ready(Ok(v)))
            .try_collect()
            .await
    }
}

impl TimexStore for FileStore {
    async fn list_projects(&self) -> Result<Vec<ProjectEntity>, StoreError> {
        let lock = DirLock::shared(&self.lock_path()).await?;
        let result = self.read_projects().await;
        lock.release().await?;
        Ok(result?.projects)
    }

    #[instrument(skip(self))]
    async fn add_project(&self, name: &str) -> Result<ProjectId, StoreError> {
        let lock = DirLock::exclusive(&self.lock_path()).await?;
        let result = self.add_project_inner(name).await;
        lock.release().await?;
        let id = result?;
        info!("Added project {name} with id {id}");
        Ok(id)
    }

    #[instrument(skip(self))]
    async fn remove_project(&self, id: ProjectId) -> Result<(), StoreError> {
        let lock = DirLock::exclusive(&self.lock_path()).await?;
        let result = self.remove_project_inner(id).await;
        lock.release().await?;
        result?;
        info!("Removed project {id}");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn rename_project(&self, id: ProjectId, name: &str) -> Result<(), StoreError> {
        let lock = DirLock::exclusive(&self.lock_path()).await?;
        let result = self.rename_project_inner(id, name).await;
        lock.release().await?;
        result?;
        info!("Renamed project {id} to {name}");
        Ok(())
    }

    #[instrument(skip_all, fields(date = %ledger.date()))]
    async fn save_ledger(&self, ledger: &DayLedger) -> Result<(), StoreError> {
        let lock = DirLock::exclusive(&self.lock_path()).await?;
        let result = self.write_ledger(ledger).await;
        lock.release().await?;
        result?;
        debug!("Stored ledger with {} projects", ledger.durations().len());
        Ok(())
    }

    async fn get_ledger(&self, date: NaiveDate) -> Result<Option<DayLedger>, StoreError> {
        let lock = DirLock::shared(&self.lock_path()).await?;
        let result = self.read_ledger(date).await;
        lock.release().await?;
        result
    }

    async fn last_ledger_before(&self, date: NaiveDate) -> Result<Option<DayLedger>, StoreError> {
        let lock = DirLock::shared(&self.lock_path()).await?;
        let result = self.last_ledger_before_inner(date).await;
        lock.release().await?;
        result
    }

    async fn ledgers_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DayLedger>, StoreError> {
        let lock = DirLock::shared(&self.lock_path()).await?;
        let result = self.ledgers_between_inner(start, end).await;
        lock.release().await?;
        result
    }
}
