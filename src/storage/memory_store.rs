use std::collections::BTreeMap;

use chrono::NaiveDate;
use tokio::sync::Mutex;
use tracing::debug;

use crate::tracker::ledger::DayLedger;

use super::{entities::ProjectEntity, ProjectId, StoreError, TimexStore};

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    projects: BTreeMap<ProjectId, String>,
    ledgers: BTreeMap<NaiveDate, DayLedger>,
}

/// [TimexStore] that keeps everything in memory. Every call holds the lock for its whole
/// duration, so calls are atomic with respect to each other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimexStore for MemoryStore {
    async fn list_projects(&self) -> Result<Vec<ProjectEntity>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .projects
            .iter()
            .map(|(id, name)| ProjectEntity {
                id: *id,
                name: name.clone(),
            })
            .collect())
    }

    async fn add_project(&self, name: &str) -> Result<ProjectId, StoreError> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let id = ProjectId(inner.next_id);
        inner.projects.insert(id, name.to_string());
        debug!("Added project {name} with id {id}");
        Ok(id)
    }

    async fn remove_project(&self, id: ProjectId) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .projects
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }

    async fn rename_project(&self, id: ProjectId, name: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let stored = inner.projects.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        debug!("Renamed project {id} from {stored} to {name}");
        *stored = name.to_string();
        Ok(())
    }

    async fn save_ledger(&self, ledger: &DayLedger) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner.ledgers.insert(ledger.date(), ledger.clone());
        Ok(())
    }

    async fn get_ledger(&self, date: NaiveDate) -> Result<Option<DayLedger>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.ledgers.get(&date).cloned())
    }

    async fn last_ledger_before(&self, date: NaiveDate) -> Result<Option<DayLedger>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.ledgers.range(..date).next_back().map(|(_, v)| v.clone()))
    }

    async fn ledgers_between(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<DayLedger>, StoreError> {
        if start > end {
            return Ok(vec![]);
        }
        let inner = self.inner.lock().await;
        Ok(inner.ledgers.range(start..=end).map(|(_, v)| v.clone()).collect())
    }
}
