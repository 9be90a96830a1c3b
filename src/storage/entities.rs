use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::tracker::{
    duration::{format_iso8601, parse_iso8601, DurationError},
    ledger::{ActiveSession, DayLedger, LedgerError},
};

use super::ProjectId;

/// Ledger fields holding a project duration are named `#<project name>`.
pub const PROJECT_FIELD_PREFIX: &str = "#";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectEntity {
    pub id: ProjectId,
    pub name: String,
}

/// Content of the project file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectsEntity {
    pub next_id: u64,
    pub projects: Vec<ProjectEntity>,
}

/// On-disk form of a [DayLedger]. Durations are stored as ISO-8601 strings under
/// `#<project name>` keys next to the fixed fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayLedgerEntity {
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active: Option<String>,
    #[serde(rename = "startTime", default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveTime>,
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("Field {key:?} doesn't hold a valid duration")]
    Duration {
        key: String,
        #[source]
        source: DurationError,
    },
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl From<&DayLedger> for DayLedgerEntity {
    fn from(ledger: &DayLedger) -> Self {
        let fields = ledger
            .durations()
            .iter()
            .map(|(name, duration)| {
                (
                    format!("{PROJECT_FIELD_PREFIX}{name}"),
                    format_iso8601(*duration),
                )
            })
            .collect();

        DayLedgerEntity {
            date: ledger.date(),
            active: ledger.active().map(|v| v.project.clone()),
            start_time: ledger.active().map(|v| v.started_at),
            fields,
        }
    }
}

impl TryFrom<DayLedgerEntity> for DayLedger {
    type Error = EntityError;

    fn try_from(
        DayLedgerEntity {
            date,
            active,
            start_time,
            fields,
        }: DayLedgerEntity,
    ) -> Result<Self, Self::Error> {
        let mut durations = BTreeMap::new();
        for (key, value) in fields {
            let Some(name) = key.strip_prefix(PROJECT_FIELD_PREFIX) else {
                warn!("Ignoring unknown ledger field {key:?} for {date}");
                continue;
            };
            let duration =
                parse_iso8601(&value).map_err(|source| EntityError::Duration {
                    key: key.clone(),
                    source,
                })?;
            durations.insert(name.to_string(), duration);
        }

        let active = match (active, start_time) {
            (Some(project), Some(started_at)) => Some(ActiveSession {
                project,
                started_at,
            }),
            (Some(project), None) => {
                // Can't resume a session without knowing when it started.
                warn!("Ledger for {date} marks {project:?} active without a start time");
                None
            }
            (None, _) => None,
        };

        Ok(DayLedger::new(date, durations, active)?)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use anyhow::Result;
    use chrono::{Duration, NaiveDate, NaiveTime};
    use serde_json::json;

    use crate::tracker::ledger::{ActiveSession, DayLedger};

    use super::{DayLedgerEntity, EntityError};

    fn test_ledger() -> DayLedger {
        DayLedger::new(
            NaiveDate::from_ymd_opt(2014, 1, 1).unwrap(),
            BTreeMap::from([
                ("A".to_string(), Duration::hours(1)),
                ("B".to_string(), Duration::minutes(30)),
            ]),
            Some(ActiveSession {
                project: "A".into(),
                started_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            }),
        )
        .unwrap()
    }

    #[test]
    fn test_entity_layout() -> Result<()> {
        let entity = DayLedgerEntity::from(&test_ledger());
        let value = serde_json::to_value(&entity)?;
        assert_eq!(
            value,
            json!({
                "date": "2014-01-01",
                "#A": "PT1H",
                "#B": "PT30M",
                "active": "A",
                "startTime": "09:00:00",
            })
        );
        Ok(())
    }

    #[test]
    fn test_entity_decoding() -> Result<()> {
        let entity: DayLedgerEntity = serde_json::from_value(json!({
            "date": "2014-01-01",
            "#A": "PT1H",
            "#B": "PT30M",
            "active": "A",
            "startTime": "09:00:00",
        }))?;
        assert_eq!(DayLedger::try_from(entity)?, test_ledger());
        Ok(())
    }

    #[test]
    fn test_entity_without_active_fields() -> Result<()> {
        let entity: DayLedgerEntity = serde_json::from_value(json!({
            "date": "2014-01-02",
            "#A": "PT0S",
        }))?;
        let ledger = DayLedger::try_from(entity)?;
        assert_eq!(ledger.active(), None);
        assert_eq!(ledger.duration_of("A"), Some(Duration::zero()));

        let value = serde_json::to_value(DayLedgerEntity::from(&ledger))?;
        assert_eq!(value, json!({ "date": "2014-01-02", "#A": "PT0S" }));
        Ok(())
    }

    #[test]
    fn test_entity_rejects_bad_duration() -> Result<()> {
        let entity: DayLedgerEntity = serde_json::from_value(json!({
            "date": "2014-01-02",
            "#A": "one hour",
        }))?;
        assert!(matches!(
            DayLedger::try_from(entity),
            Err(EntityError::Duration { key, .. }) if key == "#A"
        ));
        Ok(())
    }

    #[test]
    fn test_entity_rejects_unknown_active_project() -> Result<()> {
        let entity: DayLedgerEntity = serde_json::from_value(json!({
            "date": "2014-01-02",
            "#A": "PT1H",
            "active": "C",
            "startTime": "10:00:00",
        }))?;
        assert!(matches!(
            DayLedger::try_from(entity),
            Err(EntityError::Ledger(_))
        ));
        Ok(())
    }

    #[test]
    fn test_entity_ignores_foreign_fields() -> Result<()> {
        let entity: DayLedgerEntity = serde_json::from_value(json!({
            "date": "2014-01-02",
            "#A": "PT1H",
            "comment": "left by hand",
        }))?;
        let ledger = DayLedger::try_from(entity)?;
        assert_eq!(ledger.durations().len(), 1);
        Ok(())
    }
}
