use std::{collections::BTreeMap, fmt::Display};

use ansi_term::Style;
use chrono::{Duration, NaiveDate};
use clap::ValueEnum;
use serde_json::{Map, Value};
use tracing::instrument;

use crate::storage::{StoreError, TimexStore};

use super::duration::format_clock;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Table,
    Csv,
    Json,
}

impl Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportFormat::Table => write!(f, "table"),
            ReportFormat::Csv => write!(f, "csv"),
            ReportFormat::Json => write!(f, "json"),
        }
    }
}

/// Time spent per project over an inclusive range of dates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    start: NaiveDate,
    end: NaiveDate,
    totals: BTreeMap<String, Duration>,
}

/// Sums the stored durations of every project from `start` to `end`, both inclusive.
///
/// Only persisted snapshots are used. A project that was running when its ledger was last
/// written contributes the time it had logged before the session started.
#[instrument(skip(store))]
pub async fn report(
    store: &impl TimexStore,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Report, StoreError> {
    let mut totals = BTreeMap::<String, Duration>::new();
    for ledger in store.ledgers_between(start, end).await? {
        for (name, duration) in ledger.durations() {
            *totals.entry(name.clone()).or_insert_with(Duration::zero) += *duration;
        }
    }
    Ok(Report { start, end, totals })
}

impl Report {
    pub fn new(start: NaiveDate, end: NaiveDate, totals: BTreeMap<String, Duration>) -> Self {
        Self { start, end, totals }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn totals(&self) -> &BTreeMap<String, Duration> {
        &self.totals
    }

    pub fn total_of(&self, name: &str) -> Option<Duration> {
        self.totals.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.totals.is_empty()
    }

    pub fn render(&self, format: ReportFormat, styled: bool) -> String {
        match format {
            ReportFormat::Table => self.to_table(styled),
            ReportFormat::Csv => self.to_csv(),
            ReportFormat::Json => self.to_json().to_string(),
        }
    }

    /// `name,HH:MM:SS` lines. Names aren't quoted, so a comma in a name breaks the row.
    pub fn to_csv(&self) -> String {
        self.totals
            .iter()
            .map(|(name, duration)| format!("{name},{}\n", format_clock(*duration)))
            .collect()
    }

    /// Flat object mapping project names to `HH:MM:SS` strings.
    pub fn to_json(&self) -> Value {
        let object = self
            .totals
            .iter()
            .map(|(name, duration)| (name.clone(), Value::String(format_clock(*duration))))
            .collect::<Map<_, _>>();
        Value::Object(object)
    }

    /// Human readable table, longest running projects first.
    pub fn to_table(&self, styled: bool) -> String {
        const NAME_HEADER: &str = "Project";
        const DURATION_HEADER: &str = "Duration";

        let mut rows = self
            .totals
            .iter()
            .map(|(name, duration)| (name.as_str(), *duration))
            .collect::<Vec<_>>();
        rows.sort_by(|left, right| right.1.cmp(&left.1).then_with(|| left.0.cmp(right.0)));

        let width = rows
            .iter()
            .map(|(name, _)| name.chars().count())
            .chain([NAME_HEADER.len()])
            .max()
            .unwrap_or_default();

        let header_style = if styled {
            Style::new().bold()
        } else {
            Style::new()
        };

        let header = format!(
            "Start: {}, end: {}\n{}\n",
            self.start,
            self.end,
            header_style.paint(format!("{NAME_HEADER:<width$}  {DURATION_HEADER}"))
        );
        rows.into_iter().fold(header, |table, (name, duration)| {
            table + &format!("{name:<width$}  {}\n", format_clock(duration))
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use anyhow::Result;
    use chrono::{Duration, NaiveDate, NaiveTime};
    use serde_json::json;

    use crate::{
        storage::{memory_store::MemoryStore, TimexStore},
        tracker::{
            ledger::{save_ledger, ActiveSession, DayLedger, ProjectList},
            record::TimeRecord,
        },
    };

    use super::{report, Report, ReportFormat};

    /// Adds up two reports over adjacent ranges.
    fn merge(left: Report, right: &Report) -> Report {
        let mut totals = left.totals().clone();
        for (name, duration) in right.totals() {
            *totals.entry(name.clone()).or_insert_with(Duration::zero) += *duration;
        }
        Report::new(left.start().min(right.start()), left.end().max(right.end()), totals)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2014, 1, d).unwrap()
    }

    fn ledger(date: NaiveDate, entries: &[(&str, i64)]) -> DayLedger {
        DayLedger::new(
            date,
            entries
                .iter()
                .map(|(name, minutes)| (name.to_string(), Duration::minutes(*minutes)))
                .collect(),
            None,
        )
        .unwrap()
    }

    /// Ledgers for the 1st to the 6th of January with gaps on the 3rd and 5th.
    async fn filled_store() -> Result<MemoryStore> {
        let store = MemoryStore::new();
        store.save_ledger(&ledger(day(1), &[("A", 60), ("B", 30)])).await?;
        store.save_ledger(&ledger(day(2), &[("A", 15), ("C", 45)])).await?;
        store.save_ledger(&ledger(day(4), &[("B", 5)])).await?;
        store.save_ledger(&ledger(day(6), &[("A", 1), ("B", 1), ("C", 1)])).await?;
        Ok(store)
    }

    fn totals(entries: &[(&str, i64)]) -> BTreeMap<String, Duration> {
        entries
            .iter()
            .map(|(name, minutes)| (name.to_string(), Duration::minutes(*minutes)))
            .collect()
    }

    #[tokio::test]
    async fn test_single_day_equals_ledger() -> Result<()> {
        let store = filled_store().await?;
        let result = report(&store, day(1), day(1)).await?;
        assert_eq!(result.totals(), &totals(&[("A", 60), ("B", 30)]));
        Ok(())
    }

    #[tokio::test]
    async fn test_range_sums_by_name() -> Result<()> {
        let store = filled_store().await?;
        let result = report(&store, day(1), day(6)).await?;
        assert_eq!(result.totals(), &totals(&[("A", 76), ("B", 36), ("C", 46)]));
        assert_eq!(result.total_of("C"), Some(Duration::minutes(46)));
        assert_eq!(result.total_of("D"), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_empty_range() -> Result<()> {
        let store = filled_store().await?;
        assert!(report(&store, day(3), day(3)).await?.is_empty());
        assert!(report(&store, day(6), day(1)).await?.is_empty());
        assert!(report(&store, day(20), day(31)).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_additive_over_consecutive_ranges() -> Result<()> {
        let store = filled_store().await?;
        for split in 1..6 {
            let left = report(&store, day(1), day(split)).await?;
            let right = report(&store, day(split + 1), day(6)).await?;
            let whole = report(&store, day(1), day(6)).await?;
            assert_eq!(merge(left, &right), whole, "split after day {split}");
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_running_project_counts_snapshot() -> Result<()> {
        let store = MemoryStore::new();
        let mut a = TimeRecord::with_duration("A", Duration::hours(1));
        a.activate(NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        let projects: ProjectList = [a, TimeRecord::with_duration("B", Duration::minutes(30))]
            .into_iter()
            .collect();
        save_ledger(&store, day(1), &projects, Some("A")).await?;

        let stored = store.get_ledger(day(1)).await?.unwrap();
        assert_eq!(
            stored.active(),
            Some(&ActiveSession {
                project: "A".into(),
                started_at: NaiveTime::from_hms_opt(9, 0, 0).unwrap()
            })
        );

        let result = report(&store, day(1), day(1)).await?;
        assert_eq!(result.to_json(), json!({"A": "01:00:00", "B": "00:30:00"}));
        Ok(())
    }

    #[test]
    fn test_csv_export() {
        let report = Report::new(day(1), day(7), totals(&[("B", 30), ("A", 125)]));
        assert_eq!(report.to_csv(), "A,02:05:00\nB,00:30:00\n");
        assert_eq!(report.render(ReportFormat::Csv, true), report.to_csv());
    }

    #[test]
    fn test_json_export() {
        let report = Report::new(day(1), day(7), totals(&[("B", 30), ("A", 125)]));
        assert_eq!(
            report.render(ReportFormat::Json, false),
            r#"{"A":"02:05:00","B":"00:30:00"}"#
        );
    }

    #[test]
    fn test_table_export() {
        let report = Report::new(
            day(1),
            day(7),
            totals(&[("Short", 30), ("A longer name", 125)]),
        );
        assert_eq!(
            report.to_table(false),
            "Start: 2014-01-01, end: 2014-01-07\n\
             Project        Duration\n\
             A longer name  02:05:00\n\
             Short          00:30:00\n"
        );
    }
}
