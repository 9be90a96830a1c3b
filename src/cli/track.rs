use ansi_term::Style;
use anyhow::Result;
use chrono::NaiveDate;
use clap::Subcommand;

use crate::{
    storage::TimexStore,
    tracker::{
        duration::format_clock,
        ledger::RolloverPolicy,
        session::{ProjectStatus, Session},
    },
    utils::clock::Clock,
};

#[derive(Subcommand, Debug)]
pub enum TrackCommand {
    #[command(about = "List projects with the time logged on a day")]
    Projects {
        #[arg(long, help = "Show a past day instead of today, for example 2025-03-15")]
        date: Option<NaiveDate>,
    },
    #[command(about = "Register a new project")]
    Add { name: String },
    #[command(about = "Remove a project and its time from today")]
    Remove { name: String },
    #[command(about = "Start tracking a project, stopping the one currently running")]
    Start { name: String },
    #[command(about = "Stop the running project")]
    Stop {},
    #[command(about = "Rename a project, keeping its logged time")]
    Rename {
        old: String,
        new: String,
        #[arg(long, help = "Rename only in a past day's ledger, for example 2025-03-15")]
        date: Option<NaiveDate>,
    },
    #[command(about = "Overwrite the time logged for a project")]
    Edit {
        name: String,
        #[arg(help = "New duration as HH:MM:SS")]
        duration: String,
        #[arg(long, help = "Edit a past day instead of today, for example 2025-03-15")]
        date: Option<NaiveDate>,
    },
}

/// Runs a command against today's session, or against `--date` where the command allows it.
/// Returns what should be shown to the user.
pub async fn process_track_command(
    command: TrackCommand,
    store: impl TimexStore,
    clock: Box<dyn Clock>,
    policy: RolloverPolicy,
    styled: bool,
) -> Result<String> {
    let date = match &command {
        TrackCommand::Projects { date }
        | TrackCommand::Rename { date, .. }
        | TrackCommand::Edit { date, .. } => *date,
        _ => None,
    };
    let mut session = match date {
        Some(date) => Session::open_day(store, clock, policy, date).await?,
        None => Session::open(store, clock, policy).await?,
    };

    let output = match command {
        TrackCommand::Projects { .. } => {
            render_statuses(session.date(), &session.statuses(), styled)
        }
        TrackCommand::Add { name } => {
            let id = session.add_project(&name).await?;
            format!("Added project {} ({id})\n", name.trim())
        }
        TrackCommand::Remove { name } => {
            session.remove_project(&name).await?;
            format!("Removed project {name}\n")
        }
        TrackCommand::Start { name } => {
            session.activate(&name).await?;
            format!("Started {name}\n")
        }
        TrackCommand::Stop {} => {
            let status = session
                .deactivate()
                .await?
                .and_then(|name| {
                    session
                        .statuses()
                        .into_iter()
                        .find(|v| v.name == name)
                });
            match status {
                Some(status) => format!(
                    "Stopped {} at {}\n",
                    status.name,
                    format_clock(status.duration)
                ),
                None => "No project is running\n".to_string(),
            }
        }
        TrackCommand::Rename { old, new, .. } => {
            session.rename_project(&old, &new).await?;
            format!("Renamed {old} to {} on {}\n", new.trim(), session.date())
        }
        TrackCommand::Edit { name, duration, .. } => {
            session.edit_duration(&name, &duration).await?;
            format!("Set {name} to {duration} on {}\n", session.date())
        }
    };
    Ok(output)
}

/// Aligned table of projects with the running one marked by `*`.
pub fn render_statuses(date: NaiveDate, statuses: &[ProjectStatus], styled: bool) -> String {
    const NAME_HEADER: &str = "Project";

    let width = statuses
        .iter()
        .map(|v| v.name.chars().count())
        .chain([NAME_HEADER.len()])
        .max()
        .unwrap_or_default();
    let bold = if styled {
        Style::new().bold()
    } else {
        Style::new()
    };

    let header = format!("Date: {date}\n");
    if statuses.is_empty() {
        return header + "No projects\n";
    }
    let header = format!(
        "{header}{}\n",
        bold.paint(format!("  {NAME_HEADER:<width$}  Duration"))
    );
    statuses.iter().fold(header, |table, status| {
        let row = format!("{:<width$}  {}", status.name, format_clock(status.duration));
        if status.active {
            table + &format!("* {}\n", bold.paint(row))
        } else {
            table + &format!("  {row}\n")
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use anyhow::Result;
    use chrono::{Duration, NaiveDate, NaiveTime};

    use crate::{
        storage::{memory_store::MemoryStore, TimexStore},
        tracker::{
            ledger::{DayLedger, RolloverPolicy},
            session::ProjectStatus,
        },
        utils::clock::MockClock,
    };

    use super::{process_track_command, render_statuses, TrackCommand};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2014, 1, 1).unwrap()
    }

    fn clock(h: u32, m: u32) -> Box<MockClock> {
        let mut clock = MockClock::new();
        clock
            .expect_now()
            .return_const(today().and_time(NaiveTime::from_hms_opt(h, m, 0).unwrap()));
        Box::new(clock)
    }

    async fn run(store: &MemoryStore, command: TrackCommand, h: u32, m: u32) -> Result<String> {
        process_track_command(command, store, clock(h, m), RolloverPolicy::default(), false).await
    }

    #[test]
    fn test_render_statuses() {
        let statuses = vec![
            ProjectStatus {
                name: "Writing".into(),
                id: None,
                duration: Duration::minutes(90),
                active: true,
            },
            ProjectStatus {
                name: "A".into(),
                id: None,
                duration: Duration::zero(),
                active: false,
            },
        ];
        assert_eq!(
            render_statuses(today(), &statuses, false),
            "Date: 2014-01-01\n  Project  Duration\n* Writing  01:30:00\n  A        00:00:00\n"
        );
        assert_eq!(
            render_statuses(today(), &[], false),
            "Date: 2014-01-01\nNo projects\n"
        );
    }

    #[tokio::test]
    async fn test_command_flow() -> Result<()> {
        let store = MemoryStore::new();

        let output = run(&store, TrackCommand::Add { name: "A".into() }, 9, 0).await?;
        assert_eq!(output, "Added project A (1)\n");
        run(&store, TrackCommand::Start { name: "A".into() }, 9, 0).await?;

        let output = run(&store, TrackCommand::Projects { date: None }, 9, 45).await?;
        assert!(output.contains("* A        00:45:00"), "{output}");

        let output = run(&store, TrackCommand::Stop {}, 10, 0).await?;
        assert_eq!(output, "Stopped A at 01:00:00\n");
        let output = run(&store, TrackCommand::Stop {}, 10, 0).await?;
        assert_eq!(output, "No project is running\n");

        let ledger = store.get_ledger(today()).await?.unwrap();
        assert_eq!(ledger.duration_of("A"), Some(Duration::hours(1)));
        assert_eq!(ledger.active(), None);
        Ok(())
    }

    #[tokio::test]
    async fn test_edit_past_day() -> Result<()> {
        let store = MemoryStore::new();
        let yesterday = today().pred_opt().unwrap();
        store
            .save_ledger(&DayLedger::new(
                yesterday,
                BTreeMap::from([("A".to_string(), Duration::hours(1))]),
                None,
            )?)
            .await?;

        let output = run(
            &store,
            TrackCommand::Edit {
                name: "A".into(),
                duration: "02:00:00".into(),
                date: Some(yesterday),
            },
            9,
            0,
        )
        .await?;
        assert_eq!(output, "Set A to 02:00:00 on 2013-12-31\n");
        assert_eq!(
            store.get_ledger(yesterday).await?.unwrap().duration_of("A"),
            Some(Duration::hours(2))
        );

        let output = run(
            &store,
            TrackCommand::Projects {
                date: Some(yesterday),
            },
            9,
            0,
        )
        .await?;
        assert!(output.contains("  A        02:00:00"), "{output}");
        Ok(())
    }

    #[tokio::test]
    async fn test_rename() -> Result<()> {
        let store = MemoryStore::new();
        run(&store, TrackCommand::Add { name: "A".into() }, 9, 0).await?;
        run(&store, TrackCommand::Start { name: "A".into() }, 9, 0).await?;

        let output = run(
            &store,
            TrackCommand::Rename {
                old: "A".into(),
                new: "Writing".into(),
                date: None,
            },
            9,
            30,
        )
        .await?;
        assert_eq!(output, "Renamed A to Writing on 2014-01-01\n");

        let output = run(&store, TrackCommand::Stop {}, 10, 0).await?;
        assert_eq!(output, "Stopped Writing at 01:00:00\n");
        let projects = store.list_projects().await?;
        assert_eq!(projects.len(), 1);
        assert_eq!(projects[0].name, "Writing");
        Ok(())
    }

    #[tokio::test]
    async fn test_errors_are_surfaced() -> Result<()> {
        let store = MemoryStore::new();
        assert!(run(&store, TrackCommand::Start { name: "A".into() }, 9, 0)
            .await
            .is_err());
        run(&store, TrackCommand::Add { name: "A".into() }, 9, 0).await?;
        let result = run(
            &store,
            TrackCommand::Edit {
                name: "A".into(),
                duration: "1:00".into(),
                date: None,
            },
            9,
            0,
        )
        .await;
        assert!(result.is_err());
        Ok(())
    }
}
