use std::{fmt::Display, path::PathBuf};

use anyhow::Result;
use chrono::{DateTime, Duration, Local, NaiveDate, TimeZone, Weekday};
use chrono_english::parse_date_string;
use clap::{ArgGroup, CommandFactory, Parser, ValueEnum};
use now::DateTimeNow;
use tracing::info;

use crate::{
    storage::TimexStore,
    tracker::report::{report, ReportFormat},
};

use super::Args;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DateStyle {
    Uk,
    Us,
}

impl From<DateStyle> for chrono_english::Dialect {
    fn from(value: DateStyle) -> Self {
        match value {
            DateStyle::Uk => Self::Uk,
            DateStyle::Us => Self::Us,
        }
    }
}

impl Display for DateStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateStyle::Uk => write!(f, "uk"),
            DateStyle::Us => write!(f, "us"),
        }
    }
}

#[derive(Debug, Parser)]
#[command(group(
    ArgGroup::new("preset")
        .args(["this_week", "last_week", "this_month", "last_month"])
        .conflicts_with_all(["start_date", "end_date"])
))]
pub struct ReportCommand {
    #[arg(long, help = "Monday to Sunday of the current week. Used when no range is given")]
    this_week: bool,
    #[arg(long, help = "Monday to Sunday of the previous week")]
    last_week: bool,
    #[arg(long, help = "The whole current month")]
    this_month: bool,
    #[arg(long, help = "The whole previous month")]
    last_month: bool,
    #[arg(
        long = "start",
        short,
        help = "First day of the range. Examples are \"yesterday\", \"last monday\", \"15/03/2025\". Defaults to today"
    )]
    start_date: Option<String>,
    #[arg(
        long = "end",
        short,
        help = "Last day of the range. Examples are \"yesterday\", \"last monday\", \"15/03/2025\". Defaults to today"
    )]
    end_date: Option<String>,
    #[arg(long, default_value_t = DateStyle::Uk, help = "Style of dates used during parsing. For Uk it's day/month/year. For Us it's month/day/year")]
    date_style: DateStyle,
    #[arg(short, long, default_value_t = ReportFormat::default())]
    format: ReportFormat,
    #[arg(short, long, help = "Write the report into a file instead of the console")]
    output: Option<PathBuf>,
}

/// Command to process `report` command. Sums the time logged per project over the selected
/// range of days.
pub async fn process_report_command(
    command: ReportCommand,
    store: impl TimexStore,
    styled: bool,
) -> Result<()> {
    let (start, end) = command.resolve(Local::now())?;
    let result = report(&store, start, end).await?;

    match command.output {
        Some(path) => {
            tokio::fs::write(&path, result.render(command.format, false)).await?;
            info!("Report from {start} to {end} written to {path:?}");
        }
        None => print!("{}", result.render(command.format, styled)),
    }
    Ok(())
}

impl ReportCommand {
    /// Turns the selected preset or the `--start`/`--end` pair into an inclusive range of days
    /// relative to `now`.
    fn resolve<Tz: TimeZone>(&self, now: DateTime<Tz>) -> Result<(NaiveDate, NaiveDate)>
    where
        Tz::Offset: Copy,
    {
        let today = now.date_naive();
        let no_range = self.start_date.is_none() && self.end_date.is_none();

        if self.this_week || (no_range && !self.last_week && !self.this_month && !self.last_month)
        {
            let week = today.week(Weekday::Mon);
            return Ok((week.first_day(), week.last_day()));
        }
        if self.last_week {
            let week = (today - Duration::weeks(1)).week(Weekday::Mon);
            return Ok((week.first_day(), week.last_day()));
        }
        if self.this_month {
            return Ok((
                now.beginning_of_month().date_naive(),
                now.end_of_month().date_naive(),
            ));
        }
        if self.last_month {
            let previous = now.beginning_of_month() - Duration::days(1);
            return Ok((
                previous.beginning_of_month().date_naive(),
                previous.end_of_month().date_naive(),
            ));
        }

        let dialect: chrono_english::Dialect = self.date_style.into();
        let start = match &self.start_date {
            Some(text) => parse_date_string(text, now.clone(), dialect)
                .map_err(|e| validation_error(format!("Failed to validate start date {e}")))?
                .date_naive(),
            None => today,
        };
        let end = match &self.end_date {
            Some(text) => parse_date_string(text, now.clone(), dialect)
                .map_err(|e| validation_error(format!("Failed to validate end date {e}")))?
                .date_naive(),
            None => today,
        };
        if start > end {
            return Err(validation_error(format!(
                "Start of the range {start} is after its end {end}"
            )));
        }
        Ok((start, end))
    }
}

fn validation_error(message: String) -> anyhow::Error {
    Args::command()
        .error(clap::error::ErrorKind::ValueValidation, message)
        .into()
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use chrono::{DateTime, NaiveDate, TimeZone, Utc};
    use clap::Parser;

    use super::ReportCommand;

    /// Wednesday.
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 12, 15, 0, 0).unwrap()
    }

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn resolve(args: &[&str]) -> Result<(NaiveDate, NaiveDate)> {
        let command = ReportCommand::try_parse_from(["report"].iter().chain(args))?;
        command.resolve(now())
    }

    #[test]
    fn test_presets() -> Result<()> {
        assert_eq!(resolve(&[])?, (day(2025, 3, 10), day(2025, 3, 16)));
        assert_eq!(resolve(&["--this-week"])?, (day(2025, 3, 10), day(2025, 3, 16)));
        assert_eq!(resolve(&["--last-week"])?, (day(2025, 3, 3), day(2025, 3, 9)));
        assert_eq!(resolve(&["--this-month"])?, (day(2025, 3, 1), day(2025, 3, 31)));
        assert_eq!(resolve(&["--last-month"])?, (day(2025, 2, 1), day(2025, 2, 28)));
        Ok(())
    }

    #[test]
    fn test_explicit_range() -> Result<()> {
        assert_eq!(
            resolve(&["--start", "01/03/2025", "--end", "05/03/2025"])?,
            (day(2025, 3, 1), day(2025, 3, 5))
        );
        assert_eq!(
            resolve(&["--start", "03/01/2025", "--end", "03/05/2025", "--date-style", "us"])?,
            (day(2025, 3, 1), day(2025, 3, 5))
        );
        assert_eq!(
            resolve(&["--start", "yesterday"])?,
            (day(2025, 3, 11), day(2025, 3, 12))
        );
        Ok(())
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(resolve(&["--start", "05/03/2025", "--end", "01/03/2025"]).is_err());
        assert!(resolve(&["--start", "not a date"]).is_err());
        assert!(resolve(&["--this-week", "--last-month"]).is_err());
        assert!(resolve(&["--this-week", "--start", "yesterday"]).is_err());
    }
}
