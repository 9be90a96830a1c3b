pub mod report;
pub mod track;
pub mod watch;

use std::{io::IsTerminal, path::PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use report::{process_report_command, ReportCommand};
use track::{process_track_command, TrackCommand};
use tracing::{info, level_filters::LevelFilter};
use watch::process_watch_command;

use crate::{
    storage::file_store::FileStore,
    tracker::ledger::RolloverPolicy,
    utils::{
        clock::DefaultClock,
        dir::create_application_default_path,
        logging::enable_logging,
    },
};

#[derive(Parser, Debug)]
#[command(name = "timex", version, long_about = None)]
#[command(about = "Tracks the time spent on projects and reports on it", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default tries $TIMEX_DIR, then $XDG_STATE_HOME or $HOME/.local/state"
    )]
    dir: Option<PathBuf>,
    #[arg(long, global = true, help = "Print logs to the console as well")]
    log_console: bool,
    #[arg(
        long,
        global = true,
        help = "Log level, for example \"debug\" or \"trace\". Falls back to $RUST_LOG, then \"info\""
    )]
    log_filter: Option<LevelFilter>,
    #[arg(
        long,
        global = true,
        default_value_t = RolloverPolicy::default(),
        help = "How a project left running on a previous day is closed"
    )]
    rollover: RolloverPolicy,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(flatten)]
    Track(TrackCommand),
    #[command(about = "Show the running project live. Stop with Ctrl-C")]
    Watch {},
    #[command(about = "Sum the logged time per project over a range of days")]
    Report {
        #[command(flatten)]
        command: ReportCommand,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let dir = match args.dir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            dir
        }
        None => create_application_default_path()?,
    };
    enable_logging(&dir, args.log_filter, args.log_console)?;
    info!("Using application directory {dir:?}");

    let store = FileStore::open(dir).await?;
    let styled = std::io::stdout().is_terminal();

    match args.commands {
        Commands::Track(command) => {
            let output = process_track_command(
                command,
                &store,
                Box::new(DefaultClock),
                args.rollover,
                styled,
            )
            .await?;
            print!("{output}");
            Ok(())
        }
        Commands::Watch {} => {
            process_watch_command(&store, Box::new(DefaultClock), args.rollover).await
        }
        Commands::Report { command } => process_report_command(command, &store, styled).await,
    }
}
