use std::{io::Write, time::Duration};

use anyhow::Result;
use futures::{Stream, StreamExt};
use tokio::{select, time::interval};
use tokio_stream::wrappers::IntervalStream;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    storage::TimexStore,
    tracker::{duration::format_clock, ledger::RolloverPolicy, session::Session},
    utils::clock::Clock,
};

const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Prints the running project every second until Ctrl-C. Nothing is persisted apart from the
/// ledger written when the day changes.
pub async fn process_watch_command(
    store: impl TimexStore,
    clock: Box<dyn Clock>,
    policy: RolloverPolicy,
) -> Result<()> {
    let mut session = Session::open(store, clock, policy).await?;
    let cancellation = CancellationToken::new();
    let shutdown = tokio::spawn(detect_shutdown(cancellation.clone()));

    let ticks = IntervalStream::new(interval(TICK_INTERVAL)).map(|_| ());
    let result = watch_session(&mut session, ticks, &cancellation, &mut std::io::stdout()).await;

    shutdown.abort();
    info!("Stopped watching");
    result
}

/// Writes one line per tick with the live duration of the running project.
pub async fn watch_session<S: TimexStore>(
    session: &mut Session<S>,
    ticks: impl Stream<Item = ()>,
    cancellation: &CancellationToken,
    out: &mut impl Write,
) -> Result<()> {
    let ticks = ticks.take_until(cancellation.cancelled());
    tokio::pin!(ticks);

    while ticks.next().await.is_some() {
        if session.roll_over().await? {
            writeln!(out, "Day changed to {}", session.date())?;
        }
        match session.tick() {
            Some((name, duration)) => writeln!(out, "{name}\t{}", format_clock(duration))?,
            None => writeln!(out, "No project is running")?,
        }
        out.flush()?;
    }
    Ok(())
}

/// Detects signals sent to the process.
async fn detect_shutdown(cancellation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            cancellation.cancel();
        },
    };
}
