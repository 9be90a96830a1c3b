use std::{path::Path, sync::LazyLock};

use anyhow::Result;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::{
    fmt::{format::FmtSpan, writer::MakeWriterExt},
    EnvFilter,
};

pub const LOG_FILE_PREFIX: &str = "timex";

const LOG_TARGET: &str = env!("CARGO_CRATE_NAME");
const DEFAULT_LEVEL: &str = "info";
const KEPT_LOG_FILES: usize = 5;

/// Sends logs into daily rotated files under `<application_data_path>/logs` and, if
/// `show_std` is set, to stdout as well. See [filter_directive] for which events pass.
pub fn enable_logging(
    application_data_path: &Path,
    log_level: Option<LevelFilter>,
    show_std: bool,
) -> Result<()> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(KEPT_LOG_FILES)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(application_data_path.join("logs"))?;

    let stdout = std::io::stdout.with_filter(move |_| show_std);
    let directive = filter_directive(log_level, std::env::var("RUST_LOG").ok().as_deref());

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(directive)?)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(stdout.and(appender))
        .with_ansi(false)
        .init();
    Ok(())
}

/// Picks the filter in order: the `--log-filter` level, then `$RUST_LOG`, then `info`.
///
/// Levels only apply to this crate so dependencies stay quiet. A `$RUST_LOG` that names its
/// own targets (`timex=debug,fs4=trace`) is used as is.
fn filter_directive(level: Option<LevelFilter>, env: Option<&str>) -> String {
    if let Some(level) = level {
        return format!("{LOG_TARGET}={level}");
    }
    match env.map(str::trim).filter(|v| !v.is_empty()) {
        Some(v) if v.contains('=') || v.contains(',') => v.to_string(),
        Some(v) => format!("{LOG_TARGET}={v}"),
        None => format!("{LOG_TARGET}={DEFAULT_LEVEL}"),
    }
}

pub static TEST_LOGGING: LazyLock<()> = LazyLock::new(|| {
    tracing_subscriber::fmt()
        .with_max_level(LevelFilter::TRACE)
        .with_test_writer()
        .pretty()
        .init()
});

#[cfg(test)]
mod tests {
    use tracing::level_filters::LevelFilter;
    use tracing_subscriber::EnvFilter;

    use super::filter_directive;

    #[test]
    fn test_flag_wins_over_environment() {
        assert_eq!(
            filter_directive(Some(LevelFilter::TRACE), Some("warn")),
            "timex=trace"
        );
    }

    #[test]
    fn test_environment_level_is_scoped() {
        assert_eq!(filter_directive(None, Some(" debug ")), "timex=debug");
        assert_eq!(
            filter_directive(None, Some("timex=debug,fs4=trace")),
            "timex=debug,fs4=trace"
        );
        assert_eq!(filter_directive(None, Some("warn,timex=info")), "warn,timex=info");
    }

    #[test]
    fn test_default_level() {
        assert_eq!(filter_directive(None, None), "timex=info");
        assert_eq!(filter_directive(None, Some("")), "timex=info");
        assert!(EnvFilter::try_new(filter_directive(None, None)).is_ok());
    }
}
