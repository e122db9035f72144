//! Stderr logger for the `log` facade.
//!
//! Output uses the bracketed tags of the rest of the tooling: `[info]`,
//! `[warn]`, `[error]`, `[debug]`. Records logged with target `step`, `run`
//! or `ok` print that tag instead of the level.

use log::{Level, LevelFilter, Metadata, Record};
use std::io::Write;

static LOGGER: StderrLogger = StderrLogger;

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let tag = tag(record);
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "[{tag}] {}", record.args());
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

fn tag<'a>(record: &Record<'a>) -> &'a str {
    match record.target() {
        t @ ("step" | "run" | "ok") if record.level() == Level::Info => t,
        _ => match record.level() {
            Level::Error => "error",
            Level::Warn => "warn",
            Level::Info => "info",
            Level::Debug => "debug",
            Level::Trace => "trace",
        },
    }
}

/// Pick the level from the -v/-q flags.
pub fn level(verbose: bool, quiet: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    }
}

pub fn init(max_level: LevelFilter) {
    // A second init (tests) keeps the first logger.
    let _ = log::set_logger(&LOGGER);
    log::set_max_level(max_level);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_selection() {
        assert_eq!(level(false, false), LevelFilter::Info);
        assert_eq!(level(true, false), LevelFilter::Debug);
        assert_eq!(level(false, true), LevelFilter::Warn);
    }

    #[test]
    fn test_step_target_replaces_level_tag() {
        assert_eq!(
            tag(&Record::builder()
                .args(format_args!("x"))
                .level(Level::Info)
                .target("step")
                .build()),
            "step"
        );
    }

    #[test]
    fn test_warn_keeps_level_tag_for_step_target() {
        assert_eq!(
            tag(&Record::builder()
                .args(format_args!("x"))
                .level(Level::Warn)
                .target("step")
                .build()),
            "warn"
        );
    }
}
