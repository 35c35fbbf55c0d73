//! Structured, hierarchical logging setup. Generalizes the teacher's
//! `tracing_layer<W>` helper to take an explicit level rather than being
//! BPF-specific, and to honor `--silent`/`JELLO_SILENT` by forcing the
//! filter to `error`.

use std::io;
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{prelude::*, EnvFilter};
use tracing_tree::HierarchicalLayer;

use crate::config::LogLevel;

const TRACING_IDENT: usize = 2;
const DEFAULT_ENV_VAR: &str = "JELLO_LOG";

/// Returns a [`HierarchicalLayer`] for the given `writer`, indented the
/// same way across every sink this driver configures.
fn tracing_layer<W>(writer: W) -> HierarchicalLayer<W>
where
    W: for<'writer> MakeWriter<'writer> + 'static,
{
    HierarchicalLayer::new(TRACING_IDENT)
        .with_indent_lines(true)
        .with_writer(writer)
}

fn level_filter(level: LogLevel) -> Level {
    match level {
        LogLevel::Quiet => Level::ERROR,
        LogLevel::Error => Level::ERROR,
        LogLevel::Warning => Level::WARN,
        LogLevel::Info => Level::INFO,
        LogLevel::Debug => Level::DEBUG,
    }
}

/// Holds the non-blocking file-appender worker guard, if any, for the
/// process lifetime. Dropping it flushes buffered lines.
pub struct LoggingGuard(#[allow(dead_code)] Option<tracing_appender::non_blocking::WorkerGuard>);

/// Initialize the global tracing subscriber: an `EnvFilter` seeded from
/// `JELLO_LOG`, overridden by `level` when given, forced down to `error`
/// when `silent` is set, and a [`HierarchicalLayer`] writing to stderr
/// (plus a non-blocking file sink when `log_file` is set).
pub fn init(level: Option<LogLevel>, silent: bool, log_file: Option<&Path>) -> LoggingGuard {
    let filter = EnvFilter::try_from_env(DEFAULT_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let filter = match level {
        Some(level) if !silent => filter.add_directive(level_filter(level).into()),
        _ => filter,
    };
    let filter = if silent {
        EnvFilter::new("error")
    } else {
        filter
    };

    let registry = tracing_subscriber::registry().with(filter);

    match log_file.and_then(split_parent_and_filename) {
        Some((parent, file_name)) => {
            let file_appender = tracing_appender::rolling::never(parent, file_name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let subscriber = registry.with(tracing_layer(io::stderr)).with(tracing_layer(non_blocking));
            let _ = tracing::subscriber::set_global_default(subscriber);
            LoggingGuard(Some(guard))
        }
        None => {
            let subscriber = registry.with(tracing_layer(io::stderr));
            let _ = tracing::subscriber::set_global_default(subscriber);
            LoggingGuard(None)
        }
    }
}

fn split_parent_and_filename(path: &Path) -> Option<(PathBuf, PathBuf)> {
    let file_name = path.file_name()?;
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or_else(|| Path::new("."));
    Some((parent.to_path_buf(), PathBuf::from(file_name)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_filter_maps_quiet_and_error_to_the_same_level() {
        assert_eq!(level_filter(LogLevel::Quiet), Level::ERROR);
        assert_eq!(level_filter(LogLevel::Error), Level::ERROR);
        assert_eq!(level_filter(LogLevel::Debug), Level::DEBUG);
    }

    #[test]
    fn splits_log_file_into_parent_and_name() {
        let (parent, name) = split_parent_and_filename(Path::new("/tmp/logs/jello.log")).unwrap();
        assert_eq!(parent, PathBuf::from("/tmp/logs"));
        assert_eq!(name, PathBuf::from("jello.log"));
    }

    #[test]
    fn bare_filename_defaults_parent_to_current_dir() {
        let (parent, name) = split_parent_and_filename(Path::new("jello.log")).unwrap();
        assert_eq!(parent, PathBuf::from("."));
        assert_eq!(name, PathBuf::from("jello.log"));
    }
}
