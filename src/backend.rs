use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Arc;

use crate::json::JsonBackend;
use crate::level::{AtomicLevel, Level};
use crate::record::LogRecord;

/// Destination that formats and writes [`LogRecord`]s.
///
/// A backend owns its buffering and output resources. `handle` never
/// reports failure to the caller: a record that cannot be written is the
/// backend's concern, so logging can never take down the workload that
/// emits it. Implementations must be safe to call from many threads.
pub trait Backend: Send + Sync {
    /// Whether a record at `level` would be written.
    fn enabled(&self, level: Level) -> bool;

    /// Accept a single record. Records below the configured minimum
    /// level are ignored.
    fn handle(&self, record: LogRecord);

    /// Make sure every record accepted so far has been written out.
    fn flush(&self) -> Result<(), BackendError>;
}

/// Error returned by [`Backend::flush`].
#[derive(thiserror::Error, Debug)]
pub enum BackendError {
    #[error("failed to flush log output: {0}")]
    Io(#[from] std::io::Error),

    #[error("timed out waiting for the log worker to flush")]
    FlushTimeout,

    #[error("log worker has shut down")]
    WorkerGone,

    #[error("log sink flush failed: {0}")]
    Sink(String),
}

/// Supported backend outputs that can be selected via DSN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendKind {
    Stdout,
    Stderr,
    File(PathBuf),
}

/// Backend configuration built from a DSN string.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// Selected output.
    pub kind: BackendKind,
    /// Raw DSN that was used to construct this config.
    pub dsn: String,
}

impl BackendConfig {
    pub fn new(kind: BackendKind, dsn: impl Into<String>) -> Self {
        BackendConfig { kind, dsn: dsn.into() }
    }
}

/// Parse a DSN string and infer the backend output from it.
///
/// Examples:
/// - "stdout" or "stdout://"
/// - "stderr" or "stderr://"
/// - "file:///var/log/app.jsonl"
pub fn parse_dsn(dsn: &str) -> Result<BackendConfig, DsnError> {
    let trimmed = dsn.trim();
    let lower = trimmed.to_ascii_lowercase();

    if lower == "stdout" || lower == "stdout://" {
        Ok(BackendConfig::new(BackendKind::Stdout, trimmed))
    } else if lower == "stderr" || lower == "stderr://" {
        Ok(BackendConfig::new(BackendKind::Stderr, trimmed))
    } else if lower.starts_with("file://") {
        let path = &trimmed["file://".len()..];
        if path.is_empty() {
            return Err(DsnError::MissingPath);
        }
        Ok(BackendConfig::new(BackendKind::File(PathBuf::from(path)), trimmed))
    } else {
        Err(DsnError::UnknownScheme(trimmed.to_string()))
    }
}

/// Error type returned when parsing a DSN.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DsnError {
    #[error("unknown or unsupported DSN scheme: {0:?}")]
    UnknownScheme(String),

    #[error("file DSN is missing a path")]
    MissingPath,
}

/// Error type returned when building a backend from configuration.
#[derive(thiserror::Error, Debug)]
pub enum BackendBuildError {
    #[error("failed to open log file {path:?}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start log worker: {0}")]
    Worker(#[source] std::io::Error),
}

/// Create a concrete [`Backend`] from a [`BackendConfig`].
///
/// This is the main entry point for applications that select an output
/// with a single DSN string instead of constructing backends manually.
pub fn make_backend_from_config(
    cfg: &BackendConfig,
    level: AtomicLevel,
) -> Result<Arc<dyn Backend>, BackendBuildError> {
    let backend = match &cfg.kind {
        BackendKind::Stdout => JsonBackend::stdout(level),
        BackendKind::Stderr => JsonBackend::stderr(level),
        BackendKind::File(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| BackendBuildError::OpenFile { path: path.clone(), source })?;
            JsonBackend::new(file, level)
        }
    };
    Ok(Arc::new(backend))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dsn_std_streams() {
        assert_eq!(parse_dsn("stdout").unwrap().kind, BackendKind::Stdout);
        assert_eq!(parse_dsn("STDERR://").unwrap().kind, BackendKind::Stderr);
    }

    #[test]
    fn test_parse_dsn_file() {
        let cfg = parse_dsn("file:///tmp/app.jsonl").unwrap();
        assert_eq!(cfg.kind, BackendKind::File(PathBuf::from("/tmp/app.jsonl")));
        assert_eq!(cfg.dsn, "file:///tmp/app.jsonl");
    }

    #[test]
    fn test_parse_dsn_errors() {
        assert_eq!(parse_dsn("file://").unwrap_err(), DsnError::MissingPath);
        assert!(matches!(parse_dsn("kafka://broker/topic"), Err(DsnError::UnknownScheme(_))));
    }

    #[test]
    fn test_make_backend_unopenable_file() {
        let cfg = BackendConfig::new(
            BackendKind::File(PathBuf::from("/nonexistent-dir/for/sure/app.jsonl")),
            "file:///nonexistent-dir/for/sure/app.jsonl",
        );
        let err = make_backend_from_config(&cfg, AtomicLevel::new(Level::Info)).err().unwrap();
        assert!(matches!(err, BackendBuildError::OpenFile { .. }));
    }

    #[test]
    fn test_make_backend_file_writes_records() {
        let path = std::env::temp_dir().join(format!("log-facade-{}.jsonl", std::process::id()));
        let _ = std::fs::remove_file(&path);
        let cfg = BackendConfig::new(BackendKind::File(path.clone()), "file");

        let backend = make_backend_from_config(&cfg, AtomicLevel::new(Level::Info)).unwrap();
        backend.handle(LogRecord::new(Level::Info, "to file", Default::default()));
        backend.flush().unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("\"msg\":\"to file\""));
        let _ = std::fs::remove_file(&path);
    }
}
