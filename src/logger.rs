use crate::backend::{Backend, BackendError};
use crate::level::Level;
use crate::record::{Fields, LogRecord};
use crate::value::Attr;
use std::fmt;
use std::sync::Arc;

/// Leveled, structured logger that application code talks to instead of a
/// concrete [`Backend`].
///
/// A `Logger` is immutable: baseline attributes are fixed at construction
/// and [`with_group`](Logger::with_group) / [`with_attrs`](Logger::with_attrs)
/// return new loggers that share the backend and, where possible, the
/// parent's attributes. Cloning is cheap and clones can be handed to
/// other components or threads freely.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use log_facade::capture::CaptureBackend;
/// use log_facade::level::Level;
/// use log_facade::logger::Logger;
/// use log_facade::value::{Attr, Value};
///
/// let backend = Arc::new(CaptureBackend::new(Level::Debug));
/// let logger = Logger::new(backend.clone(), [Attr::string("app", "x")]);
///
/// logger.info("Hello world", &[]);
/// logger.with_group("details").info("Hello world", &[Attr::int("cpus", 8)]);
///
/// let records = backend.records();
/// assert_eq!(records[1].fields.lookup(&["details", "cpus"]), Some(&Value::Int(8)));
/// ```
#[derive(Clone)]
pub struct Logger {
    backend: Arc<dyn Backend>,
    attrs: Arc<Fields>,
    groups: Arc<[String]>,
}

impl Logger {
    /// Bind a ready backend and the baseline attributes merged into every
    /// record this logger (and any logger derived from it) produces.
    pub fn new(backend: Arc<dyn Backend>, baseline: impl IntoIterator<Item = Attr>) -> Self {
        Logger {
            backend,
            attrs: Arc::new(baseline.into_iter().collect()),
            groups: Arc::from(Vec::new()),
        }
    }

    /// Derive a logger that nests everything subsequently logged through it
    /// under `name`. Calls chain: `with_group("a").with_group("b")` places
    /// attributes at `a.b.<key>`.
    ///
    /// An empty name adds no nesting level.
    pub fn with_group(&self, name: impl Into<String>) -> Logger {
        let name = name.into();
        if name.is_empty() {
            return self.clone();
        }

        let mut groups = self.groups.to_vec();
        groups.push(name);
        Logger {
            backend: Arc::clone(&self.backend),
            attrs: Arc::clone(&self.attrs),
            groups: Arc::from(groups),
        }
    }

    /// Derive a logger that attaches `attrs` to every record, placed under
    /// the currently open groups. The parent logger is left untouched.
    pub fn with_attrs(&self, attrs: impl IntoIterator<Item = Attr>) -> Logger {
        let attrs: Vec<Attr> = attrs.into_iter().collect();
        if attrs.is_empty() {
            return self.clone();
        }

        let mut fields = (*self.attrs).clone();
        fields.insert_under(&self.groups[..], attrs);
        Logger {
            backend: Arc::clone(&self.backend),
            attrs: Arc::new(fields),
            groups: Arc::clone(&self.groups),
        }
    }

    /// Whether the backend would write a record at `level`.
    pub fn enabled(&self, level: Level) -> bool {
        self.backend.enabled(level)
    }

    /// Build a record from the current time, `level`, `message`, the bound
    /// attributes and the call-site `attrs`, and hand it to the backend.
    ///
    /// Call-site attributes win over bound ones with the same name. Nothing
    /// is returned: write failures stay inside the backend.
    pub fn log(&self, level: Level, message: impl Into<String>, attrs: &[Attr]) {
        if !self.backend.enabled(level) {
            return;
        }

        let mut fields = (*self.attrs).clone();
        fields.insert_under(&self.groups[..], attrs.iter().cloned());
        self.backend.handle(LogRecord::new(level, message, fields));
    }

    pub fn debug(&self, message: impl Into<String>, attrs: &[Attr]) {
        self.log(Level::Debug, message, attrs);
    }

    pub fn info(&self, message: impl Into<String>, attrs: &[Attr]) {
        self.log(Level::Info, message, attrs);
    }

    pub fn warn(&self, message: impl Into<String>, attrs: &[Attr]) {
        self.log(Level::Warn, message, attrs);
    }

    pub fn error(&self, message: impl Into<String>, attrs: &[Attr]) {
        self.log(Level::Error, message, attrs);
    }

    /// Flush the backend.
    pub fn flush(&self) -> Result<(), BackendError> {
        self.backend.flush()
    }

    /// Guard that flushes the backend when it goes out of scope, on every
    /// exit path including early returns and unwinding.
    #[must_use = "the backend is flushed when the guard is dropped"]
    pub fn flush_guard(&self) -> FlushGuard {
        FlushGuard { backend: Arc::clone(&self.backend) }
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger")
            .field("attrs", &self.attrs)
            .field("groups", &self.groups)
            .finish_non_exhaustive()
    }
}

/// Flushes a backend on drop. See [`Logger::flush_guard`].
pub struct FlushGuard {
    backend: Arc<dyn Backend>,
}

impl Drop for FlushGuard {
    fn drop(&mut self) {
        if let Err(e) = self.backend.flush() {
            eprintln!("failed to flush log backend: {}", e);
        }
    }
}
