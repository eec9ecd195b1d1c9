use crate::backend::{Backend, BackendError};
use crate::level::{AtomicLevel, Level};
use crate::record::{Fields, LogRecord};
use crate::value::epoch_seconds;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::borrow::Cow;
use std::io::{self, BufWriter, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

const LINE_KEYS: [&str; 3] = ["level", "ts", "msg"];

/// Line layout written by [`JsonBackend`]: fixed keys first, then the
/// record's attributes flattened into the same object.
struct JsonLine<'a> {
    level: Level,
    ts: f64,
    msg: &'a str,
    fields: &'a Fields,
}

impl Serialize for JsonLine<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(LINE_KEYS.len() + self.fields.len()))?;
        map.serialize_entry("level", &self.level)?;
        map.serialize_entry("ts", &self.ts)?;
        map.serialize_entry("msg", self.msg)?;
        for (key, value) in self.fields {
            map.serialize_entry(&*attr_key(self.fields, key), value)?;
        }
        map.end()
    }
}

/// Top-level attribute name as written on the line. Names taken by the
/// fixed keys get a `fields.` prefix, repeated until the name is free.
fn attr_key<'a>(fields: &Fields, key: &'a str) -> Cow<'a, str> {
    if !LINE_KEYS.contains(&key) {
        return Cow::Borrowed(key);
    }
    let mut renamed = format!("fields.{}", key);
    while fields.get(&renamed).is_some() {
        renamed = format!("fields.{}", renamed);
    }
    Cow::Owned(renamed)
}

/// Synchronous backend that encodes each record as one JSON object per
/// line, e.g.
///
/// ```text
/// {"level":"info","ts":1699978120.97,"msg":"Hello world","app":"my-awesome-app"}
/// ```
///
/// Top-level attributes named `level`, `ts` or `msg` are written as
/// `fields.level`, `fields.ts` and `fields.msg` so every key on a line is
/// unique.
///
/// Output is buffered; call [`Backend::flush`] (or hold a
/// [`FlushGuard`](crate::logger::FlushGuard)) before the process exits.
pub struct JsonBackend {
    level: AtomicLevel,
    writer: Mutex<BufWriter<Box<dyn Write + Send>>>,
    auto_flush: bool,
    write_errors: AtomicU64,
}

impl JsonBackend {
    pub fn new(writer: impl Write + Send + 'static, level: impl Into<AtomicLevel>) -> Self {
        JsonBackend {
            level: level.into(),
            writer: Mutex::new(BufWriter::new(Box::new(writer))),
            auto_flush: false,
            write_errors: AtomicU64::new(0),
        }
    }

    pub fn stdout(level: impl Into<AtomicLevel>) -> Self {
        JsonBackend::new(io::stdout(), level)
    }

    pub fn stderr(level: impl Into<AtomicLevel>) -> Self {
        JsonBackend::new(io::stderr(), level)
    }

    /// Flush the underlying writer after every record instead of only on
    /// explicit [`Backend::flush`].
    pub fn with_auto_flush(mut self, auto_flush: bool) -> Self {
        self.auto_flush = auto_flush;
        self
    }

    /// Handle to the minimum level, for adjusting it at runtime.
    pub fn level(&self) -> &AtomicLevel {
        &self.level
    }

    /// Number of records that could not be written.
    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    fn encode(record: &LogRecord) -> serde_json::Result<Vec<u8>> {
        let line = JsonLine {
            level: record.level,
            ts: epoch_seconds(&record.timestamp),
            msg: &record.message,
            fields: &record.fields,
        };
        let mut buf = serde_json::to_vec(&line)?;
        buf.push(b'\n');
        Ok(buf)
    }
}

impl Backend for JsonBackend {
    fn enabled(&self, level: Level) -> bool {
        self.level.enabled(level)
    }

    fn handle(&self, record: LogRecord) {
        if !self.enabled(record.level) {
            return;
        }

        let buf = match Self::encode(&record) {
            Ok(buf) => buf,
            Err(e) => {
                self.write_errors.fetch_add(1, Ordering::Relaxed);
                eprintln!("failed to encode log record: {}", e);
                return;
            }
        };

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let result = writer.write_all(&buf).and_then(|_| {
            if self.auto_flush {
                writer.flush()
            } else {
                Ok(())
            }
        });
        if let Err(e) = result {
            self.write_errors.fetch_add(1, Ordering::Relaxed);
            eprintln!("failed to write log record: {}", e);
        }
    }

    fn flush(&self) -> Result<(), BackendError> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Attr;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    /// Writer that appends into a buffer shared with the test.
    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn lines(&self) -> Vec<serde_json::Value> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8(bytes)
                .unwrap()
                .lines()
                .map(|l| serde_json::from_str(l).unwrap())
                .collect()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    fn record(level: Level, msg: &str, attrs: Vec<Attr>) -> LogRecord {
        LogRecord::new(level, msg, attrs.into_iter().collect())
    }

    #[test]
    fn test_line_layout() {
        let out = SharedBuf::default();
        let backend = JsonBackend::new(out.clone(), Level::Debug);

        backend.handle(record(
            Level::Info,
            "Finished",
            vec![
                Attr::string("app", "my-awesome-app"),
                Attr::duration("elapsed", Duration::from_millis(250)),
                Attr::group("details", [Attr::int("cpus", 8)]),
            ],
        ));
        backend.flush().unwrap();

        let lines = out.lines();
        assert_eq!(lines.len(), 1);
        let line = &lines[0];
        assert_eq!(line["level"], "info");
        assert_eq!(line["msg"], "Finished");
        assert!(line["ts"].is_f64());
        assert_eq!(line["app"], "my-awesome-app");
        assert_eq!(line["elapsed"], json!(0.25));
        assert_eq!(line["details"], json!({"cpus": 8}));
    }

    #[test]
    fn test_fixed_keys_come_first() {
        let out = SharedBuf::default();
        let backend = JsonBackend::new(out.clone(), Level::Debug);
        backend.handle(record(Level::Warn, "m", vec![Attr::int("a", 1)]));
        backend.flush().unwrap();

        let raw = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert!(raw.starts_with("{\"level\":\"warn\",\"ts\":"));
        assert!(raw.trim_end().ends_with("\"msg\":\"m\",\"a\":1}"));
    }

    #[test]
    fn test_reserved_attr_names_are_prefixed() {
        let out = SharedBuf::default();
        let backend = JsonBackend::new(out.clone(), Level::Debug);
        backend.handle(record(
            Level::Info,
            "real",
            vec![
                Attr::string("msg", "shadow"),
                Attr::string("fields.msg", "taken"),
                Attr::int("ts", 7),
                Attr::group("details", [Attr::string("msg", "nested")]),
            ],
        ));
        backend.flush().unwrap();

        let raw = String::from_utf8(out.0.lock().unwrap().clone()).unwrap();
        assert_eq!(raw.matches("\"msg\":").count(), 2);
        assert_eq!(raw.matches("\"ts\":").count(), 1);

        let line = &out.lines()[0];
        assert_eq!(line["msg"], "real");
        assert!(line["ts"].is_f64());
        assert_eq!(line["fields.ts"], 7);
        assert_eq!(line["fields.msg"], "taken");
        assert_eq!(line["fields.fields.msg"], "shadow");
        assert_eq!(line["details"], json!({"msg": "nested"}));
    }

    #[test]
    fn test_below_min_level_is_not_written() {
        let out = SharedBuf::default();
        let backend = JsonBackend::new(out.clone(), Level::Info);
        assert!(!backend.enabled(Level::Debug));

        backend.handle(record(Level::Debug, "hidden", vec![]));
        backend.handle(record(Level::Error, "shown", vec![]));
        backend.flush().unwrap();

        let lines = out.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["msg"], "shown");
    }

    #[test]
    fn test_output_buffered_until_flush() {
        let out = SharedBuf::default();
        let backend = JsonBackend::new(out.clone(), Level::Debug);
        backend.handle(record(Level::Info, "buffered", vec![]));
        assert!(out.lines().is_empty());

        backend.flush().unwrap();
        assert_eq!(out.lines().len(), 1);
    }

    #[test]
    fn test_auto_flush_writes_through() {
        let out = SharedBuf::default();
        let backend = JsonBackend::new(out.clone(), Level::Debug).with_auto_flush(true);
        backend.handle(record(Level::Info, "now", vec![]));
        assert_eq!(out.lines().len(), 1);
    }

    #[test]
    fn test_write_failure_is_swallowed_and_counted() {
        let backend = JsonBackend::new(BrokenPipe, Level::Debug).with_auto_flush(true);
        backend.handle(record(Level::Error, "lost", vec![]));
        assert_eq!(backend.write_errors(), 1);
        assert!(backend.flush().is_err());
    }

    #[test]
    fn test_runtime_level_change() {
        let out = SharedBuf::default();
        let backend = JsonBackend::new(out.clone(), Level::Error);
        backend.handle(record(Level::Info, "dropped", vec![]));

        backend.level().set_level(Level::Debug);
        backend.handle(record(Level::Info, "kept", vec![]));
        backend.flush().unwrap();

        let lines = out.lines();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0]["msg"], "kept");
    }
}
