use crate::backend::{Backend, BackendBuildError, BackendError};
use crate::level::{AtomicLevel, Level};
use crate::record::LogRecord;
use crate::sink::LogSink;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::JoinHandle;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration, MissedTickBehavior};

const MAX_BACKOFF: Duration = Duration::from_secs(10);

fn clamp_backoff(backoff: Duration) -> Duration {
    backoff.min(MAX_BACKOFF)
}

fn next_backoff(backoff: Duration) -> Duration {
    clamp_backoff(backoff.saturating_mul(2))
}

/// Buffering and delivery settings for [`ChannelBackend`].
///
/// **Fields**
/// - `buffer`: maximum number of records queued before new ones are dropped.
/// - `batch_size`: number of records delivered to the sink per batch.
/// - `flush_interval`: longest time a partial batch waits before delivery.
/// - `max_retries`: how many times a failing batch is retried before it is
///   discarded.
/// - `retry_backoff`: delay before the first retry; doubles up to 10s.
///   Larger values are clamped to 10s.
/// - `flush_timeout`: how long [`Backend::flush`] waits for the worker.
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    pub buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
    pub flush_timeout: Duration,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            max_retries: 3,
            retry_backoff: Duration::from_millis(100),
            flush_timeout: Duration::from_secs(5),
        }
    }
}

/// Snapshot of [`ChannelBackend`] counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Records handed to the backend, before level filtering.
    pub total: u64,
    /// Records accepted into the channel.
    pub enqueued: u64,
    /// Records dropped because the channel was full or closed.
    pub dropped: u64,
    /// Records delivered to the sink.
    pub sent: u64,
    /// Records discarded after exhausting retries.
    pub failed: u64,
}

#[derive(Default)]
struct Counters {
    total: AtomicU64,
    enqueued: AtomicU64,
    dropped: AtomicU64,
    sent: AtomicU64,
    failed: AtomicU64,
}

enum Control {
    Flush(std_mpsc::SyncSender<Result<(), String>>),
    Shutdown,
}

/// Non-blocking backend that queues records on a bounded channel and
/// delivers them in batches to an asynchronous [`LogSink`].
///
/// Delivery runs on a dedicated worker thread with its own Tokio runtime,
/// so the application thread only pays for a `try_send`. When the queue is
/// full the record is dropped and counted rather than blocking the caller.
pub struct ChannelBackend {
    level: AtomicLevel,
    sender: mpsc::Sender<LogRecord>,
    control: mpsc::UnboundedSender<Control>,
    counters: Arc<Counters>,
    flush_timeout: Duration,
    worker: Option<JoinHandle<()>>,
}

impl ChannelBackend {
    /// Start the worker and return the backend feeding it.
    ///
    /// Minimal thresholds are enforced for `buffer`, `batch_size` and
    /// `flush_interval` to avoid degenerate configurations.
    pub fn new(
        sink: Arc<dyn LogSink>,
        config: ChannelConfig,
        level: impl Into<AtomicLevel>,
    ) -> Result<Self, BackendBuildError> {
        let buffer = config.buffer.max(16);
        let batch_size = config.batch_size.max(1);
        let flush_interval = config.flush_interval.max(Duration::from_millis(10));

        let (tx, rx) = mpsc::channel::<LogRecord>(buffer);
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let counters = Arc::new(Counters::default());

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(BackendBuildError::Worker)?;

        let worker = Worker {
            sink,
            batch: Vec::with_capacity(batch_size),
            batch_size,
            max_retries: config.max_retries,
            retry_backoff: clamp_backoff(config.retry_backoff),
            counters: Arc::clone(&counters),
        };

        let handle = std::thread::Builder::new()
            .name("log-facade-worker".to_string())
            .spawn(move || runtime.block_on(worker.run(rx, control_rx, flush_interval)))
            .map_err(BackendBuildError::Worker)?;

        Ok(Self {
            level: level.into(),
            sender: tx,
            control: control_tx,
            counters,
            flush_timeout: config.flush_timeout,
            worker: Some(handle),
        })
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            total: self.counters.total.load(Ordering::Relaxed),
            enqueued: self.counters.enqueued.load(Ordering::Relaxed),
            dropped: self.counters.dropped.load(Ordering::Relaxed),
            sent: self.counters.sent.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }

    pub fn level(&self) -> &AtomicLevel {
        &self.level
    }
}

impl Backend for ChannelBackend {
    fn enabled(&self, level: Level) -> bool {
        self.level.enabled(level)
    }

    fn handle(&self, record: LogRecord) {
        self.counters.total.fetch_add(1, Ordering::Relaxed);
        if !self.enabled(record.level) {
            return;
        }

        match self.sender.try_send(record) {
            Ok(()) => {
                self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                eprintln!("log channel full, dropping log record");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                eprintln!("log worker stopped, dropping log record");
            }
        }
    }

    fn flush(&self) -> Result<(), BackendError> {
        let (reply_tx, reply_rx) = std_mpsc::sync_channel(1);
        self.control
            .send(Control::Flush(reply_tx))
            .map_err(|_| BackendError::WorkerGone)?;

        match reply_rx.recv_timeout(self.flush_timeout) {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BackendError::Sink(e)),
            Err(std_mpsc::RecvTimeoutError::Timeout) => Err(BackendError::FlushTimeout),
            Err(std_mpsc::RecvTimeoutError::Disconnected) => Err(BackendError::WorkerGone),
        }
    }
}

impl Drop for ChannelBackend {
    fn drop(&mut self) {
        let _ = self.control.send(Control::Shutdown);
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                eprintln!("log worker panicked during shutdown");
            }
        }
    }
}

struct Worker {
    sink: Arc<dyn LogSink>,
    batch: Vec<LogRecord>,
    batch_size: usize,
    max_retries: u32,
    retry_backoff: Duration,
    counters: Arc<Counters>,
}

impl Worker {
    async fn run(
        mut self,
        mut rx: mpsc::Receiver<LogRecord>,
        mut control: mpsc::UnboundedReceiver<Control>,
        flush_interval: Duration,
    ) {
        let mut ticker = tokio::time::interval(flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                Some(record) = rx.recv() => {
                    self.batch.push(record);
                    if self.batch.len() >= self.batch_size {
                        self.deliver().await;
                    }
                }
                cmd = control.recv() => {
                    let reply = match cmd {
                        Some(Control::Flush(reply)) => Some(reply),
                        Some(Control::Shutdown) | None => None,
                    };
                    let result = self.drain_and_flush(&mut rx).await;
                    match reply {
                        Some(reply) => {
                            let _ = reply.send(result);
                        }
                        None => {
                            if let Err(e) = result {
                                eprintln!("error flushing log sink on shutdown: {}", e);
                            }
                            return;
                        }
                    }
                }
                _ = ticker.tick() => {
                    if !self.batch.is_empty() {
                        self.deliver().await;
                    }
                }
            }
        }
    }

    /// Deliver every record already queued, then flush the sink.
    async fn drain_and_flush(&mut self, rx: &mut mpsc::Receiver<LogRecord>) -> Result<(), String> {
        while let Ok(record) = rx.try_recv() {
            self.batch.push(record);
            if self.batch.len() >= self.batch_size {
                self.deliver().await;
            }
        }
        if !self.batch.is_empty() {
            self.deliver().await;
        }
        self.sink.flush().await.map_err(|e| e.to_string())
    }

    /// Send the current batch, retrying from the first failed record with
    /// exponential backoff. The batch is always empty afterwards.
    async fn deliver(&mut self) {
        let mut backoff = self.retry_backoff;
        let mut attempt = 0;
        let mut next = 0;

        loop {
            let mut last_err = None;
            while next < self.batch.len() {
                match self.sink.send(&self.batch[next]).await {
                    Ok(()) => {
                        self.counters.sent.fetch_add(1, Ordering::Relaxed);
                        next += 1;
                    }
                    Err(e) => {
                        last_err = Some(e);
                        break;
                    }
                }
            }

            let Some(e) = last_err else {
                self.batch.clear();
                return;
            };

            if attempt >= self.max_retries {
                let lost = (self.batch.len() - next) as u64;
                self.counters.failed.fetch_add(lost, Ordering::Relaxed);
                eprintln!("log sink send failed, discarding {} records: {}", lost, e);
                self.batch.clear();
                return;
            }

            eprintln!("log sink send failed, retrying in {:?}: {}", backoff, e);
            sleep(backoff).await;
            backoff = next_backoff(backoff);
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Fields;
    use async_trait::async_trait;
    use std::error::Error;
    use std::sync::atomic::AtomicU32;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<String>>,
        flushes: AtomicU32,
        failures_left: AtomicU32,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl LogSink for RecordingSink {
        async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
            if let Some(delay) = self.delay {
                sleep(delay).await;
            }
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err("sink unavailable".into());
            }
            self.messages.lock().unwrap().push(record.message.clone());
            Ok(())
        }

        async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
            self.flushes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn record(level: Level, msg: &str) -> LogRecord {
        LogRecord::new(level, msg, Fields::new())
    }

    fn fast_config() -> ChannelConfig {
        ChannelConfig {
            retry_backoff: Duration::from_millis(1),
            ..ChannelConfig::default()
        }
    }

    #[test]
    fn test_backoff_never_exceeds_cap() {
        assert_eq!(clamp_backoff(Duration::from_secs(13)), MAX_BACKOFF);
        assert_eq!(clamp_backoff(Duration::from_millis(100)), Duration::from_millis(100));
        assert_eq!(next_backoff(Duration::from_millis(100)), Duration::from_millis(200));
        assert_eq!(next_backoff(Duration::from_secs(6)), MAX_BACKOFF);
        assert_eq!(next_backoff(MAX_BACKOFF), MAX_BACKOFF);
        assert_eq!(next_backoff(Duration::MAX), MAX_BACKOFF);
    }

    #[test]
    fn test_flush_delivers_everything_accepted() {
        let sink = Arc::new(RecordingSink::default());
        let backend = ChannelBackend::new(sink.clone(), fast_config(), Level::Debug).unwrap();

        for i in 0..10 {
            backend.handle(record(Level::Info, &format!("event {}", i)));
        }
        backend.flush().unwrap();

        let messages = sink.messages.lock().unwrap().clone();
        assert_eq!(messages.len(), 10);
        assert_eq!(messages[0], "event 0");
        assert_eq!(messages[9], "event 9");
        assert_eq!(sink.flushes.load(Ordering::SeqCst), 1);

        let stats = backend.stats();
        assert_eq!(stats.total, 10);
        assert_eq!(stats.enqueued, 10);
        assert_eq!(stats.sent, 10);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_level_filter_skips_channel() {
        let sink = Arc::new(RecordingSink::default());
        let backend = ChannelBackend::new(sink.clone(), fast_config(), Level::Warn).unwrap();

        backend.handle(record(Level::Info, "quiet"));
        backend.handle(record(Level::Error, "loud"));
        backend.flush().unwrap();

        assert_eq!(*sink.messages.lock().unwrap(), vec!["loud".to_string()]);
        let stats = backend.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.enqueued, 1);
    }

    #[test]
    fn test_transient_failure_is_retried_without_duplicates() {
        let sink = Arc::new(RecordingSink {
            failures_left: AtomicU32::new(2),
            ..RecordingSink::default()
        });
        let backend = ChannelBackend::new(sink.clone(), fast_config(), Level::Debug).unwrap();

        backend.handle(record(Level::Error, "a"));
        backend.handle(record(Level::Error, "b"));
        backend.flush().unwrap();

        assert_eq!(*sink.messages.lock().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(backend.stats().failed, 0);
    }

    #[test]
    fn test_batch_discarded_after_retries() {
        let sink = Arc::new(RecordingSink {
            failures_left: AtomicU32::new(u32::MAX),
            ..RecordingSink::default()
        });
        let config = ChannelConfig { max_retries: 1, ..fast_config() };
        let backend = ChannelBackend::new(sink.clone(), config, Level::Debug).unwrap();

        backend.handle(record(Level::Error, "never"));
        backend.flush().unwrap();

        assert!(sink.messages.lock().unwrap().is_empty());
        assert_eq!(backend.stats().failed, 1);
    }

    #[test]
    fn test_full_channel_drops_instead_of_blocking() {
        let sink = Arc::new(RecordingSink {
            delay: Some(Duration::from_millis(20)),
            ..RecordingSink::default()
        });
        let config = ChannelConfig { buffer: 16, batch_size: 1, ..fast_config() };
        let backend = ChannelBackend::new(sink, config, Level::Debug).unwrap();

        for i in 0..100 {
            backend.handle(record(Level::Info, &format!("burst {}", i)));
        }

        let stats = backend.stats();
        assert_eq!(stats.total, 100);
        assert!(stats.dropped > 0);
        assert_eq!(stats.enqueued + stats.dropped, 100);
    }

    #[test]
    fn test_drop_drains_pending_records() {
        let sink = Arc::new(RecordingSink::default());
        let config = ChannelConfig { flush_interval: Duration::from_secs(60), ..fast_config() };
        let backend = ChannelBackend::new(sink.clone(), config, Level::Debug).unwrap();

        backend.handle(record(Level::Info, "last words"));
        drop(backend);

        assert_eq!(*sink.messages.lock().unwrap(), vec!["last words".to_string()]);
        assert_eq!(sink.flushes.load(Ordering::SeqCst), 1);
    }
}
