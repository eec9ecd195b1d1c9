//! The record sequence emitted by the `log-facade-demo` binary.

use crate::logger::Logger;
use crate::value::Attr;
use chrono::{DateTime, Local, SecondsFormat, Utc};
use std::time::Instant;

pub const APP_NAME: &str = "my-awesome-app";

/// Baseline attributes bound to the demo logger.
pub fn sample_baseline(started_at: DateTime<Utc>) -> Vec<Attr> {
    vec![
        Attr::string("app", APP_NAME),
        Attr::timestamp("event_time", started_at),
        Attr::int("event_time_ns", started_at.timestamp_nanos_opt().unwrap_or_default()),
    ]
}

/// Emit the four demo records: a plain greeting, the same greeting with a
/// `details` group, a debug record and a `Finished` record carrying the
/// time elapsed since `started`.
#[allow(clippy::approx_constant)]
pub fn emit_sample_records(logger: &Logger, app_version: &str, cpus: i64, started: Instant) {
    logger.info("Hello world", &[]);

    logger.with_group("details").info(
        "Hello world",
        &[
            Attr::int("cpus", cpus),
            Attr::string("app_version", app_version),
            Attr::bool("is_debug", true),
            Attr::bool("is_prod", false),
            Attr::float("pi", 3.14),
            Attr::string(
                "event_time_iso",
                Local::now().to_rfc3339_opts(SecondsFormat::AutoSi, false),
            ),
        ],
    );

    logger.debug(
        "Hello world",
        &[Attr::int("cpus", cpus), Attr::string("app_version", app_version)],
    );

    logger.info("Finished", &[Attr::duration("elapsed", started.elapsed())]);
}
