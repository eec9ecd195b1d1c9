use std::process::ExitCode;
use std::time::Instant;

use chrono::Utc;

use log_facade::backend::make_backend_from_config;
use log_facade::env::Settings;
use log_facade::level::AtomicLevel;
use log_facade::sample::{emit_sample_records, sample_baseline};
use log_facade::Logger;

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("log-facade-demo: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let started = Instant::now();
    let started_at = Utc::now();

    let settings = Settings::from_env()?;
    let backend = make_backend_from_config(&settings.backend, AtomicLevel::new(settings.level))?;

    let logger = Logger::new(backend, sample_baseline(started_at));
    let _guard = logger.flush_guard();

    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1) as i64;
    emit_sample_records(&logger, &settings.app_version, cpus, started);

    Ok(())
}
