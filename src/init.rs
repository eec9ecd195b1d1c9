use crate::layer::BackendLayer;
use crate::logger::Logger;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Settings for the `tracing` bridge installed by [`init_tracing_with_config`].
///
/// **Fields**
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt` layer is added
///   next to [`BackendLayer`] so events are also printed in human-readable
///   form on stdout.
/// - `with_target`: record each event's target as a `target` attribute.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub enable_stdout: bool,
    pub with_target: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self { enable_stdout: false, with_target: true }
    }
}

/// Error returned when the global subscriber cannot be installed.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    #[error("failed to install global tracing subscriber: {0}")]
    SetGlobal(#[from] tracing::subscriber::SetGlobalDefaultError),
}

/// Install a global `tracing` subscriber that forwards every event to
/// `logger`.
///
/// Prefer passing a [`Logger`] explicitly to the components that log.
/// This exists for libraries that are already instrumented with `tracing`
/// macros.
///
/// **Errors**
///
/// Fails if a global subscriber has already been installed.
pub fn init_tracing_with_config(logger: Logger, config: LayerConfig) -> Result<(), InitError> {
    let layer = BackendLayer::new(logger).with_target(config.with_target);
    let fmt_layer = config.enable_stdout.then(|| tracing_subscriber::fmt::layer());

    let subscriber = Registry::default().with(layer).with(fmt_layer);
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

/// Equivalent to [`init_tracing_with_config`] with [`LayerConfig::default`].
pub fn init_tracing(logger: Logger) -> Result<(), InitError> {
    init_tracing_with_config(logger, LayerConfig::default())
}
