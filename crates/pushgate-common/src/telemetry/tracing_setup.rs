//! Tracing and logging setup
//!
//! `RUST_LOG` always wins. Without it the filter is built from the preset:
//! the base level for our crates, the WebSocket and HTTP stacks capped at
//! `info`, and optionally every gateway frame at `trace`.

use crate::config::Environment;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, Layer, Registry,
};

/// Dependencies that log every frame or request at debug level
const NOISY_TARGETS: &[&str] = &["tungstenite", "tokio_tungstenite", "reqwest", "hyper", "hyper_util"];

/// Target the shard task logs frames under
const FRAME_TARGET: &str = "pushgate_gateway::shard";

/// Subscriber options
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub level: Level,
    /// One JSON object per line instead of human-readable output
    pub json: bool,
    /// Log span open and close, which shows each shard connection's lifetime
    pub span_events: bool,
    pub file_line: bool,
    pub thread_names: bool,
    pub thread_ids: bool,
    /// Log every inbound frame and heartbeat
    pub trace_frames: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            span_events: false,
            file_line: true,
            thread_names: false,
            thread_ids: false,
            trace_frames: false,
        }
    }
}

impl TracingConfig {
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            span_events: true,
            thread_names: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn production() -> Self {
        Self {
            json: true,
            file_line: false,
            ..Self::default()
        }
    }

    /// Pick the preset matching a deployment environment
    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Development => Self::development(),
            Environment::Staging => Self::default(),
            Environment::Production => Self::production(),
        }
    }

    #[must_use]
    pub fn with_frame_tracing(mut self, enabled: bool) -> Self {
        self.trace_frames = enabled;
        self
    }

    /// Filter directives used when `RUST_LOG` is unset
    #[must_use]
    pub fn directives(&self) -> String {
        let mut directives = vec![self.level.to_string().to_lowercase()];
        if self.level > Level::INFO {
            directives.extend(NOISY_TARGETS.iter().map(|target| format!("{target}=info")));
        }
        if self.trace_frames {
            directives.push(format!("{FRAME_TARGET}=trace"));
        }
        directives.join(",")
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

/// Install the default subscriber
///
/// # Panics
/// Panics if a global subscriber is already set.
pub fn init_tracing() {
    init_tracing_with_config(TracingConfig::default());
}

/// # Panics
/// Panics if a global subscriber is already set.
pub fn init_tracing_with_config(config: TracingConfig) {
    if let Err(e) = install(&config) {
        panic!("failed to install tracing subscriber: {e}");
    }
}

/// Install the default subscriber unless one is already set
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(TracingConfig::default())
}

pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    install(&config).map_err(|_| TracingError::AlreadyInitialized)
}

fn install(config: &TracingConfig) -> Result<(), TryInitError> {
    let output = fmt::layer()
        .with_file(config.file_line)
        .with_line_number(config.file_line)
        .with_thread_names(config.thread_names)
        .with_thread_ids(config.thread_ids)
        .with_span_events(config.span_events());

    let output: Box<dyn Layer<Registry> + Send + Sync> = if config.json {
        output.json().boxed()
    } else {
        output.boxed()
    };

    tracing_subscriber::registry()
        .with(output)
        .with(config.env_filter())
        .try_init()
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}
