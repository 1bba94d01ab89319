//! Structured logging.
//!
//! JSON output carries consistent fields so log shippers can parse them:
//! - `timestamp`, `level`, `target`
//! - `service`: service name from [`TelemetryConfig`]
//! - `identity`: record outpoint, when the event concerns one record
//! - Additional context fields

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{TelemetryConfig, TelemetryError};

/// Structured logger handle
pub struct StructuredLogger {
    service_name: String,
}

impl StructuredLogger {
    /// Service name the logger was initialised for.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }
}

/// Build the env filter: `RUST_LOG` wins over the configured level.
pub(crate) fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Config(e.to_string()))
}

/// Install the global tracing subscriber.
pub fn init_logging(config: &TelemetryConfig) -> Result<StructuredLogger, TelemetryError> {
    let filter = env_filter(config)?;

    if !config.console_output {
        tracing_subscriber::registry()
            .with(filter)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .with_ansi(true);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::LoggingInit(e.to_string()))?;
    }

    tracing::debug!(
        service = %config.service_name,
        json_logs = config.json_logs,
        "Structured logging initialized"
    );

    Ok(StructuredLogger {
        service_name: config.service_name.clone(),
    })
}

/// Log a record-related event with standard fields.
#[macro_export]
macro_rules! log_record_event {
    ($level:ident, $msg:expr, $identity:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            identity = %$identity,
            $($($field)*,)?
            $msg
        )
    };
}

/// Log a workflow phase change with standard fields.
#[macro_export]
macro_rules! log_workflow_event {
    ($level:ident, $workflow:expr, $phase:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            workflow = %$workflow,
            phase = ?$phase,
            $($($field)*,)?
            $msg
        )
    };
}
