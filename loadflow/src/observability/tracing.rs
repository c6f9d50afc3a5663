//! Subscriber installation and span helpers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingConfig;
use crate::errors::{LoadflowError, Result};

/// Installs the global `tracing` subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. Fails if a subscriber is
/// already installed or the directive does not parse.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| LoadflowError::Config(format!("invalid logging.level '{}': {e}", config.level)))?,
    };

    let builder = fmt().with_env_filter(filter).with_target(true);
    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| LoadflowError::Config(format!("tracing subscriber already installed: {e}")))
}

/// Attributes recorded for one stage advance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdvanceSpanAttributes {
    /// Record being advanced.
    pub record_id: Option<String>,
    /// Acting user.
    pub actor_id: Option<String>,
    /// Stage that was completed.
    pub stage: Option<u8>,
    /// Outcome (`advanced`, `rejected`, `failed`).
    pub outcome: Option<String>,
    /// Duration in milliseconds.
    pub duration_ms: Option<f64>,
    /// Error code on failure.
    pub error_code: Option<String>,
}

impl AdvanceSpanAttributes {
    /// Creates attributes for a record.
    #[must_use]
    pub fn new(record_id: impl Into<String>) -> Self {
        Self {
            record_id: Some(record_id.into()),
            ..Default::default()
        }
    }

    /// Sets the actor.
    #[must_use]
    pub fn with_actor(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }

    /// Sets the stage.
    #[must_use]
    pub fn with_stage(mut self, stage: u8) -> Self {
        self.stage = Some(stage);
        self
    }

    /// Sets the outcome.
    #[must_use]
    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    /// Sets the duration.
    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: f64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Sets the error code.
    #[must_use]
    pub fn with_error_code(mut self, code: impl Into<String>) -> Self {
        self.error_code = Some(code.into());
        self
    }

    /// Flattens into dotted attribute names.
    #[must_use]
    pub fn to_attributes(&self) -> HashMap<String, String> {
        let mut attrs = HashMap::new();

        if let Some(ref v) = self.record_id {
            attrs.insert("loading.record_id".to_string(), v.clone());
        }
        if let Some(ref v) = self.actor_id {
            attrs.insert("loading.actor_id".to_string(), v.clone());
        }
        if let Some(v) = self.stage {
            attrs.insert("loading.stage".to_string(), v.to_string());
        }
        if let Some(ref v) = self.outcome {
            attrs.insert("loading.outcome".to_string(), v.clone());
        }
        if let Some(v) = self.duration_ms {
            attrs.insert("loading.duration_ms".to_string(), v.to_string());
        }
        if let Some(ref v) = self.error_code {
            attrs.insert("loading.error_code".to_string(), v.clone());
        }

        attrs
    }
}

/// Simple span timing helper.
#[derive(Debug)]
pub struct SpanTimer {
    start: Instant,
    name: String,
}

impl SpanTimer {
    /// Starts a new span timer.
    #[must_use]
    pub fn start(name: impl Into<String>) -> Self {
        Self {
            start: Instant::now(),
            name: name.into(),
        }
    }

    /// Returns the elapsed time in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }

    /// Returns the span name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Finishes the span and returns the duration.
    #[must_use]
    pub fn finish(self) -> f64 {
        self.elapsed_ms()
    }
}
