//! Tracing subscriber setup for binaries and services.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use hl_types::{config_error, HlError, HlResult};

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = HlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(config_error!("unknown log format: {other}")),
        }
    }
}

fn env_filter(default_directive: &str) -> HlResult<EnvFilter> {
    let directive: Directive = default_directive
        .parse()
        .map_err(|e| config_error!("invalid log directive {default_directive}: {e}"))?;
    Ok(EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy())
}

/// Install the global subscriber. `RUST_LOG` overrides `default_directive`.
/// Fails if the directive is malformed or a subscriber is already installed.
pub fn init_logging(default_directive: &str, format: LogFormat) -> HlResult<()> {
    let filter = env_filter(default_directive)?;
    let registry = tracing_subscriber::registry().with(filter);
    let installed = match format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_names(true),
            )
            .try_init(),
    };
    installed.map_err(|e| config_error!("failed to install tracing subscriber: {e}"))
}
