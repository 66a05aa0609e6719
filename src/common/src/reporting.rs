//! Crash and error reporting.
//!
//! The backup binary hands every fatal error to an [`ErrorReporter`] before
//! exiting. With a DSN configured, errors go to a Sentry-compatible backend
//! (Sentry, GlitchTip) through [`SentryReporter`]; otherwise [`LogReporter`]
//! writes the full error chain to the log.

use anyhow::Context;
use sentry::types::Dsn;

use crate::config::ReportingConfig;

pub trait ErrorReporter {
    /// Report a fatal error. Must not panic or fail.
    fn report(&self, error: &anyhow::Error);
}

/// Render an error and its causes as a single line.
pub fn render(error: &anyhow::Error) -> String {
    error
        .chain()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

/// Reports errors through the process log only.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogReporter;

impl ErrorReporter for LogReporter {
    fn report(&self, error: &anyhow::Error) {
        tracing::error!(error = %render(error), "Run failed");
    }
}

/// Logs errors and captures them on the current Sentry hub.
#[derive(Debug, Clone, Copy, Default)]
pub struct SentryReporter;

impl ErrorReporter for SentryReporter {
    fn report(&self, error: &anyhow::Error) {
        tracing::error!(error = %render(error), "Run failed; reporting to error tracker");
        let event_id = sentry::integrations::anyhow::capture_anyhow(error);
        tracing::debug!(%event_id, "Captured error event");
    }
}

/// Install the Sentry client when a DSN is configured.
///
/// The returned guard flushes pending events when dropped and must outlive
/// every call to [`SentryReporter::report`].
///
/// # Errors
///
/// Returns an error if the DSN does not parse.
pub fn init_sentry(config: &ReportingConfig) -> anyhow::Result<Option<sentry::ClientInitGuard>> {
    let Some(raw) = config.dsn.as_deref() else {
        return Ok(None);
    };

    let dsn: Dsn = raw.parse().context("Invalid reporting.dsn")?;
    tracing::debug!(host = dsn.host(), "Initializing error reporting");

    let guard = sentry::init(sentry::ClientOptions {
        dsn: Some(dsn),
        release: Some(env!("CARGO_PKG_VERSION").into()),
        ..Default::default()
    });
    Ok(Some(guard))
}

/// Pick the reporter matching whether a Sentry client was installed.
pub fn reporter_for(guard: Option<&sentry::ClientInitGuard>) -> Box<dyn ErrorReporter> {
    match guard {
        Some(_) => Box::new(SentryReporter),
        None => Box::new(LogReporter),
    }
}
