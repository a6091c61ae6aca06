//! Reporting sink for supervisor events.
//!
//! The [`Reporter`] trait is the extension point for operational messages:
//! worker deaths, fork failures, shutdown progress. Implementations can
//! forward to syslog, a metrics pipeline, or anything else that should see
//! what the supervisor is doing.
//!
//! The stock implementation, [`TracingReporter`], forwards every message to
//! the `tracing` macros and is installed by default. Reports are emitted
//! from forked worker processes as well as from the supervisor, so the
//! trait is synchronous.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, trace, warn};

/// Shared handle to a reporting sink.
pub type ReporterRef = Arc<dyn Reporter>;

/// Message severities a sink must accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    /// Fine-grained diagnostics.
    Trace,
    /// Normal operational messages.
    Notice,
    /// Something undesirable that does not stop the supervisor.
    Warning,
    /// A failure an operator should look at (worker crash loops, fork
    /// failures).
    Alert,
    /// The supervisor cannot continue.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Trace => "trace",
            Severity::Notice => "notice",
            Severity::Warning => "warning",
            Severity::Alert => "alert",
            Severity::Fatal => "fatal",
        };
        f.write_str(label)
    }
}

/// Trait for receiving supervisor reports.
pub trait Reporter: Send + Sync {
    /// Called for every message the supervisor emits.
    fn report(&self, severity: Severity, message: &str);
}

/// Default reporter backed by the `tracing` macros.
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn report(&self, severity: Severity, message: &str) {
        match severity {
            Severity::Trace => trace!("{message}"),
            Severity::Notice => info!("{message}"),
            Severity::Warning => warn!("{message}"),
            Severity::Alert => error!(severity = "alert", "{message}"),
            Severity::Fatal => error!(severity = "fatal", "{message}"),
        }
    }
}

/// Fan a message out to every configured sink.
pub(crate) fn report_all(reporters: &[ReporterRef], severity: Severity, message: &str) {
    for reporter in reporters {
        reporter.report(severity, message);
    }
}
