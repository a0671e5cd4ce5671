//! Diagnostics sink injected into both compiler passes.
//!
//! The core never decides where messages go or how verbose they are: it hands each
//! report to a [`Diagnostics`] implementation. [`LogDiagnostics`] forwards to the
//! `log` facade (whose level and target are configured by the binary), while
//! [`CollectingDiagnostics`] keeps reports in memory.

use std::cell::RefCell;
use std::fmt;

/// Severity of a diagnostic. The core never emits anything above `Warning`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
}

/// A position in the analysed sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub module: String,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.module, self.line, self.column)
    }
}

/// Sink accepting `(message, cause?, location?)` reports.
pub trait Diagnostics {
    fn report(
        &self,
        severity: Severity,
        message: &str,
        cause: Option<&dyn std::error::Error>,
        location: Option<&SourceLocation>,
    );

    fn debug(&self, message: &str, location: Option<&SourceLocation>) {
        self.report(Severity::Debug, message, None, location);
    }

    fn warn(&self, message: &str, location: Option<&SourceLocation>) {
        self.report(Severity::Warning, message, None, location);
    }
}

/// Forwards every report to the `log` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDiagnostics;

impl Diagnostics for LogDiagnostics {
    fn report(
        &self,
        severity: Severity,
        message: &str,
        cause: Option<&dyn std::error::Error>,
        location: Option<&SourceLocation>,
    ) {
        let level = match severity {
            Severity::Debug => log::Level::Debug,
            Severity::Info => log::Level::Info,
            Severity::Warning => log::Level::Warn,
        };
        match (location, cause) {
            (Some(loc), Some(cause)) => log::log!(level, "{}: {} ({})", loc, message, cause),
            (Some(loc), None) => log::log!(level, "{}: {}", loc, message),
            (None, Some(cause)) => log::log!(level, "{} ({})", message, cause),
            (None, None) => log::log!(level, "{}", message),
        }
    }
}

/// A single recorded report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub severity: Severity,
    pub message: String,
    pub location: Option<SourceLocation>,
}

/// Keeps every report in memory, in emission order.
#[derive(Debug, Default)]
pub struct CollectingDiagnostics {
    reports: RefCell<Vec<Report>>,
}

impl CollectingDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Report> {
        self.reports.borrow().clone()
    }

    /// Reports at `severity` or above.
    pub fn at_least(&self, severity: Severity) -> Vec<Report> {
        self.reports
            .borrow()
            .iter()
            .filter(|r| r.severity >= severity)
            .cloned()
            .collect()
    }
}

impl Diagnostics for CollectingDiagnostics {
    fn report(
        &self,
        severity: Severity,
        message: &str,
        cause: Option<&dyn std::error::Error>,
        location: Option<&SourceLocation>,
    ) {
        let message = match cause {
            Some(cause) => format!("{} ({})", message, cause),
            None => message.to_string(),
        };
        self.reports.borrow_mut().push(Report {
            severity,
            message,
            location: location.cloned(),
        });
    }
}
