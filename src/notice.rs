use serde::Serialize;
use std::fmt;

/// Severity of a user-visible message
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    /// The step failed and the run stopped
    Error,
    /// Something was skipped; the run went on
    Warning,
    Info,
    /// Diagnostic echo, e.g. the raw body returned by the LLM endpoint
    Debug,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Level::Error => "error",
            Level::Warning => "warning",
            Level::Info => "info",
            Level::Debug => "debug",
        };
        write!(f, "{}", name)
    }
}

/// One message shown to the user alongside the analysis
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notice {
    /// Severity, rendered as the notice style
    pub level: Level,
    /// Text shown as is
    pub message: String,
}

/// Ordered collection of notices produced during one pipeline run
///
/// Every fail-soft step reports through this instead of returning an error,
/// so the caller always gets a value plus a readable explanation.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Notices(Vec<Notice>);

impl Notices {
    /// Empty list
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a message at `level`
    ///
    /// # Arguments
    /// * `level` - Severity shown with the message
    /// * `message` - Text for the user
    pub fn push(&mut self, level: Level, message: impl Into<String>) {
        self.0.push(Notice {
            level,
            message: message.into(),
        });
    }

    /// Appends an [`Level::Error`] message
    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Level::Error, message);
    }

    /// Appends a [`Level::Warning`] message
    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Level::Warning, message);
    }

    /// Appends a [`Level::Info`] message
    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Level::Info, message);
    }

    /// Appends a [`Level::Debug`] message
    pub fn debug(&mut self, message: impl Into<String>) {
        self.push(Level::Debug, message);
    }

    /// Notices in insertion order
    pub fn iter(&self) -> std::slice::Iter<'_, Notice> {
        self.0.iter()
    }

    /// Number of notices
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when nothing was reported
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Notices of a single level, in insertion order
    pub fn at_level(&self, level: Level) -> Vec<&Notice> {
        self.0.iter().filter(|n| n.level == level).collect()
    }
}
