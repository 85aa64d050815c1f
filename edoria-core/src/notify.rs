//! User-facing message sink.
//!
//! Combat log lines and toast-style messages share one channel. The engine
//! pushes into a [`MessageLog`], which keeps a bounded history, emits a
//! tracing event and forwards to an optional host [`Notifier`].

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Default number of messages retained by a [`MessageLog`].
pub const DEFAULT_LOG_CAPACITY: usize = 200;

/// Severity tag attached to every message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Normal,
    Success,
    Failure,
    Info,
    Warning,
}

impl Severity {
    pub fn name(&self) -> &'static str {
        match self {
            Severity::Normal => "normal",
            Severity::Success => "success",
            Severity::Failure => "failure",
            Severity::Info => "info",
            Severity::Warning => "warning",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A single message as delivered to the player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
}

/// Host-side rendering hook for messages.
pub trait Notifier {
    fn notify(&mut self, message: &str, severity: Severity);
}

/// Bounded message history plus an optional forwarding sink.
pub struct MessageLog {
    entries: VecDeque<Notice>,
    capacity: usize,
    sink: Option<Box<dyn Notifier>>,
}

impl MessageLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
            sink: None,
        }
    }

    /// Forward every message to `sink` as well as keeping it locally.
    pub fn with_sink(mut self, sink: Box<dyn Notifier>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn set_sink(&mut self, sink: Box<dyn Notifier>) {
        self.sink = Some(sink);
    }

    /// Record a message.
    pub fn push(&mut self, message: impl Into<String>, severity: Severity) {
        let message = message.into();
        match severity {
            Severity::Failure | Severity::Warning => {
                tracing::warn!(severity = severity.name(), "{message}")
            }
            _ => tracing::info!(severity = severity.name(), "{message}"),
        }

        if let Some(sink) = self.sink.as_mut() {
            sink.notify(&message, severity);
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Notice { message, severity });
    }

    pub fn entries(&self) -> impl Iterator<Item = &Notice> {
        self.entries.iter()
    }

    pub fn last(&self) -> Option<&Notice> {
        self.entries.back()
    }

    /// The most recent `count` messages, oldest first.
    pub fn recent(&self, count: usize) -> Vec<&Notice> {
        let skip = self.entries.len().saturating_sub(count);
        self.entries.iter().skip(skip).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for MessageLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl fmt::Debug for MessageLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageLog")
            .field("entries", &self.entries)
            .field("capacity", &self.capacity)
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}
