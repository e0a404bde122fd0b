//! Status/log sink shared by the channel and the controller.

use std::{
    collections::VecDeque,
    sync::{Mutex, PoisonError},
};

use serde_json::Value;
use shared::{domain::LogLevel, protocol::StatusEvent};

pub const DEFAULT_LOG_CAPACITY: usize = 500;

pub trait StatusSink: Send + Sync {
    /// Replace the headline status line.
    fn set_status(&self, text: &str);

    fn log(&self, level: LogLevel, message: &str, extra: Option<Value>);

    fn record(&self, event: StatusEvent) {
        match event.level {
            None => self.set_status(&event.message),
            Some(level) => self.log(level, &event.message, event.extra),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    pub extra: Option<Value>,
}

#[derive(Default)]
struct StatusLogState {
    headline: String,
    entries: VecDeque<LogEntry>,
}

/// Headline status plus a capped history; the oldest entries fall off first.
pub struct StatusLog {
    capacity: usize,
    state: Mutex<StatusLogState>,
}

impl StatusLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: Mutex::new(StatusLogState::default()),
        }
    }

    pub fn headline(&self) -> String {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .headline
            .clone()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .iter()
            .cloned()
            .collect()
    }

    pub fn render_text(&self) -> String {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let mut out = String::new();
        for entry in &state.entries {
            out.push_str(&format!("[{}] {}", entry.level.as_str(), entry.message));
            if let Some(extra) = &entry.extra {
                out.push_str(&format!(" {extra}"));
            }
            out.push('\n');
        }
        out
    }

    fn push(&self, entry: LogEntry) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        while state.entries.len() >= self.capacity {
            state.entries.pop_front();
        }
        state.entries.push_back(entry);
    }
}

impl Default for StatusLog {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl StatusSink for StatusLog {
    fn set_status(&self, text: &str) {
        tracing::info!(status = text, "status");
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            state.headline = text.to_string();
        }
        self.push(LogEntry {
            level: LogLevel::Info,
            message: text.to_string(),
            extra: None,
        });
    }

    fn log(&self, level: LogLevel, message: &str, extra: Option<Value>) {
        let extra_text = extra.as_ref().map(Value::to_string).unwrap_or_default();
        match level {
            LogLevel::Debug => tracing::debug!(extra = %extra_text, "{message}"),
            LogLevel::Info => tracing::info!(extra = %extra_text, "{message}"),
            LogLevel::Warning => tracing::warn!(extra = %extra_text, "{message}"),
            LogLevel::Error => tracing::error!(extra = %extra_text, "{message}"),
        }
        self.push(LogEntry {
            level,
            message: message.to_string(),
            extra,
        });
    }
}

#[cfg(test)]
#[path = "tests/status_tests.rs"]
mod tests;
