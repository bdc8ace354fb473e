//! Operator-facing diagnostic channel.
//!
//! Every entry is emitted through `tracing` and also kept in a bounded
//! in-memory ring so the UI and tests can inspect what happened on each
//! channel without scraping log output.

use std::collections::VecDeque;
use std::fmt;

pub const DEFAULT_CAPACITY: usize = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Chat,
    Upload,
    Url,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Chat => "chat",
            Channel::Upload => "upload",
            Channel::Url => "url",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub channel: Channel,
    pub level: Level,
    pub text: String,
}

#[derive(Debug)]
pub struct DiagnosticLog {
    entries: VecDeque<Diagnostic>,
    capacity: usize,
}

impl Default for DiagnosticLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl DiagnosticLog {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        DiagnosticLog {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn info<T: Into<String>>(&mut self, channel: Channel, text: T) {
        self.record(channel, Level::Info, text);
    }

    pub fn warn<T: Into<String>>(&mut self, channel: Channel, text: T) {
        self.record(channel, Level::Warn, text);
    }

    pub fn error<T: Into<String>>(&mut self, channel: Channel, text: T) {
        self.record(channel, Level::Error, text);
    }

    pub fn record<T: Into<String>>(&mut self, channel: Channel, level: Level, text: T) {
        let text = text.into();
        match level {
            Level::Info => tracing::info!(channel = channel.as_str(), "{}", text),
            Level::Warn => tracing::warn!(channel = channel.as_str(), "{}", text),
            Level::Error => tracing::error!(channel = channel.as_str(), "{}", text),
        }

        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(Diagnostic {
            channel,
            level,
            text,
        });
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<Diagnostic> {
        let take = n.min(self.entries.len());
        self.entries
            .iter()
            .skip(self.entries.len() - take)
            .cloned()
            .collect()
    }

    pub fn for_channel(&self, channel: Channel) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter().filter(move |d| d.channel == channel)
    }

    pub fn last(&self) -> Option<&Diagnostic> {
        self.entries.back()
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
