//! Local display queue for chat and session notices

use std::collections::VecDeque;

/// One line for the on-screen console
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsoleLine {
    /// Display name of the sender, `None` for system notices
    pub sender: Option<String>,
    pub text: String,
}

impl ConsoleLine {
    pub fn chat(sender: &str, text: impl Into<String>) -> Self {
        Self {
            sender: Some(sender.to_string()),
            text: text.into(),
        }
    }

    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            sender: None,
            text: text.into(),
        }
    }
}

impl std::fmt::Display for ConsoleLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.sender {
            Some(sender) => write!(f, "{}: {}", sender, self.text),
            None => f.write_str(&self.text),
        }
    }
}

/// Bounded history; the oldest line falls off when full
#[derive(Debug, Clone)]
pub struct ConsoleLog {
    lines: VecDeque<ConsoleLine>,
    capacity: usize,
}

impl ConsoleLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, line: ConsoleLine) {
        if self.lines.len() >= self.capacity {
            self.lines.pop_front();
        }
        tracing::debug!(line = %line, "Console");
        self.lines.push_back(line);
    }

    pub fn notice(&mut self, text: impl Into<String>) {
        self.push(ConsoleLine::notice(text));
    }

    /// Take every pending line, oldest first
    pub fn drain(&mut self) -> Vec<ConsoleLine> {
        self.lines.drain(..).collect()
    }

    pub fn lines(&self) -> impl Iterator<Item = &ConsoleLine> {
        self.lines.iter()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_prefixes_sender() {
        assert_eq!(ConsoleLine::chat("Alpha", "hi").to_string(), "Alpha: hi");
        assert_eq!(ConsoleLine::notice("Beta joined").to_string(), "Beta joined");
    }

    #[test]
    fn test_oldest_dropped() {
        let mut log = ConsoleLog::new(2);
        log.notice("one");
        log.notice("two");
        log.notice("three");
        let texts: Vec<String> = log.drain().into_iter().map(|l| l.text).collect();
        assert_eq!(texts, vec!["two", "three"]);
        assert!(log.is_empty());
    }
}
