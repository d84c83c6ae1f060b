//! Bounded chat and action history.

use crate::permissions::NetworkAction;
use hydrogrow_common::{ContainerId, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Chat lines retained per session.
pub const CHAT_HISTORY_CAP: usize = 100;
/// Action log entries retained per session.
pub const ACTION_HISTORY_CAP: usize = 500;

/// Ring buffer that evicts its oldest entry once full.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundedLog<T> {
    entries: VecDeque<T>,
    cap: usize,
}

impl<T> BoundedLog<T> {
    /// Creates an empty log holding at most `cap` entries.
    #[must_use]
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap.min(1024)),
            cap,
        }
    }

    /// Appends an entry, evicting the oldest if full.
    pub fn push(&mut self, entry: T) {
        if self.cap == 0 {
            return;
        }
        while self.entries.len() >= self.cap {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Entries from oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.entries.iter()
    }

    /// The `n` most recent entries, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> {
        self.entries.iter().skip(self.entries.len().saturating_sub(n))
    }

    /// Most recent entry.
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.entries.back()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if the log is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of entries.
    #[must_use]
    pub fn cap(&self) -> usize {
        self.cap
    }
}

/// One chat line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Sender ([`PlayerId::SYSTEM`] for system lines)
    pub sender: PlayerId,
    /// Sender display name
    pub sender_name: String,
    /// Text
    pub text: String,
    /// Session time (seconds) when posted
    pub timestamp: f64,
    /// Whether this is a system notice
    pub is_system: bool,
}

/// One applied player action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionLogEntry {
    /// Acting player
    pub player: PlayerId,
    /// Action kind
    pub action: NetworkAction,
    /// Target container, if any
    pub container: Option<ContainerId>,
    /// Free-form detail
    pub detail: String,
    /// Session time (seconds) when applied
    pub timestamp: f64,
}
