//! Notification sink for the outcomes of user-initiated actions

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Kind of a user-facing notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

/// A notice as delivered to a UI surface
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

/// Receives terminal outcomes of user-initiated mutations.
///
/// `notify` must return immediately; sinks never block the caller and never
/// report back.
pub trait NotificationSink: Send + Sync + std::fmt::Debug {
    fn notify(&self, kind: NoticeKind, text: &str);
}

/// Writes notices to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, kind: NoticeKind, text: &str) {
        match kind {
            NoticeKind::Success => tracing::info!("{}", text),
            NoticeKind::Error => tracing::warn!("{}", text),
        }
    }
}

/// Forwards notices to a channel drained by a UI surface
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Notice>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, kind: NoticeKind, text: &str) {
        let notice = Notice {
            kind,
            text: text.to_string(),
        };
        if self.tx.send(notice).is_err() {
            tracing::debug!("Notice dropped, no surface attached: {}", text);
        }
    }
}

/// Keeps every notice in memory, oldest first
#[derive(Debug, Default)]
pub struct RecordingSink {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingSink {
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl NotificationSink for RecordingSink {
    fn notify(&self, kind: NoticeKind, text: &str) {
        self.notices
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Notice {
                kind,
                text: text.to_string(),
            });
    }
}
