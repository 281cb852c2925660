//! Notification feed with an unread counter

use serde::de::Deserializer;
use serde::{Deserialize, Serialize};

use crate::record::{lenient_string, lenient_text};

/// Largest unread count shown as a number; above it the badge reads `99+`
pub const BADGE_DISPLAY_LIMIT: u32 = 99;

/// Severity of a system notice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl std::fmt::Display for NoticeLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoticeLevel::Info => write!(f, "info"),
            NoticeLevel::Success => write!(f, "success"),
            NoticeLevel::Warning => write!(f, "warning"),
            NoticeLevel::Error => write!(f, "error"),
        }
    }
}

impl From<&str> for NoticeLevel {
    /// Unrecognised levels fall back to `Info`
    fn from(level: &str) -> Self {
        match level.to_ascii_lowercase().as_str() {
            "success" | "ok" => NoticeLevel::Success,
            "warning" | "warn" => NoticeLevel::Warning,
            "error" | "danger" | "critical" => NoticeLevel::Error,
            _ => NoticeLevel::Info,
        }
    }
}

impl<'de> Deserialize<'de> for NoticeLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(value.as_str().map(NoticeLevel::from).unwrap_or_default())
    }
}

/// A system notice pushed by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    #[serde(default)]
    pub level: NoticeLevel,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub message: String,
    #[serde(default, deserialize_with = "lenient_text")]
    pub timestamp: Option<String>,
}

/// Newest-first notice feed.
///
/// Marking all read only moves the display boundary; the underlying log is
/// never truncated.
#[derive(Debug, Clone, Default)]
pub struct NotificationFeed {
    log: Vec<Notice>,
    visible_from: usize,
    unread: u32,
    badge_visible: bool,
    revision: u64,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, notice: Notice) {
        tracing::debug!("Notice [{}] {}: {}", notice.level, notice.title, notice.message);
        self.log.push(notice);
        self.revision += 1;
        self.unread = self.unread.saturating_add(1);
        self.badge_visible = true;
    }

    /// Empty the displayed list and hide the counter
    pub fn mark_all_read(&mut self) {
        if self.visible_from != self.log.len() {
            self.visible_from = self.log.len();
            self.revision += 1;
        }
        self.unread = 0;
        self.badge_visible = false;
    }

    /// The feed was viewed: hide and zero the counter, keep the list
    pub fn open(&mut self) {
        self.unread = 0;
        self.badge_visible = false;
    }

    /// Notices currently displayed, newest first
    pub fn visible(&self) -> impl Iterator<Item = &Notice> {
        self.log[self.visible_from..].iter().rev()
    }

    /// Every notice received, newest first
    pub fn all(&self) -> impl Iterator<Item = &Notice> {
        self.log.iter().rev()
    }

    pub fn unread(&self) -> u32 {
        self.unread
    }

    pub fn badge_visible(&self) -> bool {
        self.badge_visible
    }

    /// Counter text, or `None` while the badge is hidden
    pub fn badge_label(&self) -> Option<String> {
        if !self.badge_visible {
            return None;
        }
        if self.unread > BADGE_DISPLAY_LIMIT {
            Some(format!("{}+", BADGE_DISPLAY_LIMIT))
        } else {
            Some(self.unread.to_string())
        }
    }

    /// Bumped whenever the displayed list changes
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn len(&self) -> usize {
        self.log.len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }
}
