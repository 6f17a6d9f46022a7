//! User-facing notifications.
//!
//! The engine reports retry exhaustion, refresh progress and write results
//! through a `Notifier`; how they reach the user (toast, status line, log)
//! is up to the front end.

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifyLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub level: NotifyLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotifyLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }

    pub fn info(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotifyLevel::Info, title, message)
    }

    pub fn success(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotifyLevel::Success, title, message)
    }

    pub fn error(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(NotifyLevel::Error, title, message)
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Writes notifications to the log. Default for headless use.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, n: Notification) {
        match n.level {
            NotifyLevel::Info | NotifyLevel::Success => {
                info!(title = %n.title, "{}", n.message)
            }
            NotifyLevel::Warning => warn!(title = %n.title, "{}", n.message),
            NotifyLevel::Error => error!(title = %n.title, "{}", n.message),
        }
    }
}
