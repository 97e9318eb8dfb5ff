use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
    /// `None` keeps the message until it is dismissed.
    pub expires_at: Option<Instant>,
}

impl Notification {
    pub fn new(message: impl Into<String>, level: NotificationLevel, duration: Duration) -> Self {
        Self {
            message: message.into(),
            level,
            expires_at: Some(Instant::now() + duration),
        }
    }

    pub fn sticky(message: impl Into<String>, level: NotificationLevel) -> Self {
        Self {
            message: message.into(),
            level,
            expires_at: None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() >= expires_at)
    }
}

/// Status line messages, newest first. Errors stay until dismissed so a
/// failed save is still on screen when the reviewer retries.
#[derive(Debug, Default)]
pub struct NotificationManager {
    notifications: Vec<Notification>,
    default_duration: Duration,
}

impl NotificationManager {
    pub fn new() -> Self {
        Self::with_default_duration(Duration::from_secs(5))
    }

    pub fn with_default_duration(default_duration: Duration) -> Self {
        Self {
            notifications: Vec::new(),
            default_duration,
        }
    }

    pub fn notify(&mut self, message: impl Into<String>, level: NotificationLevel) {
        let notification = match level {
            NotificationLevel::Error => Notification::sticky(message, level),
            _ => Notification::new(message, level, self.default_duration),
        };
        self.notifications.insert(0, notification);
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Info);
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Warning);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.notify(message, NotificationLevel::Error);
    }

    /// Remove expired notifications, returns true if any were removed
    pub fn update(&mut self) -> bool {
        let initial_len = self.notifications.len();
        self.notifications.retain(|n| !n.is_expired());
        self.notifications.len() != initial_len
    }

    pub fn current(&self) -> Option<&Notification> {
        self.notifications.first()
    }

    pub fn dismiss_current(&mut self) -> bool {
        if self.notifications.is_empty() {
            false
        } else {
            self.notifications.remove(0);
            true
        }
    }

    pub fn count(&self) -> usize {
        self.notifications.len()
    }
}
