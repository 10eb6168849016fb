//! User-facing notifications.
//!
//! Commands and the dispatcher report outcomes as [`Notification`]s on a
//! channel owned by the shell (a UI, or the CLI printing them). Sending never
//! blocks and never fails: with no receiver the notification is only logged.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub message: String,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            title: title.into(),
            message: message.into(),
        }
    }
}

/// Sending half of the notification channel.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl Notifier {
    /// Creates a notifier and the receiver the shell should drain.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// A notifier whose notifications are only logged.
    pub fn disconnected() -> Self {
        Self::channel().0
    }

    pub fn send(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => error!("[NOTIFY] {}: {}", notification.title, notification.message),
            NotificationLevel::Warning => warn!("[NOTIFY] {}: {}", notification.title, notification.message),
            _ => info!("[NOTIFY] {}: {}", notification.title, notification.message),
        }

        // A closed receiver only means nobody is listening
        let _ = self.tx.send(notification);
    }

    pub fn info(&self, title: impl Into<String>, message: impl Into<String>) {
        self.send(Notification::new(NotificationLevel::Info, title, message));
    }

    pub fn success(&self, title: impl Into<String>, message: impl Into<String>) {
        self.send(Notification::new(NotificationLevel::Success, title, message));
    }

    pub fn warning(&self, title: impl Into<String>, message: impl Into<String>) {
        self.send(Notification::new(NotificationLevel::Warning, title, message));
    }

    pub fn error(&self, title: impl Into<String>, message: impl Into<String>) {
        self.send(Notification::new(NotificationLevel::Error, title, message));
    }

    /// Reports an error with its user-facing presentation.
    pub fn app_error(&self, level: NotificationLevel, err: &AppError) {
        let presentation = err.to_presentation();
        self.send(Notification::new(level, presentation.title, presentation.message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn notifications_arrive_in_order() {
        let (notifier, mut rx) = Notifier::channel();

        notifier.info("Started", "3 calls");
        notifier.success("Done", "all good");

        let first = rx.recv().await.unwrap();
        assert_eq!(first.level, NotificationLevel::Info);
        assert_eq!(first.title, "Started");
        assert_eq!(rx.recv().await.unwrap().level, NotificationLevel::Success);
    }

    #[test]
    fn sending_without_receiver_does_not_panic() {
        let notifier = Notifier::disconnected();
        notifier.error("Oops", "nobody listens");
    }

    #[tokio::test]
    async fn app_error_uses_presentation() {
        let (notifier, mut rx) = Notifier::channel();

        notifier.app_error(NotificationLevel::Warning, &AppError::NoLeadsSelected);

        let n = rx.recv().await.unwrap();
        assert_eq!(n.level, NotificationLevel::Warning);
        assert_eq!(n.title, AppError::NoLeadsSelected.to_presentation().title);
    }

    #[test]
    fn notification_serializes_lowercase_level() {
        let n = Notification::new(NotificationLevel::Success, "t", "m");
        let json = serde_json::to_value(&n).unwrap();
        assert_eq!(json["level"], "success");
    }
}
