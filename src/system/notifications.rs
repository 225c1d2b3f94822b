//! Fire-and-forget user notifications.

use crossbeam_channel::Sender;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub text: String,
}

impl fmt::Display for Notification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            NotificationKind::Info => write!(f, "{}", self.text),
            NotificationKind::Error => write!(f, "[error] {}", self.text),
        }
    }
}

/// Posts notifications without waiting for anyone to read them.
#[derive(Debug, Clone)]
pub struct Notifier {
    tx: Option<Sender<Notification>>,
}

impl Notifier {
    pub fn new(tx: Sender<Notification>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A notifier that only logs.
    pub fn disconnected() -> Self {
        Self { tx: None }
    }

    pub fn post(&self, text: impl Into<String>) {
        self.send(NotificationKind::Info, text.into());
    }

    pub fn post_error(&self, text: impl Into<String>) {
        self.send(NotificationKind::Error, text.into());
    }

    fn send(&self, kind: NotificationKind, text: String) {
        match kind {
            NotificationKind::Info => log::info!("NOTIFY: {}", text),
            NotificationKind::Error => log::warn!("NOTIFY: {}", text),
        }

        if let Some(tx) = &self.tx {
            // Nobody listening is fine.
            let _ = tx.send(Notification { kind, text });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;

    #[test]
    fn test_post_reaches_receiver() {
        let (tx, rx) = unbounded();
        let notifier = Notifier::new(tx);
        notifier.post("Saved!");
        notifier.post_error("Something went wrong!");

        assert_eq!(rx.try_recv().unwrap().text, "Saved!");
        assert_eq!(rx.try_recv().unwrap().kind, NotificationKind::Error);
    }

    #[test]
    fn test_post_without_receiver_does_not_panic() {
        let (tx, rx) = unbounded();
        drop(rx);
        Notifier::new(tx).post("hello");
        Notifier::disconnected().post_error("hello");
    }
}
