//! Cross-thread plumbing.

pub mod bus;
pub mod notifications;

pub use bus::{AudioCommand, SystemBus, SystemEvent};
pub use notifications::{Notification, NotificationKind, Notifier};
