use std::sync::Mutex;

use tracing::{info, warn};

use centavo_core::{Notification, NotificationSink};

/// Notification sink that logs deliveries. Stands in for the push
/// transport; delivery is best-effort by contract.
#[derive(Debug, Default)]
pub struct TracingNotificationSink;

impl TracingNotificationSink {
    pub fn new() -> Self {
        Self
    }
}

impl NotificationSink for TracingNotificationSink {
    fn notify(&self, notification: Notification) {
        info!(
            account_id = %notification.account_id,
            kind = ?notification.kind,
            reference = %notification.reference,
            message = %notification.message,
            "notification"
        );
    }
}

/// Notification sink that records everything it is given, for asserting
/// on delivery in tests.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<Notification> {
        match self.delivered.lock() {
            Ok(delivered) => delivered.clone(),
            Err(_) => {
                warn!("notification sink lock poisoned, reporting empty");
                Vec::new()
            }
        }
    }
}

impl NotificationSink for RecordingNotificationSink {
    fn notify(&self, notification: Notification) {
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.push(notification);
        }
    }
}
