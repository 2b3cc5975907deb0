//! Nullable notifier — collects delivered alerts in memory.

use rollcall_notify::Notifier;
use std::sync::Mutex;

/// Records every delivered alert for later assertions.
#[derive(Default)]
pub struct CollectingNotifier {
    delivered: Mutex<Vec<(String, String)>>,
}

impl CollectingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of (subject, body) pairs delivered so far.
    pub fn delivered(&self) -> Vec<(String, String)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

impl Notifier for CollectingNotifier {
    fn deliver(&self, subject: &str, body: &str) {
        self.delivered
            .lock()
            .unwrap()
            .push((subject.to_string(), body.to_string()));
    }
}
