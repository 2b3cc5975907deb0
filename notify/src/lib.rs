//! Fire-and-forget alert delivery.
//!
//! The notifier is an external collaborator reduced to one method: hand
//! off a human-readable alert and return. Implementations must never
//! block the caller meaningfully and never raise to it — delivery
//! failures are their own problem (log and drop).

/// Outbound delivery of human-readable security alerts.
pub trait Notifier: Send + Sync {
    fn deliver(&self, subject: &str, body: &str);
}

/// A notifier that routes alerts into the structured log. Useful as a
/// production fallback and wherever real delivery is not wired up.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&self, subject: &str, body: &str) {
        tracing::warn!(target: "rollcall::alert", subject, body, "security alert");
    }
}
