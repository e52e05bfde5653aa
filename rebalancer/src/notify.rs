//! Best-effort operator notifications. A failure to notify never fails
//! the caller — workers and the webhook handler log a warning and move
//! on, since a missed notification is not worth aborting an order for.
//!
//! Rate-limiting a single asset's "new limit placed" messages lives in
//! [`crate::engine::WorkerRegistry`] rather than here: the notifier a
//! given call uses can change request to request (a webhook's
//! `line_token` overrides the default), but the interval must track the
//! asset regardless of which notifier instance ends up sending.

use std::time::Duration;

use log::warn;
use reqwest::blocking::Client;

/// A channel operators can be told about order lifecycle events on.
/// Implementations must not block the caller for long or panic; any
/// failure is swallowed after a log line.
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Sends a message via the LINE Notify API, as the original service did.
pub struct LineNotifier {
    client: Client,
    token: String,
}

impl LineNotifier {
    pub fn new(token: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| Client::new()),
            token: token.to_string(),
        }
    }
}

impl Notifier for LineNotifier {
    fn notify(&self, message: &str) {
        let result = self
            .client
            .post("https://notify-api.line.me/api/notify")
            .header("Authorization", format!("Bearer {}", self.token))
            .form(&[("message", message)])
            .send();

        match result {
            Ok(resp) if !resp.status().is_success() => {
                warn!("line notify returned {}", resp.status());
            }
            Err(e) => warn!("line notify request failed: {e}"),
            Ok(_) => {}
        }
    }
}

/// Discards every message. The default when no notification token is
/// configured.
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn notify(&self, _message: &str) {}
}
