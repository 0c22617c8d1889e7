//! Desktop notifications via notify-rust.

use std::fmt::Display;

use notify_rust::Notification;
use tracing::{debug, warn};

/// Names the backend that failed, so the user knows which voice to fix.
pub fn speech_failure_body(backend: &str, error: &impl Display) -> String {
    format!("Speech failed ({backend}): {error}")
}

pub struct Notifier {
    enabled: bool,
}

impl Notifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn notify(&self, summary: &str, body: &str) {
        if !self.enabled {
            return;
        }

        debug!("Notification: {summary}: {body}");

        if let Err(e) = Notification::new()
            .summary(summary)
            .body(body)
            .icon("audio-speakers")
            .timeout(4000)
            .show()
        {
            warn!("Failed to show notification: {e}");
        }
    }

    pub fn speech_failed(&self, summary: &str, backend: &str, error: &impl Display) {
        self.notify(summary, &speech_failure_body(backend, error));
    }
}
