use crate::upload::{HealthStatus, Notification, ShareLink, UploadStrategy};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

pub const TOAST_LIFETIME: Duration = Duration::from_secs(5);
const MAX_TOASTS: usize = 5;

/// Share link lifetimes offered in the share dialog, as `(server value, label)`.
pub const SHARE_EXPIRATIONS: [(&str, &str); 4] = [
    ("1h", "1 hour"),
    ("24h", "1 day"),
    ("72h", "3 days"),
    ("168h", "7 days"),
];

pub struct Toast {
    pub notification: Notification,
    pub shown_at: Instant,
}

#[derive(Clone, Default)]
pub enum HealthState {
    #[default]
    Unknown,
    Checking,
    Online(String),
    Offline(String),
}

impl HealthState {
    pub fn from_result(result: Result<HealthStatus, String>) -> Self {
        match result {
            Ok(health) => match health.time {
                Some(time) => HealthState::Online(format!("{} ({})", health.status, time)),
                None => HealthState::Online(health.status),
            },
            Err(e) => HealthState::Offline(e),
        }
    }
}

pub enum ShareProgress {
    Idle,
    Generating,
    Ready(ShareLink),
    Failed(String),
}

pub struct ShareDialog {
    pub file_name: String,
    pub file_url: String,
    pub expiration: String,
    pub progress: ShareProgress,
}

impl ShareDialog {
    pub fn new(file_name: String, file_url: String, expiration: String) -> Self {
        Self {
            file_name,
            file_url,
            expiration,
            progress: ShareProgress::Idle,
        }
    }

    pub fn expiration_label(&self) -> &str {
        SHARE_EXPIRATIONS
            .iter()
            .find(|(value, _)| *value == self.expiration)
            .map(|(_, label)| *label)
            .unwrap_or(self.expiration.as_str())
    }
}

pub type ShareResult = (String, Result<ShareLink, String>);

#[derive(Default)]
pub struct UiState {
    pub toasts: Vec<Toast>,
    pub share_dialog: Option<ShareDialog>,
    pub health: HealthState,
    pub active_strategy: Option<UploadStrategy>,
    pub notification_receiver: Option<Receiver<Notification>>,
    pub batch_done_receiver: Option<Receiver<()>>,
    pub share_receiver: Option<Receiver<ShareResult>>,
    pub health_receiver: Option<Receiver<HealthState>>,
}

impl UiState {
    pub fn is_uploading(&self) -> bool {
        self.active_strategy.is_some()
    }

    pub fn push_toast(&mut self, notification: Notification, now: Instant) {
        self.toasts.push(Toast {
            notification,
            shown_at: now,
        });
        if self.toasts.len() > MAX_TOASTS {
            let overflow = self.toasts.len() - MAX_TOASTS;
            self.toasts.drain(..overflow);
        }
    }

    pub fn expire_toasts(&mut self, now: Instant) {
        self.toasts
            .retain(|toast| now.saturating_duration_since(toast.shown_at) < TOAST_LIFETIME);
    }

    /// Applies a finished share link request to the dialog, if it is still
    /// open for the same file.
    pub fn apply_share_result(&mut self, (file_name, result): ShareResult) {
        let Some(dialog) = self.share_dialog.as_mut() else {
            return;
        };
        if dialog.file_name != file_name {
            return;
        }
        dialog.progress = match result {
            Ok(link) => ShareProgress::Ready(link),
            Err(e) => ShareProgress::Failed(e),
        };
    }
}
