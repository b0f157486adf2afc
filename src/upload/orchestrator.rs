use crate::error::{Result, UploadError};
use crate::upload::notifier::{NotificationKind, Notifier};
use crate::upload::progress::{
    percent, ProgressMessage, SpeedSampler, TransferSample, SPEED_SAMPLE_WINDOW,
};
use crate::upload::registry::SharedRegistry;
use crate::upload::transport::{HealthStatus, ShareLink, Transport};
use crate::upload::types::{FileRef, StatusInfo, UploadStatus};
use parking_lot::Mutex;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub const PREPARING_INFO: &str = "Preparing upload...";

const UPLOAD_ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const UPLOAD_ID_SUFFIX_LEN: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStrategy {
    /// Multipart upload through the application server, progress pushed over a WebSocket.
    Relayed,
    /// Direct PUT to storage using a server-issued pre-signed URL.
    Presigned,
}

impl fmt::Display for UploadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadStrategy::Relayed => f.write_str("relayed"),
            UploadStrategy::Presigned => f.write_str("presigned"),
        }
    }
}

struct ItemOutcome {
    url: String,
    already_exists: bool,
}

/// Drives uploads of the registry's pending files, one file at a time.
///
/// A failing file is marked as failed and the batch moves on. Only one batch
/// is tracked for cancellation at a time.
pub struct UploadOrchestrator {
    registry: SharedRegistry,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    batch_token: Mutex<Option<CancellationToken>>,
}

impl UploadOrchestrator {
    pub fn new(
        registry: SharedRegistry,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            registry,
            transport,
            notifier,
            batch_token: Mutex::new(None),
        }
    }

    pub async fn upload_relayed(&self) {
        self.run_batch(UploadStrategy::Relayed).await
    }

    pub async fn upload_presigned(&self) {
        self.run_batch(UploadStrategy::Presigned).await
    }

    pub async fn run_batch(&self, strategy: UploadStrategy) {
        let pending = self.registry.lock().pending();
        if pending.is_empty() {
            warn!("No pending files for {} upload", strategy);
            self.notifier.show(
                NotificationKind::Error,
                "Error",
                &UploadError::NoPendingFiles.to_string(),
            );
            return;
        }

        info!("Starting {} upload of {} file(s)", strategy, pending.len());
        let token = CancellationToken::new();
        *self.batch_token.lock() = Some(token.clone());

        for (index, file) in pending.iter().enumerate() {
            if token.is_cancelled() {
                info!(
                    "Upload batch cancelled, {} file(s) left pending",
                    pending.len() - index
                );
                break;
            }

            let started = Instant::now();
            self.registry
                .lock()
                .set_status(&file.name, UploadStatus::Uploading, StatusInfo::default());

            let result = self.upload_one(strategy, file, &token).await;
            self.finish_item(file, started.elapsed().as_secs_f64(), result);
        }

        *self.batch_token.lock() = None;
        info!("{} upload batch finished", strategy);
    }

    /// Cancels the running batch. Returns false when no batch is running.
    pub fn cancel(&self) -> bool {
        match self.batch_token.lock().as_ref() {
            Some(token) => {
                info!("Cancelling upload batch");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.batch_token.lock().is_some()
    }

    async fn upload_one(
        &self,
        strategy: UploadStrategy,
        file: &FileRef,
        token: &CancellationToken,
    ) -> Result<ItemOutcome> {
        match strategy {
            UploadStrategy::Relayed => self.relay_item(file, token).await,
            UploadStrategy::Presigned => tokio::select! {
                biased;
                _ = token.cancelled() => Err(UploadError::Cancelled),
                result = self.presigned_item(file) => result,
            },
        }
    }

    /// Cancellation is observed inside the loop so the progress channel is
    /// always closed before returning.
    async fn relay_item(&self, file: &FileRef, token: &CancellationToken) -> Result<ItemOutcome> {
        let upload_id = generate_upload_id();
        debug!("Relaying {} with upload id {}", file.name, upload_id);

        let mut channel = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(UploadError::Cancelled),
            channel = self.transport.open_progress_channel(&upload_id) => channel?,
        };
        self.registry.lock().set_info(&file.name, PREPARING_INFO);

        let upload = self.transport.relay_upload(file, &upload_id);
        tokio::pin!(upload);
        let mut channel_open = true;

        let result = loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break Err(UploadError::Cancelled),
                event = channel.next_event(), if channel_open => match event {
                    Some(Ok(message)) => self.apply_progress_message(&file.name, &message),
                    Some(Err(e)) => break Err(e),
                    None => {
                        debug!("Progress channel closed by server: {}", upload_id);
                        channel_open = false;
                    }
                },
                response = &mut upload => break response,
            }
        };

        channel.close().await;
        let response = result?;
        Ok(ItemOutcome {
            url: response.url.unwrap_or_default(),
            already_exists: response.already_exists,
        })
    }

    fn apply_progress_message(&self, name: &str, message: &ProgressMessage) {
        self.registry.lock().set_progress(
            name,
            message.percent(),
            message.transferred.max(0.0) as u64,
            message.speed,
        );
    }

    async fn presigned_item(&self, file: &FileRef) -> Result<ItemOutcome> {
        self.registry.lock().set_info(&file.name, PREPARING_INFO);

        let descriptor = self.transport.presign_upload(&file.name, file.size).await?;
        debug!(
            "Presigned upload target for {}: {} (expires {:?})",
            file.name, descriptor.url, descriptor.expiration
        );

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel();
        let put = self.transport.put_object(&descriptor, file, progress_tx);
        tokio::pin!(put);
        let mut sampler = SpeedSampler::new(SPEED_SAMPLE_WINDOW);

        let status = loop {
            tokio::select! {
                biased;
                Some(sample) = progress_rx.recv() => {
                    self.apply_transfer_sample(&file.name, &mut sampler, sample);
                }
                status = &mut put => break status?,
            }
        };
        while let Ok(sample) = progress_rx.try_recv() {
            self.apply_transfer_sample(&file.name, &mut sampler, sample);
        }

        if (200..300).contains(&status) {
            Ok(ItemOutcome {
                url: descriptor.public_url(&file.name),
                already_exists: false,
            })
        } else {
            Err(UploadError::UnexpectedStatus(status))
        }
    }

    fn apply_transfer_sample(&self, name: &str, sampler: &mut SpeedSampler, sample: TransferSample) {
        let speed = sampler.sample(sample.loaded);
        self.registry.lock().set_progress(
            name,
            percent(sample.loaded as f64, sample.total as f64),
            sample.loaded,
            Some(speed),
        );
    }

    fn finish_item(&self, file: &FileRef, elapsed: f64, result: Result<ItemOutcome>) {
        match result {
            Ok(outcome) => {
                info!("Uploaded {} in {:.1}s", file.name, elapsed);
                self.registry.lock().set_status(
                    &file.name,
                    UploadStatus::Success,
                    StatusInfo::success(elapsed, outcome.url),
                );
                let message = if outcome.already_exists {
                    format!("{} already exists in storage", file.name)
                } else {
                    format!("{} uploaded", file.name)
                };
                self.notifier
                    .show(NotificationKind::Success, "Upload succeeded", &message);
            }
            Err(e) => {
                let message = e.to_string();
                error!("Upload of {} failed: {}", file.name, message);
                self.registry.lock().set_status(
                    &file.name,
                    UploadStatus::Error,
                    StatusInfo::error(message.clone()),
                );
                self.notifier.show(
                    NotificationKind::Error,
                    "Upload failed",
                    &format!("{}: {}", file.name, message),
                );
            }
        }
    }

    /// Creates a short share link for an uploaded file.
    ///
    /// Failures are shown to the user and also returned.
    pub async fn generate_share_link(
        &self,
        file_name: &str,
        file_url: &str,
        expiration: &str,
    ) -> Result<ShareLink> {
        debug!(
            "Generating share link for {} ({}), expiration {}",
            file_name, file_url, expiration
        );

        let result = self.share_link(file_name, expiration).await;
        match &result {
            Ok(link) => info!("Share link for {}: {}", file_name, link.short_url),
            Err(e) => {
                error!("Share link for {} failed: {}", file_name, e);
                self.notifier.show(
                    NotificationKind::Error,
                    "Failed to generate link",
                    &e.to_string(),
                );
            }
        }
        result
    }

    async fn share_link(&self, file_name: &str, expiration: &str) -> Result<ShareLink> {
        let download = self.transport.presign_download(file_name, expiration).await?;
        self.transport
            .create_short_link(&download.url, file_name, &download.expiration)
            .await
    }

    pub async fn check_health(&self) -> Result<HealthStatus> {
        let health = self.transport.health().await;
        match &health {
            Ok(status) => debug!("Server health: {}", status.status),
            Err(e) => warn!("Server health check failed: {}", e),
        }
        health
    }
}

/// `upload_{unix millis}_{9 random base36 chars}`.
pub fn generate_upload_id() -> String {
    let mut rng = rand::thread_rng();
    let suffix: String = (0..UPLOAD_ID_SUFFIX_LEN)
        .map(|_| UPLOAD_ID_ALPHABET[rng.gen_range(0..UPLOAD_ID_ALPHABET.len())] as char)
        .collect();
    format!(
        "upload_{}_{}",
        chrono::Utc::now().timestamp_millis(),
        suffix
    )
}
