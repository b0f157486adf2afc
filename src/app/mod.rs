mod state;
mod ui;

use crate::config::AppConfig;
use crate::upload::{
    FileRef, FileRegistry, Notification, NotificationKind, Notifier, SharedRegistry, Transport,
    UploadOrchestrator, UploadStrategy,
};
use eframe::{egui, App};
use ignore::Walk;
use parking_lot::Mutex;
pub use state::{HealthState, ShareDialog, ShareProgress, UiState};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self as std_mpsc, Sender};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{error, info, warn};

const UPLOAD_REPAINT_INTERVAL: Duration = Duration::from_millis(100);

/// Forwards notifications to the UI thread as toasts.
pub struct ChannelNotifier {
    sender: Mutex<Sender<Notification>>,
    ctx: egui::Context,
}

impl Notifier for ChannelNotifier {
    fn show(&self, kind: NotificationKind, title: &str, message: &str) {
        let notification = Notification {
            kind,
            title: title.to_string(),
            message: message.to_string(),
        };
        if self.sender.lock().send(notification).is_err() {
            warn!("Notification dropped, UI is gone: {} {}", title, message);
        }
        self.ctx.request_repaint();
    }
}

pub struct UploaderApp {
    registry: SharedRegistry,
    orchestrator: Arc<UploadOrchestrator>,
    notifier: Arc<ChannelNotifier>,
    runtime: Handle,
    api_base: String,
    default_expiration: String,
    state: UiState,
}

impl UploaderApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        transport: Arc<dyn Transport>,
        runtime: Handle,
        config: &AppConfig,
    ) -> Self {
        info!("Initializing OSS Uploader");
        let (sender, receiver) = std_mpsc::channel();
        let notifier = Arc::new(ChannelNotifier {
            sender: Mutex::new(sender),
            ctx: cc.egui_ctx.clone(),
        });

        let registry = FileRegistry::shared();
        let orchestrator = Arc::new(UploadOrchestrator::new(
            registry.clone(),
            transport,
            notifier.clone(),
        ));

        let mut app = Self {
            registry,
            orchestrator,
            notifier,
            runtime,
            api_base: config.server.api_base.clone(),
            default_expiration: config.upload.default_share_expiration.clone(),
            state: UiState {
                notification_receiver: Some(receiver),
                ..Default::default()
            },
        };
        app.check_health(&cc.egui_ctx);
        app
    }

    pub fn add_paths(&mut self, paths: Vec<PathBuf>) {
        let mut files = Vec::with_capacity(paths.len());
        for path in paths {
            match FileRef::from_path(&path) {
                Ok(file) => files.push(file),
                Err(e) => {
                    warn!("Cannot add {}: {}", path.display(), e);
                    self.notifier.show(
                        NotificationKind::Warning,
                        "File skipped",
                        &format!("{}: {}", path.display(), e),
                    );
                }
            }
        }
        self.add_files(files);
    }

    pub fn add_files(&mut self, files: Vec<FileRef>) {
        let offered = files.len();
        let (added, tracked) = {
            let mut registry = self.registry.lock();
            let added = registry.add(files);
            (added, registry.len())
        };
        info!("Added {} of {} selected file(s), {} tracked", added, offered, tracked);
        if added < offered {
            self.notifier.show(
                NotificationKind::Info,
                "Duplicates skipped",
                &format!("{} file(s) with an already listed name were ignored", offered - added),
            );
        }
    }

    pub fn pick_files(&mut self) {
        if let Some(paths) = rfd::FileDialog::new().pick_files() {
            self.add_paths(paths);
        }
    }

    pub fn pick_folder(&mut self) {
        if let Some(folder) = rfd::FileDialog::new().pick_folder() {
            let paths = Self::collect_folder(&folder);
            info!("Found {} file(s) in {}", paths.len(), folder.display());
            self.add_paths(paths);
        }
    }

    /// Files below `folder`, honouring `.gitignore` and hidden-file rules.
    fn collect_folder(folder: &Path) -> Vec<PathBuf> {
        Walk::new(folder)
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry.into_path()),
                Err(e) => {
                    warn!("Skipping folder entry: {}", e);
                    None
                }
            })
            .filter(|path| path.is_file())
            .collect()
    }

    pub fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if dropped.is_empty() {
            return;
        }

        let mut paths = Vec::new();
        let mut files = Vec::new();
        for file in dropped {
            if let Some(path) = file.path {
                paths.push(path);
            } else if let Some(bytes) = file.bytes {
                files.push(FileRef::from_bytes(file.name, bytes));
            }
        }
        self.add_paths(paths);
        self.add_files(files);
    }

    pub fn start_upload(&mut self, strategy: UploadStrategy, ctx: &egui::Context) {
        if self.state.is_uploading() || self.orchestrator.is_running() {
            return;
        }
        info!("Starting {} upload", strategy);

        let (done_sender, done_receiver) = std_mpsc::channel();
        self.state.batch_done_receiver = Some(done_receiver);
        self.state.active_strategy = Some(strategy);

        let orchestrator = self.orchestrator.clone();
        let notifier = self.notifier.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let batch = tokio::spawn(async move {
                match strategy {
                    UploadStrategy::Relayed => orchestrator.upload_relayed().await,
                    UploadStrategy::Presigned => orchestrator.upload_presigned().await,
                }
            });
            if let Err(e) = batch.await {
                error!("Upload batch aborted: {}", e);
                notifier.show(
                    NotificationKind::Error,
                    "Upload failed",
                    &format!("Unexpected error during upload: {}", e),
                );
            }
            let _ = done_sender.send(());
            ctx.request_repaint();
        });
    }

    pub fn cancel_upload(&mut self) {
        if !self.orchestrator.cancel() {
            warn!("Cancel requested but no upload is running");
        }
    }

    pub fn remove_file(&mut self, name: &str) {
        if self.registry.lock().remove(name).is_some() {
            info!("Removed {}", name);
        }
    }

    pub fn clear_files(&mut self) {
        info!("Clearing file list");
        self.registry.lock().clear();
    }

    pub fn open_share_dialog(&mut self, file_name: String) {
        let Some(file_url) = self.registry.lock().get(&file_name).map(|item| item.url.clone())
        else {
            return;
        };
        self.state.share_dialog = Some(ShareDialog::new(
            file_name,
            file_url,
            self.default_expiration.clone(),
        ));
    }

    pub fn generate_share_link(&mut self, ctx: &egui::Context) {
        let Some(dialog) = self.state.share_dialog.as_mut() else {
            return;
        };
        dialog.progress = ShareProgress::Generating;

        let (sender, receiver) = std_mpsc::channel();
        self.state.share_receiver = Some(receiver);

        let orchestrator = self.orchestrator.clone();
        let file_name = dialog.file_name.clone();
        let file_url = dialog.file_url.clone();
        let expiration = dialog.expiration.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let result = orchestrator
                .generate_share_link(&file_name, &file_url, &expiration)
                .await
                .map_err(|e| e.to_string());
            let _ = sender.send((file_name, result));
            ctx.request_repaint();
        });
    }

    pub fn check_health(&mut self, ctx: &egui::Context) {
        self.state.health = HealthState::Checking;
        let (sender, receiver) = std_mpsc::channel();
        self.state.health_receiver = Some(receiver);

        let orchestrator = self.orchestrator.clone();
        let ctx = ctx.clone();
        self.runtime.spawn(async move {
            let result = orchestrator.check_health().await.map_err(|e| e.to_string());
            let _ = sender.send(HealthState::from_result(result));
            ctx.request_repaint();
        });
    }

    pub fn update_state(&mut self, ctx: &egui::Context) {
        let now = Instant::now();

        if let Some(receiver) = &self.state.notification_receiver {
            let pending: Vec<Notification> = receiver.try_iter().collect();
            for notification in pending {
                self.state.push_toast(notification, now);
            }
        }

        if let Some(receiver) = &self.state.batch_done_receiver {
            if receiver.try_recv().is_ok() {
                self.state.batch_done_receiver = None;
                self.state.active_strategy = None;
            }
        }

        if let Some(receiver) = &self.state.share_receiver {
            if let Ok(result) = receiver.try_recv() {
                self.state.share_receiver = None;
                self.state.apply_share_result(result);
            }
        }

        if let Some(receiver) = &self.state.health_receiver {
            if let Ok(health) = receiver.try_recv() {
                self.state.health_receiver = None;
                self.state.health = health;
            }
        }

        self.state.expire_toasts(now);
        if self.state.is_uploading() {
            ctx.request_repaint_after(UPLOAD_REPAINT_INTERVAL);
        } else if !self.state.toasts.is_empty() {
            ctx.request_repaint_after(Duration::from_millis(250));
        }
    }
}

impl App for UploaderApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_dropped_files(ctx);
        self.update_state(ctx);
        self.render(ctx);
    }
}
