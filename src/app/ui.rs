use super::state::SHARE_EXPIRATIONS;
use super::{HealthState, ShareProgress, UploaderApp};
use crate::upload::{NotificationKind, UploadItem, UploadStatus, UploadStrategy};
use crate::utils::FileSizeUtils;
use eframe::egui::{self, Align, Align2, Color32, RichText};

const ACCENT: Color32 = Color32::from_rgb(161, 89, 225);
const SUCCESS: Color32 = Color32::from_rgb(0, 180, 0);
const FAILURE: Color32 = Color32::from_rgb(220, 50, 50);
const MUTED: Color32 = Color32::from_rgb(150, 150, 150);

enum RowAction {
    Remove(String),
    Open(String),
    Share(String),
}

fn status_color(status: UploadStatus) -> Color32 {
    match status {
        UploadStatus::Pending => MUTED,
        UploadStatus::Uploading => ACCENT,
        UploadStatus::Success => SUCCESS,
        UploadStatus::Error => FAILURE,
    }
}

fn status_icon(status: UploadStatus) -> &'static str {
    match status {
        UploadStatus::Pending => "⏳",
        UploadStatus::Uploading => "📤",
        UploadStatus::Success => "✅",
        UploadStatus::Error => "❌",
    }
}

impl UploaderApp {
    pub fn render(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            let total_height = ui.available_height();
            let footer_height = 30.0;

            egui::ScrollArea::vertical()
                .max_height(total_height - footer_height)
                .show(ui, |ui| {
                    ui.add_space(12.0);
                    self.render_header(ui);
                    ui.add_space(12.0);
                    self.render_actions(ui);
                    ui.add_space(12.0);
                    self.render_files(ui);
                });

            ui.with_layout(egui::Layout::bottom_up(Align::Center), |ui| {
                ui.add_space(6.0);
                ui.label(
                    RichText::new(format!("Server: {}", self.api_base))
                        .color(ui.visuals().text_color().gamma_multiply(0.6)),
                );
            });
        });

        self.render_share_dialog(ctx);
        self.render_toasts(ctx);
    }

    fn render_header(&mut self, ui: &mut egui::Ui) {
        ui.vertical_centered(|ui| {
            ui.heading("OSS Uploader");
            ui.add_space(5.0);
            ui.label(
                RichText::new("Upload files through the server or straight to storage")
                    .color(ui.visuals().text_color().gamma_multiply(0.7)),
            );
        });

        ui.add_space(8.0);
        ui.horizontal(|ui| {
            let (color, text) = match &self.state.health {
                HealthState::Unknown => (MUTED, "Server status unknown".to_string()),
                HealthState::Checking => (MUTED, "Checking server...".to_string()),
                HealthState::Online(status) => (SUCCESS, format!("Server online: {}", status)),
                HealthState::Offline(e) => (FAILURE, format!("Server unreachable: {}", e)),
            };
            ui.colored_label(color, "●");
            ui.label(text);
            if ui.small_button("↻").on_hover_text("Check again").clicked() {
                self.check_health(ui.ctx());
            }
        });
    }

    fn render_actions(&mut self, ui: &mut egui::Ui) {
        let uploading = self.state.is_uploading();

        ui.group(|ui| {
            ui.horizontal(|ui| {
                if ui.button("📄 Add Files").clicked() {
                    self.pick_files();
                }
                if ui.button("📁 Add Folder").clicked() {
                    self.pick_folder();
                }
                ui.label(
                    RichText::new("or drop files here")
                        .color(ui.visuals().text_color().gamma_multiply(0.6)),
                );
                ui.with_layout(egui::Layout::right_to_left(Align::Center), |ui| {
                    let has_files = !self.registry.lock().is_empty();
                    if ui
                        .add_enabled(has_files && !uploading, egui::Button::new("🗑 Clear All"))
                        .clicked()
                    {
                        self.clear_files();
                    }
                });
            });

            let stats = self.registry.lock().stats();
            ui.add_space(4.0);
            ui.label(format!(
                "Files: {} | Total size: {} | Pending: {}",
                stats.total_files, stats.total_size, stats.pending_files
            ));
        });

        ui.add_space(10.0);
        ui.vertical_centered(|ui| {
            ui.horizontal(|ui| {
                let can_upload = !uploading;
                let relayed = egui::Button::new("📤 Upload via Server").min_size(egui::vec2(180.0, 36.0));
                if ui.add_enabled(can_upload, relayed).clicked() {
                    self.start_upload(UploadStrategy::Relayed, ui.ctx());
                }

                let presigned = egui::Button::new("☁ Direct Upload").min_size(egui::vec2(180.0, 36.0));
                if ui
                    .add_enabled(can_upload, presigned)
                    .on_hover_text("Upload straight to storage with a pre-signed URL")
                    .clicked()
                {
                    self.start_upload(UploadStrategy::Presigned, ui.ctx());
                }

                if uploading && ui.button("⏹ Cancel").clicked() {
                    self.cancel_upload();
                }
            });
        });
    }

    fn render_files(&mut self, ui: &mut egui::Ui) {
        let items: Vec<UploadItem> = self.registry.lock().iter().cloned().collect();
        if items.is_empty() {
            ui.vertical_centered(|ui| {
                ui.add_space(20.0);
                ui.colored_label(MUTED, "No files selected");
            });
            return;
        }

        let mut actions = Vec::new();
        egui::Frame::none()
            .fill(ui.style().visuals.extreme_bg_color)
            .inner_margin(8.0)
            .show(ui, |ui| {
                egui::Grid::new("upload_items")
                    .num_columns(6)
                    .striped(true)
                    .spacing([12.0, 6.0])
                    .show(ui, |ui| {
                        ui.strong("File");
                        ui.strong("Size");
                        ui.strong("Status");
                        ui.strong("Progress");
                        ui.strong("Info");
                        ui.strong("");
                        ui.end_row();

                        for item in &items {
                            Self::render_row(ui, item, &mut actions);
                            ui.end_row();
                        }
                    });
            });

        for action in actions {
            match action {
                RowAction::Remove(name) => self.remove_file(&name),
                RowAction::Open(url) => {
                    if let Err(e) = open::that(&url) {
                        tracing::warn!("Failed to open {}: {}", url, e);
                    }
                }
                RowAction::Share(name) => self.open_share_dialog(name),
            }
        }
    }

    fn render_row(ui: &mut egui::Ui, item: &UploadItem, actions: &mut Vec<RowAction>) {
        ui.label(&item.file.name);
        ui.label(FileSizeUtils::format_bytes(item.file.size));
        ui.colored_label(
            status_color(item.status),
            format!("{} {}", status_icon(item.status), item.status),
        );

        match item.status {
            UploadStatus::Uploading => {
                ui.add(
                    egui::ProgressBar::new(item.progress as f32 / 100.0)
                        .desired_width(120.0)
                        .show_percentage()
                        .fill(ACCENT),
                );
            }
            UploadStatus::Success => {
                ui.label("100%");
            }
            _ => {
                ui.label("-");
            }
        }

        let info = RichText::new(&item.upload_info);
        if item.status == UploadStatus::Error {
            ui.label(info.color(FAILURE));
        } else {
            ui.label(info);
        }

        ui.horizontal(|ui| {
            if item.status == UploadStatus::Success && !item.url.is_empty() {
                if ui.small_button("🔗").on_hover_text(&item.url).clicked() {
                    actions.push(RowAction::Open(item.url.clone()));
                }
                if ui.small_button("Share").clicked() {
                    actions.push(RowAction::Share(item.file.name.clone()));
                }
            }
            if ui.small_button("✖").on_hover_text("Remove").clicked() {
                actions.push(RowAction::Remove(item.file.name.clone()));
            }
        });
    }

    fn render_share_dialog(&mut self, ctx: &egui::Context) {
        let Some(mut dialog) = self.state.share_dialog.take() else {
            return;
        };

        let mut open = true;
        let mut generate = false;
        egui::Window::new("Share link")
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .open(&mut open)
            .show(ctx, |ui| {
                ui.label(RichText::new(&dialog.file_name).strong());
                ui.add_space(6.0);

                let busy = matches!(dialog.progress, ShareProgress::Generating);
                ui.add_enabled_ui(!busy, |ui| {
                    let selected = dialog.expiration_label().to_string();
                    egui::ComboBox::from_label("Valid for")
                        .selected_text(selected)
                        .show_ui(ui, |ui| {
                            for (value, label) in SHARE_EXPIRATIONS {
                                ui.selectable_value(&mut dialog.expiration, value.to_string(), label);
                            }
                        });
                });

                ui.add_space(6.0);
                match &dialog.progress {
                    ShareProgress::Idle => {
                        if ui.button("Generate link").clicked() {
                            generate = true;
                        }
                    }
                    ShareProgress::Generating => {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Generating...");
                        });
                    }
                    ShareProgress::Ready(link) => {
                        ui.horizontal(|ui| {
                            ui.monospace(&link.short_url);
                            if ui.small_button("📋").on_hover_text("Copy").clicked() {
                                ui.output_mut(|o| o.copied_text = link.short_url.clone());
                            }
                        });
                        ui.colored_label(MUTED, format!("Expires {}", link.expiration));
                        if ui.button("Generate again").clicked() {
                            generate = true;
                        }
                    }
                    ShareProgress::Failed(e) => {
                        ui.colored_label(FAILURE, e);
                        if ui.button("Retry").clicked() {
                            generate = true;
                        }
                    }
                }
            });

        if open {
            self.state.share_dialog = Some(dialog);
            if generate {
                self.generate_share_link(ctx);
            }
        }
    }

    fn render_toasts(&self, ctx: &egui::Context) {
        if self.state.toasts.is_empty() {
            return;
        }

        egui::Area::new("toasts")
            .anchor(Align2::RIGHT_BOTTOM, egui::vec2(-12.0, -40.0))
            .show(ctx, |ui| {
                for toast in &self.state.toasts {
                    let color = match toast.notification.kind {
                        NotificationKind::Success => SUCCESS,
                        NotificationKind::Error => FAILURE,
                        NotificationKind::Warning => Color32::from_rgb(230, 160, 30),
                        NotificationKind::Info => ACCENT,
                    };
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.set_max_width(280.0);
                        ui.colored_label(color, RichText::new(&toast.notification.title).strong());
                        ui.label(&toast.notification.message);
                    });
                    ui.add_space(4.0);
                }
            });
    }
}
