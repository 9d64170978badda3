use super::{ActionProgress, IntakeApp};
use crate::session::token::TokenStatus;
use crate::upload::{Category, EntryId, Severity};
use eframe::egui::{self, Align, Align2, Color32, RichText};
use rfd::FileDialog;
use std::time::Instant;

const ACCENT: Color32 = Color32::from_rgb(161, 89, 225);
const SUCCESS: Color32 = Color32::from_rgb(0, 180, 0);
const WARNING: Color32 = Color32::from_rgb(230, 160, 0);
const ERROR: Color32 = Color32::from_rgb(220, 50, 50);
const MUTED: Color32 = Color32::from_rgb(150, 150, 150);

enum UiAction {
    PickFiles(Category),
    PickFolder(Category),
    Cancel(Category),
    Remove(Category, EntryId),
    Clear(Category),
}

fn severity_color(severity: Severity) -> Color32 {
    match severity {
        Severity::Info => ACCENT,
        Severity::Success => SUCCESS,
        Severity::Warning => WARNING,
        Severity::Error => ERROR,
    }
}

impl IntakeApp {
    pub fn render(&mut self, ctx: &egui::Context) {
        let mut actions = Vec::new();
        let hovering = ctx.input(|i| !i.raw.hovered_files.is_empty());

        egui::CentralPanel::default().show(ctx, |ui| {
            let footer_height = 40.0;
            let content_height = ui.available_height() - footer_height;

            egui::ScrollArea::vertical()
                .max_height(content_height)
                .show(ui, |ui| {
                    ui.add_space(20.0);
                    ui.vertical_centered(|ui| {
                        ui.heading("Document Intake");
                        ui.add_space(5.0);
                        ui.label(
                            RichText::new("Drop CSV exports and supporting documents to upload them")
                                .color(ui.visuals().text_color().gamma_multiply(0.7)),
                        );
                    });
                    ui.add_space(20.0);

                    self.render_token(ui);
                    ui.add_space(20.0);

                    for category in Category::ALL {
                        self.render_zone(ui, category, hovering, &mut actions);
                        ui.add_space(20.0);
                    }
                });

            ui.with_layout(egui::Layout::bottom_up(Align::Center), |ui| {
                ui.add_space(10.0);
                self.render_footer(ui);
            });
        });

        self.render_toasts(ctx);

        for action in actions {
            self.apply_action(action);
        }
    }

    fn apply_action(&mut self, action: UiAction) {
        match action {
            UiAction::PickFiles(category) => {
                let dialog = FileDialog::new().add_filter(category.label(), category.allowed_extensions());
                if let Some(paths) = dialog.pick_files() {
                    self.submit_paths(paths, category);
                }
            }
            UiAction::PickFolder(category) => {
                if let Some(path) = FileDialog::new().pick_folder() {
                    self.submit_paths(vec![path], category);
                }
            }
            UiAction::Cancel(category) => {
                self.controller.cancel_upload(category);
            }
            UiAction::Remove(category, id) => {
                self.controller.remove_file(category, id);
            }
            UiAction::Clear(category) => self.controller.clear(category),
        }
    }

    fn render_token(&mut self, ui: &mut egui::Ui) {
        ui.group(|ui| {
            ui.horizontal(|ui| {
                ui.label("Access token");
                ui.add_space(4.0);
                ui.label("ℹ").on_hover_text_at_pointer(
                    "The token is sent to the server shortly after you stop typing.\n\
                    It stays valid for 6 hours after it was first entered.",
                );
            });
            ui.add_space(8.0);

            let edit = egui::TextEdit::singleline(&mut self.state.token_input)
                .password(true)
                .desired_width(ui.available_width())
                .hint_text("Paste your access token");
            if ui.add(edit).changed() {
                self.state.token_edited(Instant::now());
            }

            let (text, color) = match self.state.token_status {
                TokenStatus::Hidden => return,
                TokenStatus::Valid { .. } => (self.state.token_status.describe(), SUCCESS),
                TokenStatus::Warning { .. } => (self.state.token_status.describe(), WARNING),
                TokenStatus::Expired => (self.state.token_status.describe(), ERROR),
            };
            ui.add_space(4.0);
            ui.colored_label(color, text);
        });
    }

    fn render_zone(
        &mut self,
        ui: &mut egui::Ui,
        category: Category,
        hovering: bool,
        actions: &mut Vec<UiAction>,
    ) {
        let fill = if hovering {
            ACCENT.gamma_multiply(0.15)
        } else {
            ui.visuals().extreme_bg_color
        };
        let roster = self.controller.roster(category);
        let uploading = self.controller.is_uploading(category);
        let progress = self.state.zone(category).progress;

        let response = egui::Frame::group(ui.style()).fill(fill).show(ui, |ui| {
            ui.set_width(ui.available_width());
            ui.heading(category.label());
            ui.label(
                RichText::new(format!(
                    "Drop files or folders here. Accepted: {}",
                    category.allowed_extensions().join(", ")
                ))
                .color(MUTED),
            );
            ui.add_space(8.0);

            ui.horizontal(|ui| {
                if ui.button("📄 Choose Files").clicked() {
                    actions.push(UiAction::PickFiles(category));
                }
                if ui.button("📁 Choose Folder").clicked() {
                    actions.push(UiAction::PickFolder(category));
                }
            });

            if progress.is_visible() {
                ui.add_space(8.0);
                let label = match progress {
                    ActionProgress::Uploading { total, .. } => format!("📤 Uploading {} files", total),
                    ActionProgress::Completed { succeeded: true, .. } => "Upload Complete".to_string(),
                    _ => "Upload Failed".to_string(),
                };
                ui.horizontal(|ui| {
                    ui.label(label);
                    if uploading && ui.small_button("Cancel").clicked() {
                        actions.push(UiAction::Cancel(category));
                    }
                });
                ui.add(
                    egui::ProgressBar::new(progress.fraction())
                        .show_percentage()
                        .animate(uploading)
                        .fill(ACCENT),
                );
            }

            if roster.is_empty() {
                return;
            }
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                ui.label(format!("{} files", roster.len()));
                ui.label(RichText::new(format!("{} bytes", roster.total_size())).color(MUTED));
                ui.with_layout(egui::Layout::right_to_left(Align::Center), |ui| {
                    if ui.small_button("🗑 Clear").clicked() {
                        actions.push(UiAction::Clear(category));
                    }
                });
            });

            egui::ScrollArea::vertical()
                .id_source(category.session_key())
                .max_height(200.0)
                .show(ui, |ui| {
                    for entry in roster.entries() {
                        ui.horizontal(|ui| {
                            ui.label(&entry.name);
                            ui.label(RichText::new(format!("{} bytes", entry.size)).color(MUTED));
                            ui.with_layout(egui::Layout::right_to_left(Align::Center), |ui| {
                                if ui
                                    .small_button("✕")
                                    .on_hover_text(format!("Remove {}", entry.name))
                                    .clicked()
                                {
                                    actions.push(UiAction::Remove(category, entry.id));
                                }
                            });
                        });
                    }
                });
        });

        self.state.zone_mut(category).rect = Some(response.response.rect);
    }

    fn render_toasts(&self, ctx: &egui::Context) {
        if self.state.toasts.is_empty() {
            return;
        }
        egui::Area::new("toasts")
            .anchor(Align2::RIGHT_BOTTOM, egui::vec2(-12.0, -12.0))
            .show(ctx, |ui| {
                for toast in &self.state.toasts {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.colored_label(severity_color(toast.notice.severity), &toast.notice.message);
                    });
                    ui.add_space(4.0);
                }
            });
    }

    fn render_footer(&self, ui: &mut egui::Ui) {
        let server = &self.controller.config().server_url;
        ui.horizontal(|ui| {
            ui.label("Server:");
            if ui
                .add(
                    egui::Label::new(RichText::new(server).color(ACCENT))
                        .sense(egui::Sense::click()),
                )
                .clicked()
            {
                let _ = open::that(server);
            }
        });
    }
}
