mod state;
mod ui;

use crate::intake::IntakeController;
use crate::upload::{Category, CollectedFile, DropItem, DropPayload};
use chrono::Utc;
use eframe::{egui, App};
pub use state::{ActionProgress, ViewState};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Repaint cadence while background work may report back
const BUSY_REPAINT: Duration = Duration::from_millis(100);

pub struct IntakeApp {
    controller: IntakeController,
    state: ViewState,
    collections: Vec<JoinHandle<()>>,
    // Keeps the worker threads alive for the controller's tasks; dropped last
    _runtime: Runtime,
}

impl IntakeApp {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        mut controller: IntakeController,
        runtime: Runtime,
    ) -> Self {
        info!(server = %controller.config().server_url, "starting intake window");
        let state = ViewState {
            token_input: controller.restore_session(),
            ..Default::default()
        };
        Self {
            controller,
            state,
            collections: Vec::new(),
            _runtime: runtime,
        }
    }

    /// Hand a drop or picker selection to the controller
    pub fn submit(&mut self, payload: DropPayload, category: Category) {
        if let Some(task) = self.controller.accept_drop(payload, category) {
            self.collections.push(task);
        }
    }

    pub fn submit_paths(&mut self, paths: Vec<PathBuf>, category: Category) {
        let items: Vec<DropItem> = paths.into_iter().map(DropItem::Path).collect();
        self.submit(items.into(), category);
    }

    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let (dropped, pointer) = ctx.input(|i| (i.raw.dropped_files.clone(), i.pointer.latest_pos()));
        if dropped.is_empty() {
            return;
        }

        let items: Vec<DropItem> = dropped
            .into_iter()
            .filter_map(|file| match (file.path, file.bytes) {
                (Some(path), _) => Some(DropItem::Path(path)),
                (None, Some(bytes)) => Some(DropItem::File(CollectedFile::in_memory(file.name, bytes))),
                (None, None) => None,
            })
            .collect();

        // Without a pointer position the drop goes to the zone whose types it matches
        let category = pointer
            .and_then(|pos| self.state.zone_at(pos))
            .unwrap_or_else(|| guess_category(&items));
        debug!(%category, items = items.len(), "files dropped on window");
        self.submit(items.into(), category);
    }

    fn update_token(&mut self, now: Instant) {
        if self
            .state
            .token_save_due(now, self.controller.config().token_save_debounce)
        {
            self.controller.set_token(&self.state.token_input, Utc::now());
            let _ = self.controller.save_token();
        }
    }

    fn is_busy(&self) -> bool {
        !self.collections.is_empty()
            || Category::ALL
                .iter()
                .any(|c| self.controller.is_uploading(*c) || self.state.zone(*c).progress.is_visible())
    }
}

fn guess_category(items: &[DropItem]) -> Category {
    let all_csv = !items.is_empty()
        && items.iter().all(|item| {
            let name = match item {
                DropItem::File(file) => file.name.clone(),
                DropItem::Path(path) => path.to_string_lossy().to_string(),
                DropItem::Entry(node) => node.name().to_string(),
            };
            name.to_ascii_lowercase().ends_with(".csv")
        });
    if all_csv {
        Category::Csv
    } else {
        Category::Docs
    }
}

impl Drop for IntakeApp {
    fn drop(&mut self) {
        // The session file holds the access token; it must not outlive the window
        if let Err(e) = self.controller.end_session() {
            warn!(error = %e, "could not remove the session file");
        }
    }
}

impl App for IntakeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        self.handle_dropped_files(ctx);
        self.collections.retain(|task| !task.is_finished());
        for event in self.controller.poll_events() {
            self.state.apply(event, now);
        }
        self.update_token(now);
        self.state.prune_toasts(now);

        self.render(ctx);

        let next = if self.is_busy() || !self.state.toasts.is_empty() {
            BUSY_REPAINT
        } else if self.state.token_edited_at.is_some() {
            self.controller.config().token_save_debounce
        } else {
            self.controller.config().token_refresh_interval
        };
        ctx.request_repaint_after(next);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_routing_falls_back_to_file_types() {
        let csv = vec![
            DropItem::Path(PathBuf::from("/tmp/a.CSV")),
            DropItem::File(CollectedFile::in_memory("b.csv", &b""[..])),
        ];
        assert_eq!(guess_category(&csv), Category::Csv);

        let mixed = vec![
            DropItem::Path(PathBuf::from("/tmp/a.csv")),
            DropItem::Path(PathBuf::from("/tmp/folder")),
        ];
        assert_eq!(guess_category(&mixed), Category::Docs);
        assert_eq!(guess_category(&[]), Category::Docs);
    }
}
