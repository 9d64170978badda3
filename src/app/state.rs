use crate::intake::IntakeEvent;
use crate::session::token::TokenStatus;
use crate::upload::{Category, Notice};
use egui::Rect;
use std::time::{Duration, Instant};

/// How long a toast stays on screen
pub const TOAST_LIFETIME: Duration = Duration::from_secs(4);

#[derive(Debug, Clone)]
pub struct Toast {
    pub notice: Notice,
    pub expires_at: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ActionProgress {
    #[default]
    NotStarted,
    Uploading {
        total: usize,
        percent: u8,
    },
    /// `percent` is how far the upload got, so a failed upload keeps its partial bar
    Completed {
        succeeded: bool,
        percent: u8,
    },
}

impl ActionProgress {
    pub fn fraction(&self) -> f32 {
        match self {
            ActionProgress::NotStarted => 0.0,
            ActionProgress::Uploading { percent, .. } => f32::from(*percent) / 100.0,
            ActionProgress::Completed { percent, .. } => f32::from(*percent) / 100.0,
        }
    }

    pub fn is_visible(&self) -> bool {
        !matches!(self, ActionProgress::NotStarted)
    }
}

/// Per-drop-zone view state
#[derive(Debug, Default)]
pub struct ZoneState {
    pub progress: ActionProgress,
    /// Screen area of the zone in the last frame, used to route OS file drops
    pub rect: Option<Rect>,
}

/// Everything the window shows that is not owned by the controller
#[derive(Debug)]
pub struct ViewState {
    pub csv: ZoneState,
    pub docs: ZoneState,
    pub toasts: Vec<Toast>,
    pub token_input: String,
    pub token_status: TokenStatus,
    /// Set on each token edit; the token is sent once the debounce has passed
    pub token_edited_at: Option<Instant>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            csv: ZoneState::default(),
            docs: ZoneState::default(),
            toasts: Vec::new(),
            token_input: String::new(),
            token_status: TokenStatus::Hidden,
            token_edited_at: None,
        }
    }
}

impl ViewState {
    pub fn zone(&self, category: Category) -> &ZoneState {
        match category {
            Category::Csv => &self.csv,
            Category::Docs => &self.docs,
        }
    }

    pub fn zone_mut(&mut self, category: Category) -> &mut ZoneState {
        match category {
            Category::Csv => &mut self.csv,
            Category::Docs => &mut self.docs,
        }
    }

    pub fn apply(&mut self, event: IntakeEvent, now: Instant) {
        match event {
            IntakeEvent::Notice(notice) => self.push_toast(notice, now),
            IntakeEvent::RosterChanged(_) => {}
            IntakeEvent::UploadStarted { category, total } => {
                self.zone_mut(category).progress = ActionProgress::Uploading { total, percent: 0 };
            }
            IntakeEvent::Progress { category, percent } => {
                if let ActionProgress::Uploading { total, .. } = self.zone(category).progress {
                    self.zone_mut(category).progress = ActionProgress::Uploading { total, percent };
                }
            }
            IntakeEvent::UploadFinished {
                category,
                succeeded,
            } => {
                let percent = match self.zone(category).progress {
                    _ if succeeded => 100,
                    ActionProgress::Uploading { percent, .. } => percent,
                    _ => 0,
                };
                self.zone_mut(category).progress = ActionProgress::Completed { succeeded, percent };
            }
            IntakeEvent::ProgressReset(category) => {
                self.zone_mut(category).progress = ActionProgress::NotStarted;
            }
            IntakeEvent::TokenStatus(status) => self.token_status = status,
        }
    }

    pub fn push_toast(&mut self, notice: Notice, now: Instant) {
        self.toasts.push(Toast {
            notice,
            expires_at: now + TOAST_LIFETIME,
        });
    }

    pub fn prune_toasts(&mut self, now: Instant) {
        self.toasts.retain(|t| t.expires_at > now);
    }

    /// Which zone contains `pos`, if any
    pub fn zone_at(&self, pos: egui::Pos2) -> Option<Category> {
        Category::ALL
            .into_iter()
            .find(|c| self.zone(*c).rect.is_some_and(|r| r.contains(pos)))
    }

    pub fn token_edited(&mut self, now: Instant) {
        self.token_edited_at = Some(now);
    }

    /// True once per edit, after `debounce` has passed without further edits
    pub fn token_save_due(&mut self, now: Instant, debounce: Duration) -> bool {
        match self.token_edited_at {
            Some(edited) if now.duration_since(edited) >= debounce => {
                self.token_edited_at = None;
                true
            }
            _ => false,
        }
    }
}
