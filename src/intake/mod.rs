//! Intake controller
//!
//! Owns both rosters and the session store, and is driven from a single thread (the UI loop).
//! Collection, uploads, token saves and the token ticker run as tokio tasks; they never touch
//! controller state directly but report through an inbox that [`IntakeController::poll_events`]
//! drains. Roster mutations therefore only ever happen on the owning thread.

mod roster;

pub use roster::Roster;

use crate::api::IntakeApi;
use crate::config::IntakeConfig;
use crate::error::Result;
use crate::session::token::TokenStatus;
use crate::session::{self, SessionSnapshot, SessionStore, TOKEN_KEY, TOKEN_TIME_KEY};
use crate::upload::{
    validate, BatchUploader, Category, CollectedFile, Collection, DropPayload, EntryId, FileEntry,
    FileSource, Notice, Severity, TreeCollector, UploadEvent, UploadSummary,
};
use chrono::{DateTime, Utc};
use derivative::Derivative;
use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What the controller reports to the UI
#[derive(Debug, Clone, PartialEq)]
pub enum IntakeEvent {
    Notice(Notice),
    RosterChanged(Category),
    UploadStarted { category: Category, total: usize },
    Progress { category: Category, percent: u8 },
    UploadFinished { category: Category, succeeded: bool },
    ProgressReset(Category),
    TokenStatus(TokenStatus),
}

/// Messages from background tasks back to the controller
enum TaskMessage {
    Upload(UploadEvent),
    Collected {
        category: Category,
        collection: Collection,
    },
    Notice(Notice),
    TokenTick,
}

impl From<UploadEvent> for TaskMessage {
    fn from(event: UploadEvent) -> Self {
        TaskMessage::Upload(event)
    }
}

#[derive(Debug, Default)]
struct Rosters {
    csv: Roster,
    docs: Roster,
}

impl Rosters {
    fn get(&self, category: Category) -> &Roster {
        match category {
            Category::Csv => &self.csv,
            Category::Docs => &self.docs,
        }
    }

    fn get_mut(&mut self, category: Category) -> &mut Roster {
        match category {
            Category::Csv => &mut self.csv,
            Category::Docs => &mut self.docs,
        }
    }
}

pub type UploadTask = JoinHandle<Result<UploadSummary>>;

#[derive(Derivative)]
#[derivative(Debug)]
pub struct IntakeController {
    config: IntakeConfig,
    #[derivative(Debug = "ignore")]
    api: Arc<dyn IntakeApi>,
    #[derivative(Debug = "ignore")]
    store: Box<dyn SessionStore>,
    #[derivative(Debug = "ignore")]
    uploader: BatchUploader,
    #[derivative(Debug = "ignore")]
    collector: Arc<TreeCollector>,
    #[derivative(Debug = "ignore")]
    runtime: Handle,
    rosters: Rosters,
    in_flight: HashMap<Category, CancellationToken>,
    queued: HashMap<Category, Vec<FileEntry>>,
    next_id: u64,
    token: String,
    token_issued: Option<DateTime<Utc>>,
    token_ticker: Option<JoinHandle<()>>,
    #[derivative(Debug = "ignore")]
    inbox_tx: Sender<TaskMessage>,
    #[derivative(Debug = "ignore")]
    inbox_rx: Receiver<TaskMessage>,
    outbox: Vec<IntakeEvent>,
}

impl IntakeController {
    pub fn new(
        config: IntakeConfig,
        api: Arc<dyn IntakeApi>,
        store: Box<dyn SessionStore>,
        runtime: Handle,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel();
        Self {
            uploader: BatchUploader::new(api.clone(), &config),
            collector: Arc::new(TreeCollector::from_config(&config)),
            config,
            api,
            store,
            runtime,
            rosters: Rosters::default(),
            in_flight: HashMap::new(),
            queued: HashMap::new(),
            next_id: 0,
            token: String::new(),
            token_issued: None,
            token_ticker: None,
            inbox_tx,
            inbox_rx,
            outbox: Vec::new(),
        }
    }

    pub fn config(&self) -> &IntakeConfig {
        &self.config
    }

    pub fn roster(&self, category: Category) -> &Roster {
        self.rosters.get(category)
    }

    pub fn is_uploading(&self, category: Category) -> bool {
        self.in_flight.contains_key(&category)
    }

    pub fn store(&self) -> &dyn SessionStore {
        self.store.as_ref()
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// Flatten a drop (or picker selection) in the background. The files reach
    /// [`handle_incoming_files`](Self::handle_incoming_files) through the next
    /// [`poll_events`](Self::poll_events) after collection completes.
    pub fn accept_drop(&mut self, payload: DropPayload, category: Category) -> Option<JoinHandle<()>> {
        if payload.is_empty() {
            return None;
        }
        let collector = self.collector.clone();
        let inbox = self.inbox_tx.clone();
        Some(self.runtime.spawn(async move {
            let collection = collector.collect(payload).await;
            let _ = inbox.send(TaskMessage::Collected {
                category,
                collection,
            });
        }))
    }

    /// Validate `files`, add the accepted ones to the roster and upload them.
    ///
    /// Returns the upload task when one was started. If the category is already uploading, the
    /// accepted files are queued and sent once the current upload finishes.
    pub fn handle_incoming_files(
        &mut self,
        files: Vec<CollectedFile>,
        category: Category,
    ) -> Option<UploadTask> {
        let mut accepted = Vec::new();
        for file in files {
            let rejections = validate(&file.name, file.size, category, self.config.max_file_size);
            if rejections.is_empty() {
                accepted.push(self.new_entry(file, category));
            } else {
                for rejection in rejections {
                    debug!(%category, name = %rejection.name, reason = ?rejection.reason, "file rejected");
                    self.notify(rejection.to_string(), Severity::Error);
                }
            }
        }
        if accepted.is_empty() {
            return None;
        }

        info!(%category, files = accepted.len(), "files accepted");
        self.rosters.get_mut(category).append(accepted.iter().cloned());
        self.roster_changed(category);

        if self.is_uploading(category) {
            let queued = self.queued.entry(category).or_default();
            queued.extend(accepted);
            let count = queued.len();
            self.notify(
                format!("{} files queued until the current upload finishes", count),
                Severity::Info,
            );
            return None;
        }
        Some(self.start_upload(category, accepted))
    }

    /// Stop an in-flight upload before its next batch and drop anything queued behind it
    pub fn cancel_upload(&mut self, category: Category) -> bool {
        self.queued.remove(&category);
        match self.in_flight.get(&category) {
            Some(cancel) => {
                cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn remove_file(&mut self, category: Category, id: EntryId) -> Option<FileEntry> {
        let removed = self.rosters.get_mut(category).remove(id)?;
        self.roster_changed(category);
        Some(removed)
    }

    /// Positional removal, as displayed; out-of-range indices are ignored
    pub fn remove_at(&mut self, category: Category, index: usize) -> Option<FileEntry> {
        let removed = self.rosters.get_mut(category).remove_at(index)?;
        self.roster_changed(category);
        Some(removed)
    }

    pub fn clear(&mut self, category: Category) {
        if self.rosters.get(category).is_empty() {
            return;
        }
        self.rosters.get_mut(category).clear();
        self.roster_changed(category);
    }

    /// Rebuild token and rosters from the session store and start the token ticker.
    ///
    /// Restored entries carry names only: sizes are zero and there is no content to resend.
    pub fn restore_session(&mut self) -> String {
        let snapshot = SessionSnapshot::load(self.store.as_ref());
        self.token = snapshot.token.clone().unwrap_or_default();
        self.token_issued = snapshot.token_issued;

        for category in Category::ALL {
            let restored: Vec<FileEntry> = snapshot
                .names(category)
                .iter()
                .map(|name| {
                    self.new_entry(
                        CollectedFile {
                            name: name.clone(),
                            size: 0,
                            source: FileSource::Restored,
                        },
                        category,
                    )
                })
                .collect();
            let roster = self.rosters.get_mut(category);
            roster.clear();
            roster.append(restored);
            self.outbox.push(IntakeEvent::RosterChanged(category));
        }
        info!(
            csv = snapshot.csv_files.len(),
            docs = snapshot.docs_files.len(),
            has_token = snapshot.token.is_some(),
            "session restored"
        );

        self.outbox
            .push(IntakeEvent::TokenStatus(self.token_status(Utc::now())));
        self.start_token_ticker();
        self.token.clone()
    }

    /// Write both rosters' names to the session store
    pub fn persist_session(&mut self) -> Result<()> {
        let csv = session::encode_names(self.rosters.get(Category::Csv).names())?;
        let docs = session::encode_names(self.rosters.get(Category::Docs).names())?;
        self.store.persist_all(&[
            (Category::Csv.session_key(), &csv),
            (Category::Docs.session_key(), &docs),
        ])
    }

    /// Drop everything the session store holds, token included. Called on a clean exit.
    pub fn end_session(&mut self) -> Result<()> {
        if let Some(ticker) = self.token_ticker.take() {
            ticker.abort();
        }
        info!("ending session");
        self.store.discard()
    }

    /// Record the token as entered at `now`. A changed token restarts the validity window.
    pub fn set_token(&mut self, token: &str, now: DateTime<Utc>) {
        let token = token.trim();
        if token != self.token || self.token_issued.is_none() {
            self.token_issued = (!token.is_empty()).then_some(now);
        }
        self.token = token.to_string();

        let issued = self
            .token_issued
            .map(|t| t.timestamp_millis().to_string())
            .unwrap_or_default();
        let stored = self
            .store
            .persist_all(&[(TOKEN_KEY, &self.token), (TOKEN_TIME_KEY, &issued)]);
        if let Err(e) = stored {
            warn!(error = %e, "could not persist token");
        }
        self.outbox.push(IntakeEvent::TokenStatus(self.token_status(now)));
    }

    /// Send the current token to the server; results arrive as notices
    pub fn save_token(&mut self) -> Option<JoinHandle<()>> {
        if self.token.is_empty() {
            return None;
        }
        let api = self.api.clone();
        let token = self.token.clone();
        let inbox = self.inbox_tx.clone();
        Some(self.runtime.spawn(async move {
            let notices = match api.register_token(&token).await {
                Ok(response) if response.success => {
                    let mut notices = vec![Notice::new(
                        response.message.unwrap_or_else(|| "Token saved".to_string()),
                        Severity::Success,
                    )];
                    if let Some(company) = response.company_name {
                        notices.push(Notice::new(format!("Company: {}", company), Severity::Info));
                    }
                    notices
                }
                Ok(response) => vec![Notice::new(
                    response
                        .error
                        .unwrap_or_else(|| "Could not save the token".to_string()),
                    Severity::Error,
                )],
                Err(e) => {
                    warn!(error = %e, "token save failed");
                    vec![Notice::new("Could not reach the server", Severity::Error)]
                }
            };
            for notice in notices {
                let _ = inbox.send(TaskMessage::Notice(notice));
            }
        }))
    }

    pub fn token_status(&self, now: DateTime<Utc>) -> TokenStatus {
        match self.token_issued {
            Some(issued) if !self.token.is_empty() => TokenStatus::at(
                issued,
                now,
                self.config.token_validity,
                self.config.token_warning,
            ),
            _ => TokenStatus::Hidden,
        }
    }

    /// Apply everything background tasks reported since the last call and return the events
    /// the UI should render, in order.
    pub fn poll_events(&mut self) -> Vec<IntakeEvent> {
        while let Ok(message) = self.inbox_rx.try_recv() {
            match message {
                TaskMessage::Upload(event) => self.apply_upload_event(event),
                TaskMessage::Collected {
                    category,
                    collection,
                } => {
                    for unreadable in &collection.unreadable {
                        self.notify(
                            format!("{}: could not be read ({})", unreadable.name, unreadable.error),
                            Severity::Error,
                        );
                    }
                    // Fire-and-forget: progress arrives through the inbox
                    let _ = self.handle_incoming_files(collection.files, category);
                }
                TaskMessage::Notice(notice) => self.outbox.push(IntakeEvent::Notice(notice)),
                TaskMessage::TokenTick => {
                    let status = self.token_status(Utc::now());
                    self.outbox.push(IntakeEvent::TokenStatus(status));
                }
            }
        }
        std::mem::take(&mut self.outbox)
    }

    fn apply_upload_event(&mut self, event: UploadEvent) {
        match event {
            UploadEvent::Started { category, total } => {
                self.outbox.push(IntakeEvent::UploadStarted { category, total })
            }
            UploadEvent::Progress { category, percent } => {
                self.outbox.push(IntakeEvent::Progress { category, percent })
            }
            UploadEvent::Notice(notice) => self.outbox.push(IntakeEvent::Notice(notice)),
            UploadEvent::Finished {
                category,
                succeeded,
            } => {
                self.in_flight.remove(&category);
                if succeeded {
                    if let Err(e) = self.persist_session() {
                        warn!(error = %e, "could not persist session");
                    }
                }
                self.outbox.push(IntakeEvent::UploadFinished {
                    category,
                    succeeded,
                });
                if let Some(queued) = self.queued.remove(&category) {
                    if !queued.is_empty() {
                        let _ = self.start_upload(category, queued);
                    }
                }
            }
            UploadEvent::ProgressReset { category } => {
                // A queued upload may already own the progress bar again
                if !self.is_uploading(category) {
                    self.outbox.push(IntakeEvent::ProgressReset(category));
                }
            }
        }
    }

    fn start_upload(&mut self, category: Category, files: Vec<FileEntry>) -> UploadTask {
        let cancel = CancellationToken::new();
        self.in_flight.insert(category, cancel.clone());

        let uploader = self.uploader.clone();
        let inbox = self.inbox_tx.clone();
        debug!(%category, files = files.len(), "starting upload");
        self.runtime
            .spawn(async move { uploader.upload(category, files, &cancel, &inbox).await })
    }

    fn start_token_ticker(&mut self) {
        if let Some(ticker) = self.token_ticker.take() {
            ticker.abort();
        }
        let inbox = self.inbox_tx.clone();
        let period = self.config.token_refresh_interval;
        self.token_ticker = Some(self.runtime.spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                if inbox.send(TaskMessage::TokenTick).is_err() {
                    break;
                }
            }
        }));
    }

    fn new_entry(&mut self, file: CollectedFile, category: Category) -> FileEntry {
        self.next_id += 1;
        FileEntry {
            id: EntryId(self.next_id),
            name: file.name,
            size: file.size,
            category,
            source: file.source,
        }
    }

    fn roster_changed(&mut self, category: Category) {
        self.outbox.push(IntakeEvent::RosterChanged(category));
        if let Err(e) = self.persist_session() {
            warn!(error = %e, "could not persist session");
        }
    }

    fn notify(&mut self, message: impl Into<String>, severity: Severity) {
        self.outbox
            .push(IntakeEvent::Notice(Notice::new(message, severity)));
    }
}

impl Drop for IntakeController {
    fn drop(&mut self) {
        if let Some(ticker) = self.token_ticker.take() {
            ticker.abort();
        }
        for cancel in self.in_flight.values() {
            cancel.cancel();
        }
    }
}
