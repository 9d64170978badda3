use crate::api::IntakeApi;
use crate::config::{IntakeConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::retry::with_retry;
use crate::upload::types::{
    Category, FileEntry, Notice, Severity, UploadEvent, UploadOutcome, UploadSummary,
};
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Receiver of upload progress and notices
pub trait UploadSink: Send + Sync {
    fn emit(&self, event: UploadEvent);
}

impl<T> UploadSink for Sender<T>
where
    T: From<UploadEvent> + Send,
{
    fn emit(&self, event: UploadEvent) {
        // A closed receiver means nobody is watching any more
        let _ = self.send(event.into());
    }
}

/// Sends a file list to the server in fixed-size batches, one batch at a time
#[derive(Clone)]
pub struct BatchUploader {
    api: Arc<dyn IntakeApi>,
    batch_size: usize,
    retry: RetryConfig,
    reset_delay: Duration,
}

impl BatchUploader {
    pub fn new(api: Arc<dyn IntakeApi>, config: &IntakeConfig) -> Self {
        Self {
            api,
            batch_size: config.batch_size.max(1),
            retry: config.retry.clone(),
            reset_delay: config.progress_reset_delay,
        }
    }

    /// Upload `files` for `category`, reporting through `sink`.
    ///
    /// Every outcome is also turned into a notice, so callers that only render events need not
    /// look at the returned result. The progress bar is reset `reset_delay` after the upload
    /// finishes, successful or not.
    pub async fn upload(
        &self,
        category: Category,
        files: Vec<FileEntry>,
        cancel: &CancellationToken,
        sink: &dyn UploadSink,
    ) -> Result<UploadSummary> {
        sink.emit(UploadEvent::Started {
            category,
            total: files.len(),
        });
        sink.emit(UploadEvent::Progress {
            category,
            percent: 0,
        });

        let result = self.send_batches(category, &files, cancel, sink).await;

        match &result {
            Ok(summary) => {
                info!(%category, files = summary.files, batches = summary.batches, "upload complete");
                sink.emit(UploadEvent::Notice(Notice::new(
                    format!("Uploaded {} files", summary.files),
                    Severity::Success,
                )));
            }
            Err(Error::Cancelled(_)) => {
                warn!(%category, "upload cancelled");
                sink.emit(UploadEvent::Notice(Notice::new(
                    format!("{} upload cancelled", category.label()),
                    Severity::Warning,
                )));
            }
            Err(e) => {
                error!(%category, error = %e, "upload failed");
                let message = match e {
                    Error::ServerRejection(message) => message.clone(),
                    other => format!("Upload failed: {}", other),
                };
                sink.emit(UploadEvent::Notice(Notice::new(message, Severity::Error)));
            }
        }

        sink.emit(UploadEvent::Finished {
            category,
            succeeded: result.is_ok(),
        });
        tokio::time::sleep(self.reset_delay).await;
        sink.emit(UploadEvent::ProgressReset { category });

        result
    }

    async fn send_batches(
        &self,
        category: Category,
        files: &[FileEntry],
        cancel: &CancellationToken,
        sink: &dyn UploadSink,
    ) -> Result<UploadSummary> {
        let total = files.len();
        let mut summary = UploadSummary {
            files: total,
            ..Default::default()
        };
        let mut sent = 0;

        for (index, batch) in files.chunks(self.batch_size).enumerate() {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled(category));
            }

            let outcome = self.send_batch(category, batch).await?;
            sent += batch.len();
            debug!(%category, batch = index + 1, files = batch.len(), accepted = outcome.accepted, "batch sent");

            sink.emit(UploadEvent::Progress {
                category,
                percent: percent_of(sent, total),
            });
            for skip in &outcome.skipped {
                sink.emit(UploadEvent::Notice(Notice::new(
                    format!("{}: {}", skip.name, skip.reason),
                    Severity::Warning,
                )));
            }

            summary.batches += 1;
            summary.skipped.extend(outcome.skipped);
        }

        Ok(summary)
    }

    async fn send_batch(&self, category: Category, batch: &[FileEntry]) -> Result<UploadOutcome> {
        let response = with_retry(&self.retry, || self.api.send_batch(category, batch)).await?;
        if !response.success {
            return Err(Error::ServerRejection(
                response
                    .error
                    .unwrap_or_else(|| "Upload failed".to_string()),
            ));
        }
        Ok(UploadOutcome {
            accepted: batch.len().saturating_sub(response.skipped.len()),
            skipped: response.skipped,
        })
    }
}

fn percent_of(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (100.0 * sent as f64 / total as f64).round() as u8
}
