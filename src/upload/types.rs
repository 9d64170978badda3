use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Which drop zone a file belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Csv,
    Docs,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Csv, Category::Docs];

    /// Lower-case extensions the category accepts
    pub fn allowed_extensions(self) -> &'static [&'static str] {
        match self {
            Category::Csv => &["csv"],
            Category::Docs => &["pdf", "txt", "md", "json", "zip"],
        }
    }

    /// API route the category's batches are posted to
    pub fn upload_route(self) -> &'static str {
        match self {
            Category::Csv => "upload/csv",
            Category::Docs => "upload/docs",
        }
    }

    /// Session store key holding the roster's file names
    pub fn session_key(self) -> &'static str {
        match self {
            Category::Csv => "csv_files",
            Category::Docs => "docs_files",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Csv => "CSV",
            Category::Docs => "Documents",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Csv => f.write_str("csv"),
            Category::Docs => f.write_str("docs"),
        }
    }
}

/// Where a file's bytes come from when it is uploaded
#[derive(Debug, Clone)]
pub enum FileSource {
    /// A file on the local filesystem, read at upload time
    Disk(PathBuf),
    /// Bytes handed over by the drop itself
    Memory(Arc<[u8]>),
    /// Name recovered from the session store; content is gone
    Restored,
}

/// A file produced by collection, before it is validated and given a roster slot
#[derive(Debug, Clone)]
pub struct CollectedFile {
    pub name: String,
    pub size: u64,
    pub source: FileSource,
}

impl CollectedFile {
    pub fn on_disk(name: impl Into<String>, size: u64, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            size,
            source: FileSource::Disk(path.into()),
        }
    }

    pub fn in_memory(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        let bytes = bytes.into();
        Self {
            name: name.into(),
            size: bytes.len() as u64,
            source: FileSource::Memory(bytes),
        }
    }
}

/// Opaque roster identifier, stable across removals of other entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(pub u64);

/// A selected file owned by one category's roster
#[derive(Debug, Clone)]
pub struct FileEntry {
    pub id: EntryId,
    pub name: String,
    pub size: u64,
    pub category: Category,
    pub source: FileSource,
}

/// A file the server accepted but chose not to store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub name: String,
    pub reason: String,
}

/// Body returned by `POST /api/upload/{csv,docs}`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub skipped: Vec<SkipRecord>,
}

/// What one batch achieved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub accepted: usize,
    pub skipped: Vec<SkipRecord>,
}

/// Totals of a finished upload call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub files: usize,
    pub batches: usize,
    pub skipped: Vec<SkipRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A message for the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
    pub severity: Severity,
}

impl Notice {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

/// Everything an upload reports while it runs
#[derive(Debug, Clone, PartialEq)]
pub enum UploadEvent {
    Started { category: Category, total: usize },
    Progress { category: Category, percent: u8 },
    Notice(Notice),
    Finished { category: Category, succeeded: bool },
    ProgressReset { category: Category },
}
