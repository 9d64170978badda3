//! Recoverable session state
//!
//! Only plain strings are kept: the access token, the time it was first entered (epoch
//! milliseconds), and the file names of each roster as a JSON array. Sizes and content are not
//! stored, so a restored roster lists names with size 0. The store is discarded when the window
//! closes, so only an interrupted session is restored.

pub mod token;

use crate::error::Result;
use crate::upload::Category;
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const TOKEN_KEY: &str = "freee_token";
pub const TOKEN_TIME_KEY: &str = "freee_token_time";

/// String key-value store the session is persisted to
pub trait SessionStore: Send {
    fn retrieve(&self, key: &str) -> Option<String>;

    fn persist(&mut self, key: &str, value: &str) -> Result<()> {
        self.persist_all(&[(key, value)])
    }

    /// Store several values in one write
    fn persist_all(&mut self, values: &[(&str, &str)]) -> Result<()>;

    /// Forget everything; called when the session ends
    fn discard(&mut self) -> Result<()>;
}

/// Store that lives as long as the process
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl SessionStore for MemoryStore {
    fn retrieve(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn persist_all(&mut self, values: &[(&str, &str)]) -> Result<()> {
        for (key, value) in values {
            self.values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }

    fn discard(&mut self) -> Result<()> {
        self.values.clear();
        Ok(())
    }
}

/// Store backed by a single JSON object on disk, readable only by the current user.
///
/// Every change rewrites the whole file through a temporary file and a rename. The file is
/// removed by [`discard`](SessionStore::discard) when the session ends.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file starts empty; an unreadable one is replaced.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "session file is corrupt, starting fresh");
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self { path, values })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            create_private_dir(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        let mut file = create_private_file(&tmp)?;
        file.write_all(&serde_json::to_vec_pretty(&self.values)?)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl SessionStore for JsonFileStore {
    fn retrieve(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn persist_all(&mut self, values: &[(&str, &str)]) -> Result<()> {
        for (key, value) in values {
            self.values.insert(key.to_string(), value.to_string());
        }
        self.flush()
    }

    fn discard(&mut self) -> Result<()> {
        self.values.clear();
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "session file removed");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Create `dir` if needed. A directory created here is private to the current user.
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    if dir.as_os_str().is_empty() || dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(dir)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(dir, std::fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Create or truncate `path` with owner-only (0600) permissions
fn create_private_file(path: &Path) -> std::io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let file = options.open(path)?;
    // A leftover file keeps its old mode on open
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    }
    Ok(file)
}

/// Everything recoverable after a restart
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub token: Option<String>,
    pub token_issued: Option<DateTime<Utc>>,
    pub csv_files: Vec<String>,
    pub docs_files: Vec<String>,
}

impl SessionSnapshot {
    pub fn load(store: &dyn SessionStore) -> Self {
        Self {
            token: store.retrieve(TOKEN_KEY).filter(|t| !t.is_empty()),
            token_issued: store
                .retrieve(TOKEN_TIME_KEY)
                .and_then(|ms| parse_epoch_millis(&ms)),
            csv_files: load_names(store, Category::Csv),
            docs_files: load_names(store, Category::Docs),
        }
    }

    pub fn names(&self, category: Category) -> &[String] {
        match category {
            Category::Csv => &self.csv_files,
            Category::Docs => &self.docs_files,
        }
    }
}

/// Names saved for `category`; a malformed value counts as no names
pub fn load_names(store: &dyn SessionStore, category: Category) -> Vec<String> {
    let Some(raw) = store.retrieve(category.session_key()) else {
        return Vec::new();
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(%category, error = %e, "could not parse saved file names");
        Vec::new()
    })
}

/// JSON array of `names`, the form roster names are stored in
pub fn encode_names<'a>(names: impl IntoIterator<Item = &'a str>) -> Result<String> {
    let names: Vec<&str> = names.into_iter().collect();
    Ok(serde_json::to_string(&names)?)
}

pub fn parse_epoch_millis(raw: &str) -> Option<DateTime<Utc>> {
    let millis = raw.trim().parse::<i64>().ok()?;
    Utc.timestamp_millis_opt(millis).single()
}
