//! Tree entries backed by the local filesystem
//!
//! Dropped paths and picker selections become [`TreeNode`]s here. Directory listings are served
//! in pages of `page_size` children; the page after the last child is empty.

use crate::error::Result;
use crate::upload::collector::{DirectoryHandle, DirectoryReader, FileHandle, TreeNode};
use crate::upload::types::CollectedFile;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

pub struct FsFile {
    name: String,
    path: PathBuf,
}

pub struct FsDirectory {
    name: String,
    path: PathBuf,
    page_size: usize,
}

/// A directory child whose type could not be determined; resolving it reports the error
pub struct FsUnreadable {
    name: String,
    error: Option<std::io::Error>,
}

pub struct FsDirectoryReader {
    path: PathBuf,
    page_size: usize,
    entries: Option<fs::ReadDir>,
    /// Listing failure held back so the children read before it are still returned
    pending_error: Option<std::io::Error>,
    exhausted: bool,
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string()
}

/// Build the tree node for a dropped or picked path. Symbolic links given directly are followed.
pub async fn node_for_path(path: &Path, page_size: usize) -> Result<TreeNode> {
    let metadata = fs::metadata(path).await?;
    Ok(if metadata.is_dir() {
        FsDirectory::node(path.to_path_buf(), page_size)
    } else {
        FsFile::node(path.to_path_buf())
    })
}

impl FsFile {
    pub fn node(path: PathBuf) -> TreeNode {
        TreeNode::File(Box::new(FsFile {
            name: display_name(&path),
            path,
        }))
    }
}

impl FsUnreadable {
    pub fn node(path: &Path, error: std::io::Error) -> TreeNode {
        TreeNode::File(Box::new(FsUnreadable {
            name: display_name(path),
            error: Some(error),
        }))
    }
}

/// Tree node for one directory child. Symbolic links to files are taken, linked directories
/// are not walked and other special files are left out.
async fn child_node(
    path: PathBuf,
    file_type: std::io::Result<std::fs::FileType>,
    page_size: usize,
) -> Option<TreeNode> {
    let file_type = match file_type {
        Ok(file_type) => file_type,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "could not stat directory entry");
            return Some(FsUnreadable::node(&path, e));
        }
    };

    if file_type.is_dir() {
        Some(FsDirectory::node(path, page_size))
    } else if file_type.is_file() {
        Some(FsFile::node(path))
    } else if file_type.is_symlink() {
        match fs::metadata(&path).await {
            Ok(target) if target.is_file() => Some(FsFile::node(path)),
            _ => {
                debug!(path = %path.display(), "not following symlink");
                None
            }
        }
    } else {
        None
    }
}

impl FsDirectory {
    pub fn node(path: PathBuf, page_size: usize) -> TreeNode {
        TreeNode::Directory(Box::new(FsDirectory {
            name: display_name(&path),
            path,
            page_size: page_size.max(1),
        }))
    }
}

#[async_trait]
impl FileHandle for FsFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(self: Box<Self>) -> Result<CollectedFile> {
        let metadata = fs::metadata(&self.path).await?;
        Ok(CollectedFile::on_disk(self.name, metadata.len(), self.path))
    }
}

#[async_trait]
impl FileHandle for FsUnreadable {
    fn name(&self) -> &str {
        &self.name
    }

    async fn resolve(mut self: Box<Self>) -> Result<CollectedFile> {
        let error = self.error.take().unwrap_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "entry could not be read")
        });
        Err(error.into())
    }
}

impl DirectoryHandle for FsDirectory {
    fn name(&self) -> &str {
        &self.name
    }

    fn reader(self: Box<Self>) -> Box<dyn DirectoryReader> {
        Box::new(FsDirectoryReader {
            path: self.path,
            page_size: self.page_size,
            entries: None,
            pending_error: None,
            exhausted: false,
        })
    }
}

#[async_trait]
impl DirectoryReader for FsDirectoryReader {
    async fn next_page(&mut self) -> Result<Vec<TreeNode>> {
        if let Some(e) = self.pending_error.take() {
            self.exhausted = true;
            return Err(e.into());
        }
        if self.exhausted {
            return Ok(Vec::new());
        }
        if self.entries.is_none() {
            self.entries = Some(fs::read_dir(&self.path).await?);
        }
        let Some(entries) = self.entries.as_mut() else {
            return Ok(Vec::new());
        };

        let mut page = Vec::with_capacity(self.page_size);
        while page.len() < self.page_size {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => {
                    self.exhausted = true;
                    break;
                }
                Err(e) if page.is_empty() => {
                    self.exhausted = true;
                    return Err(e.into());
                }
                Err(e) => {
                    self.pending_error = Some(e);
                    break;
                }
            };
            let file_type = entry.file_type().await;
            if let Some(node) = child_node(entry.path(), file_type, self.page_size).await {
                page.push(node);
            }
        }

        Ok(page)
    }
}
