//! Flattening of drop payloads into file lists
//!
//! A drop may mix plain files with tree entries, and a tree entry may be a directory of any depth.
//! Directories are listed page by page through a [`DirectoryReader`]; a listing is only complete
//! once a page comes back empty, since readers make no promise to return every child at once.

use crate::config::IntakeConfig;
use crate::error::{Error, Result};
use crate::upload::fs_tree::node_for_path;
use crate::upload::types::CollectedFile;
use async_trait::async_trait;
use glob::Pattern;
use std::path::PathBuf;
use tracing::{debug, warn};

/// One node of a dropped tree
pub enum TreeNode {
    File(Box<dyn FileHandle>),
    Directory(Box<dyn DirectoryHandle>),
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::File(file) => file.name(),
            TreeNode::Directory(dir) => dir.name(),
        }
    }
}

/// A file entry whose size and content location still need to be looked up
#[async_trait]
pub trait FileHandle: Send {
    fn name(&self) -> &str;

    /// Resolve the entry into a concrete file. No timeout is applied here.
    async fn resolve(self: Box<Self>) -> Result<CollectedFile>;
}

/// A directory entry that can be opened for listing
pub trait DirectoryHandle: Send {
    fn name(&self) -> &str;

    fn reader(self: Box<Self>) -> Box<dyn DirectoryReader>;
}

/// Paged listing of one directory's children
#[async_trait]
pub trait DirectoryReader: Send {
    /// Next batch of children; an empty page means the listing is exhausted
    async fn next_page(&mut self) -> Result<Vec<TreeNode>>;
}

/// A top-level item of a drop or picker selection
pub enum DropItem {
    /// A file that needs no further resolution
    File(CollectedFile),
    /// An entry that may be a file or a directory
    Entry(TreeNode),
    /// A local path, turned into a file or directory entry when collected
    Path(PathBuf),
}

#[derive(Default)]
pub struct DropPayload {
    pub items: Vec<DropItem>,
}

impl DropPayload {
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl From<Vec<DropItem>> for DropPayload {
    fn from(items: Vec<DropItem>) -> Self {
        Self { items }
    }
}

/// An entry that could not be read
#[derive(Debug)]
pub struct Unreadable {
    pub name: String,
    pub error: Error,
}

/// Result of flattening one payload
#[derive(Debug, Default)]
pub struct Collection {
    pub files: Vec<CollectedFile>,
    pub unreadable: Vec<Unreadable>,
}

pub struct TreeCollector {
    ignore: Vec<Pattern>,
    page_size: usize,
}

impl TreeCollector {
    pub fn new(ignore_patterns: &[String]) -> Self {
        let ignore = ignore_patterns
            .iter()
            .filter_map(|p| match Pattern::new(p) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!(pattern = %p, error = %e, "ignoring invalid ignore pattern");
                    None
                }
            })
            .collect();
        Self {
            ignore,
            page_size: 100,
        }
    }

    pub fn from_config(config: &IntakeConfig) -> Self {
        Self::new(&config.ignore_patterns).with_page_size(config.directory_page_size)
    }

    /// Page size used for directories reached through [`DropItem::Path`]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignore.iter().any(|p| p.matches(name))
    }

    /// Flatten `payload` into files: direct files first, then every tree entry depth-first in
    /// pre-order. The whole list is returned once traversal is complete.
    pub async fn collect(&self, payload: DropPayload) -> Collection {
        let mut collection = Collection::default();
        let mut stack = Vec::new();

        for item in payload.items {
            match item {
                DropItem::File(file) => {
                    if self.is_ignored(&file.name) {
                        debug!(name = %file.name, "skipping ignored file");
                    } else {
                        collection.files.push(file);
                    }
                }
                DropItem::Entry(node) => stack.push(node),
                DropItem::Path(path) => match node_for_path(&path, self.page_size).await {
                    Ok(node) => stack.push(node),
                    Err(error) => {
                        warn!(path = %path.display(), error = %error, "could not open dropped path");
                        collection.unreadable.push(Unreadable {
                            name: path.display().to_string(),
                            error,
                        });
                    }
                },
            }
        }
        stack.reverse();

        while let Some(node) = stack.pop() {
            match node {
                TreeNode::File(handle) => {
                    let name = handle.name().to_string();
                    if self.is_ignored(&name) {
                        debug!(name = %name, "skipping ignored file");
                        continue;
                    }
                    match handle.resolve().await {
                        Ok(file) => collection.files.push(file),
                        Err(error) => {
                            warn!(name = %name, error = %error, "could not resolve file entry");
                            collection.unreadable.push(Unreadable { name, error });
                        }
                    }
                }
                TreeNode::Directory(handle) => {
                    let name = handle.name().to_string();
                    let (children, failure) = read_all_pages(handle.reader()).await;
                    debug!(directory = %name, children = children.len(), "listed directory");
                    if let Some(error) = failure {
                        warn!(directory = %name, error = %error, "directory listing failed");
                        collection.unreadable.push(Unreadable { name, error });
                    }
                    stack.extend(children.into_iter().rev());
                }
            }
        }

        collection
    }
}

/// Keep requesting pages until one comes back empty.
/// Children read before a failing page are still returned.
async fn read_all_pages(mut reader: Box<dyn DirectoryReader>) -> (Vec<TreeNode>, Option<Error>) {
    let mut children = Vec::new();
    loop {
        match reader.next_page().await {
            Ok(page) if page.is_empty() => return (children, None),
            Ok(page) => children.extend(page),
            Err(e) => return (children, Some(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct MemFile {
        name: String,
        size: u64,
        broken: bool,
    }

    #[async_trait]
    impl FileHandle for MemFile {
        fn name(&self) -> &str {
            &self.name
        }

        async fn resolve(self: Box<Self>) -> Result<CollectedFile> {
            tokio::task::yield_now().await;
            if self.broken {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::PermissionDenied,
                    "denied",
                )));
            }
            Ok(CollectedFile::in_memory(
                self.name,
                vec![0u8; self.size as usize],
            ))
        }
    }

    struct MemDir {
        name: String,
        pages: Vec<Vec<TreeNode>>,
        requests: Arc<AtomicUsize>,
    }

    struct MemReader {
        pages: VecDeque<Vec<TreeNode>>,
        requests: Arc<AtomicUsize>,
    }

    impl DirectoryHandle for MemDir {
        fn name(&self) -> &str {
            &self.name
        }

        fn reader(self: Box<Self>) -> Box<dyn DirectoryReader> {
            Box::new(MemReader {
                pages: self.pages.into(),
                requests: self.requests,
            })
        }
    }

    #[async_trait]
    impl DirectoryReader for MemReader {
        async fn next_page(&mut self) -> Result<Vec<TreeNode>> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(self.pages.pop_front().unwrap_or_default())
        }
    }

    fn file(name: &str) -> TreeNode {
        TreeNode::File(Box::new(MemFile {
            name: name.to_string(),
            size: 3,
            broken: false,
        }))
    }

    fn dir(name: &str, children: Vec<TreeNode>) -> TreeNode {
        paged_dir(name, vec![children], Arc::new(AtomicUsize::new(0)))
    }

    fn paged_dir(name: &str, pages: Vec<Vec<TreeNode>>, requests: Arc<AtomicUsize>) -> TreeNode {
        TreeNode::Directory(Box::new(MemDir {
            name: name.to_string(),
            pages,
            requests,
        }))
    }

    fn names(collection: &Collection) -> Vec<&str> {
        collection.files.iter().map(|f| f.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_nested_tree_yields_every_file_in_pre_order() {
        let tree = dir(
            "root",
            vec![
                file("a.pdf"),
                dir("empty", vec![]),
                dir(
                    "sub",
                    vec![
                        file("b.txt"),
                        dir("deeper", vec![dir("deepest", vec![file("c.md")])]),
                        dir("also-empty", vec![]),
                    ],
                ),
                file("d.json"),
            ],
        );

        let collector = TreeCollector::new(&[]);
        let collection = collector.collect(vec![DropItem::Entry(tree)].into()).await;

        assert_eq!(names(&collection), ["a.pdf", "b.txt", "c.md", "d.json"]);
        assert!(collection.unreadable.is_empty());
    }

    #[tokio::test]
    async fn test_listing_continues_until_an_empty_page() {
        let requests = Arc::new(AtomicUsize::new(0));
        let page = |prefix: &str| -> Vec<TreeNode> {
            (0..100).map(|i| file(&format!("{}-{}.pdf", prefix, i))).collect()
        };
        let tree = paged_dir("big", vec![page("first"), page("second")], requests.clone());

        let collection = TreeCollector::new(&[])
            .collect(vec![DropItem::Entry(tree)].into())
            .await;

        assert_eq!(collection.files.len(), 200);
        assert_eq!(requests.load(Ordering::SeqCst), 3);
        assert_eq!(collection.files[0].name, "first-0.pdf");
        assert_eq!(collection.files[199].name, "second-99.pdf");
    }

    #[tokio::test]
    async fn test_direct_files_come_before_tree_entries() {
        let payload = vec![
            DropItem::Entry(dir("folder", vec![file("inner.csv")])),
            DropItem::File(CollectedFile::in_memory("direct.csv", vec![1u8, 2])),
            DropItem::Entry(file("loose.csv")),
        ];

        let collection = TreeCollector::new(&[]).collect(payload.into()).await;

        assert_eq!(names(&collection), ["direct.csv", "inner.csv", "loose.csv"]);
        assert_eq!(collection.files[0].size, 2);
    }

    #[tokio::test]
    async fn test_ignored_names_are_dropped() {
        let tree = dir("photos", vec![file(".DS_Store"), file("scan.pdf"), file("Thumbs.db")]);
        let collector = TreeCollector::new(&[".DS_Store".into(), "Thumbs.db".into()]);

        let collection = collector.collect(vec![DropItem::Entry(tree)].into()).await;

        assert_eq!(names(&collection), ["scan.pdf"]);
    }

    #[tokio::test]
    async fn test_unreadable_entry_does_not_stop_the_walk() {
        let broken = TreeNode::File(Box::new(MemFile {
            name: "locked.pdf".into(),
            size: 1,
            broken: true,
        }));
        let tree = dir("mixed", vec![file("a.pdf"), broken, file("b.pdf")]);

        let collection = TreeCollector::new(&[])
            .collect(vec![DropItem::Entry(tree)].into())
            .await;

        assert_eq!(names(&collection), ["a.pdf", "b.pdf"]);
        assert_eq!(collection.unreadable.len(), 1);
        assert_eq!(collection.unreadable[0].name, "locked.pdf");
    }

    #[tokio::test]
    async fn test_empty_payload_collects_nothing() {
        let collection = TreeCollector::new(&[]).collect(DropPayload::default()).await;
        assert!(collection.files.is_empty());
        assert!(collection.unreadable.is_empty());
    }
}
