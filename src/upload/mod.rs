mod batch;
mod collector;
mod fs_tree;
mod types;
mod validator;

pub use batch::{BatchUploader, UploadSink};
pub use collector::{
    Collection, DirectoryHandle, DirectoryReader, DropItem, DropPayload, FileHandle, TreeCollector,
    TreeNode, Unreadable,
};
pub use fs_tree::{node_for_path, FsDirectory, FsFile};
pub use types::{
    Category, CollectedFile, EntryId, FileEntry, FileSource, Notice, Severity, SkipRecord,
    UploadEvent, UploadOutcome, UploadResponse, UploadSummary,
};
pub use validator::{extension_of, validate, RejectReason, Rejection};

#[cfg(test)]
pub(crate) use batch::tests as batch_tests;
