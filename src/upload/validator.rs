use crate::upload::types::Category;
use std::fmt;

/// Why a file was refused before upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    TooLarge { size: u64, limit: u64 },
    DisallowedExtension { extension: Option<String> },
}

/// A refused file, ready to be shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub name: String,
    pub category: Category,
    pub reason: RejectReason,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.reason, self.category) {
            (RejectReason::TooLarge { limit, .. }, _) => write!(
                f,
                "{}: file is larger than {} MB",
                self.name,
                limit / (1024 * 1024)
            ),
            (RejectReason::DisallowedExtension { .. }, Category::Csv) => {
                write!(f, "{}: only CSV files can be uploaded", self.name)
            }
            (RejectReason::DisallowedExtension { .. }, Category::Docs) => {
                write!(f, "{}: file type is not allowed", self.name)
            }
        }
    }
}

/// Text after the last `.`, lower-cased; `None` when the name has no dot
pub fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty())
}

/// Check one file against the size limit and the category's extensions.
///
/// Both rules are always evaluated, so a large file with the wrong extension yields two
/// rejections. An empty result means the file is accepted.
pub fn validate(name: &str, size: u64, category: Category, max_size: u64) -> Vec<Rejection> {
    let mut rejections = Vec::new();

    if size > max_size {
        rejections.push(Rejection {
            name: name.to_string(),
            category,
            reason: RejectReason::TooLarge {
                size,
                limit: max_size,
            },
        });
    }

    let extension = extension_of(name);
    let allowed = extension
        .as_deref()
        .is_some_and(|ext| category.allowed_extensions().contains(&ext));
    if !allowed {
        rejections.push(Rejection {
            name: name.to_string(),
            category,
            reason: RejectReason::DisallowedExtension { extension },
        });
    }

    rejections
}
