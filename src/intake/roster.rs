use crate::upload::{EntryId, FileEntry};

/// Files selected for one category, in the order they were added
#[derive(Debug, Default, Clone)]
pub struct Roster {
    entries: Vec<FileEntry>,
}

impl Roster {
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn append(&mut self, entries: impl IntoIterator<Item = FileEntry>) {
        self.entries.extend(entries);
    }

    pub fn remove(&mut self, id: EntryId) -> Option<FileEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    /// Remove by position; an out-of-range index leaves the roster untouched
    pub fn remove_at(&mut self, index: usize) -> Option<FileEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }

    pub fn total_size(&self) -> u64 {
        self.entries.iter().map(|e| e.size).sum()
    }
}
