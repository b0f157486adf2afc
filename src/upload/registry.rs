use crate::upload::types::{FileRef, FileStats, StatusInfo, UploadItem, UploadStatus};
use crate::utils::FileSizeUtils;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

pub type SharedRegistry = Arc<Mutex<FileRegistry>>;

/// Files chosen for upload, keyed by file name, in the order they were added.
///
/// Names are unique: adding a file whose name is already tracked keeps the
/// existing entry and drops the new one. Two different files that share a
/// name can therefore not be tracked at the same time.
#[derive(Debug, Default)]
pub struct FileRegistry {
    items: Vec<UploadItem>,
}

impl FileRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedRegistry {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Tracks every file whose name is not present yet. Returns how many were added.
    pub fn add<I>(&mut self, files: I) -> usize
    where
        I: IntoIterator<Item = FileRef>,
    {
        let mut added = 0;
        for file in files {
            if self.contains(&file.name) {
                debug!("Skipping duplicate file name: {}", file.name);
                continue;
            }
            self.items.push(UploadItem::new(file));
            added += 1;
        }
        added
    }

    pub fn set_status(&mut self, name: &str, status: UploadStatus, info: StatusInfo) {
        let Some(item) = self.get_mut(name) else {
            return;
        };

        item.status = status;
        match status {
            UploadStatus::Success => {
                item.url = info.url.unwrap_or_default();
                if let Some(upload_time) = info.upload_time {
                    item.upload_info = format!("Upload time: {:.1}s", upload_time);
                }
            }
            UploadStatus::Error => {
                item.upload_info = info
                    .error
                    .unwrap_or_else(|| "An error occurred".to_string());
            }
            UploadStatus::Pending | UploadStatus::Uploading => {}
        }
    }

    /// `percent` must already be clamped to 0..=100 by the caller.
    pub fn set_progress(&mut self, name: &str, percent: u8, transferred: u64, speed: Option<f64>) {
        let Some(item) = self.get_mut(name) else {
            return;
        };

        item.progress = percent;
        if let Some(speed) = speed.filter(|s| *s > 0.0) {
            item.upload_info = format!("Speed: {}/s", FileSizeUtils::format_size(Some(speed)));
        }
        debug!("{}: {}% ({} bytes)", name, percent, transferred);
    }

    pub fn set_info(&mut self, name: &str, info: impl Into<String>) {
        if let Some(item) = self.get_mut(name) {
            item.upload_info = info.into();
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<UploadItem> {
        let index = self.items.iter().position(|item| item.file.name == name)?;
        Some(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn stats(&self) -> FileStats {
        let total_size: u64 = self.items.iter().map(|item| item.file.size).sum();
        let pending_files = self
            .items
            .iter()
            .filter(|item| item.status == UploadStatus::Pending)
            .count();

        FileStats {
            total_files: self.items.len(),
            total_size: FileSizeUtils::format_bytes(total_size),
            pending_files,
        }
    }

    /// Snapshot of the files still waiting for upload, in display order.
    pub fn pending(&self) -> Vec<FileRef> {
        self.items
            .iter()
            .filter(|item| item.status == UploadStatus::Pending)
            .map(|item| item.file.clone())
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&UploadItem> {
        self.items.iter().find(|item| item.file.name == name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut UploadItem> {
        self.items.iter_mut().find(|item| item.file.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UploadItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, size: usize) -> FileRef {
        FileRef::from_bytes(name, vec![0u8; size])
    }

    #[test]
    fn add_creates_pending_items() {
        let mut registry = FileRegistry::new();
        assert_eq!(registry.add(vec![file("a.txt", 3), file("b.txt", 5)]), 2);

        let item = registry.get("a.txt").unwrap();
        assert_eq!(item.status, UploadStatus::Pending);
        assert_eq!(item.progress, 0);
        assert_eq!(item.upload_info, "-");
        assert!(item.url.is_empty());
    }

    #[test]
    fn duplicate_name_keeps_first_entry() {
        let mut registry = FileRegistry::new();
        registry.add(vec![file("a.txt", 3)]);
        registry.set_progress("a.txt", 40, 1, None);

        assert_eq!(registry.add(vec![file("a.txt", 100)]), 0);
        assert_eq!(registry.len(), 1);
        let item = registry.get("a.txt").unwrap();
        assert_eq!(item.file.size, 3);
        assert_eq!(item.progress, 40);
    }

    #[test]
    fn duplicates_within_one_batch_are_dropped() {
        let mut registry = FileRegistry::new();
        assert_eq!(registry.add(vec![file("a.txt", 1), file("a.txt", 2)]), 1);
        assert_eq!(registry.get("a.txt").unwrap().file.size, 1);
    }

    #[test]
    fn stats_count_every_status_for_size() {
        let mut registry = FileRegistry::new();
        registry.add(vec![file("a", 1024), file("b", 1024), file("c", 2048)]);
        registry.set_status("a", UploadStatus::Success, StatusInfo::success(1.0, "u"));
        registry.set_status("b", UploadStatus::Error, StatusInfo::error("boom"));

        let stats = registry.stats();
        assert_eq!(stats.total_files, 3);
        assert_eq!(stats.total_size, "4.00 KB");
        assert_eq!(stats.pending_files, 1);
    }

    #[test]
    fn empty_registry_stats() {
        let stats = FileRegistry::new().stats();
        assert_eq!(stats.total_files, 0);
        assert_eq!(stats.total_size, "0 B");
        assert_eq!(stats.pending_files, 0);
    }

    #[test]
    fn updates_on_absent_name_are_noops() {
        let mut registry = FileRegistry::new();
        registry.add(vec![file("a", 1)]);

        registry.set_progress("missing", 50, 10, Some(100.0));
        registry.set_status("missing", UploadStatus::Success, StatusInfo::success(1.0, "u"));
        registry.set_info("missing", "x");

        assert_eq!(registry.len(), 1);
        let item = registry.get("a").unwrap();
        assert_eq!(item.progress, 0);
        assert_eq!(item.upload_info, "-");
    }

    #[test]
    fn success_sets_url_and_elapsed_time() {
        let mut registry = FileRegistry::new();
        registry.add(vec![file("a", 1)]);
        registry.set_status("a", UploadStatus::Success, StatusInfo::success(2.345, "https://x/a"));

        let item = registry.get("a").unwrap();
        assert_eq!(item.url, "https://x/a");
        assert_eq!(item.upload_info, "Upload time: 2.3s");
    }

    #[test]
    fn success_without_time_keeps_info_and_defaults_url() {
        let mut registry = FileRegistry::new();
        registry.add(vec![file("a", 1)]);
        registry.set_info("a", "Preparing upload...");
        registry.set_status("a", UploadStatus::Success, StatusInfo::default());

        let item = registry.get("a").unwrap();
        assert_eq!(item.url, "");
        assert_eq!(item.upload_info, "Preparing upload...");
    }

    #[test]
    fn error_uses_message_or_fallback() {
        let mut registry = FileRegistry::new();
        registry.add(vec![file("a", 1), file("b", 1)]);
        registry.set_status("a", UploadStatus::Error, StatusInfo::error("disk full"));
        registry.set_status("b", UploadStatus::Error, StatusInfo::default());

        assert_eq!(registry.get("a").unwrap().upload_info, "disk full");
        assert_eq!(registry.get("b").unwrap().upload_info, "An error occurred");
    }

    #[test]
    fn progress_overwrites_info_only_with_positive_speed() {
        let mut registry = FileRegistry::new();
        registry.add(vec![file("a", 1)]);

        registry.set_progress("a", 10, 10, Some(0.0));
        assert_eq!(registry.get("a").unwrap().upload_info, "-");

        registry.set_progress("a", 20, 20, Some(2048.0));
        let item = registry.get("a").unwrap();
        assert_eq!(item.progress, 20);
        assert_eq!(item.upload_info, "Speed: 2.00 KB/s");
    }

    #[test]
    fn pending_snapshot_keeps_insertion_order() {
        let mut registry = FileRegistry::new();
        registry.add(vec![file("c", 1), file("a", 1), file("b", 1)]);
        registry.set_status("a", UploadStatus::Uploading, StatusInfo::default());

        let names: Vec<_> = registry.pending().into_iter().map(|f| f.name).collect();
        assert_eq!(names, vec!["c", "b"]);
    }

    #[test]
    fn remove_and_clear() {
        let mut registry = FileRegistry::new();
        registry.add(vec![file("a", 1), file("b", 1)]);

        assert!(registry.remove("a").is_some());
        assert!(registry.remove("a").is_none());
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }
}
