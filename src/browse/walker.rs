//! Depth-first streaming loader for walk mode.
//!
//! A [`Walker`] mirrors a subtree of the remote filesystem as a lazily
//! populated tree. Pending directory expansions live in an explicit
//! double-ended work queue; newly discovered subdirectories are pushed to
//! the *front* so they expand before previously queued siblings (true DFS,
//! not BFS). The viewport feeder drives [`Walker::next`] until enough media
//! is buffered or the queue runs dry.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};

use crate::error::{AppError, Result};
use crate::fs::node::{is_media_file, FileNode};
use crate::fs::service::FileService;
use crate::fs::sort::{sort_files, SortMethod};

/// One node of the lazily expanded tree.
#[derive(Debug, Clone)]
pub struct TreeNode {
    pub info: FileNode,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    fn new(info: FileNode) -> Self {
        Self {
            info,
            children: Vec::new(),
        }
    }
}

/// Streaming depth-first loader rooted at one remote directory.
#[derive(Debug)]
pub struct Walker<S> {
    service: Arc<S>,
    root: TreeNode,
    sort_method: SortMethod,
    /// Fullpaths of directories pending expansion, front = next.
    exec_queue: VecDeque<String>,
    initialized: bool,
}

impl<S: FileService> Walker<S> {
    /// Create an unprimed walker; the first [`Walker::next`] call performs
    /// initialization (root metadata + first-level listing).
    pub fn new(service: Arc<S>, entry_path: &str, sort_method: SortMethod) -> Self {
        Self {
            service,
            root: TreeNode::new(FileNode::dir(entry_path)),
            sort_method,
            exec_queue: VecDeque::new(),
            initialized: false,
        }
    }

    pub fn root_path(&self) -> &str {
        &self.root.info.fullpath
    }

    pub fn sort_method(&self) -> SortMethod {
        self.sort_method
    }

    /// Whether every known directory has been listed.
    pub fn is_completed(&self) -> bool {
        self.initialized && self.exec_queue.is_empty()
    }

    async fn ensure_init(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        let entry = self.root.info.fullpath.clone();
        // real root metadata, so later expiry diffs compare like with like
        let info_map = self
            .service
            .batch_get_files_info(std::slice::from_ref(&entry))
            .await?;
        if let Some(info) = info_map.get(&entry) {
            self.root.info = info.clone();
        }
        self.expand(&entry).await?;
        self.initialized = true;
        debug!(
            "walker initialized at {} ({} dirs queued)",
            entry,
            self.exec_queue.len()
        );
        Ok(())
    }

    /// List `dir_path`, attach its (sorted) children, and queue its
    /// subdirectories for depth-first expansion.
    async fn expand(&mut self, dir_path: &str) -> Result<FileNode> {
        let listing = self.service.list_directory(dir_path).await?;
        let files = sort_files(&listing.files, self.sort_method);
        let subdirs: Vec<String> = files
            .iter()
            .filter(|f| f.is_dir())
            .map(|f| f.fullpath.clone())
            .collect();

        let node = find_node_mut(&mut self.root, dir_path)
            .ok_or_else(|| AppError::PathNotFound(dir_path.to_string()))?;
        node.children = files.into_iter().map(TreeNode::new).collect();
        let info = node.info.clone();

        for dir in subdirs.into_iter().rev() {
            self.exec_queue.push_front(dir);
        }
        Ok(info)
    }

    /// Expand the next pending directory; `Ok(None)` once the tree is
    /// complete. A failed expansion leaves the directory at the front of the
    /// queue so an explicit refresh can retry it; the partial tree stays
    /// valid either way.
    pub async fn next(&mut self) -> Result<Option<FileNode>> {
        self.ensure_init().await?;
        let Some(dir) = self.exec_queue.front().cloned() else {
            return Ok(None);
        };
        let info = self.expand(&dir).await?;
        self.exec_queue.pop_front();
        Ok(Some(info))
    }

    /// Every media-type file reachable from the root, in tree order. Within
    /// one directory the configured sort applies; across directories the
    /// order is simply directory-visit order.
    pub fn media_files(&self) -> Vec<FileNode> {
        let mut out = Vec::new();
        collect_media(&self.root, &mut out);
        out
    }

    /// Cheap count of what [`Walker::media_files`] would return.
    pub fn media_count(&self) -> usize {
        count_media(&self.root)
    }

    /// Throw away all fetched children and re-run initialization.
    pub async fn reset(&mut self) -> Result<()> {
        self.root.children.clear();
        self.exec_queue.clear();
        self.initialized = false;
        self.ensure_init().await
    }

    /// Re-fetch metadata for every known directory and compare against the
    /// cached copies. Detects *that* something changed, not *what*: a
    /// missing key or any field difference reports expired.
    pub async fn is_expired(&self) -> Result<bool> {
        let mut dirs = Vec::new();
        collect_dirs(&self.root, &mut dirs);
        let paths: Vec<String> = dirs.iter().map(|d| d.fullpath.clone()).collect();
        let fresh = self.service.batch_get_files_info(&paths).await?;
        for cached in &dirs {
            match fresh.get(&cached.fullpath) {
                None => {
                    debug!("walker expiry: {} no longer exists", cached.fullpath);
                    return Ok(true);
                }
                Some(now) if *now != *cached => {
                    debug!("walker expiry: {} metadata changed", cached.fullpath);
                    return Ok(true);
                }
                Some(_) => {}
            }
        }
        Ok(false)
    }

    /// Build a replacement walker over the same root and drive it until it
    /// has buffered at least `current_position` media items (or completed),
    /// so swapping it in does not rewind the user's scroll position.
    ///
    /// `cancel` is checked between remote round-trips; cancellation fails
    /// with [`AppError::Cancelled`] and the half-built walker must be
    /// discarded by the caller.
    pub async fn seamless_refresh(
        &self,
        current_position: usize,
        cancel: &Arc<AtomicBool>,
    ) -> Result<Walker<S>> {
        let mut fresh = Walker::new(
            self.service.clone(),
            &self.root.info.fullpath,
            self.sort_method,
        );
        loop {
            if cancel.load(Ordering::Relaxed) {
                warn!("seamless refresh of {} cancelled", self.root.info.fullpath);
                return Err(AppError::Cancelled);
            }
            if fresh.media_count() >= current_position {
                break;
            }
            match fresh.next().await? {
                Some(_) => {}
                None => break,
            }
        }
        Ok(fresh)
    }
}

fn find_node_mut<'a>(node: &'a mut TreeNode, target: &str) -> Option<&'a mut TreeNode> {
    if node.info.fullpath == target {
        return Some(node);
    }
    for child in node.children.iter_mut() {
        if let Some(found) = find_node_mut(child, target) {
            return Some(found);
        }
    }
    None
}

fn collect_media(node: &TreeNode, out: &mut Vec<FileNode>) {
    for child in &node.children {
        if child.info.is_dir() {
            collect_media(child, out);
        } else if is_media_file(&child.info.name) {
            out.push(child.info.clone());
        }
    }
}

fn count_media(node: &TreeNode) -> usize {
    node.children
        .iter()
        .map(|child| {
            if child.info.is_dir() {
                count_media(child)
            } else {
                usize::from(is_media_file(&child.info.name))
            }
        })
        .sum()
}

fn collect_dirs(node: &TreeNode, out: &mut Vec<FileNode>) {
    if node.info.is_dir() {
        out.push(node.info.clone());
    }
    for child in &node.children {
        collect_dirs(child, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::path as vpath;
    use crate::fs::service::LocalFileService;
    use std::fs::{self, File};
    use tempfile::TempDir;

    fn s(p: &std::path::Path) -> String {
        vpath::normalize(&p.to_string_lossy())
    }

    /// root/
    ///   dir_x/ { a.jpg, b.mp4 }
    fn setup_shallow() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("dir_x")).unwrap();
        File::create(dir.path().join("dir_x").join("a.jpg")).unwrap();
        File::create(dir.path().join("dir_x").join("b.mp4")).unwrap();
        dir
    }

    /// root/
    ///   a_dir/ { deep/ { img2.png }, img1.png }
    ///   b_dir/ { img3.gif }
    ///   top.webp, skip.txt
    fn setup_nested() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("a_dir").join("deep")).unwrap();
        fs::create_dir(dir.path().join("b_dir")).unwrap();
        File::create(dir.path().join("a_dir").join("img1.png")).unwrap();
        File::create(dir.path().join("a_dir").join("deep").join("img2.png")).unwrap();
        File::create(dir.path().join("b_dir").join("img3.gif")).unwrap();
        File::create(dir.path().join("top.webp")).unwrap();
        File::create(dir.path().join("skip.txt")).unwrap();
        dir
    }

    fn walker_for(dir: &TempDir) -> Walker<LocalFileService> {
        Walker::new(
            Arc::new(LocalFileService::new()),
            &s(dir.path()),
            SortMethod::NameAsc,
        )
    }

    async fn drain(walker: &mut Walker<LocalFileService>) {
        while walker.next().await.unwrap().is_some() {}
    }

    #[tokio::test]
    async fn two_next_calls_complete_shallow_tree() {
        let dir = setup_shallow();
        let mut walker = walker_for(&dir);

        // first call initializes (lists root) and expands dir_x
        let expanded = walker.next().await.unwrap().unwrap();
        assert_eq!(expanded.name, "dir_x");
        // second call finds the queue empty
        assert!(walker.next().await.unwrap().is_none());
        assert!(walker.is_completed());

        let media = walker.media_files();
        let names: Vec<&str> = media.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.jpg", "b.mp4"]);
    }

    #[tokio::test]
    async fn completeness_no_duplicates() {
        let dir = setup_nested();
        let mut walker = walker_for(&dir);
        drain(&mut walker).await;

        assert!(walker.is_completed());
        let media = walker.media_files();
        let names: Vec<&str> = media.iter().map(|f| f.name.as_str()).collect();
        // every media file reachable from the root, none twice
        assert_eq!(names, vec!["img2.png", "img1.png", "img3.gif", "top.webp"]);
        let mut unique: Vec<&str> = names.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), names.len());
        assert_eq!(walker.media_count(), media.len());
    }

    #[tokio::test]
    async fn expansion_is_depth_first() {
        let dir = setup_nested();
        let mut walker = walker_for(&dir);

        let mut visited = Vec::new();
        while let Some(node) = walker.next().await.unwrap() {
            visited.push(node.name);
        }
        // a_dir's child `deep` expands before sibling b_dir
        assert_eq!(visited, vec!["a_dir", "deep", "b_dir"]);
    }

    #[tokio::test]
    async fn next_is_repeatedly_safe_after_completion() {
        let dir = setup_shallow();
        let mut walker = walker_for(&dir);
        drain(&mut walker).await;
        assert!(walker.next().await.unwrap().is_none());
        assert!(walker.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn reset_rebuilds_from_scratch() {
        let dir = setup_nested();
        let mut walker = walker_for(&dir);
        drain(&mut walker).await;
        let before = walker.media_count();

        File::create(dir.path().join("b_dir").join("late.png")).unwrap();
        walker.reset().await.unwrap();
        assert!(!walker.is_completed());
        drain(&mut walker).await;
        assert_eq!(walker.media_count(), before + 1);
    }

    #[tokio::test]
    async fn is_expired_detects_changes() {
        let dir = setup_nested();
        let mut walker = walker_for(&dir);
        drain(&mut walker).await;
        assert!(!walker.is_expired().await.unwrap());

        // adding an entry touches b_dir's mtime
        File::create(dir.path().join("b_dir").join("new.png")).unwrap();
        assert!(walker.is_expired().await.unwrap());
    }

    #[tokio::test]
    async fn is_expired_detects_removed_directory() {
        let dir = setup_nested();
        let mut walker = walker_for(&dir);
        drain(&mut walker).await;
        fs::remove_dir_all(dir.path().join("b_dir")).unwrap();
        assert!(walker.is_expired().await.unwrap());
    }

    #[tokio::test]
    async fn seamless_refresh_reaches_position() {
        let dir = setup_nested();
        let mut walker = walker_for(&dir);
        drain(&mut walker).await;

        let cancel = Arc::new(AtomicBool::new(false));
        let fresh = walker.seamless_refresh(3, &cancel).await.unwrap();
        assert!(fresh.media_count() >= 3);
    }

    #[tokio::test]
    async fn seamless_refresh_cancellation_is_distinct() {
        let dir = setup_nested();
        let mut walker = walker_for(&dir);
        drain(&mut walker).await;

        let cancel = Arc::new(AtomicBool::new(true));
        let err = walker.seamless_refresh(1, &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn failed_expansion_propagates_and_keeps_partial_tree() {
        let dir = setup_nested();
        let mut walker = walker_for(&dir);
        walker.next().await.unwrap(); // a_dir expanded, deep + b_dir queued

        fs::remove_dir_all(dir.path().join("a_dir").join("deep")).unwrap();
        let err = walker.next().await.unwrap_err();
        assert!(matches!(err, AppError::PathNotFound(_)));
        // fetched media is still usable
        assert!(walker.media_files().iter().any(|f| f.name == "img1.png"));
    }
}
