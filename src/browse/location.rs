//! Navigation stack operations: mounting, descending, absolute jumps,
//! refresh and the shareable location state.
//!
//! All navigation runs through `&mut Pane`, so calls against one pane are
//! naturally serialized; `to` additionally snapshots the stack and restores
//! it on any failure (all-or-nothing).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};

use crate::error::{AppError, Result};
use crate::event::PaneEvent;
use crate::fs::node::FileNode;
use crate::fs::path as vpath;
use crate::fs::service::FileService;

use super::walker::Walker;
use super::{BrowseMode, Page, Pane};

impl<S: FileService> Pane<S> {
    /// Initialize the stack and navigate to the pane's configured path (or
    /// the configured home directory).
    pub async fn mount(&mut self) -> Result<()> {
        if self.stack.is_empty() {
            match self.mode {
                BrowseMode::ScannedFixed => self.stack.push(Page {
                    files: Vec::new(),
                    curr: String::new(),
                }),
                BrowseMode::Walk => {
                    let path = self.path.clone().ok_or_else(|| {
                        AppError::InvalidPath("walk mode requires an entry path".into())
                    })?;
                    self.stack.push(Page {
                        files: Vec::new(),
                        curr: path,
                    });
                }
                BrowseMode::Scanned => {
                    let listing = self.service.list_directory("/").await?;
                    self.stack.push(Page {
                        files: listing.files,
                        curr: "/".into(),
                    });
                }
            }
        }

        if self.mode == BrowseMode::Walk {
            self.pane_bus.emit(PaneEvent::LoadNextDir);
            return Ok(());
        }
        match (self.path.clone(), self.conf.home().map(str::to_string)) {
            (Some(path), _) if path != "/" => self.to(&path).await,
            (None, Some(home)) => self.to(&home).await,
            _ => Ok(()),
        }
    }

    /// Mount directly at `path` (share/restore and CLI entry point).
    pub async fn mount_at(&mut self, path: &str) -> Result<()> {
        self.path = Some(vpath::normalize(path));
        self.mount().await
    }

    /// Descend into a directory entry. No-op for non-directories. Pushes a
    /// page in scanned mode, replaces the single page in fixed mode.
    pub async fn open_next(&mut self, file: &FileNode) -> Result<()> {
        if !file.is_dir() {
            return Ok(());
        }
        self.feeder.progress_start();
        let result = self.service.list_directory(&file.fullpath).await;
        self.feeder.progress_done();
        let listing = result?;

        match self.mode {
            BrowseMode::ScannedFixed => {
                self.stack = vec![Page {
                    files: listing.files,
                    curr: file.fullpath.clone(),
                }];
            }
            _ => self.stack.push(Page {
                files: listing.files,
                curr: file.name.clone(),
            }),
        }
        self.on_page_changed();
        Ok(())
    }

    /// Pop back to breadcrumb index `idx` (0 = root).
    pub fn back(&mut self, idx: usize) {
        let mut popped = false;
        while self.stack.len() > idx + 1 {
            self.stack.pop();
            popped = true;
        }
        if popped {
            self.on_page_changed();
        }
    }

    /// Go up one level via a full path resolution.
    pub async fn back_to_parent(&mut self) -> Result<()> {
        let frags = vpath::split_path(&self.current_location());
        if frags.len() <= 1 {
            return Ok(());
        }
        let parent = vpath::join(&frags[..frags.len() - 1]);
        let parent = if vpath::is_absolute(&parent) {
            parent
        } else {
            format!("/{}", parent)
        };
        self.to(&parent).await
    }

    fn is_dir_name_equal(&self, a: &str, b: &str) -> bool {
        if self.conf.is_windows() {
            a.to_lowercase() == b.to_lowercase()
        } else {
            a == b
        }
    }

    /// Jump to an absolute (or working-dir-relative) path.
    ///
    /// Diffs the target against the current stack, pops the divergent
    /// suffix, then descends fragment by fragment. If any fragment cannot
    /// be found in its parent listing the pre-call stack is restored and
    /// the error surfaces to the caller.
    pub async fn to(&mut self, dir: &str) -> Result<()> {
        match self.mode {
            BrowseMode::ScannedFixed => {
                return self.open_next(&FileNode::dir(&vpath::normalize(dir))).await;
            }
            BrowseMode::Walk => return self.walk_to(dir),
            BrowseMode::Scanned => {}
        }

        let backup = self.stack.clone();
        match self.to_inner(dir).await {
            Ok(()) => Ok(()),
            Err(e) => {
                debug!("navigation to {} failed: {}", dir, e);
                self.stack = backup;
                self.on_page_changed();
                Err(e)
            }
        }
    }

    async fn to_inner(&mut self, dir: &str) -> Result<()> {
        let dir = if vpath::is_absolute(dir) {
            dir.to_string()
        } else {
            vpath::join(&[self.conf.working_dir(), dir])
        };
        let mut frags = vpath::split_path(&dir);
        let mut curr_paths: Vec<String> = self.stack.iter().map(|p| p.curr.clone()).collect();
        if !curr_paths.is_empty() {
            curr_paths.remove(0); // the "/" root page
        }

        // longest common prefix stays, the divergent suffix is popped
        while let (Some(curr), Some(frag)) = (curr_paths.first(), frags.first()) {
            if !self.is_dir_name_equal(curr, frag) {
                break;
            }
            curr_paths.remove(0);
            frags.remove(0);
        }
        for _ in 0..curr_paths.len() {
            self.stack.pop();
        }
        if frags.is_empty() {
            return self.refresh().await;
        }
        for frag in frags {
            let target = self
                .current_page()
                .and_then(|page| {
                    page.files
                        .iter()
                        .find(|v| self.is_dir_name_equal(&v.name, &frag))
                })
                .cloned()
                .ok_or_else(|| AppError::SegmentNotFound(frag.clone()))?;
            self.open_next(&target).await?;
        }
        Ok(())
    }

    /// Re-root walk mode at a new entry path.
    fn walk_to(&mut self, dir: &str) -> Result<()> {
        let path = vpath::normalize(dir);
        self.path = Some(path.clone());
        self.stack = vec![Page {
            files: Vec::new(),
            curr: path.clone(),
        }];
        self.walker = Some(Walker::new(self.service.clone(), &path, self.sort_method));
        self.on_page_changed();
        self.feeder.reset_load_state();
        self.pane_bus.emit(PaneEvent::LoadNextDir);
        Ok(())
    }

    /// Full refresh: reset the walker (walk mode) or re-list the current
    /// directory, clear tombstones, and scroll back to the top.
    pub async fn refresh(&mut self) -> Result<()> {
        self.feeder.progress_start();
        let result = self.refresh_inner().await;
        self.feeder.progress_done();
        result
    }

    async fn refresh_inner(&mut self) -> Result<()> {
        if let Some(walker) = &mut self.walker {
            walker.reset().await?;
            self.feeder.reset_load_state();
            self.pane_bus.emit(PaneEvent::LoadNextDir);
        } else {
            let target = self.refresh_target();
            let listing = self.service.list_directory(&target).await?;
            if let Some(top) = self.stack.last_mut() {
                top.files = listing.files;
            }
        }
        self.deleted_files.clear();
        self.feeder.scroll_to_top();
        self.pane_bus.emit(PaneEvent::ScrollToTop);
        info!("refreshed {}", self.current_location());
        Ok(())
    }

    fn refresh_target(&self) -> String {
        if self.stack.len() == 1 && self.mode != BrowseMode::ScannedFixed {
            "/".to_string()
        } else {
            self.current_location()
        }
    }

    /// Cheap poll/focus-return refresh.
    ///
    /// Stack modes compare just the `date` fields of a fresh listing and
    /// swap it in only when they differ. Walk mode runs the expensive
    /// expiry check + seamless rebuild, and only when auto refresh is
    /// enabled and the scroll position is under the configured ceiling.
    /// Returns whether anything was swapped.
    pub async fn lazy_refresh(&mut self) -> Result<bool> {
        match self.mode {
            BrowseMode::Walk => self.lazy_refresh_walk().await,
            _ => self.lazy_refresh_listing().await,
        }
    }

    async fn lazy_refresh_listing(&mut self) -> Result<bool> {
        let target = self.refresh_target();
        self.feeder.progress_start();
        let result = self.service.list_directory(&target).await;
        self.feeder.progress_done();
        let listing = result?;

        let Some(top) = self.stack.last_mut() else {
            return Ok(false);
        };
        let dates = |files: &[FileNode]| {
            files
                .iter()
                .map(|f| f.date.clone())
                .collect::<Vec<_>>()
                .join(",")
        };
        if dates(&top.files) == dates(&listing.files) {
            return Ok(false);
        }
        top.files = listing.files;
        Ok(true)
    }

    async fn lazy_refresh_walk(&mut self) -> Result<bool> {
        if !self.conf.auto_refresh()
            || self.feeder.visible_start() > self.conf.walk_scroll_ceiling()
        {
            return Ok(false);
        }
        let Some(walker) = &self.walker else {
            return Ok(false);
        };
        if !walker.is_expired().await? {
            return Ok(false);
        }
        self.refresh_cancel.store(false, Ordering::Relaxed);
        let position = self.feeder.visible_end().max(walker.media_count());
        let fresh = walker
            .seamless_refresh(position, &self.refresh_cancel)
            .await?;
        self.walker = Some(fresh);
        self.deleted_files.clear();
        self.pane_bus.emit(PaneEvent::LoadNextDir);
        Ok(true)
    }

    /// Handle other tasks can use to abort an in-flight seamless refresh.
    pub fn refresh_cancel_flag(&self) -> Arc<AtomicBool> {
        self.refresh_cancel.clone()
    }

    /// Create a subdirectory of the current location and re-list.
    pub async fn create_directory(&mut self, name: &str) -> Result<()> {
        let dest = vpath::join(&[&self.current_location(), name]);
        self.service.mkdirs(&dest).await?;
        self.refresh().await
    }

    /// Serializable location state for the share URL.
    pub fn share_state(&self) -> ShareState {
        ShareState {
            path: self.current_location(),
            mode: self.mode,
        }
    }
}

/// The client-visible state a share URL encodes. Round-trip law: parsing a
/// built query reproduces the same mode and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareState {
    pub path: String,
    pub mode: BrowseMode,
}

impl ShareState {
    /// Build the query-string form (`action=open&mode=...&path=...`).
    pub fn to_query(&self) -> String {
        let mut query = format!(
            "action=open&mode={}&path={}",
            self.mode,
            encode_component(&self.path)
        );
        if self.mode == BrowseMode::Walk {
            query.push_str("&walk=1");
        }
        query
    }

    /// Parse a share query string back into location state.
    pub fn from_query(query: &str) -> Result<Self> {
        let query = query.trim_start_matches('?');
        let mut action = None;
        let mut path = None;
        let mut mode = None;
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let value = decode_component(value)?;
            match key {
                "action" => action = Some(value),
                "path" => path = Some(value),
                "mode" => mode = Some(value),
                _ => {}
            }
        }
        if action.as_deref() != Some("open") {
            return Err(AppError::Payload("share query is not an open action".into()));
        }
        let path = path.ok_or_else(|| AppError::Payload("share query missing path".into()))?;
        let mode = match mode {
            Some(m) => m.parse()?,
            None => BrowseMode::Scanned,
        };
        Ok(Self { path, mode })
    }
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~')
}

pub(crate) fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

pub(crate) fn decode_component(s: &str) -> Result<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hex = bytes
                    .get(i + 1..i + 3)
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok())
                    .ok_or_else(|| AppError::Payload(format!("bad percent escape in {}", s)))?;
                out.push(hex);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| AppError::Payload(format!("invalid utf-8 in {}", s)))
}
