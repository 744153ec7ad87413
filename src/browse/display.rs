//! Viewport feeder: grid geometry and the just-in-time loading loop that
//! keeps a virtualized scroller fed.
//!
//! The scroller reports a visible index range; while that range comes
//! within [`PRELOAD_THRESHOLD`] items of the end of the materialized list
//! (and more data is available) the feeder pulls another chunk. Concurrent
//! triggers collapse into one in-flight load, and a failed load latches
//! "can't load more" until an explicit refresh. Metadata fetches ride on a
//! debounced viewable-area event instead of the hot scroll path.

use std::future::Future;
use std::time::Duration;

use log::warn;

use crate::error::Result;
use crate::event::{Debounce, PaneEvent};
use crate::fs::node::{is_media_file, FileNode};
use crate::fs::service::FileService;
use crate::fs::tags::MetadataService;

use super::{BrowseMode, Pane};

/// Keep loading while the visible index is within this many items of the
/// end of the materialized list.
pub const PRELOAD_THRESHOLD: usize = 50;
/// Horizontal margin added around one grid cell.
pub const CELL_MARGIN: u32 = 16;
/// Height of the profile row shown under wide cells.
pub const PROFILE_HEIGHT: u32 = 44;
/// Cells at or below this width drop the profile row.
const PROFILE_CUTOFF: u32 = 160;
/// Overscan rows included in the viewable-area window.
const OVERSCAN: usize = 10;
/// Settle delay between fill iterations.
const FILL_SETTLE: Duration = Duration::from_millis(30);
/// Debounce window for viewable-area events.
const AREA_DEBOUNCE: Duration = Duration::from_millis(300);

/// Grid geometry and fill-loop state for one pane.
#[derive(Debug)]
pub struct ViewportFeeder {
    cell_width: u32,
    viewport_width: u32,
    visible_start: usize,
    visible_end: usize,
    preview_idx: Option<usize>,
    loading: bool,
    load_failed: bool,
    progress_depth: u32,
    area_debounce: Debounce,
}

impl ViewportFeeder {
    pub fn new(cell_width: u32) -> Self {
        Self {
            cell_width,
            viewport_width: 0,
            visible_start: 0,
            visible_end: 0,
            preview_idx: None,
            loading: false,
            load_failed: false,
            progress_depth: 0,
            area_debounce: Debounce::new(AREA_DEBOUNCE),
        }
    }

    /// One cell plus its margin.
    pub fn grid_size(&self) -> u32 {
        self.cell_width + CELL_MARGIN
    }

    /// How many columns fit the current viewport width.
    pub fn columns(&self) -> u32 {
        if self.grid_size() == 0 {
            return 0;
        }
        self.viewport_width / self.grid_size()
    }

    /// Row heights: `(first, rest)`. Wide cells get a profile row under the
    /// first line of each entry.
    pub fn item_heights(&self) -> (u32, u32) {
        let second = self.grid_size();
        let first = if self.cell_width <= PROFILE_CUTOFF {
            second
        } else {
            second + PROFILE_HEIGHT
        };
        (first, second)
    }

    pub fn set_viewport_width(&mut self, width: u32) {
        self.viewport_width = width;
    }

    pub fn set_cell_width(&mut self, width: u32) {
        self.cell_width = width;
    }

    /// Record the scroller's visible index range.
    pub fn set_visible_range(&mut self, start: usize, end: usize) {
        self.visible_start = start;
        self.visible_end = end.max(start);
    }

    pub fn visible_start(&self) -> usize {
        self.visible_start
    }

    pub fn visible_end(&self) -> usize {
        self.visible_end
    }

    /// Index shown in the fullscreen preview, if open.
    pub fn set_preview_idx(&mut self, idx: Option<usize>) {
        self.preview_idx = idx;
    }

    fn current_index(&self, fullscreen_preview: bool) -> usize {
        if fullscreen_preview {
            self.preview_idx.unwrap_or(0)
        } else {
            self.visible_end
        }
    }

    pub fn scroll_to_top(&mut self) {
        let span = self.visible_end.saturating_sub(self.visible_start);
        self.visible_start = 0;
        self.visible_end = span;
        self.preview_idx = None;
        self.area_debounce.reset();
    }

    /// Clear the failure latch (explicit refresh re-enables auto loading).
    pub fn reset_load_state(&mut self) {
        self.load_failed = false;
    }

    pub fn load_failed(&self) -> bool {
        self.load_failed
    }

    pub(crate) fn progress_start(&mut self) {
        self.progress_depth += 1;
    }

    pub(crate) fn progress_done(&mut self) {
        self.progress_depth = self.progress_depth.saturating_sub(1);
    }

    /// Whether a remote operation is in flight (progress indicator state).
    pub fn is_busy(&self) -> bool {
        self.progress_depth > 0 || self.loading
    }
}

impl<S: FileService + MetadataService> Pane<S> {
    /// Whether walk mode still has pending directories (and loading has not
    /// been disabled by a failure).
    pub fn can_load_next(&self) -> bool {
        match &self.walker {
            Some(walker) => !walker.is_completed() && !self.feeder.load_failed,
            None => false,
        }
    }

    /// Fill the viewport from the walker until the visible range is safely
    /// buffered or the tree is exhausted.
    pub async fn fill_viewport(&mut self) -> Result<()> {
        self.fill_viewport_inner(false).await
    }

    /// Same, but keyed to the fullscreen-preview index instead of the
    /// scroller range.
    pub async fn fill_viewport_for_preview(&mut self) -> Result<()> {
        self.fill_viewport_inner(true).await
    }

    async fn fill_viewport_inner(&mut self, fullscreen_preview: bool) -> Result<()> {
        if self.feeder.loading || self.mode != BrowseMode::Walk {
            return Ok(());
        }
        self.feeder.loading = true;
        loop {
            let len = self.sorted_files().len();
            let need = len == 0
                || (self.feeder.current_index(fullscreen_preview) + PRELOAD_THRESHOLD > len
                    && self.can_load_next());
            if !need {
                break;
            }
            // let dependent state settle before the next pull
            tokio::time::sleep(FILL_SETTLE).await;
            let step = match self.walker.as_mut() {
                Some(walker) => walker.next().await,
                None => break,
            };
            match step {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(e) => {
                    warn!("walk expansion failed, auto-load disabled: {}", e);
                    self.feeder.load_failed = true;
                    self.feeder.loading = false;
                    return Err(e);
                }
            }
        }
        self.feeder.loading = false;
        self.emit_viewable_area_change();
        Ok(())
    }

    /// Fill loop over a caller-supplied source (search results and other
    /// externally fed lists). `fetch_next` returns the next chunk, or
    /// `None` when exhausted; chunks are appended to the top page.
    pub async fn fill_viewport_with<F, Fut>(&mut self, mut fetch_next: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<Vec<FileNode>>>>,
    {
        if self.feeder.loading {
            return Ok(());
        }
        self.feeder.loading = true;
        loop {
            let len = self.sorted_files().len();
            let need = len == 0 || self.feeder.current_index(false) + PRELOAD_THRESHOLD > len;
            if !need {
                break;
            }
            tokio::time::sleep(FILL_SETTLE).await;
            match fetch_next().await {
                Ok(Some(chunk)) => {
                    if let Some(top) = self.stack.last_mut() {
                        top.files.extend(chunk);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    self.feeder.load_failed = true;
                    self.feeder.loading = false;
                    return Err(e);
                }
            }
        }
        self.feeder.loading = false;
        self.emit_viewable_area_change();
        Ok(())
    }

    /// Scroll notification from the UI: update the range, keep the buffer
    /// ahead of it, and let metadata consumers know what is visible.
    pub async fn on_scroll(&mut self, start: usize, end: usize) -> Result<()> {
        self.feeder.set_visible_range(start, end);
        self.fill_viewport().await?;
        self.emit_viewable_area_change();
        Ok(())
    }

    /// Emit the debounced viewable-area event carrying the visible window
    /// plus overscan.
    pub(crate) fn emit_viewable_area_change(&mut self) {
        if !self.feeder.area_debounce.should_fire() {
            return;
        }
        let files = self.sorted_files();
        if files.is_empty() {
            return;
        }
        let start_idx = self.feeder.visible_start.saturating_sub(OVERSCAN);
        let end_idx = (self.feeder.visible_end + OVERSCAN).min(files.len());
        if start_idx >= end_idx {
            return;
        }
        self.pane_bus.emit(PaneEvent::ViewableAreaChange {
            files: files[start_idx..end_idx].to_vec(),
            start_idx,
        });
    }

    /// Batch-fetch tags and directory covers for the entries in view. Only
    /// entries under a scanned path carry metadata.
    pub(crate) async fn fetch_viewable_metadata(&mut self, files: &[FileNode]) -> Result<()> {
        let service = self.service.clone();
        let tag_paths: Vec<String> = files
            .iter()
            .filter(|f| f.is_under_scanned_path && !f.is_dir() && is_media_file(&f.name))
            .map(|f| f.fullpath.clone())
            .collect();
        if !tag_paths.is_empty() {
            self.tag_store.fetch_image_tags(&*service, &tag_paths).await?;
        }

        let cover_paths: Vec<String> = files
            .iter()
            .filter(|f| f.is_under_scanned_path && f.is_dir())
            .map(|f| f.fullpath.clone())
            .collect();
        if !cover_paths.is_empty() {
            self.tag_store.fetch_dir_covers(&*service, &cover_paths).await?;
        }
        Ok(())
    }
}
