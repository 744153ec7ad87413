//! Per-pane browsing state and the components layered over it.
//!
//! One [`Pane`] owns everything a single browser view needs: the breadcrumb
//! stack, the optional walker, the tombstone set, the selection, and the
//! viewport feeder. The submodules group its operations: navigation in
//! [`location`], the fill loop in [`display`], selection semantics in
//! [`selection`], drag/drop in [`transfer`], and context commands in
//! [`actions`]. Cross-pane consistency flows only through the global event
//! bus — panes never share mutable state.

pub mod actions;
pub mod display;
pub mod location;
pub mod selection;
pub mod transfer;
pub mod walker;

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::event::{EventBus, EventReceiver, GlobalEvent, PaneEvent};
use crate::fs::node::{is_image_file, is_media_file, FileNode};
use crate::fs::path as vpath;
use crate::fs::service::FileService;
use crate::fs::sort::{sort_files, SortMethod};
use crate::fs::tags::{MetadataService, TagStore};

use display::ViewportFeeder;
use walker::Walker;

/// Addressing mode of one pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BrowseMode {
    /// Free breadcrumb navigation.
    #[default]
    Scanned,
    /// Pinned root: descending replaces the single page instead of pushing.
    ScannedFixed,
    /// Depth-first streaming of an entire subtree via the walker.
    Walk,
}

impl BrowseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowseMode::Scanned => "scanned",
            BrowseMode::ScannedFixed => "scanned-fixed",
            BrowseMode::Walk => "walk",
        }
    }
}

impl std::fmt::Display for BrowseMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BrowseMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scanned" => Ok(BrowseMode::Scanned),
            "scanned-fixed" => Ok(BrowseMode::ScannedFixed),
            "walk" => Ok(BrowseMode::Walk),
            other => Err(AppError::Payload(format!("unknown browse mode: {}", other))),
        }
    }
}

/// One directory's listing as currently known to the navigation stack.
#[derive(Debug, Clone)]
pub struct Page {
    pub files: Vec<FileNode>,
    /// Segment name (scanned) or fullpath (fixed/walk) of this directory.
    pub curr: String,
}

/// A single browser view over one file service.
pub struct Pane<S> {
    pub(crate) service: Arc<S>,
    pub(crate) conf: Arc<AppConfig>,
    pub mode: BrowseMode,
    /// Walk root, or the path this pane was opened/restored at.
    pub path: Option<String>,
    pub(crate) stack: Vec<Page>,
    pub(crate) walker: Option<Walker<S>>,
    pub(crate) sort_method: SortMethod,
    /// Tombstones masking entries pending removal, keyed by fullpath.
    pub(crate) deleted_files: HashSet<String>,
    /// Indices into the rendered (sorted/filtered) list.
    pub(crate) selection: Vec<usize>,
    /// Fuzzy name filter over the rendered list.
    pub(crate) name_filter: Option<String>,
    pub(crate) tag_store: TagStore,
    pub(crate) feeder: ViewportFeeder,
    pub(crate) global_bus: EventBus<GlobalEvent>,
    pub(crate) global_rx: EventReceiver<GlobalEvent>,
    pub(crate) pane_bus: EventBus<PaneEvent>,
    pub(crate) pane_rx: EventReceiver<PaneEvent>,
    /// Cancels an in-flight seamless refresh when raised.
    pub(crate) refresh_cancel: Arc<AtomicBool>,
}

impl<S: FileService> Pane<S> {
    /// Create an unmounted pane. Call [`Pane::mount`](location) before use.
    pub fn new(
        service: Arc<S>,
        conf: Arc<AppConfig>,
        global_bus: EventBus<GlobalEvent>,
        mode: BrowseMode,
        path: Option<String>,
    ) -> Result<Self> {
        let sort_method = conf.default_sort().parse()?;
        let pane_bus: EventBus<PaneEvent> = EventBus::new();
        let pane_rx = pane_bus.subscribe();
        let global_rx = global_bus.subscribe();
        let walker = match (mode, &path) {
            (BrowseMode::Walk, Some(p)) => Some(Walker::new(service.clone(), p, sort_method)),
            _ => None,
        };
        let feeder = ViewportFeeder::new(conf.cell_width());
        Ok(Self {
            service,
            conf,
            mode,
            path,
            stack: Vec::new(),
            walker,
            sort_method,
            deleted_files: HashSet::new(),
            selection: Vec::new(),
            name_filter: None,
            tag_store: TagStore::new(),
            feeder,
            global_bus,
            global_rx,
            pane_bus,
            pane_rx,
            refresh_cancel: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn current_page(&self) -> Option<&Page> {
        self.stack.last()
    }

    pub fn sort_method(&self) -> SortMethod {
        self.sort_method
    }

    pub fn tag_store(&self) -> &TagStore {
        &self.tag_store
    }

    /// Breadcrumb segments; on a Windows host the leading `/` placeholder is
    /// dropped so the drive letter forms the root.
    fn base_path(&self) -> Vec<&str> {
        let skip = usize::from(self.conf.is_windows() && self.mode != BrowseMode::ScannedFixed);
        self.stack
            .iter()
            .skip(skip)
            .map(|p| p.curr.as_str())
            .collect()
    }

    /// The directory this pane is currently showing.
    pub fn current_location(&self) -> String {
        match self.mode {
            BrowseMode::ScannedFixed => self
                .stack
                .first()
                .map(|p| p.curr.clone())
                .unwrap_or_default(),
            BrowseMode::Walk => self.path.clone().unwrap_or_default(),
            BrowseMode::Scanned => {
                if self.stack.len() <= 1 {
                    "/".to_string()
                } else {
                    vpath::join(&self.base_path())
                }
            }
        }
    }

    /// The rendered list: a pure function of {raw files, sort method,
    /// deleted set, filter flags}. Walk mode streams the walker's media in
    /// tree order; stack modes sort the top page.
    pub fn sorted_files(&self) -> Vec<FileNode> {
        let files: Vec<FileNode> = if let Some(walker) = &self.walker {
            walker.media_files()
        } else if let Some(page) = self.current_page() {
            let filtered: Vec<FileNode> = if self.conf.only_media_and_dirs() {
                page.files
                    .iter()
                    .filter(|f| f.is_dir() || is_media_file(&f.name))
                    .cloned()
                    .collect()
            } else {
                page.files.clone()
            };
            sort_files(&filtered, self.sort_method)
        } else {
            return Vec::new();
        };

        let files = files
            .into_iter()
            .filter(|f| !self.deleted_files.contains(&f.fullpath));
        match &self.name_filter {
            Some(query) if !query.is_empty() => {
                let matcher = SkimMatcherV2::default();
                files
                    .filter(|f| matcher.fuzzy_match(&f.name, query).is_some())
                    .collect()
            }
            _ => files.collect(),
        }
    }

    /// Set the fuzzy name filter (`None` clears it). Selection indices are
    /// invalidated by the change.
    pub fn set_name_filter(&mut self, query: Option<String>) {
        self.name_filter = query;
        self.selection.clear();
    }

    /// Change the sort method. Walk mode rebuilds its walker (per-directory
    /// ordering is baked in at fetch time) and re-triggers loading.
    pub fn set_sort_method(&mut self, method: SortMethod) {
        self.sort_method = method;
        if self.mode == BrowseMode::Walk {
            if let Some(path) = self.path.clone() {
                self.walker = Some(Walker::new(self.service.clone(), &path, method));
                self.feeder.reset_load_state();
                self.pane_bus.emit(PaneEvent::LoadNextDir);
            }
        }
    }

    /// Apply one cross-pane event to this pane's own state. Events scoped
    /// to a different directory are ignored.
    pub(crate) fn apply_global_event(&mut self, event: GlobalEvent) {
        let here = vpath::normalize(&self.current_location());
        match event {
            GlobalEvent::RemoveFiles { paths, loc } => {
                if vpath::normalize(&loc) != here || self.stack.is_empty() {
                    return;
                }
                for path in paths {
                    if is_image_file(&path) {
                        // the generation-info sidecar goes with the image
                        if let Some((stem, _)) = path.rsplit_once('.') {
                            self.deleted_files.insert(format!("{}.txt", stem));
                        }
                    }
                    self.deleted_files.insert(path);
                }
            }
            GlobalEvent::AddFiles { files, loc } => {
                if vpath::normalize(&loc) != here {
                    return;
                }
                if let Some(top) = self.stack.last_mut() {
                    top.files.splice(0..0, files);
                }
            }
        }
    }

    /// Invariants tied to "the current Page changed": tombstones and the
    /// selection are both scoped to one directory view.
    pub(crate) fn on_page_changed(&mut self) {
        self.deleted_files.clear();
        self.selection.clear();
    }
}

impl<S: FileService + MetadataService> Pane<S> {
    /// Drain and handle queued events. Call from the owner's update loop
    /// after any action that may have emitted.
    pub async fn pump(&mut self) -> Result<()> {
        for event in self.global_rx.try_drain() {
            self.apply_global_event(event);
        }
        for event in self.pane_rx.try_drain() {
            match event {
                PaneEvent::LoadNextDir => self.fill_viewport().await?,
                PaneEvent::Refresh => self.refresh().await?,
                PaneEvent::SelectAll => {
                    self.selection = (0..self.sorted_files().len()).collect();
                }
                PaneEvent::ScrollToTop => self.feeder.scroll_to_top(),
                PaneEvent::ViewableAreaChange { files, .. } => {
                    self.fetch_viewable_metadata(&files).await?;
                }
            }
        }
        Ok(())
    }
}
