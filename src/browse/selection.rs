//! Multi-select semantics over the rendered list.
//!
//! Selection is an ordered list of indices into the *currently rendered*
//! list, not the raw page. It dies with the page: navigation, filters and
//! outside clicks (unless keep-multi-select is on) all clear it.

use crate::error::{AppError, Result};
use crate::fs::node::FileNode;
use crate::fs::service::FileService;

use super::Pane;

/// Modifier keys held during a click.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClickModifiers {
    pub shift: bool,
    /// Ctrl, or Cmd on macOS hosts.
    pub ctrl: bool,
}

/// What a click resolved to.
#[derive(Debug, Clone, PartialEq)]
pub enum ClickOutcome {
    /// Plain click: open the directory / preview the file.
    Activate(FileNode),
    /// Modifier click: the selection changed, nothing opens.
    SelectionChanged,
}

impl<S: FileService> Pane<S> {
    pub fn selection(&self) -> &[usize] {
        &self.selection
    }

    pub fn is_selected(&self, idx: usize) -> bool {
        self.selection.contains(&idx)
    }

    /// The rendered entries behind the current selection.
    pub fn selected_files(&self) -> Vec<FileNode> {
        let files = self.sorted_files();
        self.selection
            .iter()
            .filter_map(|&idx| files.get(idx).cloned())
            .collect()
    }

    /// Click dispatch. Plain click activates; shift extends a contiguous
    /// range; ctrl toggles a single index.
    pub fn on_item_click(&mut self, idx: usize, modifiers: ClickModifiers) -> Result<ClickOutcome> {
        let files = self.sorted_files();
        let file = files
            .get(idx)
            .cloned()
            .ok_or_else(|| AppError::Payload(format!("click index {} out of range", idx)))?;
        self.feeder.set_preview_idx(Some(idx));

        let pos = self.selection.iter().position(|&i| i == idx);
        if modifiers.shift {
            match pos {
                Some(p) => {
                    self.selection.remove(p);
                }
                None => {
                    self.selection.push(idx);
                    self.selection.sort_unstable();
                    let first = self.selection[0];
                    let last = self.selection[self.selection.len() - 1];
                    self.selection = (first..=last).collect();
                }
            }
            Ok(ClickOutcome::SelectionChanged)
        } else if modifiers.ctrl {
            match pos {
                Some(p) => {
                    self.selection.remove(p);
                }
                None => self.selection.push(idx),
            }
            Ok(ClickOutcome::SelectionChanged)
        } else {
            Ok(ClickOutcome::Activate(file))
        }
    }

    pub fn select_all(&mut self) {
        self.selection = (0..self.sorted_files().len()).collect();
    }

    pub fn invert_selection(&mut self) {
        let len = self.sorted_files().len();
        self.selection = (0..len).filter(|i| !self.selection.contains(i)).collect();
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// A click outside the list clears the selection unless the
    /// keep-multi-select mode is active.
    pub fn on_outside_click(&mut self) {
        if !self.conf.keep_multi_select() {
            self.selection.clear();
        }
    }

    /// Focus loss behaves like an outside click.
    pub fn on_focus_loss(&mut self) {
        self.on_outside_click();
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_util::*;
    use super::super::{BrowseMode, Pane};
    use super::*;
    use crate::config::AppConfig;
    use crate::event::EventBus;
    use crate::fs::service::LocalFileService;
    use std::fs::{self, File};
    use std::sync::Arc;

    const SHIFT: ClickModifiers = ClickModifiers {
        shift: true,
        ctrl: false,
    };
    const CTRL: ClickModifiers = ClickModifiers {
        shift: false,
        ctrl: true,
    };

    async fn pane_with_files(count: usize) -> (tempfile::TempDir, Pane<LocalFileService>) {
        let dir = tempfile::TempDir::new().unwrap();
        for i in 0..count {
            File::create(dir.path().join(format!("f{:02}.png", i))).unwrap();
        }
        let pane = mounted_pane(&dir).await;
        (dir, pane)
    }

    #[tokio::test]
    async fn plain_click_activates() {
        let (_dir, mut pane) = pane_with_files(3).await;
        let outcome = pane
            .on_item_click(1, ClickModifiers::default())
            .unwrap();
        assert!(matches!(outcome, ClickOutcome::Activate(f) if f.name == "f01.png"));
        assert!(pane.selection().is_empty());
    }

    #[tokio::test]
    async fn ctrl_click_toggles_without_contiguity() {
        let (_dir, mut pane) = pane_with_files(5).await;
        pane.on_item_click(1, CTRL).unwrap();
        pane.on_item_click(3, CTRL).unwrap();
        assert_eq!(pane.selection(), &[1, 3]);
        pane.on_item_click(1, CTRL).unwrap();
        assert_eq!(pane.selection(), &[3]);
    }

    #[tokio::test]
    async fn shift_click_extends_contiguous_range() {
        let (_dir, mut pane) = pane_with_files(10).await;
        // existing selection [2, 3, 4]
        pane.on_item_click(2, CTRL).unwrap();
        pane.on_item_click(3, CTRL).unwrap();
        pane.on_item_click(4, CTRL).unwrap();

        pane.on_item_click(7, SHIFT).unwrap();
        assert_eq!(pane.selection(), &[2, 3, 4, 5, 6, 7]);

        pane.on_item_click(0, SHIFT).unwrap();
        assert_eq!(pane.selection(), &[0, 1, 2, 3, 4, 5, 6, 7]);
    }

    #[tokio::test]
    async fn shift_click_on_selected_index_removes_it() {
        let (_dir, mut pane) = pane_with_files(5).await;
        pane.on_item_click(1, CTRL).unwrap();
        pane.on_item_click(2, CTRL).unwrap();
        pane.on_item_click(2, SHIFT).unwrap();
        assert_eq!(pane.selection(), &[1]);
    }

    #[tokio::test]
    async fn click_out_of_range_is_an_error() {
        let (_dir, mut pane) = pane_with_files(2).await;
        assert!(pane.on_item_click(9, CTRL).is_err());
    }

    #[tokio::test]
    async fn select_all_and_invert() {
        let (_dir, mut pane) = pane_with_files(4).await;
        pane.select_all();
        assert_eq!(pane.selection(), &[0, 1, 2, 3]);

        pane.on_item_click(1, CTRL).unwrap(); // deselect 1
        pane.invert_selection();
        assert_eq!(pane.selection(), &[1]);
    }

    #[tokio::test]
    async fn outside_click_clears_unless_kept() {
        let (_dir, mut pane) = pane_with_files(3).await;
        pane.select_all();
        pane.on_outside_click();
        assert!(pane.selection().is_empty());

        let dir2 = tempfile::TempDir::new().unwrap();
        File::create(dir2.path().join("a.png")).unwrap();
        let service = Arc::new(LocalFileService::new());
        let conf: AppConfig = toml::from_str("[browse]\nkeep_multi_select = true\n").unwrap();
        let mut kept = Pane::new(
            service,
            Arc::new(conf),
            EventBus::new(),
            BrowseMode::Scanned,
            None,
        )
        .unwrap();
        kept.mount_at(&norm(dir2.path())).await.unwrap();
        kept.select_all();
        kept.on_outside_click();
        kept.on_focus_loss();
        assert_eq!(kept.selection().len(), 1);
    }

    #[tokio::test]
    async fn navigation_clears_selection() {
        let dir = setup_tree();
        let mut pane = mounted_pane(&dir).await;
        pane.to(&norm(dir.path())).await.unwrap();
        pane.select_all();
        assert!(!pane.selection().is_empty());

        pane.to(&format!("{}/dir_a", norm(dir.path()))).await.unwrap();
        assert!(pane.selection().is_empty());
    }

    #[tokio::test]
    async fn selected_files_map_through_rendered_order() {
        let (dir, mut pane) = pane_with_files(3).await;
        fs::create_dir(dir.path().join("zz_dir")).unwrap();
        pane.refresh().await.unwrap();

        // dirs sort first: index 0 is zz_dir despite the name
        pane.on_item_click(0, CTRL).unwrap();
        let selected = pane.selected_files();
        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].name, "zz_dir");
    }
}
