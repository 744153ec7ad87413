//! Drag/drop file transfer between panes.
//!
//! The drag payload crosses the platform drag-and-drop API as JSON, so it
//! carries an explicit discriminator that drop handlers verify before
//! trusting any other field. Self-drops are rejected before the copy/move
//! prompt; confirmed transfers go to the file service first and only then
//! fan out as events for every open pane to reconcile against.

use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::event::{GlobalEvent, PaneEvent};
use crate::fs::node::{unique_files, FileNode, NodeKind};
use crate::fs::path as vpath;
use crate::fs::service::FileService;

use super::Pane;

/// Discriminator value marking a drag payload as ours.
pub const TRANSFER_PAYLOAD_TAG: &str = "FileTransferData";

/// Serialized form of a drag operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileTransferData {
    /// Fullpaths of every dragged entry.
    pub path: Vec<String>,
    /// Source directory the drag started in.
    pub loc: String,
    #[serde(rename = "includeDir")]
    pub include_dir: bool,
    pub nodes: Vec<FileNode>,
    #[serde(rename = "__id")]
    pub id: String,
}

impl FileTransferData {
    /// Parse a drag payload, verifying the discriminator before anything
    /// else. Foreign or malformed drags yield `None`.
    pub fn from_drag_json(raw: &str) -> Option<Self> {
        let value: serde_json::Value = serde_json::from_str(raw).ok()?;
        if value.get("__id")?.as_str()? != TRANSFER_PAYLOAD_TAG {
            return None;
        }
        serde_json::from_value(value).ok()
    }
}

/// Where a drop landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// The empty area of the directory view (destination = current dir).
    Background,
    /// A directory entry inside the view.
    Directory(String),
}

/// A validated drop waiting for the user to pick copy or move.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransfer {
    pub data: FileTransferData,
    pub dest: String,
}

/// The user's answer to the copy/move prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferChoice {
    Copy,
    Move,
}

impl<S: FileService> Pane<S> {
    /// Build the drag payload for the entry at `idx`. If the entry is part
    /// of the current selection the whole selection travels with it.
    pub fn drag_payload(&self, idx: usize) -> Result<String> {
        let files = self.sorted_files();
        let file = files
            .get(idx)
            .cloned()
            .ok_or_else(|| AppError::Payload(format!("drag index {} out of range", idx)))?;

        let mut dragged = vec![file.clone()];
        let mut include_dir = file.kind == NodeKind::Dir;
        if self.selection.contains(&idx) {
            let selected = self.selected_files();
            include_dir = selected.iter().any(|f| f.is_dir());
            dragged.extend(selected);
        }
        let dragged = unique_files(dragged);

        let loc = {
            let loc = self.current_location();
            if loc.is_empty() {
                "search-result".to_string()
            } else {
                loc
            }
        };
        let data = FileTransferData {
            path: dragged.iter().map(|f| f.fullpath.clone()).collect(),
            loc,
            include_dir,
            nodes: dragged,
            id: TRANSFER_PAYLOAD_TAG.to_string(),
        };
        serde_json::to_string(&data).map_err(|e| AppError::Payload(e.to_string()))
    }

    /// Validate a drop. Returns the pending transfer to confirm, or `None`
    /// when the drop is ignored: walk panes accept no drops, foreign
    /// payloads are not ours, and self-drops (same directory, onto a
    /// dragged node, or into a dragged node's own subtree) are rejected
    /// before any prompt.
    pub fn accept_drop(&self, raw: &str, target: &DropTarget) -> Option<PendingTransfer> {
        if self.walker.is_some() {
            return None;
        }
        let data = FileTransferData::from_drag_json(raw)?;
        let dest = match target {
            DropTarget::Background => self.current_location(),
            DropTarget::Directory(path) => path.clone(),
        };
        let dest = vpath::normalize(&dest);
        if dest == vpath::normalize(&data.loc) {
            return None;
        }
        for dragged in &data.path {
            let dragged = vpath::normalize(dragged);
            if dest == dragged || dest.starts_with(&format!("{}/", dragged)) {
                return None;
            }
        }
        Some(PendingTransfer { data, dest })
    }

    /// Run a confirmed transfer. Nothing is patched locally until the
    /// remote call succeeds; reconciliation then flows through the global
    /// bus so every open pane (this one included) adjusts its own state.
    pub async fn execute_transfer(
        &mut self,
        pending: PendingTransfer,
        choice: TransferChoice,
    ) -> Result<()> {
        let PendingTransfer { data, dest } = pending;
        match choice {
            TransferChoice::Copy => {
                self.service.copy_files(&data.path, &dest, false).await?;
                info!("copied {} entries to {}", data.path.len(), dest);
            }
            TransferChoice::Move => {
                self.service.move_files(&data.path, &dest, false).await?;
                info!("moved {} entries {} -> {}", data.path.len(), data.loc, dest);
                self.global_bus.emit(GlobalEvent::RemoveFiles {
                    paths: data.path.clone(),
                    loc: data.loc.clone(),
                });
            }
        }
        self.global_bus.emit(GlobalEvent::AddFiles {
            files: data.nodes,
            loc: dest,
        });
        self.pane_bus.emit(PaneEvent::Refresh);
        Ok(())
    }
}
