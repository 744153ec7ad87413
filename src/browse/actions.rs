//! Context-menu command dispatch for file items.
//!
//! Each command is validated against the current selection, translated into
//! remote calls, and reconciled locally through the same events the
//! transfer core uses. Confirmation prompts (delete, copy/move) are the
//! caller's responsibility; by the time a command reaches the dispatcher it
//! is considered confirmed.

use log::info;

use crate::error::{AppError, Result};
use crate::event::GlobalEvent;
use crate::fs::node::{is_media_file, FileNode};
use crate::fs::path as vpath;
use crate::fs::service::FileService;
use crate::fs::tags::{MetadataService, Tag};
use crate::host::{gen_info_completed, HostChannel, HostMessage, HostTab};

use super::location::encode_component;
use super::Pane;

/// A confirmed context command against the entry at some rendered index.
#[derive(Debug, Clone, PartialEq)]
pub enum FileAction {
    /// Remove the clicked entry (or the whole selection containing it).
    Delete,
    /// Rename the clicked entry to a new fullpath.
    Rename { new_path: String },
    /// Attach/detach one tag on the clicked entry.
    ToggleTag { tag: Tag },
    /// Add or remove a tag across the selection.
    BatchTag { tag: Tag, add: bool },
    /// Copy the selection to a quick-move target directory.
    CopyTo { dest: String },
    /// Move the selection to a quick-move target directory.
    MoveTo { dest: String },
    /// Hand the clicked image to a host feature tab.
    SendToHostTab { tab: HostTab },
    /// Open the raw file in a new window.
    OpenInNewWindow,
    /// Copy the entry's fullpath.
    CopyFilePath,
    /// Download the selection.
    Download,
}

/// What the caller should do after a command ran.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    Done,
    /// The toggled tag ended up removed (`true`) or added (`false`).
    TagToggled { removed: bool },
    /// URLs to open or download.
    Urls(Vec<String>),
    /// Text to place on the clipboard.
    Text(String),
}

/// Raw-file URL for an entry (`download` adds a content-disposition name).
pub fn raw_file_url(api_base: &str, file: &FileNode, download: bool) -> String {
    let mut url = format!(
        "{}/file?path={}&t={}",
        api_base,
        encode_component(&file.fullpath),
        encode_component(&file.date)
    );
    if download {
        url.push_str(&format!("&disposition={}", encode_component(&file.name)));
    }
    url
}

/// Thumbnail URL for a media entry.
pub fn thumbnail_url(api_base: &str, file: &FileNode, size: &str) -> String {
    format!(
        "{}/image-thumbnail?path={}&size={}&t={}",
        api_base,
        encode_component(&file.fullpath),
        size,
        encode_component(&file.date)
    )
}

impl<S: FileService + MetadataService> Pane<S> {
    /// The files a command at `idx` operates on: the whole selection when
    /// the clicked entry is part of it, otherwise just the clicked entry.
    pub fn action_targets(&self, idx: usize) -> Result<Vec<FileNode>> {
        let files = self.sorted_files();
        let file = files
            .get(idx)
            .cloned()
            .ok_or_else(|| AppError::Payload(format!("action index {} out of range", idx)))?;
        if self.selection.contains(&idx) {
            Ok(self.selected_files())
        } else {
            Ok(vec![file])
        }
    }

    /// Run a confirmed context command for the entry at `idx`.
    pub async fn dispatch_action<H: HostChannel>(
        &mut self,
        action: FileAction,
        idx: usize,
        host: &H,
    ) -> Result<ActionOutcome> {
        let targets = self.action_targets(idx)?;
        let clicked = targets
            .first()
            .cloned()
            .ok_or_else(|| AppError::Payload("empty action target".into()))?;
        let paths: Vec<String> = targets.iter().map(|f| f.fullpath.clone()).collect();

        match action {
            FileAction::Delete => {
                self.service.delete_files(&paths).await?;
                info!("deleted {} entries in {}", paths.len(), self.current_location());
                self.global_bus.emit(GlobalEvent::RemoveFiles {
                    paths,
                    loc: self.current_location(),
                });
                self.drain_global_events();
                Ok(ActionOutcome::Done)
            }
            FileAction::Rename { new_path } => {
                let new_path = vpath::normalize(&new_path);
                self.service.rename_file(&clicked.fullpath, &new_path).await?;
                self.tag_store.rename_path(&clicked.fullpath, &new_path);
                self.patch_renamed_entry(&clicked.fullpath, &new_path);
                Ok(ActionOutcome::Done)
            }
            FileAction::ToggleTag { tag } => {
                let service = self.service.clone();
                let removed = service.toggle_tag(&tag, &clicked.fullpath).await?;
                self.tag_store
                    .refresh_tags(&*service, std::slice::from_ref(&clicked.fullpath))
                    .await?;
                Ok(ActionOutcome::TagToggled { removed })
            }
            FileAction::BatchTag { tag, add } => {
                let media_paths: Vec<String> = targets
                    .iter()
                    .filter(|f| is_media_file(&f.name))
                    .map(|f| f.fullpath.clone())
                    .collect();
                let service = self.service.clone();
                service.batch_update_tag(&tag, &media_paths, add).await?;
                self.tag_store.refresh_tags(&*service, &media_paths).await?;
                Ok(ActionOutcome::Done)
            }
            FileAction::CopyTo { dest } => {
                self.service.copy_files(&paths, &dest, true).await?;
                self.global_bus.emit(GlobalEvent::AddFiles {
                    files: targets,
                    loc: dest,
                });
                self.drain_global_events();
                Ok(ActionOutcome::Done)
            }
            FileAction::MoveTo { dest } => {
                self.service.move_files(&paths, &dest, true).await?;
                self.global_bus.emit(GlobalEvent::RemoveFiles {
                    paths,
                    loc: self.current_location(),
                });
                self.global_bus.emit(GlobalEvent::AddFiles {
                    files: targets,
                    loc: dest,
                });
                self.drain_global_events();
                Ok(ActionOutcome::Done)
            }
            FileAction::SendToHostTab { tab } => {
                if self.feeder.is_busy() {
                    return Ok(ActionOutcome::Done);
                }
                self.feeder.progress_start();
                let result = send_to_host_tab(host, &clicked, tab).await;
                self.feeder.progress_done();
                result.map(|_| ActionOutcome::Done)
            }
            FileAction::OpenInNewWindow => Ok(ActionOutcome::Urls(vec![raw_file_url(
                self.conf.api_base(),
                &clicked,
                false,
            )])),
            FileAction::CopyFilePath => Ok(ActionOutcome::Text(clicked.fullpath)),
            FileAction::Download => Ok(ActionOutcome::Urls(
                targets
                    .iter()
                    .map(|f| raw_file_url(self.conf.api_base(), f, true))
                    .collect(),
            )),
        }
    }

    fn drain_global_events(&mut self) {
        for event in self.global_rx.try_drain() {
            self.apply_global_event(event);
        }
    }

    /// Patch the renamed entry in place in the top page.
    fn patch_renamed_entry(&mut self, old_path: &str, new_path: &str) {
        let new_name = vpath::split_path(new_path)
            .last()
            .cloned()
            .unwrap_or_else(|| new_path.to_string());
        if let Some(top) = self.stack.last_mut() {
            if let Some(entry) = top.files.iter_mut().find(|f| f.fullpath == old_path) {
                entry.fullpath = new_path.to_string();
                entry.name = new_name;
            }
        }
    }
}

/// The full image hand-off handshake: stage the image, trigger the host's
/// update button, wait for generation info, then press the tab button.
async fn send_to_host_tab<H: HostChannel>(host: &H, file: &FileNode, tab: HostTab) -> Result<()> {
    host.post(HostMessage::SetActiveImage {
        path: file.fullpath.clone(),
    });
    host.post(HostMessage::ClickHiddenButton {
        btn_ele_id: "hidden_img_update_trigger".into(),
    });
    gen_info_completed(host).await?;
    host.post(HostMessage::ClickHiddenButton {
        btn_ele_id: format!("hidden_tab_{}", tab.as_str()),
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::selection::ClickModifiers;
    use super::super::test_util::*;
    use super::*;
    use crate::host::RecordingHostChannel;

    const CTRL: ClickModifiers = ClickModifiers {
        shift: false,
        ctrl: true,
    };

    fn tag(id: i64, name: &str) -> Tag {
        Tag {
            id,
            name: name.into(),
        }
    }

    #[tokio::test]
    async fn delete_removes_remotely_and_tombstones_locally() {
        let dir = setup_tree();
        let mut pane = mounted_pane(&dir).await;
        let sub = format!("{}/dir_a", norm(dir.path()));
        pane.to(&sub).await.unwrap();
        let host = RecordingHostChannel::new();

        pane.dispatch_action(FileAction::Delete, 0, &host)
            .await
            .unwrap();
        assert!(!dir.path().join("dir_a").join("file1.png").exists());
        // the rendered list updates from the event without a re-list
        assert!(!pane.sorted_files().iter().any(|f| f.name == "file1.png"));
    }

    #[tokio::test]
    async fn delete_of_selected_entry_takes_whole_selection() {
        let dir = setup_tree();
        let mut pane = mounted_pane(&dir).await;
        let sub = format!("{}/dir_a", norm(dir.path()));
        pane.to(&sub).await.unwrap();
        pane.on_item_click(0, CTRL).unwrap();
        pane.on_item_click(1, CTRL).unwrap();
        let host = RecordingHostChannel::new();

        pane.dispatch_action(FileAction::Delete, 0, &host)
            .await
            .unwrap();
        assert!(pane.sorted_files().is_empty());
    }

    #[tokio::test]
    async fn failed_delete_patches_nothing() {
        let dir = setup_tree();
        let mut pane = mounted_pane(&dir).await;
        let sub = format!("{}/dir_a", norm(dir.path()));
        pane.to(&sub).await.unwrap();
        std::fs::remove_file(dir.path().join("dir_a").join("file1.png")).unwrap();
        let host = RecordingHostChannel::new();

        let err = pane
            .dispatch_action(FileAction::Delete, 0, &host)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PathNotFound(_)));
        assert!(pane.deleted_files.is_empty());
    }

    #[tokio::test]
    async fn rename_patches_entry_and_carries_tags() {
        let dir = setup_tree();
        let mut pane = mounted_pane(&dir).await;
        let sub = format!("{}/dir_a", norm(dir.path()));
        pane.to(&sub).await.unwrap();
        let host = RecordingHostChannel::new();

        let old_path = format!("{}/file1.png", sub);
        let service = pane.service.clone();
        crate::fs::tags::MetadataService::toggle_tag(&*service, &tag(1, "keep"), &old_path)
            .await
            .unwrap();
        pane.tag_store
            .fetch_image_tags(&*service, std::slice::from_ref(&old_path))
            .await
            .unwrap();

        let new_path = format!("{}/renamed.png", sub);
        pane.dispatch_action(
            FileAction::Rename {
                new_path: new_path.clone(),
            },
            0,
            &host,
        )
        .await
        .unwrap();

        assert!(dir.path().join("dir_a").join("renamed.png").exists());
        assert!(pane.sorted_files().iter().any(|f| f.name == "renamed.png"));
        assert_eq!(pane.tag_store().tags_of(&new_path).len(), 1);
        assert!(pane.tag_store().tags_of(&old_path).is_empty());
    }

    #[tokio::test]
    async fn toggle_tag_round_trips_through_store() {
        let dir = setup_tree();
        let mut pane = mounted_pane(&dir).await;
        let sub = format!("{}/dir_a", norm(dir.path()));
        pane.to(&sub).await.unwrap();
        let host = RecordingHostChannel::new();

        let outcome = pane
            .dispatch_action(
                FileAction::ToggleTag {
                    tag: tag(7, "favorite"),
                },
                0,
                &host,
            )
            .await
            .unwrap();
        assert_eq!(outcome, ActionOutcome::TagToggled { removed: false });
        let path = format!("{}/file1.png", sub);
        assert_eq!(pane.tag_store().tags_of(&path).len(), 1);

        let outcome = pane
            .dispatch_action(
                FileAction::ToggleTag {
                    tag: tag(7, "favorite"),
                },
                0,
                &host,
            )
            .await
            .unwrap();
        assert_eq!(outcome, ActionOutcome::TagToggled { removed: true });
        assert!(pane.tag_store().tags_of(&path).is_empty());
    }

    #[tokio::test]
    async fn move_to_quick_target_reconciles_both_sides() {
        let dir = setup_tree();
        let mut pane = mounted_pane(&dir).await;
        let sub = format!("{}/dir_a", norm(dir.path()));
        let dest = format!("{}/dir_b", norm(dir.path()));
        pane.to(&sub).await.unwrap();
        let host = RecordingHostChannel::new();

        pane.dispatch_action(FileAction::MoveTo { dest: dest.clone() }, 0, &host)
            .await
            .unwrap();
        assert!(dir.path().join("dir_b").join("file1.png").exists());
        assert!(!pane.sorted_files().iter().any(|f| f.name == "file1.png"));
    }

    #[tokio::test]
    async fn copy_to_quick_target_keeps_source() {
        let dir = setup_tree();
        let mut pane = mounted_pane(&dir).await;
        let sub = format!("{}/dir_a", norm(dir.path()));
        let dest = format!("{}/dir_b", norm(dir.path()));
        pane.to(&sub).await.unwrap();
        let host = RecordingHostChannel::new();

        pane.dispatch_action(FileAction::CopyTo { dest }, 0, &host)
            .await
            .unwrap();
        assert!(dir.path().join("dir_a").join("file1.png").exists());
        assert!(dir.path().join("dir_b").join("file1.png").exists());
    }

    #[tokio::test]
    async fn send_to_host_tab_runs_the_handshake() {
        let dir = setup_tree();
        let mut pane = mounted_pane(&dir).await;
        pane.to(&format!("{}/dir_a", norm(dir.path()))).await.unwrap();
        let host = RecordingHostChannel::new();

        pane.dispatch_action(
            FileAction::SendToHostTab {
                tab: HostTab::Txt2img,
            },
            0,
            &host,
        )
        .await
        .unwrap();

        let posted = host.take_posted();
        assert_eq!(posted.len(), 3);
        assert!(matches!(&posted[0], HostMessage::SetActiveImage { .. }));
        assert!(matches!(
            &posted[2],
            HostMessage::ClickHiddenButton { btn_ele_id } if btn_ele_id == "hidden_tab_txt2img"
        ));
    }

    #[tokio::test]
    async fn url_actions_build_links() {
        let dir = setup_tree();
        let mut pane = mounted_pane(&dir).await;
        pane.to(&format!("{}/dir_a", norm(dir.path()))).await.unwrap();
        let host = RecordingHostChannel::new();

        let outcome = pane
            .dispatch_action(FileAction::OpenInNewWindow, 0, &host)
            .await
            .unwrap();
        let ActionOutcome::Urls(urls) = outcome else {
            panic!("expected urls");
        };
        assert!(urls[0].starts_with("/api/file?path="));

        let outcome = pane
            .dispatch_action(FileAction::Download, 0, &host)
            .await
            .unwrap();
        let ActionOutcome::Urls(urls) = outcome else {
            panic!("expected urls");
        };
        assert!(urls[0].contains("&disposition="));
    }

    #[tokio::test]
    async fn copy_file_path_returns_text() {
        let dir = setup_tree();
        let mut pane = mounted_pane(&dir).await;
        let sub = format!("{}/dir_a", norm(dir.path()));
        pane.to(&sub).await.unwrap();
        let host = RecordingHostChannel::new();

        let outcome = pane
            .dispatch_action(FileAction::CopyFilePath, 0, &host)
            .await
            .unwrap();
        assert_eq!(outcome, ActionOutcome::Text(format!("{}/file1.png", sub)));
    }

    #[test]
    fn thumbnail_url_encodes_path() {
        let file = file_node("a b.png", "/out dir");
        let url = thumbnail_url("/api", &file, "512x512");
        assert!(url.contains("path=%2Fout%20dir%2Fa%20b.png"));
        assert!(url.contains("size=512x512"));
    }
}
