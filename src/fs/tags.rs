//! Tag and directory-cover metadata.
//!
//! Metadata fetches are decoupled from the hot scroll path: the viewport
//! feeder emits viewable-area events and this store batch-fetches tags and
//! covers for the entries in view, caching by fullpath so repeat scrolling
//! is free.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::fs::node::{is_media_file, FileNode};
use crate::fs::service::{FileService, LocalFileService};
use crate::fs::sort::{sort_files, SortMethod};

/// A user-defined tag attached to an image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub id: i64,
    pub name: String,
}

/// How many media entries make up a directory cover.
pub const DIR_COVER_LEN: usize = 4;

/// Tag/cover operations the metadata store depends on.
pub trait MetadataService: Send + Sync {
    fn batch_get_image_tags(
        &self,
        paths: &[String],
    ) -> impl std::future::Future<Output = Result<HashMap<String, Vec<Tag>>>> + Send;

    /// Top media entries per directory, used as grid cover thumbnails.
    fn batch_get_dir_covers(
        &self,
        paths: &[String],
    ) -> impl std::future::Future<Output = Result<HashMap<String, Vec<FileNode>>>> + Send;

    /// Attach or detach `tag`; returns `true` when the tag was removed.
    fn toggle_tag(
        &self,
        tag: &Tag,
        img_path: &str,
    ) -> impl std::future::Future<Output = Result<bool>> + Send;

    fn batch_update_tag(
        &self,
        tag: &Tag,
        img_paths: &[String],
        add: bool,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

impl MetadataService for LocalFileService {
    async fn batch_get_image_tags(&self, paths: &[String]) -> Result<HashMap<String, Vec<Tag>>> {
        let store = self.tags.lock().unwrap_or_else(|e| e.into_inner());
        Ok(paths
            .iter()
            .map(|p| (p.clone(), store.get(p).cloned().unwrap_or_default()))
            .collect())
    }

    async fn batch_get_dir_covers(&self, paths: &[String]) -> Result<HashMap<String, Vec<FileNode>>> {
        let mut map = HashMap::new();
        for path in paths {
            let listing = match self.list_directory(path).await {
                Ok(l) => l,
                Err(_) => continue, // vanished dirs just have no cover
            };
            let media: Vec<FileNode> = sort_files(&listing.files, SortMethod::NameAsc)
                .into_iter()
                .filter(|f| !f.is_dir() && is_media_file(&f.name))
                .take(DIR_COVER_LEN)
                .collect();
            map.insert(path.clone(), media);
        }
        Ok(map)
    }

    async fn toggle_tag(&self, tag: &Tag, img_path: &str) -> Result<bool> {
        let mut store = self.tags.lock().unwrap_or_else(|e| e.into_inner());
        let tags = store.entry(img_path.to_string()).or_default();
        if let Some(pos) = tags.iter().position(|t| t.id == tag.id) {
            tags.remove(pos);
            Ok(true)
        } else {
            tags.push(tag.clone());
            Ok(false)
        }
    }

    async fn batch_update_tag(&self, tag: &Tag, img_paths: &[String], add: bool) -> Result<()> {
        let mut store = self.tags.lock().unwrap_or_else(|e| e.into_inner());
        for path in img_paths {
            let tags = store.entry(path.clone()).or_default();
            let pos = tags.iter().position(|t| t.id == tag.id);
            match (add, pos) {
                (true, None) => tags.push(tag.clone()),
                (false, Some(i)) => {
                    tags.remove(i);
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Pane-local metadata cache.
#[derive(Debug, Default)]
pub struct TagStore {
    tag_map: HashMap<String, Vec<Tag>>,
    cover_map: HashMap<String, Vec<FileNode>>,
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch tags for the given paths, skipping ones already cached.
    pub async fn fetch_image_tags<M: MetadataService>(
        &mut self,
        svc: &M,
        paths: &[String],
    ) -> Result<()> {
        let missing: Vec<String> = paths
            .iter()
            .filter(|p| !self.tag_map.contains_key(*p))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        let fetched = svc.batch_get_image_tags(&missing).await?;
        self.tag_map.extend(fetched);
        Ok(())
    }

    /// Force re-fetch, replacing whatever is cached.
    pub async fn refresh_tags<M: MetadataService>(
        &mut self,
        svc: &M,
        paths: &[String],
    ) -> Result<()> {
        let fetched = svc.batch_get_image_tags(paths).await?;
        self.tag_map.extend(fetched);
        Ok(())
    }

    /// Fetch covers for directories not yet cached.
    pub async fn fetch_dir_covers<M: MetadataService>(
        &mut self,
        svc: &M,
        paths: &[String],
    ) -> Result<()> {
        let missing: Vec<String> = paths
            .iter()
            .filter(|p| !self.cover_map.contains_key(*p))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        let fetched = svc.batch_get_dir_covers(&missing).await?;
        self.cover_map.extend(fetched);
        Ok(())
    }

    pub fn tags_of(&self, path: &str) -> &[Tag] {
        self.tag_map.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn cover_of(&self, path: &str) -> Option<&[FileNode]> {
        self.cover_map.get(path).map(Vec::as_slice)
    }

    /// Carry cached tags across a rename.
    pub fn rename_path(&mut self, old: &str, new: &str) {
        let tags = self.tag_map.remove(old).unwrap_or_default();
        self.tag_map.insert(new.to_string(), tags);
    }
}
