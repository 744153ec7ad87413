use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, Local};
use log::warn;

use crate::error::{AppError, Result};
use crate::fs::node::{human_size, FileNode, NodeKind};
use crate::fs::path as vpath;

/// One directory's listing response.
#[derive(Debug, Clone)]
pub struct Listing {
    pub files: Vec<FileNode>,
}

/// Remote file operations the browsing core depends on.
///
/// The production backend is an HTTP service; [`LocalFileService`] is the
/// reference collaborator used by the CLI and the test suite. "Path not
/// found" must surface as [`AppError::PathNotFound`], distinct from
/// transient I/O errors.
pub trait FileService: Send + Sync {
    fn list_directory(&self, path: &str) -> impl std::future::Future<Output = Result<Listing>> + Send;

    /// Metadata for many paths at once; missing keys mean "no longer exists".
    fn batch_get_files_info(
        &self,
        paths: &[String],
    ) -> impl std::future::Future<Output = Result<HashMap<String, FileNode>>> + Send;

    fn delete_files(&self, paths: &[String]) -> impl std::future::Future<Output = Result<()>> + Send;

    /// `continue_on_error` selects best-effort semantics (partial success);
    /// without it the first failure aborts the whole operation.
    fn move_files(
        &self,
        paths: &[String],
        dest: &str,
        continue_on_error: bool,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn copy_files(
        &self,
        paths: &[String],
        dest: &str,
        continue_on_error: bool,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    fn mkdirs(&self, dest: &str) -> impl std::future::Future<Output = Result<()>> + Send;

    fn rename_file(
        &self,
        path: &str,
        new_path: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

/// File service backed by the local filesystem.
///
/// Paths cross this boundary as normalized slash-separated strings, the same
/// shape the remote backend reports.
#[derive(Debug, Default)]
pub struct LocalFileService {
    /// Indexed roots; entries under one of these are flagged
    /// `is_under_scanned_path`. Empty means everything is flagged.
    scanned_roots: Vec<String>,
    /// In-memory tag assignments, keyed by fullpath. The production backend
    /// keeps these in its database.
    pub(crate) tags: std::sync::Mutex<HashMap<String, Vec<crate::fs::tags::Tag>>>,
}

impl LocalFileService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scanned_roots(roots: Vec<String>) -> Self {
        Self {
            scanned_roots: roots.into_iter().map(|r| vpath::normalize(&r)).collect(),
            ..Self::default()
        }
    }

    fn is_scanned(&self, fullpath: &str) -> bool {
        if self.scanned_roots.is_empty() {
            return true;
        }
        self.scanned_roots.iter().any(|r| fullpath.starts_with(r.as_str()))
    }

    fn node_from_path(&self, path: &Path) -> Result<FileNode> {
        let metadata = fs::symlink_metadata(path)?;
        let fullpath = vpath::normalize(&path.to_string_lossy());
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| fullpath.clone());

        let kind = if metadata.is_dir() {
            NodeKind::Dir
        } else {
            NodeKind::File
        };
        let (size, bytes) = if metadata.is_dir() {
            ("-".to_string(), -1)
        } else {
            (human_size(metadata.len()), metadata.len() as i64)
        };

        let fmt = |t: SystemTime| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M:%S").to_string();
        let ns = |t: SystemTime| {
            t.duration_since(SystemTime::UNIX_EPOCH)
                .ok()
                .map(|d| d.as_nanos() as u64)
        };
        let modified = metadata.modified().ok();
        let created = metadata.created().ok();

        Ok(FileNode {
            name,
            is_under_scanned_path: self.is_scanned(&fullpath),
            fullpath,
            kind,
            size,
            bytes,
            date: modified.map(fmt).unwrap_or_default(),
            created_time: created.map(fmt).unwrap_or_default(),
            mtime_ns: modified.and_then(ns),
            ctime_ns: created.and_then(ns),
        })
    }

    fn transfer_one(src: &str, dest_dir: &Path, remove_source: bool) -> Result<()> {
        let src_path = PathBuf::from(src);
        let name = src_path
            .file_name()
            .ok_or_else(|| AppError::InvalidPath(src.to_string()))?;
        let dest = dest_dir.join(name);
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dest)?;
            if remove_source {
                fs::remove_dir_all(&src_path)?;
            }
        } else {
            fs::copy(&src_path, &dest)?;
            if remove_source {
                fs::remove_file(&src_path)?;
            }
        }
        Ok(())
    }

    fn transfer_many(
        paths: &[String],
        dest: &str,
        continue_on_error: bool,
        remove_source: bool,
    ) -> Result<()> {
        let dest_dir = PathBuf::from(dest);
        if !dest_dir.is_dir() {
            return Err(AppError::PathNotFound(dest.to_string()));
        }
        let mut errors = Vec::new();
        for src in paths {
            if remove_source && vpath::normalize(src) == vpath::normalize(dest) {
                // moving a directory into itself
                return Err(AppError::Transfer(format!("{} is the destination", src)));
            }
            match Self::transfer_one(src, &dest_dir, remove_source) {
                Ok(()) => {}
                Err(e) if continue_on_error => {
                    warn!("transfer of {} failed: {}", src, e);
                    errors.push(format!("{}: {}", src, e));
                }
                Err(e) => return Err(e),
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::Transfer(errors.join("; ")))
        }
    }
}

impl FileService for LocalFileService {
    async fn list_directory(&self, path: &str) -> Result<Listing> {
        let dir = PathBuf::from(path);
        if !dir.exists() {
            return Err(AppError::PathNotFound(path.to_string()));
        }
        let mut files = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = match entry {
                Ok(e) => e,
                Err(_) => continue,
            };
            match self.node_from_path(&entry.path()) {
                Ok(node) => files.push(node),
                Err(_) => continue,
            }
        }
        Ok(Listing { files })
    }

    async fn batch_get_files_info(&self, paths: &[String]) -> Result<HashMap<String, FileNode>> {
        let mut map = HashMap::new();
        for p in paths {
            let path = PathBuf::from(p);
            if !path.exists() {
                continue; // missing key = no longer exists
            }
            map.insert(p.clone(), self.node_from_path(&path)?);
        }
        Ok(map)
    }

    async fn delete_files(&self, paths: &[String]) -> Result<()> {
        for p in paths {
            let path = PathBuf::from(p);
            if !path.exists() {
                return Err(AppError::PathNotFound(p.clone()));
            }
            if path.is_dir() {
                fs::remove_dir_all(&path)?;
            } else {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    async fn move_files(&self, paths: &[String], dest: &str, continue_on_error: bool) -> Result<()> {
        Self::transfer_many(paths, dest, continue_on_error, true)
    }

    async fn copy_files(&self, paths: &[String], dest: &str, continue_on_error: bool) -> Result<()> {
        Self::transfer_many(paths, dest, continue_on_error, false)
    }

    async fn mkdirs(&self, dest: &str) -> Result<()> {
        fs::create_dir_all(dest)?;
        Ok(())
    }

    async fn rename_file(&self, path: &str, new_path: &str) -> Result<()> {
        let from = PathBuf::from(path);
        if !from.exists() {
            return Err(AppError::PathNotFound(path.to_string()));
        }
        fs::rename(&from, new_path)?;
        Ok(())
    }
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dest_path = dest.join(entry.file_name());
        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dest_path)?;
        } else {
            fs::copy(&src_path, &dest_path)?;
        }
    }
    Ok(())
}
