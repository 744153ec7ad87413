use serde::{Deserialize, Serialize};

/// Kind of filesystem entry, matching the backend wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeKind {
    #[serde(rename = "file")]
    File,
    #[serde(rename = "dir")]
    Dir,
}

/// One filesystem entry as reported by the listing endpoint.
///
/// `fullpath` is unique within one listing response; `name` is the last path
/// segment of `fullpath`. `bytes` of -1/0 means "unknown" for directories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileNode {
    pub name: String,
    pub fullpath: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Human-readable size string (e.g. "1.2 MB", "-" when unknown).
    pub size: String,
    pub bytes: i64,
    /// Modification time, `YYYY-MM-DD HH:MM:SS`.
    pub date: String,
    pub created_time: String,
    /// High-precision modification timestamp (nanoseconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime_ns: Option<u64>,
    /// High-precision creation timestamp (nanoseconds).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ctime_ns: Option<u64>,
    /// Whether this entry falls under an indexed root; gates tag/cover
    /// metadata fetches.
    #[serde(default)]
    pub is_under_scanned_path: bool,
}

impl FileNode {
    /// Synthesize a directory node from a bare path (used for walker roots
    /// and pinned-root descents where no listing entry exists yet).
    pub fn dir(fullpath: &str) -> Self {
        Self {
            name: fullpath.to_string(),
            fullpath: fullpath.to_string(),
            kind: NodeKind::Dir,
            size: "-".into(),
            bytes: 0,
            date: String::new(),
            created_time: String::new(),
            mtime_ns: None,
            ctime_ns: None,
            is_under_scanned_path: true,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == NodeKind::Dir
    }
}

const IMAGE_EXTS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];
const VIDEO_EXTS: &[&str] = &["mp4", "avi", "mov", "mkv"];

fn ext_of(filename: &str) -> Option<String> {
    filename.rsplit_once('.').map(|(_, e)| e.to_lowercase())
}

/// Whether a filename has a recognized image extension.
pub fn is_image_file(filename: &str) -> bool {
    ext_of(filename).is_some_and(|e| IMAGE_EXTS.contains(&e.as_str()))
}

/// Whether a filename has a recognized video extension.
pub fn is_video_file(filename: &str) -> bool {
    ext_of(filename).is_some_and(|e| VIDEO_EXTS.contains(&e.as_str()))
}

/// Media = image or video.
pub fn is_media_file(filename: &str) -> bool {
    is_image_file(filename) || is_video_file(filename)
}

/// Keep the first occurrence of every fullpath, preserving order.
pub fn unique_files(files: Vec<FileNode>) -> Vec<FileNode> {
    let mut seen = std::collections::HashSet::new();
    files
        .into_iter()
        .filter(|f| seen.insert(f.fullpath.clone()))
        .collect()
}

/// Human-readable size string for listing responses.
pub fn human_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
