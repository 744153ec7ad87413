//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--config`, `--sort`, etc.)
//! 2. `$MEDIA_BROWSER_CONFIG` environment variable (path to config file)
//! 3. Project-local `.media-browser.toml` in the current working directory
//! 4. Global `~/.config/media-browser/config.toml`
//! 5. Built-in defaults

use std::path::{Path, PathBuf};

use serde::Deserialize;

// ── Section configs ──────────────────────────────────────────────────────────

/// Host/environment settings reported by (or configured for) the backend.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory opened on startup when no path is shared/restored.
    pub home: Option<String>,
    /// Working directory relative paths are resolved against.
    pub working_dir: Option<String>,
    /// Whether the *remote* host is Windows; gates case-insensitive
    /// directory-name comparison.
    pub is_windows: Option<bool>,
    /// Indexed roots; entries under these get tag/cover metadata.
    pub scanned_paths: Option<Vec<String>>,
    /// URL prefix of the backing file API (raw file / thumbnail links).
    pub api_base: Option<String>,
}

/// Browsing/grid settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct BrowseConfig {
    /// Default sort method (kebab-case, e.g. "date-desc").
    pub default_sort: Option<String>,
    /// Grid cell width in pixels.
    pub cell_width: Option<u32>,
    /// Hide non-media files from listings.
    pub only_media_and_dirs: Option<bool>,
    /// Keep the multi-selection across outside clicks / focus loss.
    pub keep_multi_select: Option<bool>,
}

/// Background refresh settings.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RefreshConfig {
    /// Allow the expensive walk-mode expiry check + seamless rebuild.
    pub auto_refresh: Option<bool>,
    /// Poll interval for the lazy refresh loop, in milliseconds.
    pub poll_interval_ms: Option<u64>,
    /// Walk-mode auto refresh only runs while the scroll position is below
    /// this item index.
    pub walk_scroll_ceiling: Option<usize>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub general: GeneralConfig,
    pub browse: BrowseConfig,
    pub refresh: RefreshConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

/// Default grid cell width in pixels.
pub const DEFAULT_CELL_WIDTH: u32 = 160;
/// Default lazy-refresh poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5_000;
/// Default walk-mode refresh scroll ceiling (item index).
pub const DEFAULT_WALK_SCROLL_CEILING: usize = 1_000;

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// Does NOT include the CLI `--config` path — that is handled separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("MEDIA_BROWSER_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".media-browser.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("media-browser").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed (with a warning logged).
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return None,
    };
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            log::warn!("failed to parse config file {}: {}", path.display(), e);
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self` — `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            general: GeneralConfig {
                home: other.general.home.clone().or(self.general.home),
                working_dir: other.general.working_dir.clone().or(self.general.working_dir),
                is_windows: other.general.is_windows.or(self.general.is_windows),
                scanned_paths: other
                    .general
                    .scanned_paths
                    .clone()
                    .or(self.general.scanned_paths),
                api_base: other.general.api_base.clone().or(self.general.api_base),
            },
            browse: BrowseConfig {
                default_sort: other.browse.default_sort.clone().or(self.browse.default_sort),
                cell_width: other.browse.cell_width.or(self.browse.cell_width),
                only_media_and_dirs: other
                    .browse
                    .only_media_and_dirs
                    .or(self.browse.only_media_and_dirs),
                keep_multi_select: other
                    .browse
                    .keep_multi_select
                    .or(self.browse.keep_multi_select),
            },
            refresh: RefreshConfig {
                auto_refresh: other.refresh.auto_refresh.or(self.refresh.auto_refresh),
                poll_interval_ms: other
                    .refresh
                    .poll_interval_ms
                    .or(self.refresh.poll_interval_ms),
                walk_scroll_ceiling: other
                    .refresh
                    .walk_scroll_ceiling
                    .or(self.refresh.walk_scroll_ceiling),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Walk in reverse so that highest-priority (env var) overwrites lower.
        let paths = candidate_paths();
        for path in paths.iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    /// Directory opened when no path is given.
    pub fn home(&self) -> Option<&str> {
        self.general.home.as_deref()
    }

    /// Working directory used to resolve relative navigation targets.
    pub fn working_dir(&self) -> &str {
        self.general.working_dir.as_deref().unwrap_or("/")
    }

    /// Whether the remote host is Windows.
    pub fn is_windows(&self) -> bool {
        self.general.is_windows.unwrap_or(false)
    }

    /// Indexed roots for tag/cover metadata.
    pub fn scanned_paths(&self) -> &[String] {
        self.general.scanned_paths.as_deref().unwrap_or(&[])
    }

    /// URL prefix of the backing file API.
    pub fn api_base(&self) -> &str {
        self.general.api_base.as_deref().unwrap_or("/api")
    }

    /// Default sort method name.
    pub fn default_sort(&self) -> &str {
        self.browse.default_sort.as_deref().unwrap_or("date-desc")
    }

    /// Grid cell width in pixels.
    pub fn cell_width(&self) -> u32 {
        self.browse.cell_width.unwrap_or(DEFAULT_CELL_WIDTH)
    }

    /// Whether non-media files are hidden from listings.
    pub fn only_media_and_dirs(&self) -> bool {
        self.browse.only_media_and_dirs.unwrap_or(false)
    }

    /// Whether multi-selection survives outside clicks / focus loss.
    pub fn keep_multi_select(&self) -> bool {
        self.browse.keep_multi_select.unwrap_or(false)
    }

    /// Whether walk-mode auto refresh is allowed.
    pub fn auto_refresh(&self) -> bool {
        self.refresh.auto_refresh.unwrap_or(false)
    }

    /// Lazy-refresh poll interval in milliseconds.
    pub fn poll_interval_ms(&self) -> u64 {
        self.refresh.poll_interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS)
    }

    /// Walk-mode refresh scroll ceiling.
    pub fn walk_scroll_ceiling(&self) -> usize {
        self.refresh
            .walk_scroll_ceiling
            .unwrap_or(DEFAULT_WALK_SCROLL_CEILING)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_when_empty() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.working_dir(), "/");
        assert!(!cfg.is_windows());
        assert_eq!(cfg.default_sort(), "date-desc");
        assert_eq!(cfg.cell_width(), DEFAULT_CELL_WIDTH);
        assert!(!cfg.auto_refresh());
        assert_eq!(cfg.poll_interval_ms(), DEFAULT_POLL_INTERVAL_MS);
        assert_eq!(cfg.walk_scroll_ceiling(), DEFAULT_WALK_SCROLL_CEILING);
    }

    #[test]
    fn parse_full_toml() {
        let toml_str = r#"
            [general]
            home = "/data/images"
            working_dir = "/sd"
            is_windows = true
            scanned_paths = ["/data/images"]

            [browse]
            default_sort = "name-asc"
            cell_width = 256
            only_media_and_dirs = true
            keep_multi_select = true

            [refresh]
            auto_refresh = true
            poll_interval_ms = 2000
            walk_scroll_ceiling = 500
        "#;
        let cfg: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(cfg.home(), Some("/data/images"));
        assert!(cfg.is_windows());
        assert_eq!(cfg.default_sort(), "name-asc");
        assert_eq!(cfg.cell_width(), 256);
        assert!(cfg.only_media_and_dirs());
        assert!(cfg.keep_multi_select());
        assert!(cfg.auto_refresh());
        assert_eq!(cfg.poll_interval_ms(), 2000);
        assert_eq!(cfg.walk_scroll_ceiling(), 500);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let cfg: AppConfig = toml::from_str("[browse]\ncell_width = 96\n").unwrap();
        assert_eq!(cfg.cell_width(), 96);
        assert_eq!(cfg.default_sort(), "date-desc");
    }

    #[test]
    fn merge_overrides_some_keeps_none() {
        let base: AppConfig = toml::from_str(
            "[general]\nhome = \"/base\"\nis_windows = false\n[browse]\ncell_width = 128\n",
        )
        .unwrap();
        let over: AppConfig = toml::from_str("[general]\nis_windows = true\n").unwrap();
        let merged = base.merge(&over);
        assert_eq!(merged.home(), Some("/base"));
        assert!(merged.is_windows());
        assert_eq!(merged.cell_width(), 128);
    }

    #[test]
    fn load_with_cli_override_wins() {
        let file: AppConfig = toml::from_str("[browse]\ndefault_sort = \"size-asc\"\n").unwrap();
        let merged = AppConfig::default().merge(&file);
        let cli: AppConfig = toml::from_str("[browse]\ndefault_sort = \"name-desc\"\n").unwrap();
        let merged = merged.merge(&cli);
        assert_eq!(merged.default_sort(), "name-desc");
    }
}
