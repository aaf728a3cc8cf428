use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EtConfig {
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default)]
    pub review: ReviewConfig,
    #[serde(default)]
    pub git: GitConfig,
}

/// [watch] section configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Quiet period after the last change notification before diffing
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Glob patterns watched when `et watch` is given no paths
    #[serde(default)]
    pub paths: Vec<String>,
}

/// Whether the document already shows the external change
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReviewMode {
    /// The change is already in the document; rejecting reverts it.
    #[default]
    Live,
    /// The document still shows the baseline; accepting applies the change.
    Preview,
}

/// What a diff pass compares the current content against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum BaselineSource {
    /// The in-memory snapshot taken at watch start / write / resolution
    #[default]
    Snapshot,
    /// Content staged in the git index
    Index,
    /// Content at HEAD
    Head,
}

/// [review] section configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewConfig {
    #[serde(default)]
    pub mode: ReviewMode,
    #[serde(default)]
    pub baseline: BaselineSource,
    /// Context lines around each hunk for display ranges
    #[serde(default = "default_context")]
    pub context: usize,
    /// Undo history depth per document
    #[serde(default = "default_max_undo")]
    pub max_undo: usize,
}

/// [git] section configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitConfig {
    /// Classify changes and allow index/HEAD baselines
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// How long index/HEAD content is reused before asking git again
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_debounce_ms() -> u64 {
    150
}

fn default_context() -> usize {
    3
}

fn default_max_undo() -> usize {
    100
}

fn default_cache_ttl_ms() -> u64 {
    2000
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            paths: Vec::new(),
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            mode: ReviewMode::default(),
            baseline: BaselineSource::default(),
            context: default_context(),
            max_undo: default_max_undo(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_ttl_ms: default_cache_ttl_ms(),
        }
    }
}

impl WatchConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl GitConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }
}

/// `~/.config/et/config.toml`, if the platform has a config dir.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("et").join("config.toml"))
}

pub fn local_config_path(repo_root: &Path) -> PathBuf {
    repo_root.join(".et-config.toml")
}

/// Load config by merging global defaults with per-repo overrides.
/// Priority: per-repo `.et-config.toml` > global `~/.config/et/config.toml` > built-in defaults.
/// Merging is deep: individual fields within sections (e.g. `[review]`) override independently.
pub fn load_config(repo_root: &Path) -> EtConfig {
    let local_path = local_config_path(repo_root);
    let global_path = global_config_path();

    let global_table = global_path
        .and_then(|p| std::fs::read_to_string(p).ok())
        .and_then(|c| parse_table(&c));
    let local_table = std::fs::read_to_string(&local_path)
        .ok()
        .and_then(|c| parse_table(&c));

    merge_tables(global_table, local_table)
}

fn parse_table(content: &str) -> Option<toml::map::Map<String, toml::Value>> {
    match content.parse::<toml::Value>() {
        Ok(toml::Value::Table(t)) => Some(t),
        Ok(_) => None,
        Err(e) => {
            log::warn!("Ignoring malformed config: {}", e);
            None
        }
    }
}

fn merge_tables(
    global: Option<toml::map::Map<String, toml::Value>>,
    local: Option<toml::map::Map<String, toml::Value>>,
) -> EtConfig {
    let merged = match (global, local) {
        (Some(mut global), Some(local)) => {
            deep_merge(&mut global, local);
            toml::Value::Table(global)
        }
        (Some(global), None) => toml::Value::Table(global),
        (None, Some(local)) => toml::Value::Table(local),
        (None, None) => return EtConfig::default(),
    };

    merged.try_into().unwrap_or_else(|e| {
        log::warn!("Invalid config values, using defaults: {}", e);
        EtConfig::default()
    })
}

/// Recursively merge `overlay` into `base`. Overlay values win; nested tables are merged recursively.
fn deep_merge(
    base: &mut toml::map::Map<String, toml::Value>,
    overlay: toml::map::Map<String, toml::Value>,
) {
    for (key, value) in overlay {
        match (base.get_mut(&key), &value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(overlay_table)) => {
                deep_merge(base_table, overlay_table.clone());
            }
            _ => {
                base.insert(key, value);
            }
        }
    }
}

/// Save config to the global config dir (~/.config/et/config.toml).
pub fn save_config(config: &EtConfig) -> Result<PathBuf> {
    let path = global_config_path()
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    save_config_to(&path, config)?;
    Ok(path)
}

/// Write `config` as TOML to `path`, creating parent directories.
pub fn save_config_to(path: &Path, config: &EtConfig) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_files() {
        let config = merge_tables(None, None);
        assert_eq!(config, EtConfig::default());
        assert_eq!(config.watch.debounce_ms, 150);
        assert_eq!(config.review.mode, ReviewMode::Live);
        assert_eq!(config.review.baseline, BaselineSource::Snapshot);
        assert!(config.git.enabled);
    }

    #[test]
    fn local_overrides_single_fields() {
        let global = parse_table(
            "[review]\nmode = \"preview\"\ncontext = 5\n[watch]\ndebounce_ms = 300\n",
        );
        let local = parse_table("[review]\ncontext = 1\n");
        let config = merge_tables(global, local);

        assert_eq!(config.review.mode, ReviewMode::Preview);
        assert_eq!(config.review.context, 1);
        assert_eq!(config.watch.debounce_ms, 300);
        assert_eq!(config.review.max_undo, 100);
    }

    #[test]
    fn malformed_file_is_ignored() {
        assert!(parse_table("[review\nmode =").is_none());
        let config = merge_tables(None, parse_table("not toml at all ==="));
        assert_eq!(config, EtConfig::default());
    }

    #[test]
    fn invalid_values_fall_back_to_defaults() {
        let config = merge_tables(None, parse_table("[review]\nmode = \"sideways\"\n"));
        assert_eq!(config.review.mode, ReviewMode::Live);
    }

    #[test]
    fn load_reads_repo_local_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".et-config.toml"),
            "[git]\nenabled = false\ncache_ttl_ms = 10\n",
        )
        .unwrap();
        let config = load_config(dir.path());
        assert!(!config.git.enabled);
        assert_eq!(config.git.cache_ttl(), Duration::from_millis(10));
    }

    #[test]
    fn round_trips_through_toml() {
        let config = EtConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: EtConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn saved_config_loads_back_as_local_override() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EtConfig::default();
        config.review.mode = ReviewMode::Preview;
        config.watch.paths = vec!["src/*.rs".to_string()];

        save_config_to(&local_config_path(dir.path()), &config).unwrap();
        assert_eq!(load_config(dir.path()).review.mode, ReviewMode::Preview);
        assert_eq!(load_config(dir.path()).watch.paths, config.watch.paths);
    }

    #[test]
    fn save_creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/et/config.toml");
        save_config_to(&path, &EtConfig::default()).unwrap();
        assert!(path.is_file());
    }
}
