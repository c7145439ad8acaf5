use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "scanshelf.yaml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Asset tree root: one directory per document plus `cache/`.
    pub root_dir: PathBuf,
    pub catalog_path: PathBuf,
    /// Render pool size, `0` for one worker per core.
    pub render_workers: usize,
    pub preview_width: u32,
    pub thumbnail_edge: u32,
    pub final_quality: u8,
    pub cache_quota_bytes: u64,
    pub default_dpi: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            root_dir: PathBuf::from("scanshelf-data"),
            catalog_path: PathBuf::from("catalog.sqlite3"),
            render_workers: 0,
            preview_width: 1080,
            thumbnail_edge: 256,
            final_quality: 90,
            cache_quota_bytes: 64 * 1024 * 1024,
            default_dpi: 300,
        }
    }
}

impl AppConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, String> {
        let config: Self = serde_yml::from_str(yaml)
            .map_err(|error| format!("failed to parse settings YAML: {error}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|error| format!("failed to read {}: {error}", path.display()))?;
        Self::from_yaml(&content)
    }

    /// `SCANSHELF_CONFIG` (or `scanshelf.yaml` when present), then the
    /// `SCANSHELF_ROOT` / `SCANSHELF_CATALOG` overrides.
    pub fn load() -> Result<Self, String> {
        Self::load_with(|key| std::env::var(key).ok())
    }

    fn load_with(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let mut config = match lookup("SCANSHELF_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_overrides(lookup);
        Ok(config)
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(root) = lookup("SCANSHELF_ROOT").filter(|value| !value.is_empty()) {
            self.root_dir = PathBuf::from(root);
        }
        if let Some(catalog) = lookup("SCANSHELF_CATALOG").filter(|value| !value.is_empty()) {
            self.catalog_path = PathBuf::from(catalog);
        }
    }

    fn validate(&self) -> Result<(), String> {
        if self.final_quality > 100 {
            return Err(format!(
                "final_quality must be within 0..=100, got {}",
                self.final_quality
            ));
        }
        if self.preview_width == 0 || self.thumbnail_edge == 0 {
            return Err("preview_width and thumbnail_edge must be positive".to_string());
        }
        if self.default_dpi == 0 {
            return Err("default_dpi must be positive".to_string());
        }
        Ok(())
    }
}
