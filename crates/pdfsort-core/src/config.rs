use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PdfSortError, Result};
use crate::template::{CaseStyle, RenderOptions};

/// Root configuration, loaded from `~/.config/pdfsort/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PdfSortConfig {
    pub naming: NamingConfig,
    pub layout: LayoutConfig,
    pub scan: ScanConfig,
    /// Journal name → abbreviation, used by the `{Jabbr}` tag.
    pub abbreviations: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NamingConfig {
    pub format: String,
    pub case: CaseStyle,
    pub max_length_authors: usize,
    pub max_length_filename: usize,
    pub max_words_title: usize,
    /// Substituted for tags the record has no data for.
    pub missing_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub todo_dir: String,
    pub output_dir: String,
    pub originals_dir: String,
    pub keep_originals: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub check_subfolders: bool,
    /// Pages read from the start of each PDF when looking for identifiers.
    pub max_pages: usize,
}

// ─── Defaults ──────────────────────────────────────────────

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            format: "{YYYY} - {Jabbr} - {A3etal} - {T}".to_string(),
            case: CaseStyle::None,
            max_length_authors: 80,
            max_length_filename: 250,
            max_words_title: 20,
            missing_token: "NA".to_string(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            todo_dir: "todo".to_string(),
            output_dir: "out".to_string(),
            originals_dir: "orig".to_string(),
            keep_originals: false,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            check_subfolders: false,
            max_pages: 2,
        }
    }
}

impl NamingConfig {
    /// Zero limits would reduce every name to the missing token.
    pub fn validate(&self) -> Result<()> {
        let limits = [
            ("max_length_authors", self.max_length_authors),
            ("max_length_filename", self.max_length_filename),
            ("max_words_title", self.max_words_title),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(PdfSortError::ConfigError(format!("{name} must be greater than 0")));
            }
        }
        Ok(())
    }
}

impl LayoutConfig {
    /// Folder names the scanner must never descend into.
    pub fn reserved_dirs(&self) -> [&str; 3] {
        [self.todo_dir.as_str(), self.output_dir.as_str(), self.originals_dir.as_str()]
    }

    pub fn validate(&self) -> Result<()> {
        for name in self.reserved_dirs() {
            if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
                return Err(PdfSortError::ConfigError(format!(
                    "layout folder names must be plain names, got {name:?}"
                )));
            }
        }
        Ok(())
    }
}

// ─── Load / Save ───────────────────────────────────────────

impl PdfSortConfig {
    /// Standard config file path: `~/.config/pdfsort/config.toml`
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("PDFSORT_CONFIG") {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("pdfsort")
            .join("config.toml")
    }

    /// Load config from disk, falling back to defaults if file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.naming.validate()?;
        self.layout.validate()?;
        if self.scan.max_pages == 0 {
            return Err(PdfSortError::ConfigError("max_pages must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let toml_str = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_str)?;
        Ok(())
    }

    pub fn render_options(&self) -> RenderOptions<'_> {
        RenderOptions {
            naming: &self.naming,
            abbreviations: &self.abbreviations,
        }
    }

    /// Merge `FULL NAME = ABBREVIATION` lines into the abbreviation table.
    /// Blank lines and lines starting with `#` are ignored. Returns the
    /// number of entries added or replaced.
    pub fn merge_abbreviations(&mut self, contents: &str) -> usize {
        let mut merged = 0;
        for (line_no, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            match line.split_once('=') {
                Some((full, abbr)) if !full.trim().is_empty() && !abbr.trim().is_empty() => {
                    self.abbreviations
                        .insert(full.trim().to_string(), abbr.trim().to_string());
                    merged += 1;
                }
                _ => warn!("ignoring abbreviation line {}: {line:?}", line_no + 1),
            }
        }
        merged
    }
}
