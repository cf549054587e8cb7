//! Application configuration for htmlcmd.
//!
//! User config lives at `~/.htmlcmd/htmlcmd.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{HtmlcmdError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "htmlcmd.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".htmlcmd";

// ---------------------------------------------------------------------------
// Config structs (matching htmlcmd.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Page fetching.
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// HTML parsing.
    #[serde(default)]
    pub parser: ParserConfig,

    /// Markdown output.
    #[serde(default)]
    pub output: OutputConfig,

    /// Plugin selection and built-in plugin settings.
    #[serde(default)]
    pub plugins: PluginsConfig,
}

/// `[fetcher]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Run without a visible window. Only affects what a developer can watch
    /// while debugging; fetched content is identical either way.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Whole-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum redirects followed before giving up.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// User-Agent override. `None` uses `htmlcmd/<version>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout_secs: default_timeout_secs(),
            max_redirects: default_max_redirects(),
            user_agent: None,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_redirects() -> usize {
    5
}

/// `[parser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Elements whose whole subtree is dropped before classification.
    #[serde(default = "default_skip_tags")]
    pub skip_tags: Vec<String>,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            skip_tags: default_skip_tags(),
        }
    }
}

fn default_skip_tags() -> Vec<String> {
    ["script", "style", "nav", "iframe", "noscript", "svg"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// `[output]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Emit the document title as a leading `#` heading.
    #[serde(default = "default_true")]
    pub include_title: bool,

    /// Prepend a YAML frontmatter block with `source_url` and `title`.
    #[serde(default)]
    pub frontmatter: bool,

    /// Optional template file with `{{title}}`, `{{source_url}}`, `{{content}}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            include_title: true,
            frontmatter: false,
            template: None,
        }
    }
}

/// `[plugins]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Plugins applied by the CLI when `--plugins` is not given.
    #[serde(default)]
    pub default: Vec<String>,

    /// Directory that `image_downloader` writes images into.
    #[serde(default = "default_image_dir")]
    pub image_dir: String,

    /// Per-image download timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            default: Vec::new(),
            image_dir: default_image_dir(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_image_dir() -> String {
    "images".into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.htmlcmd/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| HtmlcmdError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.htmlcmd/htmlcmd.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| HtmlcmdError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| HtmlcmdError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Serialize `config` to TOML at `path`, creating parent directories.
pub fn write_config(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| HtmlcmdError::io(parent, e))?;
    }

    let content =
        toml::to_string_pretty(config).map_err(|e| HtmlcmdError::Serialization(e.to_string()))?;
    std::fs::write(path, content).map_err(|e| HtmlcmdError::io(path, e))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let path = config_file_path()?;
    write_config(&path, &AppConfig::default())?;
    tracing::info!(?path, "created default config file");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("headless"));
        assert!(toml_str.contains("skip_tags"));
        assert!(toml_str.contains("image_dir"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert!(parsed.fetcher.headless);
        assert_eq!(parsed.fetcher.timeout_secs, 30);
        assert_eq!(parsed.plugins.image_dir, "images");
        assert!(parsed.output.include_title);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[fetcher]
headless = false

[plugins]
default = ["image_downloader"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert!(!config.fetcher.headless);
        assert_eq!(config.fetcher.max_redirects, 5);
        assert_eq!(config.plugins.default, vec!["image_downloader"]);
        assert_eq!(config.parser.skip_tags.len(), 6);
        assert!(!config.output.frontmatter);
    }

    #[test]
    fn write_then_load_config() {
        let dir = std::env::temp_dir().join(format!("htmlcmd-config-{}", uuid::Uuid::now_v7()));
        let path = dir.join("nested").join("htmlcmd.toml");

        let mut config = AppConfig::default();
        config.output.frontmatter = true;
        write_config(&path, &config).expect("write");

        let loaded = load_config_from(&path).expect("load");
        assert!(loaded.output.frontmatter);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let dir = std::env::temp_dir().join(format!("htmlcmd-bad-{}", uuid::Uuid::now_v7()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("htmlcmd.toml");
        std::fs::write(&path, "[fetcher\nheadless = ").unwrap();

        let err = load_config_from(&path).unwrap_err();
        assert!(matches!(err, HtmlcmdError::Config { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
