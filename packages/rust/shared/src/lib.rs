//! Shared types, error model, and configuration for htmlcmd.
//!
//! This crate is the foundation depended on by all other htmlcmd crates.
//! It provides:
//! - [`HtmlcmdError`] — the unified error type
//! - The content model ([`ContentModel`], [`ContentBlock`], [`ListItem`])
//! - Configuration ([`AppConfig`] and its sections, config loading)
//! - Markdown escaping for literal text ([`escape_inline`], [`escape_line_start`])

pub mod config;
pub mod error;
pub mod escape;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, FetcherConfig, OutputConfig, ParserConfig, PluginsConfig, config_dir,
    config_file_path, init_config, load_config, load_config_from, write_config,
};
pub use error::{HtmlcmdError, Result};
pub use escape::{escape_inline, escape_line_start, unescape};
pub use types::{ContentBlock, ContentModel, ListItem};
