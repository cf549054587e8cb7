//! Conversion pipeline for htmlcmd.
//!
//! This crate ties together fetching, parsing, plugins, and Markdown
//! serialization into the two entry points the CLI (and any embedding
//! service) calls: convert a URL, or convert an HTML string.

pub mod pipeline;

pub use htmlcmd_plugins::{ImageDownloader, Plugin, PluginInfo, PluginManager};
pub use pipeline::{
    Conversion, ConvertRequest, Converter, PSEUDO_BASE_URL, ProgressReporter, SilentProgress,
    convert_html, convert_url, list_plugins, run_plugins,
};
