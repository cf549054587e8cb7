//! Built-in `image_downloader` plugin.
//!
//! Downloads every remote image in a model into a local directory and points
//! the model at the saved files. That covers image blocks and the inline
//! `![alt](src)` markup left in headings, table cells, and text. Files are
//! named by the SHA-256 of their bytes, so repeated runs reuse what is
//! already on disk.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::{Captures, Regex};
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument, warn};
use url::Url;
use uuid::Uuid;

use htmlcmd_shared::{
    ContentBlock, ContentModel, HtmlcmdError, PluginsConfig, Result, escape_inline,
};

use crate::Plugin;

const NAME: &str = "image_downloader";
const DESCRIPTION: &str = "Download images to a local directory and link them from the Markdown";
const USER_AGENT: &str = concat!("htmlcmd/", env!("CARGO_PKG_VERSION"));

/// Inline image markup as the parser emits it: `![alt](absolute-url)`.
static INLINE_IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

/// Downloads images referenced by a model to `output_dir`.
///
/// Saved paths are written into the model as `output_dir/<file>`. When the
/// Markdown is stored somewhere other than the working directory, set that
/// location with [`ImageDownloader::relative_to`]: files then land in
/// `root/output_dir` while the model keeps the root-relative path.
pub struct ImageDownloader {
    client: Client,
    output_dir: PathBuf,
    root: Option<PathBuf>,
}

impl ImageDownloader {
    /// Registry key of this plugin.
    pub const NAME: &'static str = NAME;

    /// Build from the `[plugins]` config section.
    pub fn new(config: &PluginsConfig) -> Result<Self> {
        Self::with_output_dir(&config.image_dir, Duration::from_secs(config.timeout_secs))
    }

    /// Build with an explicit output directory and per-image timeout.
    pub fn with_output_dir(output_dir: impl Into<PathBuf>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| HtmlcmdError::plugin(NAME, format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            output_dir: output_dir.into(),
            root: None,
        })
    }

    /// Resolve the output directory against `root`, the directory the
    /// Markdown file is written to. An absolute output directory ignores it.
    pub fn relative_to(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Where files are written on disk.
    fn storage_dir(&self) -> PathBuf {
        match &self.root {
            Some(root) => root.join(&self.output_dir),
            None => self.output_dir.clone(),
        }
    }

    /// Download `src` into `dir` under its content hash. Returns the file name.
    async fn download(&self, src: &str, dir: &Path) -> Result<String> {
        let response = self
            .client
            .get(src)
            .send()
            .await
            .map_err(|e| HtmlcmdError::plugin(NAME, format!("{src}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(HtmlcmdError::plugin(NAME, format!("{src}: HTTP {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| HtmlcmdError::plugin(NAME, format!("{src}: body read failed: {e}")))?;

        let hash = format!("{:x}", Sha256::digest(&bytes));
        let ext = extension_for(src, content_type.as_deref());
        let file_name = format!("{hash}.{ext}");
        let target = dir.join(&file_name);

        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            debug!(path = %target.display(), "image already cached");
            return Ok(file_name);
        }

        // Unique temp name per writer; concurrent writers of the same image
        // race only on the final rename.
        let temp = dir.join(format!(".{hash}.{}.tmp", Uuid::now_v7()));
        tokio::fs::write(&temp, &bytes)
            .await
            .map_err(|e| HtmlcmdError::io(&temp, e))?;
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            let _ = tokio::fs::remove_file(&temp).await;
            return Err(HtmlcmdError::io(&target, e));
        }

        debug!(path = %target.display(), size = bytes.len(), "image saved");
        Ok(file_name)
    }
}

#[async_trait::async_trait]
impl Plugin for ImageDownloader {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        DESCRIPTION
    }

    #[instrument(skip_all, fields(url = %model.source_url, dir = %self.storage_dir().display()))]
    async fn process_content(&self, mut model: ContentModel) -> Result<ContentModel> {
        let mut sources: Vec<String> = Vec::new();
        let mut add_source = |src: &str| {
            if is_remote(src) && !sources.iter().any(|s| s == src) {
                sources.push(src.to_string());
            }
        };
        model.visit_blocks(&mut |block| {
            if let ContentBlock::Image {
                src,
                local_path: None,
                ..
            } = block
            {
                add_source(src);
            }
            for text in inline_texts(block) {
                for caps in INLINE_IMAGE_RE.captures_iter(text) {
                    add_source(&caps[2]);
                }
            }
        });

        if sources.is_empty() {
            return Ok(model);
        }

        let dir = self.storage_dir();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| HtmlcmdError::io(&dir, e))?;

        // src -> path written into the model, or None when the download failed.
        let mut outcomes: HashMap<String, Option<String>> = HashMap::with_capacity(sources.len());
        for src in sources {
            let outcome = match self.download(&src, &dir).await {
                Ok(file_name) => {
                    let linked = self.output_dir.join(file_name);
                    Some(linked.to_string_lossy().into_owned())
                }
                Err(e) => {
                    warn!(%src, error = %e, "image download failed");
                    None
                }
            };
            outcomes.insert(src, outcome);
        }

        model.visit_blocks_mut(&mut |block| {
            for text in inline_texts_mut(block) {
                localize_inline(text, &outcomes);
            }

            let replacement = match block {
                ContentBlock::Image {
                    src,
                    alt,
                    local_path,
                } => match outcomes.get(src.as_str()) {
                    Some(Some(path)) => {
                        *local_path = Some(path.clone());
                        None
                    }
                    Some(None) => Some(ContentBlock::text(fallback_text(alt, src))),
                    None => None,
                },
                _ => None,
            };
            if let Some(replacement) = replacement {
                *block = replacement;
            }
        });

        let saved = outcomes.values().filter(|o| o.is_some()).count();
        info!(
            saved,
            failed = outcomes.len() - saved,
            "images processed"
        );

        Ok(model)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Text fields of `block` that may hold inline image markup.
fn inline_texts(block: &ContentBlock) -> Vec<&String> {
    match block {
        ContentBlock::Text { text }
        | ContentBlock::Heading { text, .. }
        | ContentBlock::Link { text, .. } => vec![text],
        ContentBlock::Table { rows } => rows.iter().flatten().collect(),
        ContentBlock::List { items, .. } => items.iter().map(|item| &item.text).collect(),
        _ => Vec::new(),
    }
}

fn inline_texts_mut(block: &mut ContentBlock) -> Vec<&mut String> {
    match block {
        ContentBlock::Text { text }
        | ContentBlock::Heading { text, .. }
        | ContentBlock::Link { text, .. } => vec![text],
        ContentBlock::Table { rows } => rows.iter_mut().flatten().collect(),
        ContentBlock::List { items, .. } => items.iter_mut().map(|item| &mut item.text).collect(),
        _ => Vec::new(),
    }
}

/// Point inline image markup in `text` at downloaded files. Failed downloads
/// degrade to their alt text.
fn localize_inline(text: &mut String, outcomes: &HashMap<String, Option<String>>) {
    if !text.contains("![") {
        return;
    }
    let replaced = INLINE_IMAGE_RE
        .replace_all(text, |caps: &Captures<'_>| match outcomes.get(&caps[2]) {
            Some(Some(path)) => format!("![{}]({})", &caps[1], link_target(path)),
            Some(None) => fallback_text(&caps[1], &caps[2]),
            None => caps[0].to_string(),
        })
        .into_owned();
    *text = replaced;
}

/// Text standing in for an image that could not be downloaded.
fn fallback_text(alt: &str, src: &str) -> String {
    if alt.trim().is_empty() {
        escape_inline(src)
    } else {
        escape_inline(alt)
    }
}

/// Angle-bracket a local path that would otherwise end the destination early.
fn link_target(path: &str) -> String {
    if path.contains([' ', '(', ')']) {
        format!("<{path}>")
    } else {
        path.to_string()
    }
}

/// Only http(s) sources are fetched; `data:` URIs and the like stay inline.
fn is_remote(src: &str) -> bool {
    Url::parse(src).is_ok_and(|u| matches!(u.scheme(), "http" | "https"))
}

/// File extension from the URL path, else the content type, else `bin`.
fn extension_for(src: &str, content_type: Option<&str>) -> String {
    extension_from_url(src)
        .or_else(|| content_type.and_then(extension_from_content_type))
        .unwrap_or_else(|| "bin".to_string())
}

fn extension_from_url(src: &str) -> Option<String> {
    let url = Url::parse(src).ok()?;
    let last = url.path_segments()?.next_back()?;
    let (stem, ext) = last.rsplit_once('.')?;
    let ext = ext.to_ascii_lowercase();

    let plausible = !stem.is_empty()
        && (1..=5).contains(&ext.len())
        && ext.chars().all(|c| c.is_ascii_alphanumeric());
    plausible.then_some(ext)
}

fn extension_from_content_type(content_type: &str) -> Option<String> {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let ext = match mime.as_str() {
        "image/png" => "png",
        "image/jpeg" | "image/jpg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "image/avif" => "avif",
        "image/bmp" => "bmp",
        "image/x-icon" | "image/vnd.microsoft.icon" => "ico",
        "image/tiff" => "tiff",
        _ => return None,
    };
    Some(ext.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
