//! End-to-end conversion pipeline: source → parse → plugins → Markdown.

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument, warn};
use url::Url;

use htmlcmd_fetcher::{FetchSession, PageFetcher};
use htmlcmd_markdown::{ConvertOptions, MarkdownConverter, render_template};
use htmlcmd_parser::ContentParser;
use htmlcmd_plugins::{ImageDownloader, PluginInfo, PluginManager};
use htmlcmd_shared::{AppConfig, ContentModel, Result};

/// Base URL that inline HTML is resolved against.
pub const PSEUDO_BASE_URL: &str = "https://html2md.local/content";

static PSEUDO_BASE: LazyLock<Url> =
    LazyLock::new(|| Url::parse(PSEUDO_BASE_URL).expect("valid pseudo base URL"));

// ---------------------------------------------------------------------------
// Request / result types
// ---------------------------------------------------------------------------

/// Per-request options.
#[derive(Debug, Clone, Default)]
pub struct ConvertRequest {
    /// Plugins to apply, in order.
    pub plugins: Vec<String>,
    /// Output template text with `{{title}}`, `{{source_url}}`, `{{content}}`.
    pub template: Option<String>,
}

impl ConvertRequest {
    /// A request that runs only `image_downloader` when `include_images` is set.
    pub fn images(include_images: bool) -> Self {
        let plugins = if include_images {
            vec![ImageDownloader::NAME.to_string()]
        } else {
            Vec::new()
        };
        Self {
            plugins,
            template: None,
        }
    }
}

/// Result of one conversion.
#[derive(Debug, Clone)]
pub struct Conversion {
    /// Final Markdown text.
    pub markdown: String,
    /// Content model after plugins ran.
    pub model: ContentModel,
    /// Total elapsed time.
    pub elapsed: Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when the conversion completes.
    fn done(&self, result: &Conversion);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn done(&self, _result: &Conversion) {}
}

// ---------------------------------------------------------------------------
// Plugin pipeline
// ---------------------------------------------------------------------------

/// Apply the named plugins to `model`, strictly in order.
///
/// Unknown names are skipped. When a plugin fails, the model from before that
/// plugin carries on to the next one.
#[instrument(skip_all, fields(plugins = ?names))]
pub async fn run_plugins(
    model: ContentModel,
    names: &[String],
    manager: &PluginManager,
) -> ContentModel {
    let mut model = model;

    for name in names {
        let Some(plugin) = manager.get_plugin(name) else {
            warn!(plugin = %name, "unknown plugin, skipping");
            continue;
        };

        match plugin.process_content(model.clone()).await {
            Ok(processed) => {
                debug!(plugin = %name, blocks = processed.content.len(), "plugin applied");
                model = processed;
            }
            Err(e) => {
                warn!(plugin = %name, error = %e, "plugin failed, keeping previous content");
            }
        }
    }

    model
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Owns everything a conversion needs: config, parser, plugin registry, and
/// Markdown serializer.
pub struct Converter {
    config: AppConfig,
    plugins: PluginManager,
    parser: ContentParser,
    markdown: MarkdownConverter,
}

impl Converter {
    /// Build a converter with the built-in plugins registered.
    pub fn new(config: AppConfig) -> Result<Self> {
        let plugins = PluginManager::with_builtins(&config.plugins)?;
        Ok(Self::with_plugins(config, plugins))
    }

    /// Build a converter around an explicit plugin registry.
    pub fn with_plugins(config: AppConfig, plugins: PluginManager) -> Self {
        Self {
            parser: ContentParser::new(&config.parser),
            markdown: MarkdownConverter::new(ConvertOptions::from(&config.output)),
            config,
            plugins,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn plugins(&self) -> &PluginManager {
        &self.plugins
    }

    /// Fetch `url` and convert it.
    ///
    /// The URL is validated before a fetch session is opened; the session is
    /// released when this returns, whatever the outcome.
    pub async fn try_convert_url(
        &self,
        url: &str,
        request: &ConvertRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<Conversion> {
        htmlcmd_fetcher::parse_url(url)?;

        progress.phase("Opening fetch session");
        let session = FetchSession::open(&self.config.fetcher)?;
        self.try_convert_url_with(&session, url, request, progress)
            .await
    }

    /// Convert `url` using the given fetcher.
    #[instrument(skip_all, fields(url = %url, plugins = ?request.plugins))]
    pub async fn try_convert_url_with(
        &self,
        fetcher: &dyn PageFetcher,
        url: &str,
        request: &ConvertRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<Conversion> {
        let start = Instant::now();
        info!(%url, "starting conversion");

        progress.phase("Fetching page");
        let page = fetcher.fetch(url).await?;

        progress.phase("Parsing content");
        let model = self.parser.parse(&page.html, &page.final_url);

        Ok(self.finish(model, request, progress, start).await)
    }

    /// Convert an HTML string. Relative URLs resolve against
    /// [`PSEUDO_BASE_URL`].
    #[instrument(skip_all, fields(html_len = html.len(), plugins = ?request.plugins))]
    pub async fn try_convert_html(
        &self,
        html: &str,
        request: &ConvertRequest,
        progress: &dyn ProgressReporter,
    ) -> Result<Conversion> {
        let start = Instant::now();

        progress.phase("Parsing content");
        let model = self.parser.parse(html, &PSEUDO_BASE);

        Ok(self.finish(model, request, progress, start).await)
    }

    /// Convert `url`, reporting failure as text.
    pub async fn convert_url(&self, url: &str, include_images: bool) -> String {
        into_text(
            self.try_convert_url(url, &ConvertRequest::images(include_images), &SilentProgress)
                .await,
        )
    }

    /// Convert an HTML string, reporting failure as text.
    pub async fn convert_html(&self, html: &str, include_images: bool) -> String {
        into_text(
            self.try_convert_html(html, &ConvertRequest::images(include_images), &SilentProgress)
                .await,
        )
    }

    async fn finish(
        &self,
        model: ContentModel,
        request: &ConvertRequest,
        progress: &dyn ProgressReporter,
        start: Instant,
    ) -> Conversion {
        let model = if request.plugins.is_empty() {
            model
        } else {
            progress.phase("Running plugins");
            run_plugins(model, &request.plugins, &self.plugins).await
        };

        progress.phase("Rendering Markdown");
        let body = self.markdown.convert(&model);
        let markdown = match &request.template {
            Some(template) => render_template(template, &model, &body),
            None => body,
        };

        let conversion = Conversion {
            markdown,
            model,
            elapsed: start.elapsed(),
        };
        progress.done(&conversion);

        info!(
            source = %conversion.model.source_url,
            blocks = conversion.model.content.len(),
            markdown_len = conversion.markdown.len(),
            elapsed_ms = conversion.elapsed.as_millis(),
            "conversion complete"
        );

        conversion
    }
}

fn into_text(result: Result<Conversion>) -> String {
    match result {
        Ok(conversion) => conversion.markdown,
        Err(e) => {
            warn!(error = %e, "conversion failed");
            format!("Conversion failed: {e}")
        }
    }
}

// ---------------------------------------------------------------------------
// Default-config entry points
// ---------------------------------------------------------------------------

/// Fetch and convert `url` with default settings. Never fails: errors come
/// back as `Conversion failed: <error>`.
pub async fn convert_url(url: &str, include_images: bool) -> String {
    match Converter::new(AppConfig::default()) {
        Ok(converter) => converter.convert_url(url, include_images).await,
        Err(e) => into_text(Err(e)),
    }
}

/// Convert an HTML string with default settings. Never fails: errors come
/// back as `Conversion failed: <error>`.
pub async fn convert_html(html: &str, include_images: bool) -> String {
    match Converter::new(AppConfig::default()) {
        Ok(converter) => converter.convert_html(html, include_images).await,
        Err(e) => into_text(Err(e)),
    }
}

/// Names and descriptions of the built-in plugins.
pub fn list_plugins() -> Vec<PluginInfo> {
    match PluginManager::with_builtins(&AppConfig::default().plugins) {
        Ok(manager) => manager.list_plugins(),
        Err(e) => {
            warn!(error = %e, "failed to build plugin registry");
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
