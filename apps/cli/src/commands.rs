//! CLI command definitions, routing, and tracing setup.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr, eyre};
use htmlcmd_core::{
    Conversion, ConvertRequest, Converter, ImageDownloader, PluginManager, ProgressReporter,
};
use htmlcmd_shared::{AppConfig, init_config, load_config, load_config_from, write_config};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// htmlcmd: turn web pages into clean Markdown.
#[derive(Parser)]
#[command(
    name = "htmlcmd",
    version,
    about = "Convert web pages and HTML files to clean Markdown.",
    long_about = None,
    args_conflicts_with_subcommands = true,
)]
pub(crate) struct Cli {
    #[command(flatten)]
    pub convert: ConvertArgs,

    /// Config file to use instead of ~/.htmlcmd/htmlcmd.toml.
    #[arg(long, env = "HTMLCMD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Options for the default convert action.
#[derive(clap::Args, Debug, Default)]
pub(crate) struct ConvertArgs {
    /// URL of the page to convert.
    pub url: Option<String>,

    /// Write Markdown to this file instead of stdout.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Convert a local HTML file instead of fetching a URL.
    #[arg(long, conflicts_with = "url")]
    pub html_file: Option<PathBuf>,

    /// Fetch with a visible browser session.
    #[arg(long)]
    pub no_headless: bool,

    /// Plugins to apply, in order (overrides `[plugins] default`).
    #[arg(long, num_args = 1..)]
    pub plugins: Option<Vec<String>>,

    /// Output template with {{title}}, {{source_url}} and {{content}}.
    #[arg(long)]
    pub template: Option<PathBuf>,

    /// List available plugins and exit.
    #[arg(long)]
    pub list_plugins: bool,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init {
        /// Overwrite an existing config file.
        #[arg(long)]
        force: bool,
    },
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags. Logs go to stderr so stdout carries
/// only Markdown.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "htmlcmd=info",
        1 => "htmlcmd=debug",
        _ => "htmlcmd=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();

    match &cli.command {
        Some(Command::Config { action }) => match action {
            ConfigAction::Init { force } => cmd_config_init(config_path, *force),
            ConfigAction::Show => cmd_config_show(config_path),
        },
        None => cmd_convert(&cli.convert, config_path).await,
    }
}

/// Load the config from `path`, or from the default location.
fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

// ---------------------------------------------------------------------------
// Convert
// ---------------------------------------------------------------------------

/// What to convert.
enum Source<'a> {
    Url(&'a str),
    HtmlFile(&'a Path),
}

async fn cmd_convert(args: &ConvertArgs, config_path: Option<&Path>) -> Result<()> {
    let mut config = resolve_config(config_path)?;

    if args.list_plugins {
        return cmd_list_plugins(config);
    }

    let source = match (&args.url, &args.html_file) {
        (Some(url), _) => Source::Url(url),
        (None, Some(path)) => Source::HtmlFile(path),
        (None, None) => {
            Cli::command().print_help()?;
            println!();
            return Ok(());
        }
    };

    if args.no_headless {
        config.fetcher.headless = false;
    }

    let request = ConvertRequest {
        plugins: args
            .plugins
            .clone()
            .unwrap_or_else(|| config.plugins.default.clone()),
        template: read_template(args.template.as_deref(), config.output.template.as_deref())?,
    };

    let plugins = plugin_registry(&config, args.output.as_deref())?;
    let converter = Converter::with_plugins(config, plugins);
    let reporter = CliProgress::new();

    let result = match source {
        Source::Url(url) => {
            info!(url, plugins = ?request.plugins, "converting page");
            converter.try_convert_url(url, &request, &reporter).await
        }
        Source::HtmlFile(path) => {
            info!(path = %path.display(), plugins = ?request.plugins, "converting file");
            let html = std::fs::read_to_string(path)
                .wrap_err_with(|| format!("failed to read {}", path.display()))?;
            converter.try_convert_html(&html, &request, &reporter).await
        }
    };
    reporter.clear();
    let conversion = result?;

    match &args.output {
        Some(path) => {
            let saved = write_output(path, &conversion.markdown)?;
            println!("Markdown saved to: {}", saved.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(conversion.markdown.as_bytes())?;
            stdout.flush()?;
        }
    }

    Ok(())
}

/// Built-in plugins. With an output file, downloaded images are stored
/// relative to that file so the links written into it resolve.
fn plugin_registry(config: &AppConfig, output: Option<&Path>) -> Result<PluginManager> {
    let mut plugins = PluginManager::with_builtins(&config.plugins)?;
    if let Some(root) = output_root(output) {
        let downloader = ImageDownloader::new(&config.plugins)?.relative_to(root);
        plugins.register(Arc::new(downloader));
    }
    Ok(plugins)
}

/// Directory of the output file, unless it is the working directory.
fn output_root(output: Option<&Path>) -> Option<&Path> {
    output?.parent().filter(|dir| !dir.as_os_str().is_empty())
}

/// Read the template from the CLI flag, else from the configured path.
fn read_template(flag: Option<&Path>, configured: Option<&str>) -> Result<Option<String>> {
    let Some(path) = flag.or(configured.map(Path::new)) else {
        return Ok(None);
    };
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read template {}", path.display()))?;
    Ok(Some(text))
}

/// Write `markdown` to `path` as UTF-8, creating parent directories. Returns
/// the absolute path written.
fn write_output(path: &Path, markdown: &str) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)
        .wrap_err_with(|| format!("cannot resolve {}", path.display()))?;

    if let Some(parent) = absolute.parent() {
        std::fs::create_dir_all(parent)
            .wrap_err_with(|| format!("failed to create {}", parent.display()))?;
    }
    std::fs::write(&absolute, markdown)
        .wrap_err_with(|| format!("failed to write {}", absolute.display()))?;

    Ok(absolute)
}

fn cmd_list_plugins(config: AppConfig) -> Result<()> {
    let converter = Converter::new(config)?;
    let plugins = converter.plugins().list_plugins();

    if plugins.is_empty() {
        println!("No plugins available.");
        return Ok(());
    }

    for plugin in plugins {
        println!("{} - {}", plugin.name, plugin.description);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner on stderr.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
            spinner.set_style(
                style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
            );
        }
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn done(&self, result: &Conversion) {
        self.spinner.finish_and_clear();
        info!(
            title = %result.model.title,
            elapsed_ms = result.elapsed.as_millis(),
            "done"
        );
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

fn cmd_config_init(path: Option<&Path>, force: bool) -> Result<()> {
    let path = match path {
        Some(path) => {
            if path.exists() && !force {
                return Err(eyre!(
                    "config already exists at {} (use --force to overwrite)",
                    path.display()
                ));
            }
            write_config(path, &AppConfig::default())?;
            path.to_path_buf()
        }
        None => {
            let default_path = htmlcmd_shared::config_file_path()?;
            if default_path.exists() && !force {
                return Err(eyre!(
                    "config already exists at {} (use --force to overwrite)",
                    default_path.display()
                ));
            }
            init_config()?
        }
    };
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(path: Option<&Path>) -> Result<()> {
    let config = resolve_config(path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
