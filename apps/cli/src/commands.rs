//! CLI command definitions, routing, and tracing setup.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use linkboard_classifier::{ClassifierPool, Classify, PageClassifier, PostStore};
use linkboard_importer::{Fetcher, ImportObserver, PostSink, default_fetchers, import_all};
use linkboard_shared::{
    AppConfig, ListOptions, Post, first_token, init_config, load_config, resolve_db_path,
};
use linkboard_storage::Storage;
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// linkboard — a web news and link aggregator.
#[derive(Parser)]
#[command(
    name = "linkboard",
    version,
    about = "Submit, import, and classify link posts.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Database file path (overrides the configured path).
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
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
    /// Submit a post.
    Post {
        /// Title of the post.
        #[arg(short, long)]
        title: String,

        /// Link URL the post is about.
        #[arg(short, long)]
        link: Option<String>,

        /// Body text.
        #[arg(short, long)]
        body: Option<String>,
    },

    /// Import posts from external feeds.
    Import {
        /// Only import from these site names (repeatable).
        #[arg(long)]
        site: Vec<String>,
    },

    /// Classify stored posts by the code density of their linked pages.
    Classify {
        /// Concurrent classify workers (overrides the configured count).
        #[arg(short, long)]
        concurrency: Option<u32>,
    },

    /// List stored posts, most recent first.
    List {
        /// 1-based page number.
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Posts per page.
        #[arg(long)]
        per_page: Option<u32>,

        /// Only list posts classified as code.
        #[arg(long)]
        code_only: bool,
    },

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
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Post { title, link, body } => {
            cmd_post(cli.db.as_deref(), &title, link.as_deref(), body.as_deref()).await
        }
        Command::Import { site } => cmd_import(cli.db.as_deref(), &site).await,
        Command::Classify { concurrency } => cmd_classify(cli.db.as_deref(), concurrency).await,
        Command::List {
            page,
            per_page,
            code_only,
        } => cmd_list(cli.db.as_deref(), page, per_page, code_only).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

/// Open the store at the flag-overridden or configured path.
async fn open_storage(db_flag: Option<&std::path::Path>, config: &AppConfig) -> Result<Storage> {
    let path = match db_flag {
        Some(p) => p.to_path_buf(),
        None => resolve_db_path(config)?,
    };
    tracing::debug!(?path, "opening database");
    Ok(Storage::open(&path).await?)
}

// ---------------------------------------------------------------------------
// post
// ---------------------------------------------------------------------------

async fn cmd_post(
    db_flag: Option<&std::path::Path>,
    title: &str,
    link: Option<&str>,
    body: Option<&str>,
) -> Result<()> {
    if title.trim().is_empty() {
        return Err(eyre!("title must not be empty"));
    }

    let link_url = link.unwrap_or_default();
    if !link_url.is_empty() {
        validate_link_url(link_url)?;
    }

    let config = load_config()?;
    let storage = open_storage(db_flag, &config).await?;

    let candidate = Post {
        title: title.to_string(),
        link_url: link_url.to_string(),
        body: body.unwrap_or_default().to_string(),
        ..Post::default()
    };

    let (post, created) = storage.submit(candidate).await?;

    if created {
        println!("created: post {} ({})", post.id, post.title);
    } else {
        println!("exists:  post {} ({})", post.id, post.title);
    }
    Ok(())
}

/// Validate a link URL before it reaches the store: http(s) only, a real
/// dotted hostname, and no nonstandard port.
fn validate_link_url(link: &str) -> Result<()> {
    let url = Url::parse(link).map_err(|e| eyre!("invalid link URL '{link}': {e}"))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(eyre!("link URL scheme must be http or https"));
    }
    if url.port().is_some() {
        return Err(eyre!("non-standard link URL port is not allowed"));
    }
    match url.host_str() {
        Some(host) if host.contains('.') => Ok(()),
        _ => Err(eyre!("invalid hostname (must contain dot)")),
    }
}

// ---------------------------------------------------------------------------
// import
// ---------------------------------------------------------------------------

/// Prints each newly created post and keeps the run totals.
///
/// Fetcher tasks call this concurrently; the counts and the two-line print
/// stay consistent under one mutex.
struct ImportPrinter {
    counts: Mutex<ImportCounts>,
}

#[derive(Default, Clone, Copy)]
struct ImportCounts {
    total: usize,
    created: usize,
}

impl ImportPrinter {
    fn new() -> Self {
        Self {
            counts: Mutex::new(ImportCounts::default()),
        }
    }

    fn counts(&self) -> ImportCounts {
        *self.counts.lock().unwrap()
    }
}

impl ImportObserver for ImportPrinter {
    fn imported(&self, site: &str, post: &Post, created: bool) {
        let mut counts = self.counts.lock().unwrap();
        counts.total += 1;
        if !created {
            return;
        }
        counts.created += 1;
        println!("{site:<14}  {}", post.title);
        println!("                {}", post.link_url);
    }
}

async fn cmd_import(db_flag: Option<&std::path::Path>, sites: &[String]) -> Result<()> {
    let config = load_config()?;
    let storage = Arc::new(open_storage(db_flag, &config).await?);

    let mut fetchers = default_fetchers(&config.importer)?;
    if !sites.is_empty() {
        fetchers.retain(|f| sites.iter().any(|s| s == f.site()));
        if fetchers.is_empty() {
            return Err(eyre!("no fetcher matches the requested sites {sites:?}"));
        }
    }

    info!(fetchers = fetchers.len(), "importing posts");

    let printer = Arc::new(ImportPrinter::new());
    let sink: Arc<dyn PostSink> = storage;
    let observer: Arc<dyn ImportObserver> = printer.clone();
    let summary = import_all(sink, fetchers, Some(observer)).await;

    let counts = printer.counts();
    info!(
        "# import: {} new posts, {} already existed",
        counts.created,
        counts.total - counts.created
    );

    if summary.failed() {
        for (site, message) in &summary.failures {
            tracing::error!(site = %site, "import failed: {message}");
        }
        return Err(eyre!(
            "{} of {} fetchers failed",
            summary.failures.len(),
            summary.sites
        ));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// classify
// ---------------------------------------------------------------------------

async fn cmd_classify(db_flag: Option<&std::path::Path>, concurrency: Option<u32>) -> Result<()> {
    let config = load_config()?;
    let storage = Arc::new(open_storage(db_flag, &config).await?);

    let concurrency = concurrency.unwrap_or(config.classifier.concurrency);
    let classifier = PageClassifier::new(Duration::from_secs(config.classifier.fetch_timeout_secs))?;
    let pool = ClassifierPool::new(concurrency as usize, config.classifier.page_size);

    info!(concurrency, "classifying posts");

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner.set_message("Classifying posts...");

    let store: Arc<dyn PostStore> = storage;
    let classify: Arc<dyn Classify> = Arc::new(classifier);
    let summary = pool.run(store, classify).await;
    spinner.finish_and_clear();
    let summary = summary?;

    if summary.changes.is_empty() {
        println!("# classified posts: no changes");
        return Ok(());
    }

    let mut labels: Vec<_> = summary.changes.iter().collect();
    labels.sort();
    let rendered: Vec<String> = labels
        .iter()
        .map(|(label, count)| format!("{label}={count}"))
        .collect();
    println!("# classified posts: {}", rendered.join(" "));
    Ok(())
}

// ---------------------------------------------------------------------------
// list
// ---------------------------------------------------------------------------

async fn cmd_list(
    db_flag: Option<&std::path::Path>,
    page: u32,
    per_page: Option<u32>,
    code_only: bool,
) -> Result<()> {
    let config = load_config()?;
    let storage = open_storage(db_flag, &config).await?;

    let opts = ListOptions {
        page: Some(page),
        per_page,
        code_only,
    };
    let posts = storage.list(&opts).await?;

    if posts.is_empty() {
        println!("no posts on page {page}");
        return Ok(());
    }

    for post in posts {
        let label = first_token(&post.classification);
        println!(
            "{:>6}  {:<8}  {}",
            post.id,
            if label.is_empty() { "-" } else { label },
            post.title
        );
        if !post.link_url.is_empty() {
            println!("                  {}", post.link_url);
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_validation_accepts_plain_http() {
        assert!(validate_link_url("http://example.com/a/b").is_ok());
        assert!(validate_link_url("https://sub.example.com/").is_ok());
    }

    #[test]
    fn link_validation_rejects_bad_schemes() {
        assert!(validate_link_url("ftp://example.com/file").is_err());
        assert!(validate_link_url("file:///etc/passwd").is_err());
    }

    #[test]
    fn link_validation_rejects_undotted_hosts() {
        assert!(validate_link_url("http://localhost/admin").is_err());
        assert!(validate_link_url("http://intranet/wiki").is_err());
    }

    #[test]
    fn link_validation_rejects_explicit_ports() {
        assert!(validate_link_url("http://example.com:8080/").is_err());
    }
}
