use anyhow::{Context, Result};
use clap::Parser;
use promptfeed::app::App;
use promptfeed::config::Config;
use promptfeed::feed::{ControllerSettings, FeedController, FeedEvent, ScrollTrigger};
use promptfeed::remote::PocketBaseClient;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// Get the config directory path (~/.config/promptfeed/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("promptfeed"))
}

#[derive(Parser, Debug)]
#[command(
    name = "promptfeed",
    about = "Browse a live, categorized prompt gallery in the terminal"
)]
struct Args {
    /// Config file (default: ~/.config/promptfeed/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// PocketBase server URL, overriding the config file
    #[arg(long, value_name = "URL")]
    base_url: Option<String>,

    /// Category to open with
    #[arg(long, value_name = "NAME")]
    category: Option<String>,

    /// Records per page
    #[arg(long, value_name = "N")]
    page_size: Option<u32>,

    /// Log file (default: ~/.config/promptfeed/promptfeed.log)
    #[arg(long, value_name = "FILE")]
    log_file: Option<PathBuf>,

    /// Print the configured categories and exit
    #[arg(long)]
    list_categories: bool,
}

/// Send tracing output to a file; the terminal belongs to the UI.
fn init_tracing(path: &Path) -> Result<()> {
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log file '{}'", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::sync::Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // Set directory permissions on Unix (user-only access); the config may hold a token
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(&config_dir) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o700);
            let _ = std::fs::set_permissions(&config_dir, perms);
        }
    }

    let log_path = args
        .log_file
        .clone()
        .unwrap_or_else(|| config_dir.join("promptfeed.log"));
    init_tracing(&log_path)?;

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from '{}'", config_path.display()))?;

    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
    }
    if let Some(category) = args.category {
        config.default_category = category;
    }
    if let Some(page_size) = args.page_size {
        config.page_size = page_size;
        if !config.page_sizes.contains(&page_size) {
            config.page_sizes.push(page_size);
            config.page_sizes.sort_unstable();
        }
    }
    config.validate().context("Invalid configuration")?;

    if args.list_categories {
        for (i, category) in config.categories.iter().enumerate() {
            println!("{}. {}", i + 1, category);
        }
        return Ok(());
    }

    tracing::info!(config = ?config, "Starting promptfeed");

    let client = PocketBaseClient::from_config(&config).context("Failed to create HTTP client")?;

    // Channel for fetch results and realtime notifications
    let (event_tx, event_rx) = mpsc::channel::<FeedEvent>(64);

    let controller = FeedController::new(
        Arc::new(client),
        ControllerSettings::from_config(&config),
        event_tx,
    );
    let trigger = ScrollTrigger::new(
        config.scroll_threshold,
        Duration::from_millis(config.scroll_throttle_ms),
    );
    let mut app = App::new(controller, trigger);

    promptfeed::ui::run(&mut app, event_rx).await?;

    println!("Goodbye!");
    Ok(())
}
