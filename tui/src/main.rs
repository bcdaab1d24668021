//! Chatbot TUI Entry Point
//!
//! Runs the chat widget in a terminal, plus a few maintenance commands.
//!
//! # Usage
//!
//! ```bash
//! # Chat (default)
//! chatbot-tui --api-base https://bot.example.com/
//!
//! # Print the fetched widget, messaging, and starter configs
//! chatbot-tui config
//!
//! # Show the onboarding form again next time
//! chatbot-tui reset form
//!
//! # Publish starter questions
//! chatbot-tui publish-starters --enable -q "What do you do?" -q "Pricing?"
//!
//! # Verbose logging (written to chatbot-tui.log next to the store)
//! RUST_LOG=widget_core=debug chatbot-tui
//! ```

use std::fs::{self, File};
use std::io::{self, IsTerminal};
use std::panic;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crossterm::{
    event::{DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tracing::info;

use chatbot_tui::{App, WidgetClient};
use widget_core::config::load_settings_from_path;
use widget_core::{
    AdminClient, ClientIdentity, ConfigOverrides, HttpApi, LocalStore, OnboardingProgress,
    WidgetApi, WidgetOptions, WidgetSettings,
};

/// Chatbot widget in the terminal
#[derive(Parser, Debug)]
#[command(name = "chatbot-tui")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Chat API base URL
    #[arg(short = 'a', long, value_name = "URL", global = true)]
    api_base: Option<String>,

    /// Configuration file path
    #[arg(short = 'c', long, env = "CHATBOT_CONFIG", value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Local store file
    #[arg(short = 's', long, value_name = "FILE", global = true)]
    storage: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "CHATBOT_LOG_LEVEL", default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Open the chat widget (default)
    Chat,
    /// Print the widget, messaging, and starter question configs as JSON
    Config,
    /// Clear onboarding progress or the whole store
    Reset {
        /// What to clear
        #[arg(value_enum)]
        target: ResetTarget,
    },
    /// Save the starter questions and notify open widgets
    PublishStarters {
        /// Show the starter screen
        #[arg(long, conflicts_with = "disable")]
        enable: bool,
        /// Hide the starter screen
        #[arg(long)]
        disable: bool,
        /// A question (repeatable, in display order)
        #[arg(short = 'q', long = "question", value_name = "TEXT")]
        questions: Vec<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ResetTarget {
    /// Show the onboarding form again
    Form,
    /// Show the starter questions again
    Starters,
    /// Both of the above
    All,
    /// Everything, including the client identity
    Storage,
}

/// Log to a file; the terminal belongs to the widget
fn init_logging(level: &str, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create log directory: {dir:?}"))?;
    let path = dir.join("chatbot-tui.log");
    let file = File::create(&path).with_context(|| format!("Failed to create log file: {path:?}"))?;

    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("chatbot_tui={level},widget_core={level}"))
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .init();

    Ok(path)
}

fn resolve_settings(args: &Args) -> Result<WidgetSettings> {
    let mut settings =
        load_settings_from_path(args.config.clone()).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(ref base) = args.api_base {
        overrides = overrides.with_api_base(base.clone());
    }
    if let Some(ref path) = args.storage {
        overrides = overrides.with_storage_path(path.clone());
    }
    overrides
        .apply(&mut settings)
        .context("Invalid configuration")?;

    Ok(settings)
}

async fn open_store(settings: &WidgetSettings) -> Result<Arc<LocalStore>> {
    match settings.storage_path {
        Some(ref path) => LocalStore::open(path.clone())
            .await
            .with_context(|| format!("Failed to open store: {path:?}")),
        None => Ok(LocalStore::in_memory()),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = resolve_settings(&args)?;

    let log_dir = settings
        .storage_path
        .as_deref()
        .and_then(Path::parent)
        .map_or_else(std::env::temp_dir, Path::to_path_buf);
    let log_path = init_logging(&args.log_level, &log_dir)?;

    info!("chatbot-tui starting");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!(api_base = %settings.api_base, source = %settings.source(), log = ?log_path, "Settings");

    let store = open_store(&settings).await?;

    match args.command.unwrap_or(Command::Chat) {
        Command::Chat => run_chat(settings, store).await,
        Command::Config => print_config(&settings, &store).await,
        Command::Reset { target } => reset(target, store).await,
        Command::PublishStarters {
            enable,
            disable,
            questions,
        } => {
            let identity = ClientIdentity::load_or_create(&store).await;
            let api = Arc::new(HttpApi::from_settings(&settings, &identity)?);
            let admin = AdminClient::new(api, store);
            let published = admin.publish_starters(enable || !disable, questions).await?;
            println!("{}", serde_json::to_string_pretty(&published)?);
            Ok(())
        }
    }
}

async fn print_config(settings: &WidgetSettings, store: &LocalStore) -> Result<()> {
    let identity = ClientIdentity::load_or_create(store).await;
    let api = HttpApi::from_settings(settings, &identity)?;

    let (widget, messaging, starters) = tokio::try_join!(
        api.widget_config(),
        api.messaging_config(),
        api.starter_questions()
    )?;

    let all = serde_json::json!({
        "client_id": identity.as_str(),
        "widget_config": widget,
        "messaging_config": messaging,
        "starter_questions": starters,
    });
    println!("{}", serde_json::to_string_pretty(&all)?);
    Ok(())
}

async fn reset(target: ResetTarget, store: Arc<LocalStore>) -> Result<()> {
    let progress = OnboardingProgress::new(store.clone());
    match target {
        ResetTarget::Form => progress.reset_form().await?,
        ResetTarget::Starters => progress.reset_starter_questions().await?,
        ResetTarget::All => progress.reset_all().await?,
        ResetTarget::Storage => store.clear().await?,
    }
    info!(?target, "Store reset");
    println!("Reset {target:?}");
    Ok(())
}

async fn run_chat(settings: WidgetSettings, store: Arc<LocalStore>) -> Result<()> {
    if !io::stdin().is_terminal() || !io::stdout().is_terminal() {
        eprintln!("Error: chatbot-tui chat requires a terminal (TTY)");
        eprintln!();
        eprintln!("Use `chatbot-tui config` to inspect the server without one.");
        std::process::exit(1);
    }

    let identity = ClientIdentity::load_or_create(&store).await;
    let api = Arc::new(HttpApi::from_settings(&settings, &identity)?);
    let client = WidgetClient::new(api, store, WidgetOptions::from_settings(&settings));

    // Set up panic hook to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), DisableMouseCapture, LeaveAlternateScreen);
        original_hook(panic_info);
    }));

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut app = App::new(client);
    let result = app.run(&mut terminal).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        DisableMouseCapture,
        LeaveAlternateScreen
    )?;
    terminal.show_cursor()?;

    result
}
