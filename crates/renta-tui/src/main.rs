mod app;
mod handler;
mod tui;
mod ui;

use anyhow::{anyhow, Context, Result};
use app::{App, SessionFactory};
use clap::{Parser, Subcommand};
use renta_core::pdf::DEFAULT_FILE_NAME;
use renta_core::{
    build_gateway, ClaudeClient, Config, FormStore, OllamaClient, OpenAIClient, Provider,
    SessionOptions, SessionStore, SqliteStore,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "renta")]
#[command(version, about = "Fill in your Modelo 100 tax return by chatting with an AI assistant")]
struct Cli {
    /// Whose conversation and form to open
    #[arg(short, long, default_value = "local")]
    subject: String,

    /// SQLite database file (defaults to the data directory)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Assistant provider: ollama, claude or openai
    #[arg(short, long)]
    provider: Option<String>,

    /// Model name for the provider
    #[arg(short, long)]
    model: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the chat and review screens (default)
    Chat,
    /// Print the form's completion
    Progress,
    /// Write the form as a PDF
    Export {
        #[arg(short, long, default_value = DEFAULT_FILE_NAME)]
        out: PathBuf,
    },
    /// List models for the selected provider
    Models,
    /// Store provider settings in the config file
    Configure {
        #[arg(long)]
        api_key: Option<String>,
        /// Keep values edited on the review screen when the chat finds new ones
        #[arg(long)]
        protect_manual_edits: Option<bool>,
        #[arg(long)]
        ollama_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(provider) = &cli.provider {
        if Provider::from_str(provider).is_none() {
            return Err(anyhow!(
                "Unknown provider {:?} (expected ollama, claude or openai)",
                provider
            ));
        }
        config.provider = Some(provider.clone());
        // A model from the config belongs to the old provider
        config.default_model = None;
    }
    if let Some(model) = &cli.model {
        config.default_model = Some(model.clone());
    }
    if let Some(db) = &cli.db {
        config.database_path = Some(db.clone());
    }

    let db_path = config.database_path()?;
    init_logging(&db_path)?;

    match cli.command.unwrap_or(Commands::Chat) {
        Commands::Chat => run_tui(&config, &cli.subject, &db_path).await,
        Commands::Progress => print_progress(&cli.subject, &db_path),
        Commands::Export { out } => export(&cli.subject, &db_path, &out),
        Commands::Models => list_models(&config).await,
        Commands::Configure {
            api_key,
            protect_manual_edits,
            ollama_url,
        } => configure(config, api_key, protect_manual_edits, ollama_url),
    }
}

/// Log to `renta.log` next to the database; the terminal belongs to the TUI
fn init_logging(db_path: &Path) -> Result<()> {
    let log_dir = db_path
        .parent()
        .map(Path::to_path_buf)
        .or_else(dirs::data_dir)
        .ok_or_else(|| anyhow!("Could not determine log directory"))?;
    std::fs::create_dir_all(&log_dir)?;

    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_dir.join("renta.log"))
        .context("failed to open log file")?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file)
                .with_ansi(false),
        )
        .init();
    Ok(())
}

fn open_store(db_path: &Path) -> Result<Arc<SqliteStore>> {
    let store = SqliteStore::open(db_path)
        .with_context(|| format!("failed to open database {:?}", db_path))?;
    Ok(Arc::new(store))
}

async fn run_tui(config: &Config, subject: &str, db_path: &Path) -> Result<()> {
    let store: Arc<dyn SessionStore> = open_store(db_path)?;
    let gateway = build_gateway(config)?;
    let options = SessionOptions {
        tax_form: config.tax_form().to_string(),
        policy: config.merge_policy(),
        ..SessionOptions::default()
    };
    let factory = SessionFactory {
        subject: subject.to_string(),
        store,
        gateway,
        options,
    };
    let mut app = App::new(factory, PathBuf::from(DEFAULT_FILE_NAME))?;

    tui::install_panic_hook();
    let mut terminal = tui::init()?;
    let mut events = tui::EventHandler::new();

    let result = async {
        while !app.should_quit {
            terminal.draw(|frame| ui::render(&mut app, frame))?;
            match events.next().await {
                Some(event) => handler::handle_event(&mut app, event).await,
                None => break,
            }
        }
        Ok::<(), anyhow::Error>(())
    }
    .await;

    tui::restore()?;

    // Let a reply that is still on its way land in the store
    if let Some(task) = app.round_trip_task.take() {
        if let Ok((mut session, _)) = task.await {
            if let Err(e) = session.sync() {
                tracing::warn!("Unsaved changes on exit: {}", e);
            }
        }
    }
    result
}

fn print_progress(subject: &str, db_path: &Path) -> Result<()> {
    let store = open_store(db_path)?;
    let record = store.load_form(subject)?.unwrap_or_default();
    let progress = renta_core::snapshot(&record);

    println!("{}", progress.describe());
    for (field, value) in record.iter() {
        println!("  {}: {}", field.label(), value);
    }
    Ok(())
}

fn export(subject: &str, db_path: &Path, out: &Path) -> Result<()> {
    let store = open_store(db_path)?;
    let record = store.load_form(subject)?.unwrap_or_default();
    let rendered = renta_core::render(&record);
    renta_core::pdf::write_pdf(&rendered, out)?;
    println!("PDF guardado en {}", out.display());
    Ok(())
}

async fn list_models(config: &Config) -> Result<()> {
    let provider = config.provider()?;
    let models = match provider {
        Provider::Ollama => {
            OllamaClient::new(config.ollama_url(), &config.model()?, config.request_timeout())
                .list_models()
                .await?
        }
        Provider::Claude => ClaudeClient::list_models(),
        Provider::OpenAI => OpenAIClient::list_models(),
    };

    println!("{} models:", provider.display_name());
    let current = config.model()?;
    for model in models {
        let marker = if model == current { "*" } else { " " };
        println!("{} {}", marker, model);
    }
    Ok(())
}

fn configure(
    mut config: Config,
    api_key: Option<String>,
    protect_manual_edits: Option<bool>,
    ollama_url: Option<String>,
) -> Result<()> {
    if let Some(key) = api_key {
        match config.provider()? {
            Provider::Claude => config.claude_api_key = Some(key),
            Provider::OpenAI => config.openai_api_key = Some(key),
            Provider::Ollama => return Err(anyhow!("Ollama does not use an API key")),
        }
    }
    if let Some(protect) = protect_manual_edits {
        config.protect_manual_edits = protect;
    }
    if let Some(url) = ollama_url {
        config.ollama_url = Some(url);
    }

    config.save()?;
    println!("Configuración guardada en {:?}", Config::get_config_path()?);
    Ok(())
}
