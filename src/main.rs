// main.rs

mod api;
mod app;
mod auth;
mod config;
mod error;
mod forms;
mod logging;
mod models;
mod session;
mod tasks;
mod ui;

use crate::api::ApiClient;
use crate::app::App;
use crate::auth::{AuthController, Route};
use crate::config::Config;
use crate::session::{FileStorage, SessionStore};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use dotenv::dotenv;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "todo-tui", version, about = "Terminal client for a personal todo list")]
struct Cli {
    /// Base URL of the task API (overrides TODO_API_URL and the config file)
    #[arg(long)]
    api_url: Option<String>,

    /// Path to a config.toml to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Open the account creation screen instead of the task list
    #[arg(long)]
    register: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables from .env file
    dotenv().ok();
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_deref(), cli.api_url)?;
    let _guard = logging::init(&config.data_dir)?;
    info!(api_url = %config.api_url, "starting");

    let store = SessionStore::new(Box::new(FileStorage::open(config.session_path())));
    let api = ApiClient::new(config.api_url.clone(), store.subscribe());
    let auth = AuthController::new(store);

    let (tx, rx) = mpsc::unbounded_channel();
    let route = if cli.register { Route::Register } else { Route::Tasks };
    let mut app = App::new(auth, api, route, tx);
    app.start();

    // Setup terminal UI
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    terminal.hide_cursor()?;

    let res = ui::run_app(&mut terminal, app, rx).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!(error = %err, "ui loop failed");
        eprintln!("Error: {:?}", err);
    }

    info!("exiting");
    Ok(())
}
