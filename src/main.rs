use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod ai;
mod app;
mod auth;
mod config;
mod handler;
mod insight;
mod provider;
mod sermon;
mod state;
mod tui;
mod ui;

use app::App;
use config::Config;
use tui::{AppEvent, EventHandler};

/// Log to a file under the data directory; stderr belongs to the TUI.
fn init_logging() -> Result<()> {
    let Some(data_dir) = dirs::data_dir() else {
        return Ok(());
    };
    let log_dir = data_dir.join("sermon-studio");
    std::fs::create_dir_all(&log_dir)?;
    let log_file = std::fs::File::create(log_dir.join("sermons.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let config = Config::load().unwrap_or_else(|_| Config::new());

    let mut events = EventHandler::new();
    let mut app = App::new(config, events.sender())?;

    // Forward auth session transitions into the event loop so the header
    // follows sign-in state no matter which call changed it.
    if let Some(auth) = &app.auth {
        let mut session_rx = auth.subscribe();
        let tx = events.sender();
        tokio::spawn(async move {
            while session_rx.changed().await.is_ok() {
                let session = session_rx.borrow_and_update().clone();
                if tx.send(AppEvent::SessionChanged(session)).is_err() {
                    break;
                }
            }
        });
    }

    tui::install_panic_hook();
    let mut terminal = tui::init()?;

    let result = run(&mut terminal, &mut app, &mut events).await;

    tui::restore()?;
    result
}

async fn run(terminal: &mut tui::Tui, app: &mut App, events: &mut EventHandler) -> Result<()> {
    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if let Some(event) = events.next().await {
            handler::handle_event(app, event).await?;
        } else {
            break;
        }
    }
    Ok(())
}
