mod app;
mod input;
mod ui;

use std::io;
use std::time::Duration;

use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::prelude::*;
use thiol_api::RagClient;
use thiol_core::ChatContext;

pub use app::ChatApp;

use crate::error::ThlError;
use crate::state::{data_dir, FileSessionState};

pub async fn run(
    ctx: ChatContext,
    client: RagClient,
    persistence: FileSessionState,
    session: Option<String>,
    new_conversation: bool,
) -> Result<(), ThlError> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = ChatApp::new(ctx, client, persistence, data_dir().join("downloads"));
    app.open(session, new_conversation);

    let result = run_loop(&mut terminal, &mut app).await;

    let final_session = app.sessions.active_session().map(String::from);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Some(session_id) = final_session {
        println!("Conversation: {}", session_id);
        println!("To continue: thl chat --session {}", session_id);
    }

    result
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app: &mut ChatApp,
) -> Result<(), ThlError> {
    loop {
        terminal.draw(|f| ui::render(f, app))?;

        // Poll for events with timeout to allow checking async responses
        if event::poll(Duration::from_millis(50))? {
            let event = event::read()?;
            input::handle_event(app, event);
        }

        app.poll_responses();

        if app.should_quit {
            break;
        }
    }

    Ok(())
}
