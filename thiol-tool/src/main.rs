mod config;
mod error;
mod state;

#[cfg(feature = "chat")]
mod chat;

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use clap::{Parser, Subcommand};
use thiol_core::{
    fetch_pdf, ChatContext, MemoryPersistence, Message, MessageStore, SessionManager,
};
use tracing_subscriber::EnvFilter;

use crate::config::{resolve_settings, Settings};
use crate::state::{data_dir, FileSessionState};

#[derive(Parser)]
#[command(name = "thl")]
#[command(about = "Terminal client for the document chat service", long_about = None)]
struct Cli {
    /// Backend base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// User id to act as
    #[arg(long, global = true)]
    user_id: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    #[cfg(feature = "chat")]
    /// Start an interactive chat session
    Chat {
        /// Open this conversation instead of the last active one
        #[arg(long)]
        session: Option<String>,

        /// Start a new conversation
        #[arg(long, conflicts_with = "session")]
        new: bool,
    },

    /// List conversations, newest first
    Sessions,

    /// Print a conversation with its sources
    History {
        /// Conversation id
        session: String,
    },

    /// Download the source PDF of a conversation
    Download {
        /// Conversation id
        session: String,

        /// Download a single cited document instead of the combined PDF
        #[arg(long)]
        document: Option<String>,

        /// Output file (default: <session>.pdf in the current directory)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the signed-in account
    Whoami,
}

fn init_logging(settings: &Settings) -> anyhow::Result<()> {
    let dir = data_dir();
    std::fs::create_dir_all(&dir)?;
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join("thl.log"))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .with_ansi(false)
        .with_writer(Mutex::new(log_file))
        .init();

    Ok(())
}

fn print_message(message: &Message) {
    let role = if message.is_user { "User" } else { "Assistant" };
    println!("{}:", role);
    for line in message.content.lines() {
        println!("  {}", line);
    }

    if !message.sources.is_empty() {
        println!("  Sources:");
        for (i, source) in message.sources.iter().enumerate() {
            println!(
                "    [{}] {}, Page {}, Paragraph {}",
                i + 1,
                source.document,
                source.page,
                source.paragraph
            );
            if !source.text.is_empty() {
                println!("        {}", source.text);
            }
        }
    }
    if let Some(pdf_path) = &message.pdf_path {
        println!("  PDF: {}", pdf_path);
    }
    println!();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = resolve_settings(cli.api_url, cli.user_id);
    init_logging(&settings)?;
    let ctx = ChatContext::new(settings.identity.clone());

    match cli.command {
        #[cfg(feature = "chat")]
        Command::Chat { session, new } => {
            let client = settings.client()?;
            let persistence = FileSessionState::new(&settings.state_path);
            chat::run(ctx, client, persistence, session, new).await?;
        }
        Command::Sessions => {
            let client = settings.client()?;
            let mut sessions = SessionManager::new(FileSessionState::new(&settings.state_path));
            sessions.refresh_sessions(&ctx, &client).await?;

            let active = sessions.active_session().map(String::from);
            for session in sessions.sessions() {
                let marker = if active.as_deref() == Some(session.session_id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {}  {}",
                    marker,
                    session.session_id,
                    session.created_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Command::History { session } => {
            let client = settings.client()?;
            // Printing a history must not change the active session.
            let mut sessions = SessionManager::new(MemoryPersistence::default());
            let mut store = MessageStore::new();
            let messages = sessions
                .select_session(&ctx, &client, &session, &mut store)
                .await?;

            for message in messages.iter().filter(|m| !m.is_welcome()) {
                print_message(message);
            }
        }
        Command::Download {
            session,
            document,
            output,
        } => {
            let client = settings.client()?;
            let pdf = fetch_pdf(&ctx, &client, &session, document.as_deref()).await?;
            let path = output.unwrap_or_else(|| PathBuf::from(&pdf.file_name));
            std::fs::write(&path, &pdf.bytes)?;
            println!("Saved {} ({} bytes)", path.display(), pdf.bytes.len());
        }
        Command::Whoami => {
            let client = settings.client()?;
            let user = client.current_user().await?;
            println!("{} <{}>", user.username, user.email);
            if !user.full_name.is_empty() {
                println!("{}", user.full_name);
            }
            if user.disabled {
                println!("(account disabled)");
            }
        }
    }

    Ok(())
}
