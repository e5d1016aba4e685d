use std::collections::HashSet;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{load_settings, ChatClient, RoomHandle, RoomView};
use shared::domain::{MessageId, RoomId};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Store a session token issued by the server.
    Login {
        #[arg(long)]
        token: String,
    },
    Logout,
    Whoami,
    /// Open a room, print incoming messages and send each stdin line.
    Room {
        room_id: i64,
        #[arg(long)]
        talking_to: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let settings = load_settings()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&settings.log_filter))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let client = ChatClient::connect(&settings).await?;

    match cli.command {
        Command::Login { token } => {
            client.log_in(&token).await?;
            println!("logged in");
        }
        Command::Logout => {
            client.log_out().await?;
            println!("logged out");
        }
        Command::Whoami => {
            if !client.session().is_logged_in().await {
                bail!("not logged in");
            }
            match client.me().await? {
                Some(me) => println!("{} ({})", me.username, me.id),
                None => println!("server has no profile for this token"),
            }
        }
        Command::Room {
            room_id,
            talking_to,
        } => {
            client.me().await?;
            let room = client.open_room(RoomId(room_id), talking_to).await?;
            run_room(room).await?;
        }
    }

    Ok(())
}

async fn run_room(room: RoomHandle) -> Result<()> {
    let mut views = room.views();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut printed = HashSet::new();
    info!(room_id = room.room_id().0, "chat_cli: room open, /quit to leave");

    loop {
        tokio::select! {
            changed = views.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = views.borrow_and_update().clone();
                render(&view, &mut printed);

                // Everything printed counts as on screen.
                let unread: Vec<MessageId> = view
                    .messages
                    .iter()
                    .filter(|row| !row.message.read)
                    .map(|row| row.message.id)
                    .collect();
                if !unread.is_empty() {
                    room.messages_visible(unread);
                }
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) if line.trim() == "/quit" => break,
                    Some(line) => {
                        room.queue_message(line);
                    }
                    None => break,
                }
            }
        }
    }

    room.close().await;
    Ok(())
}

fn render(view: &RoomView, printed: &mut HashSet<MessageId>) {
    // Rows arrive newest first.
    for row in view.messages.iter().rev() {
        if !printed.insert(row.message.id) {
            continue;
        }
        let marker = if row.outgoing { ">" } else { "<" };
        println!(
            "[{}] {marker} {}: {}",
            view.title, row.message.user.username, row.message.payload
        );
    }
}
