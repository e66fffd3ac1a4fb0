//! folio: join a book's reading room and follow who else is there.
//!
//! Prints the roster, the connection badge and the author conversation
//! state as they change, until Ctrl-C.

mod wiring;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use folio_common::RoomId;
use folio_config::{toml_loader, validation, FolioConfig};
use folio_presence::{
    connection_indicator, present_roster, ChatClient, ConversationState,
    EphemeralConversationController, HttpBackend, PresenceChannelCoordinator, PresenceState,
    RealtimeProvider, RoomMembershipController,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "folio", about = "Follow who is reading a book with you")]
struct Args {
    /// Room (book) id to join.
    room: String,

    /// Config file to use instead of the platform default.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reader id; a random one is generated when omitted.
    #[arg(long)]
    user_id: Option<String>,

    #[arg(long, default_value = "Reader")]
    display_name: String,

    /// Announce yourself as the book's author.
    #[arg(long)]
    author: bool,

    /// Print the effective config as JSON and exit.
    #[arg(long)]
    print_config: bool,
}

fn load(path: Option<&PathBuf>) -> folio_common::Result<FolioConfig> {
    let config = match path {
        Some(path) => {
            let config = toml_loader::load_from_path(path)?;
            validation::validate(&config)?;
            config
        }
        None => folio_config::load_config()?,
    };
    Ok(config)
}

fn init_logging(config: &FolioConfig) {
    let level = config.logging.level.as_filter();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            format!("folio={level},folio_presence={level},folio_config={level}").into()
        }))
        .init();
}

fn print_presence(state: &PresenceState, max_visible: usize) {
    let badge = connection_indicator(state.mode);
    let view = present_roster(&state.roster, max_visible);
    let mut names: Vec<String> = view
        .visible
        .iter()
        .map(|m| {
            if m.is_author {
                format!("{} (author)", m.display_name)
            } else {
                m.display_name.clone()
            }
        })
        .collect();
    if view.overflow > 0 {
        names.push(format!("+{} more", view.overflow));
    }
    if view.total() <= 1 {
        println!("[{}] You're the only one reading right now", badge.label);
    } else {
        println!("[{}] {} reading: {}", badge.label, view.total(), names.join(", "));
    }
}

fn print_conversation(state: &ConversationState) {
    match state {
        ConversationState::Idle | ConversationState::Checking => {}
        ConversationState::Locked => println!("The author is here. Upgrade to chat with them."),
        ConversationState::Connecting => println!("Connecting to the author..."),
        ConversationState::Active(channel) => {
            println!("Chatting with the author (channel {})", channel.channel_id)
        }
        ConversationState::Ended => println!("The author left. Conversation ended."),
        ConversationState::Error(failure) => println!("{}", failure.user_message()),
    }
}

#[tokio::main]
async fn main() -> folio_common::Result<()> {
    let args = Args::parse();
    let config = load(args.config.as_ref())?;
    if args.print_config {
        println!("{}", folio_config::config_to_json(&config));
        return Ok(());
    }
    init_logging(&config);

    let identity = wiring::identity(
        &config,
        args.user_id.as_deref(),
        &args.display_name,
        args.author,
    );
    let room = RoomId::new(args.room.as_str());
    info!(room_id = %room, user_id = %identity.user_id, "Starting folio");

    let backend = Arc::new(HttpBackend::new(wiring::http_config(&config))?);
    let provider = Arc::new(
        RealtimeProvider::new(wiring::realtime_config(&config)).with_identity(identity.clone()),
    );
    let coordinator = PresenceChannelCoordinator::new(
        provider,
        backend.clone(),
        wiring::coordinator_config(&config),
    );
    let mut membership = RoomMembershipController::new(
        backend.clone(),
        coordinator,
        wiring::membership_config(&config),
    );
    membership.join(room.clone()).await?;

    let chat: Arc<dyn ChatClient> = backend.clone();
    let mut conversation = EphemeralConversationController::spawn(
        room.clone(),
        backend,
        Some(chat),
        wiring::conversation_config(&config),
    );
    // An author does not open a conversation with themselves.
    if !identity.is_author {
        conversation.follow_roster(membership.subscribe());
    }

    let max_visible = config.presence.max_visible as usize;
    let mut presence = membership.subscribe();
    let mut chat_state = conversation.subscribe();
    print_presence(&presence.borrow_and_update(), max_visible);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = presence.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = presence.borrow_and_update().clone();
                print_presence(&state, max_visible);
            }
            changed = chat_state.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = chat_state.borrow_and_update().clone();
                print_conversation(&state);
            }
        }
    }

    info!(room_id = %room, "Shutting down");
    conversation.shutdown().await;
    if let Err(e) = membership.leave(&room).await {
        warn!(room_id = %room, error = %e, "Leave failed");
        membership.teardown();
    }
    Ok(())
}
