use anyhow::{Context, Result, bail};
use chatstream_rs::types::MessageRole;
use chatstream_rs::{
    ChatConfig, ChatOrchestrator, ChatUpdate, Client, OrchestratorConfig, ReadOutcome, SendOutcome,
};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::oneshot;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "chatstream")]
#[command(about = "Talk to a streaming chat server from the terminal")]
#[command(version)]
struct Args {
    /// Chat API base URL (overrides CHATSTREAM_BASE_URL)
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// User id (overrides CHATSTREAM_USER_ID)
    #[arg(long, global = true)]
    user_id: Option<String>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a message and stream the reply to stdout
    Send {
        text: String,
        /// Continue an existing session
        #[arg(long)]
        session: Option<String>,
    },
    /// List sessions
    Sessions,
    /// List quick prompts
    Prompts,
    /// Delete a session
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "chatstream_rs=info".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = ChatConfig::new();
    if let Some(base) = args.base_url {
        config = config.with_base_url(base);
    }
    if let Some(user) = args.user_id {
        config = config.with_user_id(user);
    }

    let client = Client::from_config(&config).context("failed to build client")?;
    let chat = Arc::new(ChatOrchestrator::new(
        client,
        OrchestratorConfig::from_chat_config(&config),
    ));

    match args.command {
        Commands::Send { text, session } => send(&chat, &text, session.as_deref()).await,
        Commands::Sessions => {
            chat.load_sessions().await?;
            for s in chat.sessions() {
                println!("{}\t{:?}\t{}\t{}", s.id, s.status, s.message_count, s.title);
            }
            Ok(())
        }
        Commands::Prompts => {
            chat.load_quick_prompts().await?;
            for p in chat.quick_prompts() {
                println!("{}\t{}\t{}", p.id, p.title, p.content);
            }
            Ok(())
        }
        Commands::Delete { id } => {
            chat.delete_session(&id).await?;
            println!("deleted {id}");
            Ok(())
        }
    }
}

async fn send(chat: &Arc<ChatOrchestrator<Client>>, text: &str, session: Option<&str>) -> Result<()> {
    if let Some(id) = session {
        let session = chat
            .backend()
            .sessions()
            .get(id)
            .await
            .with_context(|| format!("session {id} not found"))?;
        chat.select_session(session).await?;
    }

    let (done_tx, done_rx) = oneshot::channel();
    let printer = tokio::spawn(print_reply(Arc::clone(chat), chat.subscribe(), done_rx));
    let stopper = {
        let chat = Arc::clone(chat);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                chat.stop_streaming();
            }
        })
    };

    let outcome = chat.handle_send_message(text).await;
    stopper.abort();
    let _ = done_tx.send(());
    printer.await?;
    println!();

    match outcome {
        SendOutcome::Finished(ReadOutcome::Completed | ReadOutcome::Aborted) => Ok(()),
        SendOutcome::Finished(ReadOutcome::Errored) => bail!("stream ended with an error"),
        SendOutcome::Skipped => bail!("nothing to send"),
        SendOutcome::SessionCreateFailed(e) => Err(e).context("failed to create session"),
        SendOutcome::StreamOpenFailed(e) => Err(e).context("failed to open stream"),
    }
}

/// Echo tokens until `done` fires, then drain what is already queued.
async fn print_reply(
    chat: Arc<ChatOrchestrator<Client>>,
    mut updates: broadcast::Receiver<ChatUpdate>,
    mut done: oneshot::Receiver<()>,
) {
    let mut stdout = std::io::stdout();
    loop {
        let update = tokio::select! {
            biased;
            update = updates.recv() => update,
            _ = &mut done => break,
        };
        if !echo(&chat, &mut stdout, update) {
            return;
        }
    }
    while let Ok(update) = updates.try_recv() {
        if !echo(&chat, &mut stdout, Ok(update)) {
            return;
        }
    }
}

fn echo(
    chat: &ChatOrchestrator<Client>,
    out: &mut impl Write,
    update: Result<ChatUpdate, RecvError>,
) -> bool {
    let text = match update {
        Ok(ChatUpdate::TokenAppended { token, .. }) => token,
        Ok(ChatUpdate::MessageAdded { message_id }) => chat
            .messages()
            .into_iter()
            .find(|m| m.id == message_id && m.role == MessageRole::Assistant)
            .map(|m| m.content)
            .unwrap_or_default(),
        Ok(_) | Err(RecvError::Lagged(_)) => return true,
        Err(RecvError::Closed) => return false,
    };
    write!(out, "{text}").and_then(|()| out.flush()).is_ok()
}
