//! Terminal front end for a DevoChat backend.
//!
//! Usage:
//!   devochat conversations
//!   devochat chat "Hello"                     start a conversation
//!   devochat chat --conversation <id> "More"  continue one
//!   devochat view <id>                        print a public transcript
//!
//! Sessions are cookie based and live for one invocation, so commands that
//! need a signed-in user take `--email` / `DEVOCHAT_EMAIL` and
//! `DEVOCHAT_PASSWORD`.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use devochat::chat::{ContentPart, Role};
use devochat::observability::init_logging;
use devochat::observability::redact::RedactedString;
use devochat::render::render_plain;
use devochat::upload::LocalFile;
use devochat::{App, ChatSession, ClientConfig, StreamOutcome, Transcript};
use tracing::info;

#[derive(Parser)]
#[command(name = "devochat", version, about = "DevoChat terminal client")]
struct Cli {
    /// Path to config file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Backend origin, overrides the config file
    #[arg(long, env = "DEVOCHAT_API_URL")]
    base_url: Option<String>,

    /// Account email used to sign in before the command runs
    #[arg(long, env = "DEVOCHAT_EMAIL")]
    email: Option<String>,

    #[arg(long, env = "DEVOCHAT_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List conversations, starred first
    Conversations {
        /// Only show aliases containing this text
        #[arg(short, long)]
        search: Option<String>,
    },
    /// List the models offered by the backend
    Models,
    /// Send a message and stream the reply
    Chat {
        /// Continue this conversation instead of starting a new one
        #[arg(long)]
        conversation: Option<String>,
        /// Model to use
        #[arg(short, long)]
        model: Option<String>,
        /// Files to attach
        #[arg(short, long = "attach")]
        attach: Vec<PathBuf>,
        message: String,
    },
    /// Print a conversation without signing in
    View { conversation_id: String },
    /// Rename a conversation
    Rename { conversation_id: String, alias: String },
    /// Star or unstar a conversation
    Star {
        conversation_id: String,
        #[arg(long)]
        off: bool,
    },
    /// Delete a conversation
    Delete { conversation_id: String },
    /// Write the effective configuration to the config file
    InitConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(devochat::app_dirs::config_file);
    let mut config = ClientConfig::load(&config_path)?;
    if let Some(url) = &cli.base_url {
        config.apply_base_url_override(url);
    }
    let _log_guard = init_logging(&config.logging);

    if matches!(cli.command, Command::InitConfig) {
        config.save_to_file(&config_path)?;
        println!("Wrote {}", config_path.display());
        return Ok(());
    }

    let app = App::new(config)?;
    if let Command::View { conversation_id } = &cli.command {
        let transcript = app.view_conversation(conversation_id).await?;
        print_transcript(&transcript);
        return Ok(());
    }

    sign_in(&app, &cli).await?;

    match cli.command {
        Command::Conversations { search } => {
            let state = app.conversations().get();
            if let Some(error) = &state.error {
                bail!("{error}");
            }
            let listed = match search.as_deref() {
                Some(query) => state.search(query),
                None => state.sorted(),
            };
            for conversation in listed {
                let star = if conversation.starred { "*" } else { " " };
                println!("{star} {}  {}", conversation.conversation_id, conversation.alias);
            }
        }
        Command::Models => {
            let settings = app.settings().get();
            for model in &settings.catalog.models {
                let marker = if model.model_name == settings.model { ">" } else { " " };
                println!("{marker} {:<32} {}", model.model_name, model.display_name());
            }
        }
        Command::Chat {
            conversation,
            model,
            attach,
            message,
        } => {
            if let Some(model) = &model {
                app.settings().update(|s| s.update_model(model, None));
            }
            let files = upload_attachments(&app, &attach).await?;
            chat(&app, conversation, &message, files).await?;
        }
        Command::Rename {
            conversation_id,
            alias,
        } => app.rename_conversation(&conversation_id, &alias).await?,
        Command::Star {
            conversation_id,
            off,
        } => app.star_conversation(&conversation_id, !off).await?,
        Command::Delete { conversation_id } => app.delete_conversation(&conversation_id).await?,
        Command::View { .. } | Command::InitConfig => {}
    }

    for notice in app.take_notices() {
        eprintln!("{notice}");
    }
    Ok(())
}

async fn sign_in(app: &App, cli: &Cli) -> anyhow::Result<()> {
    let auth = match (&cli.email, &cli.password) {
        (Some(email), Some(password)) => {
            let password = RedactedString::new(password.as_str());
            match app.login(email, &password).await {
                Ok(auth) => auth,
                Err(e) => bail!("login failed: {}", e.message()),
            }
        }
        (Some(_), None) => bail!("DEVOCHAT_PASSWORD is not set"),
        _ => app.bootstrap().await,
    };
    if !auth.logged_in {
        bail!("not signed in; pass --email and set DEVOCHAT_PASSWORD");
    }
    info!(admin = auth.admin, "signed in");
    Ok(())
}

async fn upload_attachments(app: &App, paths: &[PathBuf]) -> anyhow::Result<Vec<ContentPart>> {
    if paths.is_empty() {
        return Ok(Vec::new());
    }
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = LocalFile::read(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        files.push(file);
    }
    let queue = app.upload_queue();
    let can_read_image = app.settings().read(|s| s.can_read_image);
    let report = queue.process_files(files, can_read_image).await?;
    for notice in &report.notices {
        eprintln!("{notice}");
    }
    Ok(queue.take_ready())
}

async fn chat(
    app: &App,
    conversation: Option<String>,
    message: &str,
    files: Vec<ContentPart>,
) -> anyhow::Result<()> {
    let outcome = match conversation {
        Some(id) => {
            let session = app.open_conversation(&id).await?;
            stream_into_terminal(&session, app, message, files).await?
        }
        None => {
            // The session only exists once the conversation is created, so
            // the reply is printed when the stream ends.
            let (session, outcome) = app.start_conversation(message, files).await?;
            session.transcript().read(|t| {
                if let Some(reply) = t.messages.last().and_then(render_plain) {
                    println!("{reply}");
                }
            });
            outcome
        }
    };
    match outcome {
        StreamOutcome::Completed | StreamOutcome::Superseded => Ok(()),
        StreamOutcome::Cancelled => {
            eprintln!("(stopped)");
            Ok(())
        }
        StreamOutcome::ServerError(msg) | StreamOutcome::Failed(msg) => bail!(msg),
    }
}

/// Send on an open session and print the reply as it grows. Ctrl+C stops
/// the stream; the partial reply stays in the transcript.
async fn stream_into_terminal(
    session: &ChatSession,
    app: &App,
    message: &str,
    files: Vec<ContentPart>,
) -> anyhow::Result<StreamOutcome> {
    let settings = app.settings().get();
    let reply_index = session.transcript().read(Transcript::len) + 1;
    let mut updates = session.transcript().subscribe();
    let mut printed = String::new();

    let send = session.send(message, files, &settings);
    tokio::pin!(send);
    let outcome = loop {
        tokio::select! {
            output = &mut send => break output,
            Ok(()) = updates.changed() => {
                let transcript = updates.borrow_and_update().clone();
                print_tail(&transcript, reply_index, &mut printed);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("received Ctrl+C, stopping the reply");
                session.stop();
            }
        }
    };
    print_tail(&session.transcript().get(), reply_index, &mut printed);
    println!();
    Ok(outcome?)
}

/// Write whatever `transcript.messages[index]` renders beyond `printed`.
/// A rendering that no longer extends what was printed is written whole.
fn print_tail(transcript: &Transcript, index: usize, printed: &mut String) {
    let Some(rendered) = transcript.messages.get(index).and_then(render_plain) else {
        return;
    };
    match rendered.strip_prefix(printed.as_str()) {
        Some(tail) => print!("{tail}"),
        None => print!("\n{rendered}"),
    }
    let _ = std::io::stdout().flush();
    *printed = rendered;
}

fn print_transcript(transcript: &Transcript) {
    for (_, message) in transcript.visible() {
        let Some(text) = render_plain(message) else {
            continue;
        };
        let label = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
            Role::Error => "error",
        };
        println!("[{label}]\n{text}\n");
    }
}
