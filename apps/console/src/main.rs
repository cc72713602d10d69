mod commands;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use clap::Parser;
use client_core::{
    error::EMPTY_QUESTION, load_settings, AssistantApi, AssistantSession, HttpAssistantApi,
    PendingFile, SessionEvent, UiAction, WorkflowError,
};
use shared::domain::Sender;
use tokio::{
    io::{stdin, AsyncBufReadExt, BufReader},
    sync::broadcast::error::RecvError,
};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::commands::{parse_line, Command, HELP};

#[derive(Parser, Debug)]
#[command(about = "Terminal front end for the study assistant service")]
struct Args {
    /// Overrides the backend url from settings and environment.
    #[arg(long)]
    backend_url: Option<String>,
    /// Settings file; defaults to ./assistant.toml when present.
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.settings.as_deref()).context("loading settings")?;
    if let Some(raw) = args.backend_url.as_deref() {
        settings = settings
            .with_backend_url(raw)
            .context("parsing --backend-url")?;
    }
    let http = HttpAssistantApi::new(settings.backend_url);
    info!(backend_url = %http.base_url(), "console: starting");

    let api: Arc<dyn AssistantApi> = Arc::new(http);
    match api.health().await {
        Ok(welcome) => println!("{}", welcome.message),
        Err(err) => warn!(error = %err, "console: service probe failed"),
    }

    let session = Arc::new(AssistantSession::start(api).await);
    tokio::spawn(print_events(session.subscribe()));
    println!("type `help` for commands");

    let mut lines = BufReader::new(stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let command = match parse_line(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{err}");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        run(&session, command).await;
    }
    Ok(())
}

async fn run(session: &Arc<AssistantSession>, command: Command) {
    match command {
        Command::Add(paths) => {
            let mut files = Vec::with_capacity(paths.len());
            for path in paths {
                match PendingFile::from_path(&path).await {
                    Ok(file) => files.push(file),
                    Err(err) => {
                        println!("{err:#}");
                        return;
                    }
                }
            }
            dispatch_now(session, UiAction::AddFiles(files)).await;
        }
        Command::Remove(index) => dispatch_now(session, UiAction::RemoveFile(index)).await,
        Command::Title(title) => dispatch_now(session, UiAction::SetNoteTitle(title)).await,
        Command::Note(content) => dispatch_now(session, UiAction::SetNoteContent(content)).await,
        Command::Set { field, value } => {
            dispatch_now(session, UiAction::EditConfig { field, value }).await
        }
        Command::Upload => dispatch_in_background(session, vec![UiAction::UploadBatch]),
        Command::SendNote => dispatch_in_background(session, vec![UiAction::SubmitNote]),
        Command::Ask(question) => dispatch_in_background(
            session,
            vec![UiAction::SetQuestion(question), UiAction::SubmitQuestion],
        ),
        Command::Save => dispatch_in_background(session, vec![UiAction::SaveConfig]),
        Command::Reload => dispatch_in_background(session, vec![UiAction::ReloadConfig]),
        Command::Summarize { text, detail } => {
            dispatch_in_background(session, vec![UiAction::Summarize { text, detail }])
        }
        Command::Files => {
            let names = session.documents().file_names();
            if names.is_empty() {
                println!("no files staged");
            }
            for (index, name) in names.iter().enumerate() {
                println!("{index}: {name}");
            }
        }
        Command::History => {
            for message in session.chat().transcript() {
                let who = match message.sender {
                    Sender::User => "you",
                    Sender::Assistant => "assistant",
                };
                println!("{who}: {}", message.text);
            }
        }
        Command::Config => match session.config().working_copy() {
            Some(config) => match serde_json::to_string_pretty(&config) {
                Ok(rendered) => println!("{rendered}"),
                Err(err) => println!("failed to render config: {err}"),
            },
            None => println!("config not loaded, try `reload`"),
        },
        Command::Status => {
            let snapshot = session.snapshot();
            println!("busy: {}", snapshot.busy);
            println!("documents: {}", snapshot.batch_status);
            println!("notes: {}", snapshot.note_status);
            println!("config: {}", snapshot.config_status);
            println!("summary: {}", snapshot.summary_status);
            if let Some(summary) = snapshot.summary {
                println!("latest summary: {summary}");
            }
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => {}
    }
}

async fn dispatch_now(session: &AssistantSession, action: UiAction) {
    if let Err(err) = session.dispatch(action).await {
        report(&err);
    }
}

/// Network actions run off the input loop so the busy gate is observable.
fn dispatch_in_background(session: &Arc<AssistantSession>, actions: Vec<UiAction>) {
    let session = Arc::clone(session);
    tokio::spawn(async move {
        for action in actions {
            if let Err(err) = session.dispatch(action).await {
                report(&err);
                return;
            }
        }
    });
}

/// Prints failures that no status line or transcript entry already shows.
fn report(err: &WorkflowError) {
    match err {
        WorkflowError::Busy(_)
        | WorkflowError::ConfigNotLoaded
        | WorkflowError::ConfigEdit(_)
        | WorkflowError::Validation(EMPTY_QUESTION) => println!("{err}"),
        WorkflowError::Request(request) => debug!(
            operation = %request.operation(),
            error = %request,
            "console: request failed"
        ),
        other => debug!(error = %other, "console: action failed"),
    }
}

async fn print_events(mut events: tokio::sync::broadcast::Receiver<SessionEvent>) {
    loop {
        match events.recv().await {
            Ok(SessionEvent::StatusChanged { panel, message }) => {
                println!("[{panel}] {message}")
            }
            Ok(SessionEvent::TranscriptAppended(message)) if message.sender == Sender::Assistant => {
                println!("assistant: {}", message.text)
            }
            Ok(_) => {}
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "console: event printer lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}
