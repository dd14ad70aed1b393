use clap::{CommandFactory, Parser};
use colored::*;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use vidbot_client::cli::{Args, Command};
use vidbot_client::commands::{parse_line, ReplInput, HELP};
use vidbot_client::terminal::TerminalView;
use vidbot_client::{Client, ConnectionManager, UserCommand};

const DEFAULT_LOG_FILTER: &str = "vidbot=info,vidbot_client=info";

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Read stdin lines into commands until EOF or `quit`.
async fn read_commands(commands: mpsc::UnboundedSender<UserCommand>, shutdown: watch::Sender<bool>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(error = %e, "stdin read failed");
                break;
            }
        };
        match parse_line(&line) {
            Ok(ReplInput::Command(command)) => {
                if commands.send(command).is_err() {
                    return;
                }
            }
            Ok(ReplInput::Help) => println!("{HELP}"),
            Ok(ReplInput::Empty) => {}
            Ok(ReplInput::Quit) => break,
            Err(e) => eprintln!("{} {e}", "error:".bright_red()),
        }
    }
    shutdown.send_replace(true);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    if let Some(Command::Completions { shell }) = &args.command {
        clap_complete::generate(*shell, &mut Args::command(), "vidbot", &mut std::io::stdout());
        return Ok(());
    }

    init_tracing(args.log_level.as_deref());

    let config = args.resolve_config()?;
    let endpoint = config.validated_endpoint()?;
    let params = args.page_params()?;
    info!(endpoint = %endpoint, reconnect = %config.reconnect.strategy, "starting");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let (handle, connection) = ConnectionManager::spawn(
        endpoint.as_str(),
        config.reconnect.policy(),
        events_tx,
        shutdown_rx.clone(),
    );

    let mut client = Client::new(params, &config, TerminalView::stdout(), handle);
    client.check_credentials();
    println!("{}", HELP.dimmed());

    tokio::spawn(read_commands(commands_tx, shutdown_tx.clone()));
    let ctrl_c = shutdown_tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.send_replace(true);
        }
    });

    let span = info_span!("session", id = %client.session().session_id());
    let client = client
        .run(events_rx, commands_rx, shutdown_rx)
        .instrument(span)
        .await;
    shutdown_tx.send_replace(true);
    if let Err(e) = connection.await {
        error!(error = %e, "connection task failed");
    }
    info!(
        messages = client.session().chat_history().len(),
        gave_up = client.gave_up(),
        "bye"
    );
    Ok(())
}
