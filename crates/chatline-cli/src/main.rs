//! chatline - terminal client for a streaming chat backend

mod commands;
mod config;
mod credentials;
mod password;
mod ui;

use anyhow::Context;
use chatline_api::ApiClient;
use chatline_core::{ConversationController, SendOutcome, SessionState};
use clap::Parser;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::commands::{CommandResult, ReplInput, TranscriptCommand};
use crate::credentials::{CredentialStore, Credentials};

/// chatline - chat with a streaming AI backend from the terminal
#[derive(Parser, Debug)]
#[command(name = "chatline")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend API root (default: http://localhost:5001/api)
    #[arg(long)]
    base_url: Option<String>,

    /// Give up on a response after this many seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Send a single message, print the reply and exit
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Don't load the server-side transcript on startup
    #[arg(long)]
    no_history: bool,

    /// Log in as this user (prompts for the password)
    #[arg(long)]
    login: Option<String>,

    /// Create an account for this user (prompts for email and password)
    #[arg(long)]
    signup: Option<String>,

    /// Forget saved credentials
    #[arg(long)]
    logout: bool,

    /// Show the logged-in user
    #[arg(long)]
    whoami: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    // Merge config with CLI args (CLI takes precedence)
    let mut cfg = config::Config::load();
    if let Some(url) = args.base_url {
        cfg.base_url = Some(url);
    }
    if let Some(secs) = args.timeout {
        cfg.stream_timeout_secs = Some(secs);
    }
    if args.no_history {
        cfg.load_history = Some(false);
    }

    let client = Arc::new(ApiClient::new(cfg.base_url()));
    let credentials = CredentialStore::new();

    if let Some(username) = args.login {
        return handle_login(&client, &credentials, &username).await;
    }
    if let Some(username) = args.signup {
        return handle_signup(&client, &username).await;
    }
    if args.logout {
        return handle_logout(&credentials);
    }
    if args.whoami {
        return show_whoami(&credentials);
    }

    let controller = ConversationController::new(
        cfg.controller_config(),
        client.clone(),
        Arc::new(credentials),
    )
    .with_history(client.clone())
    .with_uploads(client.clone());

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&controller, &command).await;
    }

    if io::stderr().is_terminal() {
        eprintln!("chatline ({})  type /help for commands", client.base_url());
        eprintln!();
    }

    if cfg.load_history() {
        load_history(&controller).await;
    }

    run_interactive(&controller).await
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        Some(EnvFilter::new(
            "chatline=debug,chatline_core=debug,chatline_api=debug",
        ))
    } else {
        EnvFilter::try_from_default_env().ok()
    };

    if let Some(filter) = filter {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
}

async fn run_command(controller: &ConversationController, text: &str) -> anyhow::Result<()> {
    match stream_reply(controller, text).await? {
        SendOutcome::Finished(report) if report.state == SessionState::Failed => {
            std::process::exit(1);
        }
        SendOutcome::Ignored => anyhow::bail!("Nothing to send"),
        _ => Ok(()),
    }
}

/// Send one message, printing the reply as it streams.
///
/// Ctrl-C aborts the reply instead of killing the process.
async fn stream_reply(
    controller: &ConversationController,
    text: &str,
) -> anyhow::Result<SendOutcome> {
    let mut events = controller.subscribe();
    let mut printer = ui::StreamPrinter::default();
    let mut stdout = io::stdout();

    let send = controller.send_message(text);
    tokio::pin!(send);

    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome?,
            Ok(event) = events.recv() => printer.render(&event, &mut stdout)?,
            Ok(()) = tokio::signal::ctrl_c() => controller.abort(),
        }
    };

    // Events emitted in the same poll as completion
    while let Ok(event) = events.try_recv() {
        printer.render(&event, &mut stdout)?;
    }

    Ok(outcome)
}

async fn load_history(controller: &ConversationController) {
    match controller.load_history().await {
        Ok(0) => {}
        Ok(count) => {
            println!("{}", TranscriptCommand::render(&controller.messages()));
            println!("[{} messages loaded]\n", count);
        }
        Err(e) if e.is_unauthorized() => {
            eprintln!("Not logged in: {}", e);
            eprintln!("Log in with: chatline --login <username>\n");
        }
        Err(e) => {
            eprintln!("Warning: could not load history: {}\n", e);
        }
    }
}

async fn run_interactive(controller: &ConversationController) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                break;
            }
        };
        // EOF
        let Some(line) = line else {
            break;
        };

        let text = match commands::classify_line(&line) {
            ReplInput::Blank => continue,
            ReplInput::Message(text) => text,
            ReplInput::Command(result) => {
                match result {
                    CommandResult::NewChat => {
                        controller.new_chat();
                        println!("Started a new chat.");
                    }
                    CommandResult::ReloadHistory => {
                        load_history(controller).await;
                    }
                    CommandResult::DeleteHistory => {
                        print!("Delete all chat history on the server? [y/N] ");
                        io::stdout().flush()?;
                        let answer = lines.next_line().await?.unwrap_or_default();
                        if commands::is_affirmative(&answer) {
                            match controller.delete_history().await {
                                Ok(notice) => println!("{}", notice),
                                Err(e) => eprintln!("Error: {}", e),
                            }
                        } else {
                            println!("Cancelled.");
                        }
                    }
                    CommandResult::Upload(path) => match controller.upload_file(&path).await {
                        Ok(receipt) => println!("Uploaded: {}", receipt.filename),
                        Err(e) => eprintln!("Upload failed: {}", e),
                    },
                    CommandResult::Transcript => {
                        println!("{}", TranscriptCommand::render(&controller.messages()));
                    }
                    CommandResult::Message(msg) => {
                        println!("{}", msg);
                    }
                    CommandResult::Exit => {
                        break;
                    }
                    CommandResult::Unknown(cmd) => {
                        println!("Unknown command: /{}", cmd);
                        println!("Type /help for available commands.");
                    }
                }
                println!();
                continue;
            }
        };

        println!();
        if let SendOutcome::Busy = stream_reply(controller, text).await? {
            println!("Still responding; try again when the reply has finished.");
        }
        println!();
    }

    Ok(())
}

/// Read one line from stdin after printing `label`
fn prompt(label: &str) -> io::Result<String> {
    print!("{}", label);
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim_end_matches(['\r', '\n']).to_string())
}

async fn handle_login(
    client: &ApiClient,
    store: &CredentialStore,
    username: &str,
) -> anyhow::Result<()> {
    let password = password::read_password("Password: ")?;
    let login = client
        .login(username, &password)
        .await
        .context("Login failed")?;

    let credentials = Credentials::from(login);
    store
        .save(&credentials)
        .context("Failed to save credentials")?;

    println!("Logged in as {}", credentials.username);
    println!("Credentials saved to {}", store.path().display());
    Ok(())
}

async fn handle_signup(client: &ApiClient, username: &str) -> anyhow::Result<()> {
    let email = prompt("Email: ")?;
    let password = password::read_password("Password: ")?;
    let notice = client
        .signup(username, &email, &password)
        .await
        .context("Signup failed")?;

    println!("{}", notice);
    println!("Log in with: chatline --login {}", username);
    Ok(())
}

fn handle_logout(store: &CredentialStore) -> anyhow::Result<()> {
    if store.remove().context("Failed to remove credentials")? {
        println!("Logged out.");
    } else {
        println!("Not logged in.");
    }
    Ok(())
}

fn show_whoami(store: &CredentialStore) -> anyhow::Result<()> {
    match store.load() {
        Some(credentials) => println!(
            "Logged in as {} (user id {})",
            credentials.username, credentials.user_id
        ),
        None => println!("Not logged in."),
    }
    Ok(())
}
