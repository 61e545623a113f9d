//! Slash commands for interactive mode

mod transcript;
mod upload;

pub use transcript::TranscriptCommand;
pub use upload::UploadCommand;

use std::path::PathBuf;

/// Result of parsing a slash command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandResult {
    /// Start a new chat (clears the local transcript)
    NewChat,
    /// Reload the transcript from the server
    ReloadHistory,
    /// Delete the server-side transcript (after confirmation)
    DeleteHistory,
    /// Upload a file
    Upload(PathBuf),
    /// Print the transcript
    Transcript,
    /// Show a message to the user (not sent to the backend)
    Message(String),
    /// Exit the application
    Exit,
    /// Unknown command
    Unknown(String),
}

/// Parse a slash command; `None` if `input` is ordinary chat text
pub fn execute_command(input: &str) -> Option<CommandResult> {
    let input = input.trim();
    let rest = input.strip_prefix('/')?;

    let (command, args) = match rest.split_once(char::is_whitespace) {
        Some((command, args)) => (command, args.trim()),
        None => (rest, ""),
    };

    Some(match command.to_lowercase().as_str() {
        "help" | "h" | "?" => CommandResult::Message(help_message()),

        "new" | "n" | "clear" => CommandResult::NewChat,

        "history" => CommandResult::ReloadHistory,

        "delete-history" => CommandResult::DeleteHistory,

        "upload" | "u" => UploadCommand::execute(args),

        "transcript" | "t" => CommandResult::Transcript,

        "quit" | "exit" | "q" => CommandResult::Exit,

        other => CommandResult::Unknown(other.to_string()),
    })
}

/// One line typed at the interactive prompt
#[derive(Debug, Clone, PartialEq)]
pub enum ReplInput<'a> {
    Blank,
    Command(CommandResult),
    /// Chat text, exactly as typed
    Message(&'a str),
}

/// Classify a prompt line. Whitespace only matters for detecting blank
/// lines and commands; messages keep it.
pub fn classify_line(line: &str) -> ReplInput<'_> {
    if line.trim().is_empty() {
        return ReplInput::Blank;
    }
    match execute_command(line) {
        Some(result) => ReplInput::Command(result),
        None => ReplInput::Message(line),
    }
}

/// Whether a confirmation answer means yes
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

fn help_message() -> String {
    r#"Available commands:
  /help, /h, /?           Show this help message
  /new, /n, /clear        Start a new chat
  /history                Reload the transcript from the server
  /delete-history         Delete all server-side history (asks first)
  /upload, /u <path>      Upload a file
  /transcript, /t         Print the conversation so far
  /quit, /exit, /q        Exit chatline

Press Ctrl-C while a response is streaming to abort it."#
        .to_string()
}
