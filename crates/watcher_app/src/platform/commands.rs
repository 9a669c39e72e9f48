//! Line protocol read from stdin.

use thiserror::Error;
use watcher_core::Msg;

pub const HELP: &str = "\
commands:
  toggle            start if idle, stop if active
  start | stop      switch detection on or off
  folder <name>     destination folder below the download root
  pattern <text>    match pattern, bare or /body/flags
  load <url>        report a resource load from the page
  status            print the current status
  help              show this text
  quit              exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Forwarded to the controller unchanged.
    Dispatch(Msg),
    Load(String),
    Status,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command {0:?}, try `help`")]
    Unknown(String),
    #[error("`{0}` needs an argument")]
    MissingArgument(&'static str),
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse_command(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word.to_ascii_lowercase().as_str() {
        "toggle" => Command::Dispatch(Msg::ToggleRequested),
        "start" => Command::Dispatch(Msg::StartRequested),
        "stop" => Command::Dispatch(Msg::StopRequested),
        // An empty folder is valid input; the controller substitutes the default.
        "folder" => Command::Dispatch(Msg::FolderEntered(rest.to_string())),
        "pattern" => Command::Dispatch(Msg::PatternEntered(required(rest, "pattern")?)),
        "load" => Command::Load(required(rest, "load")?),
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        _ => return Err(CommandError::Unknown(word.to_string())),
    };
    Ok(Some(command))
}

fn required(rest: &str, command: &'static str) -> Result<String, CommandError> {
    if rest.is_empty() {
        Err(CommandError::MissingArgument(command))
    } else {
        Ok(rest.to_string())
    }
}
