use std::path::PathBuf;

use serde_json::Value;
use shared::{domain::ConfigField, error::ConfigEditError};
use thiserror::Error;

pub const HELP: &str = "\
commands:
  add <path>...              stage PDFs for upload (max 5)
  rm <index>                 unstage a file by its position in `files`
  files                      list staged files
  upload                     upload and process the staged batch
  title <text>               set the note title
  note <text>                set the note content
  send-note                  submit the note
  ask <question>             ask the assistant
  history                    print the conversation
  config                     print the working config
  set <section.key> <value>  edit one config field (value is JSON or text)
  save                       save the working config
  reload                     discard edits and fetch the config again
  summarize <text> [| <detail>]
  status                     print every panel status
  help
  quit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add(Vec<PathBuf>),
    Remove(usize),
    Files,
    Upload,
    Title(String),
    Note(String),
    SendNote,
    Ask(String),
    History,
    Config,
    Set { field: ConfigField, value: Value },
    Save,
    Reload,
    Summarize { text: String, detail: Option<String> },
    Status,
    Help,
    Quit,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown command `{0}`, try `help`")]
    Unknown(String),
    #[error("usage: {0}")]
    Usage(&'static str),
    #[error("`{0}` is not a file index")]
    BadIndex(String),
    #[error(transparent)]
    Field(#[from] ConfigEditError),
}

/// Parses one input line. Blank lines yield `Ok(None)`.
pub fn parse_line(line: &str) -> Result<Option<Command>, CommandError> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let command = match word {
        "add" => {
            let paths: Vec<PathBuf> = rest.split_whitespace().map(PathBuf::from).collect();
            if paths.is_empty() {
                return Err(CommandError::Usage("add <path>..."));
            }
            Command::Add(paths)
        }
        "rm" => {
            if rest.is_empty() {
                return Err(CommandError::Usage("rm <index>"));
            }
            let index = rest
                .parse()
                .map_err(|_| CommandError::BadIndex(rest.to_string()))?;
            Command::Remove(index)
        }
        "files" => Command::Files,
        "upload" => Command::Upload,
        "title" => Command::Title(rest.to_string()),
        "note" => Command::Note(rest.to_string()),
        "send-note" => Command::SendNote,
        "ask" => Command::Ask(rest.to_string()),
        "history" => Command::History,
        "config" => Command::Config,
        "set" => {
            let (path, raw) = rest
                .split_once(char::is_whitespace)
                .ok_or(CommandError::Usage("set <section.key> <value>"))?;
            Command::Set {
                field: path.parse()?,
                value: parse_value(raw.trim()),
            }
        }
        "save" => Command::Save,
        "reload" => Command::Reload,
        "summarize" => {
            let (text, detail) = match rest.rsplit_once(" | ") {
                Some((text, detail)) => (text.trim(), Some(detail.trim().to_string())),
                None => (rest, None),
            };
            Command::Summarize {
                text: text.to_string(),
                detail: detail.filter(|detail| !detail.is_empty()),
            }
        }
        "status" => Command::Status,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(CommandError::Unknown(other.to_string())),
    };
    Ok(Some(command))
}

fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}
