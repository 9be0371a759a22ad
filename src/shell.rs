//! Operator shell: command parsing and execution against a [`SatelliteAgent`].
//!
//! Line I/O is left to the caller. Commands that need a pasted JSON document
//! (`connect_json`, `save_json`) return [`Reply::AwaitDocument`]; the caller
//! collects the lines and hands them to [`submit_document`].

use crate::agent::{AgentError, SatelliteAgent};
use crate::events::Event;
use crate::registry::JoinOutcome;
use crate::store::{self, DescriptorStore, StoreError};
use serde_json::Value;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

pub const HELP_TEXT: &str = "\
Commands:
  state                         Show current satellite state
  kp <value>                    Publish SPACE_WEATHER (kp index)
  pass <minutes>                Publish NEXT_PASS (minutes to next pass)
  anomaly <signature>           Publish ANOMALY event
  connect_file <path.json>      Load a descriptor from file and try to join
  connect_json                  Paste JSON descriptor (ends with a blank line)
  disconnect <module_id>        Remove a joined module
  list_modules                  List descriptor files in the modules directory
  save_json                     Paste JSON descriptor, save it, then join
  quit / exit                   Stop the shell";

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Help,
    State,
    Kp(f64),
    Pass(i64),
    Anomaly(String),
    ConnectFile(PathBuf),
    ConnectJson,
    SaveJson,
    Disconnect(String),
    ListModules,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellError {
    #[error("empty command")]
    Empty,
    #[error("Unknown command: {0}. Type 'help'.")]
    Unknown(String),
    #[error("'{command}' needs {argument}")]
    MissingArgument {
        command: &'static str,
        argument: &'static str,
    },
    #[error("'{command}' expects a number, got '{value}'")]
    InvalidNumber { command: &'static str, value: String },
}

impl FromStr for ShellCommand {
    type Err = ShellError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let op = parts.next().ok_or(ShellError::Empty)?.to_lowercase();
        let rest: Vec<&str> = parts.collect();

        let command = match op.as_str() {
            "help" => ShellCommand::Help,
            "state" => ShellCommand::State,
            "quit" | "exit" => ShellCommand::Quit,
            "list_modules" => ShellCommand::ListModules,
            "connect_json" => ShellCommand::ConnectJson,
            "save_json" => ShellCommand::SaveJson,
            "kp" => ShellCommand::Kp(number("kp", "a kp value", &rest)?),
            "pass" => ShellCommand::Pass(number("pass", "minutes to the next pass", &rest)?),
            "anomaly" => {
                if rest.is_empty() {
                    return Err(ShellError::MissingArgument {
                        command: "anomaly",
                        argument: "a signature",
                    });
                }
                ShellCommand::Anomaly(rest.join(" "))
            }
            "connect_file" => ShellCommand::ConnectFile(PathBuf::from(first(
                "connect_file",
                "a file path",
                &rest,
            )?)),
            "disconnect" => {
                ShellCommand::Disconnect(first("disconnect", "a module id", &rest)?.to_string())
            }
            _ => return Err(ShellError::Unknown(op)),
        };
        Ok(command)
    }
}

fn first<'a>(
    command: &'static str,
    argument: &'static str,
    rest: &[&'a str],
) -> Result<&'a str, ShellError> {
    rest.first()
        .copied()
        .ok_or(ShellError::MissingArgument { command, argument })
}

fn number<T: FromStr>(
    command: &'static str,
    argument: &'static str,
    rest: &[&str],
) -> Result<T, ShellError> {
    let value = first(command, argument, rest)?;
    value.parse().map_err(|_| ShellError::InvalidNumber {
        command,
        value: value.to_string(),
    })
}

/// What the caller should do after a command ran.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Nothing to print beyond what bus subscribers already printed.
    Done,
    Text(String),
    /// Read a pasted document up to a blank line, then call [`submit_document`].
    AwaitDocument { save: bool },
    Quit,
}

/// Run one parsed command.
///
/// # Errors
///
/// Only store failures (listing the modules directory) are errors; operator
/// mistakes such as a missing file or an unknown module come back as
/// [`Reply::Text`].
pub fn execute(
    agent: &SatelliteAgent,
    store: &DescriptorStore,
    command: ShellCommand,
) -> Result<Reply, AgentError> {
    let reply = match command {
        ShellCommand::Help => Reply::Text(HELP_TEXT.to_string()),
        ShellCommand::State => Reply::Text(agent.status_report()),
        ShellCommand::Quit => Reply::Quit,
        ShellCommand::Kp(kp) => {
            agent.publish(Event::SpaceWeather { kp });
            Reply::Done
        }
        ShellCommand::Pass(minutes) => {
            agent.publish(Event::NextPass { minutes });
            Reply::Done
        }
        ShellCommand::Anomaly(signature) => {
            agent.publish(Event::Anomaly { signature });
            Reply::Done
        }
        ShellCommand::ListModules => {
            let files = store.list_files()?;
            if files.is_empty() {
                Reply::Text("(no module JSON files found)".to_string())
            } else {
                let names: Vec<String> = files
                    .iter()
                    .filter_map(|p| p.file_name())
                    .map(|n| format!("- {}", n.to_string_lossy()))
                    .collect();
                Reply::Text(names.join("\n"))
            }
        }
        ShellCommand::ConnectFile(path) => {
            if !path.exists() {
                return Ok(Reply::Text("File not found.".to_string()));
            }
            match store::load_file(&path) {
                Ok(doc) => {
                    agent.connect_module(&doc);
                    Reply::Done
                }
                Err(StoreError::Json { source, .. }) => Reply::Text(format!("Invalid JSON: {source}")),
                Err(e) => return Err(e.into()),
            }
        }
        ShellCommand::Disconnect(module_id) => {
            if agent.disconnect_module(&module_id) {
                Reply::Done
            } else {
                Reply::Text(format!("Module not joined: {module_id}"))
            }
        }
        ShellCommand::ConnectJson => Reply::AwaitDocument { save: false },
        ShellCommand::SaveJson => Reply::AwaitDocument { save: true },
    };
    Ok(reply)
}

/// Parse a pasted document, optionally persist it, then try to join it.
///
/// # Errors
///
/// Returns [`AgentError::Store`] if saving fails. Invalid JSON is reported as
/// [`Reply::Text`] and nothing is saved or submitted.
pub fn submit_document(
    agent: &SatelliteAgent,
    store: &DescriptorStore,
    raw: &str,
    save: bool,
) -> Result<(Reply, Option<JoinOutcome>), AgentError> {
    let doc: Value = match serde_json::from_str(raw) {
        Ok(doc) => doc,
        Err(e) => return Ok((Reply::Text(format!("Invalid JSON: {e}")), None)),
    };

    let reply = if save {
        let path = store.save_descriptor(&doc, None)?;
        Reply::Text(format!("Saved to {}", path.display()))
    } else {
        Reply::Done
    };
    let outcome = agent.connect_module(&doc);
    Ok((reply, Some(outcome)))
}
