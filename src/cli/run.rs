//! Command execution for the CLI.

use crate::cli::Command;
use crate::error::{Error, ErrorKind, Result};
use crate::storage::SharedTaskStore;
use crate::tasks::requests::{self, NewTaskRequest, UpdateTaskRequest};
use crate::tasks::{Task, TaskRecord};
use serde::Serialize;
use std::io::Read;
use std::process::ExitCode;

/// Output from running the CLI, with separate stdout and stderr messages.
#[derive(Debug)]
pub struct CliOutput {
    /// Exit code for the process.
    pub exit_code: ExitCode,
    /// Messages to print to stdout.
    pub stdout: Vec<String>,
    /// Messages to print to stderr.
    pub stderr: Vec<String>,
}

impl CliOutput {
    fn success(stdout: String) -> Self {
        Self { exit_code: ExitCode::SUCCESS, stdout: vec![stdout], stderr: vec![] }
    }

    /// Report `err` on stderr with the exit code for its kind.
    #[must_use]
    pub fn failure(err: &Error) -> Self {
        Self {
            exit_code: ExitCode::from(exit_code_for(err.kind())),
            stdout: vec![],
            stderr: vec![format!("Error: {err}")],
        }
    }
}

/// Process exit code for an error kind.
///
/// 1 is a storage or configuration failure, 2 a bad request (malformed
/// body, unknown referenced task, cycle), 3 an unknown target task.
#[must_use]
pub const fn exit_code_for(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::NotFound => 3,
        ErrorKind::InvalidRequest | ErrorKind::UnableToCreate | ErrorKind::Cycle => 2,
        ErrorKind::Io | ErrorKind::Decode | ErrorKind::Config => 1,
    }
}

#[derive(Serialize)]
struct Deleted {
    deleted: Vec<String>,
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| Error::io("<stdout>", e.into()))
}

/// Read a whole request body.
///
/// # Errors
///
/// Returns [`Error::Io`] if the input cannot be read as UTF-8 text.
pub fn read_input(mut reader: impl Read) -> Result<String> {
    let mut input = String::new();
    reader.read_to_string(&mut input).map_err(|e| Error::io("<stdin>", e))?;
    Ok(input)
}

/// Run a CLI command against `store`, with `stdin` holding any request body.
pub fn run(command: Command, store: &SharedTaskStore, stdin: &str) -> CliOutput {
    match execute(command, store, stdin) {
        Ok(json) => CliOutput::success(json),
        Err(err) => {
            tracing::debug!(error = %err, kind = ?err.kind(), "command failed");
            CliOutput::failure(&err)
        }
    }
}

fn execute(command: Command, store: &SharedTaskStore, stdin: &str) -> Result<String> {
    match command {
        Command::List { all } => {
            let records: Vec<TaskRecord> = store.read(|tasks| {
                requests::list_tasks(tasks, all).iter().map(Task::to_record).collect()
            })?;
            to_json(&records)
        }
        Command::Show { id } => {
            let record = store.read(|tasks| tasks.get_required(&id).map(Task::to_record))??;
            to_json(&record)
        }
        Command::New { name, parents, due, categories } => {
            let request = NewTaskRequest { name, parent_ids: parents, due_date: due, categories };
            let task = store.transact(|tasks| requests::create_task(tasks, &request))?;
            to_json(&task.to_record())
        }
        Command::ApplyNew => {
            let request = requests::parse_new_task(stdin)?;
            let task = store.transact(|tasks| requests::create_task(tasks, &request))?;
            to_json(&task.to_record())
        }
        Command::Update {
            id,
            name,
            complete,
            incomplete,
            subtasks,
            parents,
            remove_subtasks,
            remove_parents,
            due,
            categories,
        } => {
            let request = UpdateTaskRequest {
                name,
                complete: match (complete, incomplete) {
                    (true, _) => Some(true),
                    (_, true) => Some(false),
                    _ => None,
                },
                subtask_ids: subtasks,
                parent_ids: parents,
                remove_subtask_ids: remove_subtasks,
                remove_parent_ids: remove_parents,
                due_date: due,
                categories: (!categories.is_empty()).then_some(categories),
            };
            let task = store.transact(|tasks| requests::update_task(tasks, &id, &request))?;
            to_json(&task.to_record())
        }
        Command::ApplyUpdate { id } => {
            let request = requests::parse_update_task(stdin)?;
            let task = store.transact(|tasks| requests::update_task(tasks, &id, &request))?;
            to_json(&task.to_record())
        }
        Command::Delete { id } => {
            let deleted = store.transact(|tasks| tasks.delete_task(&id))?;
            to_json(&Deleted { deleted })
        }
    }
}
