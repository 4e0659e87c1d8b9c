use crate::error::SheetError;
use crate::models::format_score;
use crate::storage::{LockMode, SheetStore, render};
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser};
use colored::*;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

pub const COMMANDS: &str = "COMMANDS:
    <name> <topic>:<score>       Record a score for a person
    keys | names                 List everyone on the sheet
    read | show [<name>]         Show a person's scores, or the whole sheet
    show with <key>[:<value>]    Find people with a task, optionally a given score
    edit                         Open the sheet in an editor
    delete                       Delete the sheet (asks first)
    help                         Print this message";

#[derive(Parser, Debug)]
#[command(name = "tutoria")]
#[command(version)]
#[command(about = "Keep score of people's tasks from the terminal")]
#[command(after_help = COMMANDS)]
pub struct Cli {
    /// Base directory for user data; the sheet lives in <DIR>/tutoria
    #[arg(long, env = "XDG_DATA_HOME", value_name = "DIR")]
    pub data_home: Option<PathBuf>,

    /// Editor used by `edit`
    #[arg(long, env = "EDITOR", value_name = "CMD")]
    pub editor: Option<String>,

    /// Do not ask before deleting the sheet
    #[arg(short, long)]
    pub yes: bool,

    /// Enable verbose output for debugging
    #[arg(short, long)]
    pub verbose: bool,

    #[arg(value_name = "COMMAND")]
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Help,
    Edit,
    Delete,
    Names,
    Search { key: String, value: String },
    Read { person: Option<String> },
    Upsert { person: String, task: String, score: f64 },
}

impl Command {
    pub fn parse(tokens: &[String]) -> Result<Command, SheetError> {
        let words: Vec<&str> = tokens.iter().map(String::as_str).collect();
        match words.as_slice() {
            [] | ["help", ..] => Ok(Command::Help),
            ["edit"] => Ok(Command::Edit),
            ["delete"] => Ok(Command::Delete),
            ["keys" | "names"] => Ok(Command::Names),
            ["show", "with", query] => parse_query(query),
            ["show", "with", ..] => Err(SheetError::InvalidArgument(
                "usage: show with <key>[:<value>]".into(),
            )),
            ["read" | "show"] => Ok(Command::Read { person: None }),
            ["read" | "show", person] => Ok(Command::Read {
                person: Some(person.to_string()),
            }),
            [cmd @ ("edit" | "delete" | "keys" | "names" | "read" | "show"), ..] => Err(
                SheetError::InvalidArgument(format!("too many arguments for '{cmd}'")),
            ),
            [person, entry] => parse_entry(person, entry),
            _ => Err(SheetError::InvalidArgument(format!(
                "unrecognized command '{}'",
                words.join(" ")
            ))),
        }
    }
}

fn parse_query(query: &str) -> Result<Command, SheetError> {
    let (key, value) = query.split_once(':').unwrap_or((query, ""));
    let key = key.trim();
    if key.is_empty() {
        return Err(SheetError::InvalidArgument(format!(
            "missing task name in '{query}'"
        )));
    }
    Ok(Command::Search {
        key: key.to_string(),
        value: value.trim().to_string(),
    })
}

fn parse_entry(person: &str, entry: &str) -> Result<Command, SheetError> {
    let invalid = |msg: String| SheetError::InvalidArgument(msg);
    let person = person.trim();
    if person.is_empty() {
        return Err(invalid("name must not be empty".into()));
    }
    let (task, score) = match entry.split_once(':') {
        Some((task, score)) if !score.contains(':') => (task.trim(), score.trim()),
        _ => return Err(invalid(format!("expected <topic>:<score>, got '{entry}'"))),
    };
    if task.is_empty() {
        return Err(invalid(format!("missing topic in '{entry}'")));
    }
    let score: f64 = score
        .parse()
        .map_err(|_| invalid(format!("score '{score}' is not a number")))?;
    if !score.is_finite() {
        return Err(invalid(format!("score '{score}' is not a finite number")));
    }
    Ok(Command::Upsert {
        person: person.to_string(),
        task: task.to_string(),
        score,
    })
}

/// Everything a command needs, resolved up front.
pub struct Dispatcher {
    pub store: SheetStore,
    pub editor: String,
    pub assume_yes: bool,
    pub indent: usize,
}

impl Dispatcher {
    pub fn run(&self, command: Command) -> Result<ExitCode> {
        tracing::debug!(?command, dir = %self.store.dir().display(), "dispatching");
        match command {
            Command::Help => {
                print_usage();
                Ok(ExitCode::from(1))
            }
            Command::Edit => self.edit(),
            Command::Delete => self.delete(),
            Command::Names => self.names(),
            Command::Search { key, value } => self.search(&key, &value),
            Command::Read { person } => self.read(person.as_deref()),
            Command::Upsert {
                person,
                task,
                score,
            } => self.upsert(&person, &task, score),
        }
    }

    fn names(&self) -> Result<ExitCode> {
        let _guard = self.store.lock(LockMode::Shared)?;
        let sheet = self.store.load()?;
        if sheet.is_empty() {
            println!("{}", "No names recorded yet.".dimmed());
        }
        for (i, name) in sheet.names().enumerate() {
            println!("{}: {}", i + 1, name);
        }
        Ok(ExitCode::SUCCESS)
    }

    fn read(&self, person: Option<&str>) -> Result<ExitCode> {
        let _guard = self.store.lock(LockMode::Shared)?;
        let sheet = self.store.load()?;
        let Some(person) = person else {
            let body = render(&sheet, self.indent)?;
            print!("{}", String::from_utf8_lossy(&body));
            return Ok(ExitCode::SUCCESS);
        };
        let tasks = match sheet.person(person) {
            Ok(tasks) => tasks,
            Err(err @ SheetError::NotFound(_)) => {
                println!("{}", err.to_string().yellow());
                return Ok(ExitCode::SUCCESS);
            }
            Err(err) => return Err(err.into()),
        };
        for line in aligned_lines(tasks) {
            println!("{line}");
        }
        Ok(ExitCode::SUCCESS)
    }

    fn search(&self, key: &str, value: &str) -> Result<ExitCode> {
        let _guard = self.store.lock(LockMode::Shared)?;
        let sheet = self.store.load()?;
        let hits = sheet.search(key, value);
        if hits.is_empty() {
            let what = if value.is_empty() {
                format!("No one found with '{key}'")
            } else {
                format!("No one found with '{key}' = '{value}'")
            };
            println!("{}", what.yellow());
        }
        for hit in hits {
            println!("Found '{}' for '{}'", hit.person, hit.value);
        }
        Ok(ExitCode::SUCCESS)
    }

    fn upsert(&self, person: &str, task: &str, score: f64) -> Result<ExitCode> {
        self.store
            .update(|sheet| sheet.upsert_score(person, task, score))?;
        tracing::info!(person, task, score, "score recorded");
        println!(
            "{} {task}: {} for {person}",
            "Recorded".green(),
            format_score(score)
        );
        Ok(ExitCode::SUCCESS)
    }

    fn delete(&self) -> Result<ExitCode> {
        let path = self.store.sheet_path();
        if !path.exists() {
            println!("{}", "No sheet to delete.".dimmed());
            return Ok(ExitCode::SUCCESS);
        }
        let prompt = "Are you sure you want to delete the sheet? [type anything to confirm]: ";
        if !self.assume_yes && !confirm(prompt)? {
            println!("Sheet not deleted");
            return Ok(ExitCode::SUCCESS);
        }
        if self.store.delete()? {
            println!("{} {}", "Deleted".green(), path.display());
        } else {
            println!("{}", "No sheet to delete.".dimmed());
        }
        Ok(ExitCode::SUCCESS)
    }

    fn edit(&self) -> Result<ExitCode> {
        let path = std::path::absolute(self.store.sheet_path())?;
        let mut parts = self.editor.split_whitespace();
        let program = parts.next().unwrap_or(self.editor.as_str());

        let status = {
            let _guard = self.store.lock(LockMode::Exclusive)?;
            std::process::Command::new(program)
                .args(parts)
                .arg(&path)
                .status()
                .with_context(|| format!("Failed to launch editor '{}'", self.editor))?
        };

        let code = status.code().unwrap_or(1);
        tracing::debug!(code, "editor exited");
        if status.success() {
            if let Err(err) = self.store.load() {
                eprintln!("{} {err}", "warning:".yellow());
            }
        }
        Ok(ExitCode::from(u8::try_from(code).unwrap_or(1)))
    }
}

/// `key: value` lines padded to the longest key.
pub fn aligned_lines(tasks: &crate::models::TaskMap) -> Vec<String> {
    let width = tasks.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    tasks
        .iter()
        .map(|(k, v)| format!("{k:<width$}: {}", format_score(*v)))
        .collect()
}

pub fn print_usage() {
    println!("{}", Cli::command().render_help());
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(!input.trim().is_empty())
}
