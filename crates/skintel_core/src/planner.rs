//! The planning collaborator seam.
//!
//! A [`Planner`] expands one week of the externally authored plan into raw
//! task content. The engine never trusts that content: [`parse_week_drafts`]
//! pulls the first JSON object out of whatever came back and checks it
//! against the per-week task structure before anything is persisted.

use crate::error::EngineError;
use crate::model::{Category, Priority, TimeOfDay, WeeklyPlanEntry};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;
use tracing::warn;
use wait_timeout::ChildExt;

const PLANNER_ENV_VAR: &str = "SKINTEL_PLANNER_CMD";
pub const PLANNER_TIMEOUT: Duration = Duration::from_secs(120);

pub trait Planner: Send + Sync {
    fn draft_week(&self, user_id: &str, entry: &WeeklyPlanEntry) -> Result<String, EngineError>;
}

/// Used when no planner is configured; every generation attempt fails.
pub struct UnavailablePlanner;

impl Planner for UnavailablePlanner {
    fn draft_week(&self, _user_id: &str, entry: &WeeklyPlanEntry) -> Result<String, EngineError> {
        Err(EngineError::generation_failed(format!(
            "no planner configured for week {}",
            entry.week
        )))
    }
}

/// Runs an external program per week, writing the request as JSON to its
/// stdin and reading the drafted tasks from stdout. A run that outlives the
/// timeout is killed and counts as a failed draft.
#[derive(Debug, Clone)]
pub struct CommandPlanner {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PlannerRequest<'a> {
    user_id: &'a str,
    #[serde(flatten)]
    entry: &'a WeeklyPlanEntry,
}

impl CommandPlanner {
    /// Splits `command` on whitespace. Quoting is not supported, so a command
    /// containing quote characters is rejected rather than split wrongly.
    pub fn from_command_line(command: &str) -> Result<Self, EngineError> {
        if command.contains(['"', '\'']) {
            return Err(EngineError::invalid_input(
                "planner command arguments cannot be quoted; wrap the call in a script",
            ));
        }
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| EngineError::invalid_input("planner command is empty"))?;
        Ok(Self {
            program,
            args: parts.collect(),
            timeout: PLANNER_TIMEOUT,
        })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

fn drain(stream: Option<impl Read + Send + 'static>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buffer = Vec::new();
        if let Some(mut stream) = stream {
            let _ = stream.read_to_end(&mut buffer);
        }
        buffer
    })
}

impl Planner for CommandPlanner {
    fn draft_week(&self, user_id: &str, entry: &WeeklyPlanEntry) -> Result<String, EngineError> {
        let request = serde_json::to_vec(&PlannerRequest { user_id, entry })?;
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                EngineError::generation_failed(format!("failed to start planner: {err}"))
            })?;

        // Both pipes are drained concurrently so a chatty planner cannot block
        // on a full pipe while we wait for it.
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        if let Some(mut stdin) = child.stdin.take()
            && let Err(err) = stdin.write_all(&request)
        {
            let _ = child.kill();
            let _ = child.wait();
            return Err(EngineError::generation_failed(format!(
                "failed to write planner input: {err}"
            )));
        }

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                warn!(program = %self.program, timeout = ?self.timeout, "planner timed out");
                return Err(EngineError::generation_failed(format!(
                    "planner timed out after {}s",
                    self.timeout.as_secs_f32()
                )));
            }
            Err(err) => {
                return Err(EngineError::generation_failed(format!(
                    "planner did not finish: {err}"
                )));
            }
        };
        let stdout = stdout.join().unwrap_or_default();
        let stderr = stderr.join().unwrap_or_default();

        if !status.success() {
            let stderr = String::from_utf8_lossy(&stderr);
            return Err(EngineError::generation_failed(format!(
                "planner exited with {}: {}",
                status,
                stderr.trim()
            )));
        }

        String::from_utf8(stdout)
            .map_err(|_| EngineError::generation_failed("planner output is not UTF-8"))
    }
}

pub fn planner_from_env(configured: Option<&str>) -> Result<Box<dyn Planner>, EngineError> {
    let from_env = std::env::var(PLANNER_ENV_VAR)
        .ok()
        .filter(|value| !value.trim().is_empty());
    let command = from_env.as_deref().or(configured);

    match command {
        Some(command) if !command.trim().is_empty() => {
            Ok(Box::new(CommandPlanner::from_command_line(command)?))
        }
        _ => Ok(Box::new(UnavailablePlanner)),
    }
}

/// One task as drafted by the planner, before product matching.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(alias = "time_of_day")]
    pub time_of_day: TimeOfDay,
    pub category: Category,
    pub priority: Priority,
    #[serde(default, alias = "recommended_products")]
    pub recommended_products: Vec<String>,
}

#[derive(Deserialize)]
struct DraftEnvelope {
    tasks: Vec<TaskDraft>,
}

pub fn parse_week_drafts(week: u8, raw: &str) -> Result<Vec<TaskDraft>, EngineError> {
    let json = extract_json(raw);
    let envelope: DraftEnvelope = serde_json::from_str(json).map_err(|err| {
        EngineError::generation_failed(format!("week {week}: unreadable planner output: {err}"))
    })?;

    if envelope.tasks.is_empty() {
        return Err(EngineError::generation_failed(format!(
            "week {week}: planner returned no tasks"
        )));
    }

    let mut drafts = Vec::with_capacity(envelope.tasks.len());
    for mut draft in envelope.tasks {
        let title = draft.title.trim();
        if title.is_empty() {
            return Err(EngineError::generation_failed(format!(
                "week {week}: task title is required"
            )));
        }
        draft.title = title.to_string();
        draft.description = draft.description.trim().to_string();
        draft.recommended_products = draft
            .recommended_products
            .iter()
            .map(|tag| tag.trim().to_string())
            .filter(|tag| !tag.is_empty())
            .collect();
        drafts.push(draft);
    }

    Ok(drafts)
}

/// Returns the first balanced JSON object in `raw`, tolerating markdown
/// fences and prose around it. Falls back to the trimmed input.
pub fn extract_json(raw: &str) -> &str {
    let trimmed = raw.trim();

    if let Some(start) = trimmed.find('{') {
        let remainder = &trimmed[start..];
        if let Some(end) = find_matching_brace(remainder) {
            return &remainder[..end];
        }
    }

    trimmed
}

fn find_matching_brace(s: &str) -> Option<usize> {
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;

    for (i, c) in s.char_indices() {
        if escape {
            escape = false;
            continue;
        }
        if c == '\\' && in_string {
            escape = true;
            continue;
        }
        if c == '"' {
            in_string = !in_string;
            continue;
        }
        if in_string {
            continue;
        }
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}
