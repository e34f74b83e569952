use clap::{Parser, Subcommand, ValueEnum};
use skintel_core::model::PlanType;
use std::path::PathBuf;

/// Operator console for the skincare task and progress engine
#[derive(Parser, Debug)]
#[command(name = "skintel", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Output JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Override configuration values (format KEY=VALUE)
    #[arg(long = "config-override", value_name = "KEY=VALUE", global = true)]
    pub config_override: Vec<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Show today's tasks and scores for a user
    ///
    /// Example: skintel today user-1
    Today { user: String },
    /// Show weekly scores, streaks and recent activity
    ///
    /// Example: skintel progress user-1
    Progress { user: String },
    /// List the active task generation
    ///
    /// Example: skintel tasks user-1
    /// Example: skintel tasks user-1 --week 2
    Tasks {
        user: String,
        #[arg(long)]
        week: Option<u8>,
    },
    /// Mark a task as completed for a day
    ///
    /// Example: skintel complete user-1 TASK_ID
    /// Example: skintel complete user-1 TASK_ID --date 2025-03-04
    Complete {
        user: String,
        task: String,
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<String>,
    },
    /// Remove a task completion for a day
    ///
    /// Example: skintel uncomplete user-1 TASK_ID
    Uncomplete {
        user: String,
        task: String,
        #[arg(long, value_name = "YYYY-MM-DD")]
        date: Option<String>,
    },
    /// Show the completion history of a task
    ///
    /// Example: skintel history user-1 TASK_ID
    History { user: String, task: String },
    /// Generate tasks from the user's weekly plan
    ///
    /// Example: skintel generate user-1 --force
    Generate {
        user: String,
        #[arg(long)]
        force: bool,
    },
    /// Adapt tasks that went uncompleted for three days
    ///
    /// Example: skintel adapt user-1
    Adapt { user: String },
    /// Renew a stale plan period, or create missing tasks
    ///
    /// Example: skintel ensure user-1 --plan-type monthly
    Ensure {
        user: String,
        /// Defaults to the plan type of the user's subscription
        #[arg(long, value_enum)]
        plan_type: Option<PlanTypeArg>,
    },
    /// Replace parts of a user's profile from a JSON file
    ///
    /// Example: skintel sync user-1 profile.json
    Sync { user: String, file: PathBuf },
    /// Run a scheduler job for every user
    ///
    /// Example: skintel run regenerate-plans
    /// Example: skintel run adapt-tasks
    /// Example: skintel run track-daily-completions
    Run { job: String },
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanTypeArg {
    Weekly,
    Monthly,
}

impl From<PlanTypeArg> for PlanType {
    fn from(value: PlanTypeArg) -> Self {
        match value {
            PlanTypeArg::Weekly => PlanType::Weekly,
            PlanTypeArg::Monthly => PlanType::Monthly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigOverrideTarget {
    DayOffset,
    PlannerCommand,
    LogFilter,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedConfigOverride {
    pub target: ConfigOverrideTarget,
    pub value: String,
}

/// Parse a raw `KEY=VALUE` override string into a structured target.
pub fn parse_config_override(raw: &str) -> Result<ParsedConfigOverride, String> {
    let trimmed = raw.trim();
    let (key_raw, value_raw) = trimmed
        .split_once('=')
        .ok_or_else(|| "override must be in KEY=VALUE format".to_string())?;

    let value = value_raw.trim().to_string();
    let canonical_field =
        canonicalize_flag_name(key_raw).ok_or_else(|| "override key cannot be empty".to_string())?;

    let target = match canonical_field.as_str() {
        "day_offset" | "offset" => ConfigOverrideTarget::DayOffset,
        "planner_command" | "planner" => ConfigOverrideTarget::PlannerCommand,
        "log_filter" | "log" => ConfigOverrideTarget::LogFilter,
        other => return Err(format!("unknown config field '{other}'")),
    };

    Ok(ParsedConfigOverride { target, value })
}

fn canonicalize_flag_name(name: &str) -> Option<String> {
    let mut cleaned = String::new();
    let mut previous_underscore = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            cleaned.push(ch.to_ascii_lowercase());
            previous_underscore = false;
        } else if !previous_underscore && !cleaned.is_empty() {
            cleaned.push('_');
            previous_underscore = true;
        }
    }

    let trimmed = cleaned.trim_matches('_');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Command, ConfigOverrideTarget, parse_config_override};
    use clap::Parser;

    #[test]
    fn parse_config_override_canonicalizes_field_names() {
        let parsed = parse_config_override(" Day-Offset = +02:00 ").unwrap();

        assert_eq!(parsed.target, ConfigOverrideTarget::DayOffset);
        assert_eq!(parsed.value, "+02:00");
    }

    #[test]
    fn parse_config_override_keeps_equals_in_value() {
        let parsed = parse_config_override("log_filter=skintel_core=debug").unwrap();

        assert_eq!(parsed.target, ConfigOverrideTarget::LogFilter);
        assert_eq!(parsed.value, "skintel_core=debug");
    }

    #[test]
    fn parse_config_override_rejects_unknown_fields() {
        let err = parse_config_override("theme=noir").unwrap_err();
        assert!(err.contains("unknown config field"));
    }

    #[test]
    fn parse_config_override_rejects_missing_equals() {
        let err = parse_config_override("planner").unwrap_err();
        assert!(err.contains("KEY=VALUE"));
    }

    #[test]
    fn parse_config_override_rejects_empty_key() {
        let err = parse_config_override(" -- = x").unwrap_err();
        assert!(err.contains("cannot be empty"));
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "skintel",
            "complete",
            "user-1",
            "task-1",
            "--date",
            "2025-03-04",
            "--json",
        ])
        .unwrap();

        assert!(cli.json);
        match cli.command {
            Command::Complete { user, task, date } => {
                assert_eq!(user, "user-1");
                assert_eq!(task, "task-1");
                assert_eq!(date.as_deref(), Some("2025-03-04"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
