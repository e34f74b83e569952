use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};
use time::format_description::well_known::Rfc3339;
use time::{Duration, OffsetDateTime};

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("skintel-{nanos}-{file_name}"))
}

fn rfc3339(instant: OffsetDateTime) -> String {
    instant.format(&Rfc3339).unwrap()
}

fn task_json(id: &str, user_id: &str, time_of_day: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "user_id": user_id,
        "generation": 1,
        "week": 1,
        "title": format!("{id} title"),
        "description": "",
        "time_of_day": time_of_day,
        "category": "treatment",
        "priority": "important",
        "recommended_products": [],
        "user_products": null,
        "is_active": true,
        "adaptations": {"skip_count": 0, "last_skipped": null, "time_adjusted": false},
        "created_at": "2025-01-01T00:00:00Z",
        "updated_at": "2025-01-01T00:00:00Z"
    })
}

fn write_store(path: &Path) {
    let start = OffsetDateTime::now_utc() - Duration::days(1);
    let content = serde_json::json!({
        "schema_version": 2,
        "tasks": [
            task_json("a1", "alice", "evening"),
            task_json("a2", "alice", "anytime"),
            task_json("b1", "bob", "morning")
        ],
        "completions": [],
        "profiles": {
            "alice": {
                "plan": {
                    "plan_start_date": rfc3339(start),
                    "plan_end_date": rfc3339(start + Duration::days(28))
                }
            },
            "bob": {}
        }
    });
    std::fs::write(path, serde_json::to_string_pretty(&content).unwrap()).unwrap();
}

fn read_store(path: &Path) -> serde_json::Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

fn run(store_path: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_skintel"))
        .args(args)
        .env("SKINTEL_STORE_PATH", store_path)
        .env("SKINTEL_CONFIG_PATH", temp_path("absent-config.json"))
        .env_remove("SKINTEL_PLANNER_CMD")
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run skintel")
}

#[test]
fn track_daily_completions_skips_users_without_plan() {
    let store_path = temp_path("cli-run-daily.json");
    write_store(&store_path);

    let output = run(&store_path, &["run", "track-daily-completions", "--json"]);
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["job"], "track-daily-completions");
    let results = report["results"].as_array().expect("results array");
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["userId"], "alice");
    assert_eq!(results[0]["total"], 2);
    assert_eq!(results[0]["dailyScore"], 0);
    assert!(report["failures"].as_array().unwrap().is_empty());
}

#[test]
fn adapt_tasks_job_updates_every_user() {
    let store_path = temp_path("cli-run-adapt.json");
    write_store(&store_path);

    let output = run(&store_path, &["run", "adapt_tasks"]);
    let stored = read_store(&store_path);
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Job adapt-tasks: 2 users processed, 0 failed"));
    assert!(stdout.contains("alice: 2 tasks adapted"));

    let tasks = stored["tasks"].as_array().unwrap();
    assert_eq!(tasks[0]["time_of_day"], "morning");
    assert_eq!(tasks[0]["adaptations"]["time_adjusted"], true);
    assert_eq!(tasks[1]["priority"], "optional");
    assert_eq!(tasks[1]["adaptations"]["skip_count"], 1);
    assert_eq!(tasks[2]["priority"], "optional");
}

#[test]
fn unknown_job_is_rejected() {
    let store_path = temp_path("cli-run-unknown.json");

    let output = run(&store_path, &["run", "send-reminders"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
    assert!(stderr.contains("unknown job"));
}

#[test]
fn unknown_config_override_is_rejected() {
    let store_path = temp_path("cli-run-override.json");

    let output = run(
        &store_path,
        &["run", "adapt-tasks", "--config-override", "theme=noir"],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input - unknown config field 'theme'"));
}

#[test]
fn bad_day_offset_override_is_rejected() {
    let store_path = temp_path("cli-run-offset.json");

    let output = run(
        &store_path,
        &["run", "adapt-tasks", "--config-override", "day_offset=soon"],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
}
