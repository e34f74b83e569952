use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_path(file_name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!("skintel-{nanos}-{file_name}"))
}

fn write_store(path: &Path) {
    let content = serde_json::json!({
        "schema_version": 2,
        "tasks": [
            {
                "id": "task-1",
                "user_id": "user-1",
                "generation": 1,
                "week": 1,
                "title": "Gentle cleanse",
                "description": "Lukewarm water",
                "time_of_day": "morning",
                "category": "cleansing",
                "priority": "critical",
                "recommended_products": ["cleanser"],
                "user_products": null,
                "is_active": true,
                "adaptations": {"skip_count": 2, "last_skipped": "2025-03-01", "time_adjusted": false},
                "created_at": "2025-01-01T00:00:00Z",
                "updated_at": "2025-01-01T00:00:00Z"
            }
        ],
        "completions": [],
        "profiles": {}
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
fn complete_records_one_completion_per_day() {
    let store_path = temp_path("cli-complete.json");
    write_store(&store_path);

    let first = run(
        &store_path,
        &["complete", "user-1", "task-1", "--date", "2025-03-04", "--json"],
    );
    let second = run(
        &store_path,
        &["complete", "user-1", "task-1", "--date", "2025-03-04", "--json"],
    );
    let stored = read_store(&store_path);
    std::fs::remove_file(&store_path).ok();

    assert!(first.status.success());
    assert!(second.status.success());
    let first: serde_json::Value = serde_json::from_slice(&first.stdout).unwrap();
    let second: serde_json::Value = serde_json::from_slice(&second.stdout).unwrap();
    assert_eq!(first["completed"], true);
    assert_eq!(second["completed"], false);

    let completions = stored["completions"].as_array().expect("completions array");
    assert_eq!(completions.len(), 1);
    assert_eq!(completions[0]["completed_at"], "2025-03-04");
    assert_eq!(completions[0]["task_id"], "task-1");
    assert_eq!(stored["tasks"][0]["adaptations"]["skip_count"], 0);
}

#[test]
fn uncomplete_removes_the_day() {
    let store_path = temp_path("cli-uncomplete.json");
    write_store(&store_path);

    run(
        &store_path,
        &["complete", "user-1", "task-1", "--date", "2025-03-04"],
    );
    let removed = run(
        &store_path,
        &["uncomplete", "user-1", "task-1", "--date", "2025-03-04"],
    );
    let again = run(
        &store_path,
        &["uncomplete", "user-1", "task-1", "--date", "2025-03-04"],
    );
    let stored = read_store(&store_path);
    std::fs::remove_file(&store_path).ok();

    assert!(removed.status.success());
    assert!(String::from_utf8_lossy(&removed.stdout).contains("Removed completion"));
    assert!(String::from_utf8_lossy(&again.stdout).contains("was not completed"));
    assert!(stored["completions"].as_array().unwrap().is_empty());
}

#[test]
fn history_lists_days_in_order() {
    let store_path = temp_path("cli-history.json");
    write_store(&store_path);

    for day in ["2025-03-05", "2025-03-03"] {
        run(&store_path, &["complete", "user-1", "task-1", "--date", day]);
    }
    let output = run(&store_path, &["history", "user-1", "task-1", "--json"]);
    std::fs::remove_file(&store_path).ok();

    assert!(output.status.success());
    let history: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let days: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["completedAt"].as_str().unwrap())
        .collect();
    assert_eq!(days, vec!["2025-03-03", "2025-03-05"]);
    assert_eq!(history[0]["taskId"], "task-1");
    assert!(history[0]["recordedAt"].is_string());
}

#[test]
fn complete_reports_foreign_task_as_not_found() {
    let store_path = temp_path("cli-complete-foreign.json");
    write_store(&store_path);

    let output = run(&store_path, &["complete", "user-2", "task-1"]);
    let stored = read_store(&store_path);
    std::fs::remove_file(&store_path).ok();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: not_found"));
    assert!(stored["completions"].as_array().unwrap().is_empty());
}

#[test]
fn complete_rejects_malformed_date() {
    let store_path = temp_path("cli-complete-date.json");
    write_store(&store_path);

    let output = run(
        &store_path,
        &["complete", "user-1", "task-1", "--date", "04/03/2025"],
    );
    std::fs::remove_file(&store_path).ok();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
    assert!(stderr.contains("YYYY-MM-DD"));
}

#[test]
fn missing_arguments_are_reported_as_invalid_input() {
    let store_path = temp_path("cli-complete-args.json");

    let output = run(&store_path, &["complete", "user-1"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("ERROR: invalid_input"));
}
