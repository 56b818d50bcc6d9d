use std::collections::HashMap;
use std::fs;
use std::path::Path;

use mail_quota_tool::{open_root, run, Command, QuotaToolConfig};
use serde_json::Value;
use tempfile::tempdir;

fn config_for(dir: &Path, user: &str, extra: &[(&str, &str)]) -> QuotaToolConfig {
    let mut vars: HashMap<String, String> = HashMap::new();
    vars.insert("USER".into(), user.into());
    vars.insert(
        "QUOTA_ROOT".into(),
        format!("dict::sqlite:{}", dir.join("quota.db").display()),
    );
    vars.insert(
        "MAIL_ROOT".into(),
        dir.join("mail").to_string_lossy().into_owned(),
    );
    for (name, value) in extra {
        vars.insert(name.to_string(), value.to_string());
    }
    QuotaToolConfig::from_vars(|name| vars.get(name).cloned()).expect("config should load")
}

fn deliver(dir: &Path, user: &str, sizes: &[u64]) {
    let new_dir = dir.join("mail").join(user).join("new");
    fs::create_dir_all(&new_dir).expect("failed to create maildir");
    for (index, size) in sizes.iter().enumerate() {
        fs::write(new_dir.join(format!("17000000{index}.M{index}P1.host,S={size}")), b"x")
            .expect("failed to write message");
    }
}

fn execute(config: &QuotaToolConfig, command: Command) -> Value {
    let mut root = open_root(config).expect("root should open");
    let mut out = Vec::new();
    run(&mut root, config, command, &mut out).expect("command should succeed");
    root.deinit().expect("root should deinit");
    serde_json::from_slice(&out).expect("report should be JSON")
}

fn resource<'a>(report: &'a Value, name: &str) -> &'a Value {
    report["resources"]
        .as_array()
        .expect("resources should be a list")
        .iter()
        .find(|entry| entry["name"] == name)
        .unwrap_or_else(|| panic!("{name} missing from report"))
}

#[test]
fn test_get_reports_recounted_usage_and_limits() {
    let temp = tempdir().expect("failed to create temp dir");
    deliver(temp.path(), "alice", &[1000, 2000]);
    let config = config_for(
        temp.path(),
        "alice",
        &[("QUOTA_STORAGE_LIMIT_BYTES", "10000"), ("QUOTA_MESSAGE_LIMIT", "5")],
    );

    let report = execute(&config, Command::Get);
    assert_eq!(report["user"], "alice");
    assert_eq!(report["backend"], "dict");
    assert_eq!(resource(&report, "STORAGE_BYTES")["value"], 3000);
    assert_eq!(resource(&report, "STORAGE_BYTES")["limit"], 10000);
    assert_eq!(resource(&report, "MESSAGE")["value"], 2);
    assert_eq!(resource(&report, "MESSAGE")["limit"], 5);
}

#[test]
fn test_update_persists_between_runs() {
    let temp = tempdir().expect("failed to create temp dir");
    deliver(temp.path(), "bob", &[500]);
    let config = config_for(temp.path(), "bob", &[]);

    execute(&config, Command::Get);
    let report = execute(
        &config,
        Command::Update {
            bytes: 1500,
            messages: 1,
        },
    );
    assert_eq!(resource(&report, "STORAGE_BYTES")["value"], 2000);
    assert_eq!(resource(&report, "MESSAGE")["value"], 2);
    assert!(resource(&report, "MESSAGE")["limit"].is_null());

    let report = execute(
        &config,
        Command::Update {
            bytes: -500,
            messages: -1,
        },
    );
    assert_eq!(resource(&report, "STORAGE_BYTES")["value"], 1500);

    let report = execute(&config, Command::Get);
    assert_eq!(resource(&report, "MESSAGE")["value"], 1);
}

#[test]
fn test_recalc_overwrites_drifted_counters() {
    let temp = tempdir().expect("failed to create temp dir");
    deliver(temp.path(), "carol", &[100, 200]);
    let config = config_for(temp.path(), "carol", &[]);

    execute(&config, Command::Get);
    let drifted = execute(
        &config,
        Command::Update {
            bytes: 9000,
            messages: 9,
        },
    );
    assert_eq!(resource(&drifted, "MESSAGE")["value"], 11);

    let report = execute(&config, Command::Recalc);
    assert_eq!(resource(&report, "STORAGE_BYTES")["value"], 300);
    assert_eq!(resource(&report, "MESSAGE")["value"], 2);
}

#[test]
fn test_unknown_backend_fails_to_open() {
    let temp = tempdir().expect("failed to create temp dir");
    let config = config_for(temp.path(), "dave", &[("QUOTA_ROOT", "fs:")]);
    assert!(open_root(&config).is_err());
}
