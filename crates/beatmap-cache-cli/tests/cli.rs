use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("beatmap-cache"));
    cmd.env_remove("BEATMAP_CACHE_DIR")
        .env_remove("BEATMAP_CACHE_MAX_SIZE")
        .env_remove("BEATMAP_CACHE_MAX_FILES")
        .env_remove("RUST_LOG")
        .arg("--dir")
        .arg(dir);
    cmd
}

fn write_beatmap(dir: &Path, beatmap_id: u64, len: usize) {
    std::fs::write(dir.join(format!("{beatmap_id}.osu")), vec![b'x'; len]).unwrap();
}

#[test]
fn help_mentions_core_commands() {
    Command::new(assert_cmd::cargo::cargo_bin!("beatmap-cache"))
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("access")
                .and(predicate::str::contains("status"))
                .and(predicate::str::contains("list"))
                .and(predicate::str::contains("trim")),
        );
}

#[test]
fn access_evicts_least_used_beatmap() {
    let tmp = tempfile::tempdir().unwrap();
    for id in [1, 2] {
        write_beatmap(tmp.path(), id, 4);
    }
    std::fs::write(
        tmp.path().join("cache-metadata.json"),
        br#"{
            "1": {"beatmapId": 1, "accessCount": 1, "lastAccessed": 10},
            "2": {"beatmapId": 2, "accessCount": 1, "lastAccessed": 20}
        }"#,
    )
    .unwrap();

    cli(tmp.path())
        .args(["--max-files", "2", "access", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("3: access_count=1"))
        .stdout(predicate::str::contains("evicted=1"));

    assert!(!tmp.path().join("1.osu").exists());
    assert!(tmp.path().join("2.osu").exists());

    let sidecar: serde_json::Value = serde_json::from_slice(
        &std::fs::read(tmp.path().join("cache-metadata.json")).unwrap(),
    )
    .unwrap();
    let mut ids: Vec<&String> = sidecar.as_object().unwrap().keys().collect();
    ids.sort();
    assert_eq!(ids, vec!["2", "3"]);
}

#[test]
fn access_reports_failed_ids_and_keeps_going() {
    let tmp = tempfile::tempdir().unwrap();
    // A directory in place of the beatmap file cannot be removed with `remove_file`.
    std::fs::create_dir(tmp.path().join("7.osu")).unwrap();

    cli(tmp.path())
        .args(["--max-files", "1", "access", "7", "8", "9"])
        .assert()
        .code(1)
        .stdout(
            predicate::str::contains("7: access_count=1")
                .and(predicate::str::contains("9: access_count=1"))
                .and(predicate::str::contains("evicted=8"))
                .and(predicate::str::contains("8: access_count").not()),
        )
        .stderr(
            predicate::str::contains("beatmap 8:")
                .and(predicate::str::contains("failed to delete")),
        );

    let sidecar: serde_json::Value = serde_json::from_slice(
        &std::fs::read(tmp.path().join("cache-metadata.json")).unwrap(),
    )
    .unwrap();
    let ids: Vec<&String> = sidecar.as_object().unwrap().keys().collect();
    assert_eq!(ids, vec!["9"]);
}

#[test]
fn access_reports_json_outcomes() {
    let tmp = tempfile::tempdir().unwrap();

    let output = cli(tmp.path())
        .args(["--json", "access", "42", "42"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let outcomes: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcomes[0]["entry"]["accessCount"], 1);
    assert_eq!(outcomes[1]["entry"]["accessCount"], 2);
    assert_eq!(outcomes[1]["entry"]["beatmapId"], 42);
    assert_eq!(outcomes[1]["evicted"], serde_json::json!([]));
}

#[test]
fn env_overrides_config_file_and_flags_override_env() {
    let tmp = tempfile::tempdir().unwrap();
    let config_path = tmp.path().join("beatmap-cache.toml");
    std::fs::write(&config_path, "[cache]\nmax_files = 10\n").unwrap();

    let output = cli(tmp.path())
        .env("BEATMAP_CACHE_MAX_FILES", "7")
        .env("BEATMAP_CACHE_MAX_SIZE", "999")
        .arg("--config")
        .arg(&config_path)
        .args(["--max-size", "123", "--json", "status"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["max_files"], 7);
    assert_eq!(stats["max_size_bytes"], 123);
}

#[test]
fn status_reports_usage_as_json() {
    let tmp = tempfile::tempdir().unwrap();
    write_beatmap(tmp.path(), 10, 7);
    write_beatmap(tmp.path(), 11, 5);

    let output = cli(tmp.path())
        .args(["--max-size", "100", "--json", "status"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["entries"], 2);
    assert_eq!(stats["total_bytes"], 12);
    assert_eq!(stats["max_size_bytes"], 100);
    assert_eq!(stats["max_files"], 100_000);
}

#[test]
fn trim_enforces_limits_from_config_file() {
    let tmp = tempfile::tempdir().unwrap();
    let cache_dir = tmp.path().join("cache");
    std::fs::create_dir(&cache_dir).unwrap();
    for id in 1..=3 {
        write_beatmap(&cache_dir, id, 10);
    }
    std::fs::write(
        cache_dir.join("cache-metadata.json"),
        br#"{
            "1": {"beatmapId": 1, "accessCount": 4, "lastAccessed": 10},
            "2": {"beatmapId": 2, "accessCount": 1, "lastAccessed": 20},
            "3": {"beatmapId": 3, "accessCount": 1, "lastAccessed": 30}
        }"#,
    )
    .unwrap();
    let config_path = tmp.path().join("beatmap-cache.toml");
    std::fs::write(&config_path, "[cache]\nmax_size_bytes = 20\n").unwrap();

    cli(&cache_dir)
        .arg("--config")
        .arg(&config_path)
        .arg("trim")
        .assert()
        .success()
        .stdout(predicate::str::contains("evicted: 2"));

    assert!(!cache_dir.join("2.osu").exists());
    assert!(cache_dir.join("1.osu").exists());
    assert!(cache_dir.join("3.osu").exists());
}

#[test]
fn list_shows_next_victim_first() {
    let tmp = tempfile::tempdir().unwrap();
    for id in [5, 6] {
        write_beatmap(tmp.path(), id, 1);
    }
    std::fs::write(
        tmp.path().join("cache-metadata.json"),
        br#"{
            "5": {"beatmapId": 5, "accessCount": 3, "lastAccessed": 10},
            "6": {"beatmapId": 6, "accessCount": 1, "lastAccessed": 20}
        }"#,
    )
    .unwrap();

    cli(tmp.path())
        .args(["list", "--limit", "1"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("6\t"))
        .stdout(predicate::str::contains("5\t").not());
}

#[test]
fn invalid_config_file_fails_with_context() {
    let tmp = tempfile::tempdir().unwrap();
    let config_path = tmp.path().join("bad.toml");
    std::fs::write(&config_path, "[cache]\nmax_filez = 1\n").unwrap();

    cli(tmp.path())
        .arg("--config")
        .arg(&config_path)
        .arg("status")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid config file"));
}

#[test]
fn corrupt_metadata_fails_open() {
    let tmp = tempfile::tempdir().unwrap();
    std::fs::write(tmp.path().join("cache-metadata.json"), b"[").unwrap();

    cli(tmp.path())
        .arg("status")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("failed to load beatmap cache"));
}
