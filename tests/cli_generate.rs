mod service_stub;

use predicates::prelude::*;
use serde_json::Value;
use service_stub::{STORY_TITLE, ServiceStub};

fn read_snapshot(path: &std::path::Path) -> anyhow::Result<Value> {
    Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

#[test]
fn generate_example_writes_snapshot_with_dialogs() -> anyhow::Result<()> {
    let stub = ServiceStub::spawn();
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("out").join("story.json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("visionforge");
    cmd.envs(stub.env())
        .args(["generate", "--example", "--style", "fantasy", "--dialogs", "manga", "--out"])
        .arg(&out)
        .assert()
        .success()
        .stderr(predicate::str::contains("wrote snapshot"));

    let snapshot = read_snapshot(&out)?;
    assert_eq!(snapshot["style"], "fantasy");
    assert_eq!(snapshot["project"]["name"], STORY_TITLE);
    assert_eq!(snapshot["characters"].as_array().map(Vec::len), Some(2));
    assert_eq!(snapshot["scenes"].as_array().map(Vec::len), Some(2));
    assert_eq!(snapshot["dna"][0]["character_id"], "char_01");
    assert_eq!(snapshot["dna"][0]["dna"]["physical_features"]["hair"]["color"], "silver");
    assert!(snapshot["dialogs"]["scene_01"].is_string());
    assert_eq!(snapshot["status"]["state"], "done");
    assert_eq!(snapshot["status"]["operation"], "generate_dialogs");

    let story_prompt = stub
        .calls()
        .iter()
        .map(|c| c.prompt())
        .find(|p| p.contains("STORY TO ANALYZE:"))
        .expect("story analysis request");
    assert!(story_prompt.contains("Target visual style: fantasy"));
    assert!(story_prompt.contains("Lyra"));
    Ok(())
}

#[test]
fn generate_reads_story_file() -> anyhow::Result<()> {
    let stub = ServiceStub::spawn();
    let dir = tempfile::tempdir()?;
    let story = dir.path().join("story.txt");
    std::fs::write(&story, "Kaito guards the bridge at midnight.")?;
    let out = dir.path().join("story.json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("visionforge");
    cmd.envs(stub.env())
        .args(["generate", "--story"])
        .arg(&story)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();

    let snapshot = read_snapshot(&out)?;
    assert_eq!(snapshot["story"], "Kaito guards the bridge at midnight.");
    assert_eq!(snapshot["style"], "anime");
    assert_eq!(snapshot["dialogs"], serde_json::json!({}));
    Ok(())
}

#[test]
fn generate_refuses_to_overwrite_without_force() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("story.json");
    std::fs::write(&out, "keep me")?;

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("visionforge");
    cmd.args(["generate", "--example", "--out"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("use --force to overwrite"));

    assert_eq!(std::fs::read_to_string(&out)?, "keep me");
    Ok(())
}

#[test]
fn generate_requires_bria_token() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("story.json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("visionforge");
    cmd.env("GOOGLE_API_KEY", "set")
        .env_remove("BRIA_API_TOKEN")
        .args(["generate", "--example", "--out"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("BRIA_API_TOKEN is not set"));

    assert!(!out.exists());
    Ok(())
}

#[test]
fn failed_generation_still_writes_snapshot() -> anyhow::Result<()> {
    let stub = ServiceStub::spawn();
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("story.json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("visionforge");
    cmd.envs(stub.env())
        .env("BRIA_API_TOKEN", "revoked")
        .args(["generate", "--example", "--force", "--out"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Bria API authentication failed"));

    let snapshot = read_snapshot(&out)?;
    assert_eq!(snapshot["status"]["state"], "error");
    assert_eq!(snapshot["characters"], serde_json::json!([]));
    Ok(())
}

#[test]
fn invalid_log_format_is_rejected() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("visionforge");
    cmd.env("VISIONFORGE_LOG_FORMAT", "xml")
        .args(["dna", "fields"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid VISIONFORGE_LOG_FORMAT"));
}

#[test]
fn unknown_dialog_format_is_rejected_before_any_request() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("story.json");

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("visionforge");
    cmd.args(["generate", "--example", "--dialogs", "webtoon", "--out"])
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("parse --dialogs"));

    assert!(!out.exists());
    Ok(())
}
