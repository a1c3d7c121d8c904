// E2E tests for the spotsync CLI commands
use assert_fs::prelude::*;
use predicates::prelude::*;

mod common;
use common::{spotsync, write_isolated_config};

#[test]
fn test_help_lists_commands() {
    let temp_dir = assert_fs::TempDir::new().unwrap();
    spotsync(&temp_dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("tag"))
        .stdout(predicate::str::contains("upload"))
        .stdout(predicate::str::contains("gallery"));
}

#[test]
fn test_upload_requires_four_arguments() {
    let temp_dir = assert_fs::TempDir::new().unwrap();
    spotsync(&temp_dir)
        .args(["upload", "a.jpg", "a.json", "2024-05-01"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));

    spotsync(&temp_dir)
        .args(["upload", "a.jpg", "a.json", "2024-05-01", "KTPA", "extra"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_tag_empty_directory_exits_immediately() {
    let temp_dir = assert_fs::TempDir::new().unwrap();
    let config = write_isolated_config(&temp_dir);
    let source = temp_dir.child("incoming");
    source.create_dir_all().unwrap();
    source.child("notes.txt").write_str("not a photo").unwrap();

    spotsync(&temp_dir)
        .arg("--config")
        .arg(config.path())
        .arg("tag")
        .arg(source.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("No images found in folder."));

    source.child("notes.txt").assert(predicate::path::exists());
}

#[test]
fn test_tag_missing_directory_fails() {
    let temp_dir = assert_fs::TempDir::new().unwrap();
    let config = write_isolated_config(&temp_dir);

    spotsync(&temp_dir)
        .arg("--config")
        .arg(config.path())
        .arg("tag")
        .arg(temp_dir.path().join("nope"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Path not found"));
}

#[test]
fn test_gallery_without_credentials_fails() {
    let temp_dir = assert_fs::TempDir::new().unwrap();
    let config = write_isolated_config(&temp_dir);

    spotsync(&temp_dir)
        .arg("--config")
        .arg(config.path())
        .arg("gallery")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Client secret file not found"));

    temp_dir.child("gallery.json").assert(predicate::path::missing());
}

#[test]
fn test_upload_without_credentials_fails() {
    let temp_dir = assert_fs::TempDir::new().unwrap();
    let config = write_isolated_config(&temp_dir);
    temp_dir.child("a.jpg").write_binary(&[0xFF, 0xD8]).unwrap();
    temp_dir.child("a.json").write_str("{}").unwrap();

    spotsync(&temp_dir)
        .arg("--config")
        .arg(config.path())
        .args(["upload", "a.jpg", "a.json", "2024-05-01", "KTPA"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Client secret file not found"));
}

#[test]
fn test_malformed_config_is_reported() {
    let temp_dir = assert_fs::TempDir::new().unwrap();
    let config = temp_dir.child("broken.json");
    config.write_str("{ nope").unwrap();

    spotsync(&temp_dir)
        .arg("--config")
        .arg(config.path())
        .arg("gallery")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid config file"));
}
