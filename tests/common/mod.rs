use assert_cmd::Command;
use assert_fs::TempDir;
use assert_fs::fixture::ChildPath;
use assert_fs::prelude::*;

/// Write a config whose credential files live inside `temp_dir` (and do not exist).
pub fn write_isolated_config(temp_dir: &TempDir) -> ChildPath {
    let config = temp_dir.child("spotsync.json");
    let json = serde_json::json!({
        "client_secret_file": temp_dir.path().join("client_secret.json"),
        "token_file": temp_dir.path().join("token.json"),
        "gallery_output": temp_dir.path().join("gallery.json"),
    });
    config.write_str(&json.to_string()).unwrap();
    config
}

pub fn spotsync(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("spotsync").unwrap();
    cmd.current_dir(temp_dir.path());
    cmd
}
