#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::assert::Assert;
use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

pub const DESCRIPTOR: &str = "game.json";
pub const CACHE: &str = "local_repo.json";

pub fn repo_fixture(prefix: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("tempdir")
}

pub fn write_package(root: &Path, name: &str, descriptor: &str) -> PathBuf {
    let dir = root.join(name);
    fs::create_dir_all(&dir).expect("package dir");
    fs::write(dir.join(DESCRIPTOR), descriptor).expect("descriptor");
    dir
}

#[cfg(unix)]
pub fn write_installer(dir: &Path, name: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("installer");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
}

/// `gamerepo --root <root>` with the ambient configuration cleared.
pub fn gamerepo(root: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("gamerepo");
    for key in [
        "GAMEREPO_ROOT",
        "GAMEREPO_CACHE_FILE",
        "GAMEREPO_TICK_MS",
        "GAMEREPO_COOLDOWN_MS",
        "GAMEREPO_MAX_CAPTURE_BYTES",
        "RUST_LOG",
    ] {
        cmd.env_remove(key);
    }
    cmd.arg("--root").arg(root);
    cmd
}

pub fn parse_json(assert: &Assert) -> Value {
    let output = assert.get_output();
    serde_json::from_slice(&output.stdout).unwrap_or_else(|err| {
        panic!(
            "invalid json: {err}\nstdout: {}\nstderr: {}",
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr)
        )
    })
}

pub fn read_json(path: &Path) -> Value {
    serde_json::from_str(&fs::read_to_string(path).expect("read json")).expect("parse json")
}
