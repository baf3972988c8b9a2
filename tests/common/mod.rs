//! Shared harness for integration tests: a temp-dir project plus helpers to
//! author templates, configs, and input dashboards, and to run the binary.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use tempfile::TempDir;

pub struct TestProject {
    temp: TempDir,
}

pub struct CommandResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl TestProject {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().expect("failed to create temp project"),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp.path()
    }

    pub fn write_file(&self, relative: &str, content: &str) -> PathBuf {
        let path = self.temp.path().join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent directories");
        }
        std::fs::write(&path, content).expect("failed to write test file");
        path
    }

    pub fn write_template(&self, category_dir: &str, file: &str, content: &str) {
        self.write_file(&format!("templates/{category_dir}/{file}"), content);
    }

    pub fn write_config(&self, content: &str) {
        self.write_file("config.yml", content);
    }

    pub fn read_file(&self, relative: &str) -> String {
        std::fs::read_to_string(self.temp.path().join(relative))
            .unwrap_or_else(|e| panic!("failed to read {relative}: {e}"))
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.temp.path().join(relative).exists()
    }

    pub fn run(&self, args: &[&str]) -> CommandResult {
        let output = Command::cargo_bin("dashforge")
            .expect("dashforge binary not built")
            .current_dir(self.temp.path())
            .args(args)
            .output()
            .expect("failed to run dashforge");
        CommandResult {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}
