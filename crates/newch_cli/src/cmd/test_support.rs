use std::path::PathBuf;
use std::process::{Command, Output};
use std::sync::OnceLock;

use newch_testkit::{fixture_path as shared_fixture_path, target_dir as workspace_target_dir};

static NEWCH_BIN: OnceLock<PathBuf> = OnceLock::new();

pub(crate) fn fixture_arg(name: &str) -> String {
	shared_fixture_path(name).to_string_lossy().into_owned()
}

pub(crate) fn run_newch(args: &[&str]) -> Output {
	Command::new(newch_bin()).args(args).output().expect("newch command executes")
}

pub(crate) fn run_newch_json(args: &[&str]) -> serde_json::Value {
	let output = run_newch(args);
	assert!(
		output.status.success(),
		"newch command failed with status={}: {}",
		output.status,
		String::from_utf8_lossy(&output.stderr)
	);
	serde_json::from_slice(&output.stdout).expect("stdout should be valid json")
}

fn newch_bin() -> &'static PathBuf {
	NEWCH_BIN.get_or_init(resolve_newch_bin)
}

fn resolve_newch_bin() -> PathBuf {
	if let Ok(path) = std::env::var("CARGO_BIN_EXE_newch") {
		return PathBuf::from(path);
	}

	let manifest_dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
	let mut bin = workspace_target_dir().join("debug");
	bin.push(if cfg!(windows) { "newch.exe" } else { "newch" });

	let status = Command::new("cargo")
		.current_dir(&manifest_dir)
		.args(["build", "--quiet", "--bin", "newch"])
		.status()
		.expect("cargo build executes");
	assert!(status.success(), "failed to build newch binary at {}", bin.display());

	bin
}
