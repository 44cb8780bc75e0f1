// Integration tests for the galaxy binary

use std::fs;
use std::process::Command;

use galaxy::core::Embedding;
use galaxy::storage::EmbeddingCache;

fn galaxy() -> Command {
	Command::new(env!("CARGO_BIN_EXE_galaxy"))
}

#[test]
fn test_version_display() {
	let output = galaxy().arg("--version").output().expect("Failed to run galaxy --version");

	assert!(output.status.success(), "Version command failed");
	let stdout = String::from_utf8_lossy(&output.stdout);
	assert!(stdout.contains("galaxy"), "Expected 'galaxy' in version output");
}

#[test]
fn test_help_display() {
	let output = galaxy().arg("--help").output().expect("Failed to run galaxy --help");

	assert!(output.status.success(), "Help command failed");
	let stdout = String::from_utf8_lossy(&output.stdout);
	assert!(
		stdout.contains("generate")
				&& stdout.contains("search")
				&& stdout.contains("project")
				&& stdout.contains("clean"),
		"Expected all commands in help output"
	);
}

#[test]
fn test_project_writes_points() {
	let dir = tempfile::tempdir().unwrap();
	let input = dir.path().join("vectors.json");
	let output = dir.path().join("points.json");
	fs::write(&input, "[[1,0,0,0],[0,1,0,0],[0,0,1,0],[0.5,0.5,0,0]]").unwrap();

	let status = galaxy()
		.args(["project", "--seed", "3", "-e"])
		.arg(&input)
		.arg("-o")
		.arg(&output)
		.output()
		.expect("Failed to run galaxy project");
	assert!(status.status.success(), "{}", String::from_utf8_lossy(&status.stderr));

	let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
	let points = json["points"].as_array().unwrap();
	assert_eq!(points.len(), 4);
	for point in points {
		let position = point["position"].as_array().unwrap();
		assert_eq!(position.len(), 3);
		assert!(position.iter().all(|v| v.as_f64().unwrap().abs() <= 50.001));
	}
}

#[test]
fn test_project_rejects_nan() {
	let dir = tempfile::tempdir().unwrap();
	let input = dir.path().join("vectors.json");
	fs::write(&input, "[[1,0,0],[null,1,0]]").unwrap();

	let output = galaxy()
		.args(["project", "-e"])
		.arg(&input)
		.output()
		.expect("Failed to run galaxy project");

	assert!(!output.status.success(), "NaN input should fail");
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("Invalid input"), "unexpected stderr: {}", stderr);
	assert!(stderr.contains("run again"), "expected a retry hint: {}", stderr);
}

#[test]
fn test_clean_removes_cache_beside_input() {
	let dir = tempfile::tempdir().unwrap();
	let input = dir.path().join("notes.txt");
	fs::write(&input, "alpha\nbeta\n").unwrap();

	let cache = EmbeddingCache::beside(&input);
	let texts = vec!["alpha".to_string(), "beta".to_string()];
	let path = cache
		.save("mini", &texts, &[Embedding::raw(vec![1.0, 0.0]), Embedding::raw(vec![0.0, 1.0])])
		.unwrap();

	let output = galaxy()
		.arg("clean")
		.arg("-i")
		.arg(&input)
		.output()
		.expect("Failed to run galaxy clean");

	assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
	assert!(!path.exists());
	assert!(input.exists());
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("Removed 1 cached batches"), "unexpected stderr: {}", stderr);
}

#[test]
fn test_generate_without_model_fails_cleanly() {
	let dir = tempfile::tempdir().unwrap();
	let input = dir.path().join("notes.txt");
	fs::write(&input, "alpha\n\nbeta\n").unwrap();

	let output = galaxy()
		.args(["generate", "--models-dir"])
		.arg(dir.path().join("missing"))
		.arg("-i")
		.arg(&input)
		.output()
		.expect("Failed to run galaxy generate");

	assert!(!output.status.success());
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.contains("Model files not found"), "unexpected stderr: {}", stderr);
}
