//! The `ricegen` binary end to end: configuration, discovery, writing and exit codes.

use crate::common::{TestProject, sample_headers};
use std::path::Path;
use std::process::{Command, Output};

fn ricegen(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ricegen"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .env_remove("RICEGEN_OUTPUT__DIR")
        .output()
        .expect("Failed to run ricegen")
}

fn write_config(project: &TestProject, body: &str) {
    project.add_file("ricegen.toml", body);
}

#[test]
fn test_generate_from_configured_directory() {
    let project = TestProject::new();
    project.add_file("include/shapes.hpp", sample_headers::SHAPES);
    project.add_file("include/buffers.h", sample_headers::BUFFERS);
    project.add_file("include/notes.txt", "not a header");
    write_config(
        &project,
        r#"
project = "geometry"

[input]
dir = "include"

[output]
dir = "ext"
"#,
    );

    let output = ricegen(project.path(), &["generate", "--report", "report.json"]);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(output.status.code(), Some(0), "stderr: {stderr}");

    let ext = project.path().join("ext");
    for file in [
        "shapes-rb.cpp",
        "shapes-rb.hpp",
        "buffers-rb.cpp",
        "buffers-rb.hpp",
        "geometry-rb.cpp",
    ] {
        assert!(ext.join(file).exists(), "missing {file}");
    }
    assert!(!ext.join("notes-rb.cpp").exists());

    // Walked headers are sorted, so buffers comes first.
    let aggregate = std::fs::read_to_string(ext.join("geometry-rb.cpp")).unwrap();
    let buffers = aggregate.find("Init_Buffers();").unwrap();
    let shapes = aggregate.find("Init_Shapes();").unwrap();
    assert!(buffers < shapes);
    assert!(aggregate.contains("void Init_Geometry()"));

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(project.path().join("report.json")).unwrap())
            .unwrap();
    let excluded = report["excluded"].as_array().unwrap();
    assert!(excluded.iter().any(|e| e["name"] == "log" && e["verdict"] == "ExcludeVariadic"));
    assert!(stderr.contains("excluded"));
}

#[test]
fn test_second_run_leaves_files_untouched() {
    let project = TestProject::new();
    project.add_file("shapes.hpp", sample_headers::SHAPES);

    let first = ricegen(project.path(), &["generate", "shapes.hpp", "-o", "out"]);
    assert_eq!(first.status.code(), Some(0));
    let source = project.path().join("out/shapes-rb.cpp");
    let before = std::fs::read_to_string(&source).unwrap();

    let second = ricegen(project.path(), &["generate", "shapes.hpp", "-o", "out"]);
    assert_eq!(second.status.code(), Some(0));
    assert_eq!(std::fs::read_to_string(&source).unwrap(), before);
    assert!(String::from_utf8_lossy(&second.stderr).contains("(2 unchanged)"));
}

#[test]
fn test_dry_run_writes_nothing() {
    let project = TestProject::new();
    project.add_file("shapes.hpp", sample_headers::SHAPES);

    let output = ricegen(project.path(), &["generate", "shapes.hpp", "-o", "out", "--dry-run"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(!project.path().join("out").exists());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Dry run: 1 units"));
}

#[test]
fn test_ambiguous_overload_exits_with_emission_errors() {
    let project = TestProject::new();
    project.add_file("convert.hpp", "void convert(int a);\nvoid convert(const int a);\nvoid convert(double a);\n");

    let output = ricegen(project.path(), &["generate", "convert.hpp", "-o", "out"]);
    assert_eq!(output.status.code(), Some(2));
    // Units are still written.
    assert!(project.path().join("out/convert-rb.cpp").exists());
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn test_error_exit_codes() {
    let project = TestProject::new();

    // Nothing to process
    let output = ricegen(project.path(), &["generate"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("NO_INPUT"));

    // Unreadable header
    let output = ricegen(project.path(), &["generate", "missing.hpp"]);
    assert_eq!(output.status.code(), Some(5));

    // Invalid configuration aborts before anything is read
    write_config(&project, "[rules]\nmax_instantiation_rounds = 0\n");
    project.add_file("a.hpp", "int f();\n");
    let output = ricegen(project.path(), &["generate", "a.hpp"]);
    assert_eq!(output.status.code(), Some(6));
    assert!(!project.path().join("a-rb.cpp").exists());
}

#[test]
fn test_init_and_config_commands() {
    let project = TestProject::new();

    let output = ricegen(project.path(), &["init"]);
    assert_eq!(output.status.code(), Some(0));
    assert!(project.path().join("ricegen.toml").exists());

    let again = ricegen(project.path(), &["init"]);
    assert_eq!(again.status.code(), Some(6));

    let output = ricegen(project.path(), &["config"]);
    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("max_instantiation_rounds = 32"));
}
