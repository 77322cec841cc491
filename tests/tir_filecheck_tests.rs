//! FileCheck-style tests for TIR files
//!
//! Every `.tir` file under `tests/filetest` carries RUN and CHECK directives;
//! this suite compiles each one as its RUN lines ask and validates the output.

use std::fs;
use std::path::{Path, PathBuf};
use tribe::tir::{CheckDirective, TestRunner, TestSpec};

fn filetest_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("filetest")
}

/// Test helper that runs a TIR file through FileCheck validation
fn run_filecheck_test(tir_file: &str) {
    let _ = env_logger::builder().is_test(true).try_init();
    let path = filetest_dir().join(tir_file);
    let contents = fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("Failed to read {}: {}", path.display(), e));

    let spec = TestSpec::parse(&contents)
        .unwrap_or_else(|e| panic!("Failed to parse test spec from {}: {}", tir_file, e));

    let runner = TestRunner::new(false);
    runner
        .run_test(&spec)
        .unwrap_or_else(|e| panic!("Test {} failed: {}", tir_file, e));
}

#[test]
fn test_lower_relational_filecheck() {
    run_filecheck_test("lower_relational.tir");
}

#[test]
fn test_short_circuit_filecheck() {
    run_filecheck_test("short_circuit.tir");
}

#[test]
fn test_full_bool_ext_filecheck() {
    run_filecheck_test("full_bool_ext.tir");
}

#[test]
fn test_truth_value_filecheck() {
    run_filecheck_test("truth_value.tir");
}

#[test]
fn test_store_forward_filecheck() {
    run_filecheck_test("store_forward.tir");
}

#[test]
fn test_line_markers_filecheck() {
    run_filecheck_test("line_markers.tir");
}

#[test]
fn test_temp_overflow_filecheck() {
    run_filecheck_test("temp_overflow.tir");
}

#[test]
fn test_extra_chars_filecheck() {
    run_filecheck_test("extra_chars.tir");
}

/// Every file in the directory passes, including ones without a named test.
#[test]
fn test_all_filetests() {
    let mut files: Vec<PathBuf> = fs::read_dir(filetest_dir())
        .expect("filetest directory exists")
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|s| s.to_str()) == Some("tir"))
        .collect();
    files.sort();
    assert!(files.len() >= 8, "found only {} filetests", files.len());

    let mut failures = Vec::new();
    for path in &files {
        let contents = fs::read_to_string(path).unwrap();
        let result = TestSpec::parse(&contents).and_then(|spec| TestRunner::new(false).run_test(&spec));
        if let Err(e) = result {
            failures.push(format!("{}: {}", path.display(), e));
        }
    }
    assert!(failures.is_empty(), "failing filetests:\n{}", failures.join("\n"));
}

#[cfg(test)]
mod filecheck_internals {
    use super::*;

    #[test]
    fn test_check_directive_parsing() {
        let content = r#"; RUN: tripc --eval %s
; CHECK: foo
; CHECK-LABEL: bar
; CHECK-NEXT: baz
; CHECK-EMPTY
; COM: comment
ret"#;

        let spec = TestSpec::parse(content).unwrap();
        assert_eq!(spec.check_directives.len(), 5);
        assert_eq!(spec.check_directives[0], CheckDirective::Check("foo".to_string()));
        assert_eq!(spec.check_directives[1], CheckDirective::CheckLabel("bar".to_string()));
        assert_eq!(spec.tir_content, "ret");
    }

    #[test]
    fn test_verbose_runner() {
        let runner = TestRunner::new(true);
        let output = "Line 1\nLine 2\nLine 3\n";
        let directives = vec![
            CheckDirective::Check("Line 1".to_string()),
            CheckDirective::CheckNext("Line 2".to_string()),
        ];

        runner.validate_output(output, &directives).unwrap();
    }

    #[test]
    fn test_mismatch_is_reported() {
        let content = "; RUN: tripc %s\n; CHECK: retarg\nret\n";
        let spec = TestSpec::parse(content).unwrap();
        let err = TestRunner::new(false).run_test(&spec).unwrap_err();
        assert!(err.contains("'retarg' not found"), "{err}");
    }
}
