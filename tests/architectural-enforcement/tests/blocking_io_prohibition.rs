//! Integration Test: Blocking I/O Prohibition
//!
//! **Policy**: async production code in the widget core and the TUI MUST NOT
//! block the runtime.
//! **Required**: `tokio::fs`, `tokio::net`, `tokio::process`, async `reqwest`.
//!
//! Synchronous functions may use `std::fs` (settings load and log setup run
//! before or outside the widget's tasks).

use std::fs;
use std::path::Path;

use architectural_enforcement::{
    code_part, is_in_async_fn, is_in_test_code, rust_files, workspace_root, Violation,
    PRODUCTION_DIRS,
};

/// Patterns that block wherever they appear in an async fn
const BLOCKING_IN_ASYNC: &[(&str, &str)] = &[
    ("std::fs::", "Blocking file I/O"),
    ("std::net::", "Blocking network I/O"),
    ("std::process::Command", "Blocking process I/O"),
    ("std::io::stdin()", "Blocking stdin in async"),
    ("std::thread::sleep", "Blocking sleep in async"),
];

#[test]
fn test_no_blocking_io_in_async_production_code() {
    let violations = find_blocking_io_violations();

    if !violations.is_empty() {
        eprintln!("\n❌ Blocking I/O found in async production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ Use tokio::fs / tokio::net / tokio::process instead,");
        eprintln!("   or move the call into a synchronous function run before the widget starts.");

        panic!(
            "\nFound {} blocking I/O violation(s) in production code.",
            violations.len()
        );
    }
}

#[test]
fn test_production_dirs_exist() {
    for dir in PRODUCTION_DIRS {
        let path = workspace_root().join(dir);
        assert!(path.is_dir(), "missing source tree {}", path.display());
        assert!(!rust_files(&path).is_empty());
    }
}

fn find_blocking_io_violations() -> Vec<Violation> {
    let mut violations = Vec::new();
    for dir in PRODUCTION_DIRS {
        for path in rust_files(&workspace_root().join(dir)) {
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            let lines: Vec<&str> = content.lines().collect();
            violations.extend(scan(&path, &lines));
        }
    }
    violations
}

fn scan(path: &Path, lines: &[&str]) -> Vec<Violation> {
    let mut found = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let code = code_part(line);

        // The blocking client is never acceptable
        if code.contains("reqwest::blocking") {
            found.push(violation(path, idx, "Blocking HTTP client", line));
            continue;
        }

        if is_in_test_code(lines, idx) || !is_in_async_fn(lines, idx) {
            continue;
        }
        for (pattern, reason) in BLOCKING_IN_ASYNC {
            if code.contains(pattern) {
                found.push(violation(path, idx, reason, line));
            }
        }
    }
    found
}

fn violation(path: &Path, idx: usize, reason: &'static str, line: &str) -> Violation {
    Violation {
        path: path.to_path_buf(),
        line: idx + 1,
        reason,
        text: line.trim().to_string(),
    }
}

#[test]
fn test_detector_flags_std_fs_in_async_fn() {
    let code = [
        "pub async fn load(path: &Path) -> String {",
        "    std::fs::read_to_string(path).unwrap_or_default()",
        "}",
        "fn load_settings(path: &Path) -> String {",
        "    std::fs::read_to_string(path).unwrap_or_default()",
        "}",
    ];
    let found = scan(Path::new("demo.rs"), &code);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].line, 2);
    assert_eq!(found[0].reason, "Blocking file I/O");
}

#[test]
fn test_detector_flags_blocking_client_anywhere() {
    let code = [
        "fn fetch() {",
        "    let c = reqwest::blocking::Client::new();",
        "}",
    ];
    assert_eq!(scan(Path::new("demo.rs"), &code).len(), 1);
}
