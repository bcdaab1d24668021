//! Integration Test: Sleep Prohibition
//!
//! **Policy**: production code waits on I/O, timers it owns, or channels. It
//! never sleeps to "wait" for something.
//! **Exceptions**: frame pacing in the TUI event loop, the mock API's
//! simulated latency, periodic tasks driven by `tokio::time::interval`, and
//! test code.

use std::fs;
use std::path::Path;

use architectural_enforcement::{
    code_part, context_mentions, is_in_test_code, rust_files, workspace_root, Violation,
};

struct SleepPolicy {
    /// Source tree, relative to the workspace root
    dir: &'static str,
    /// Frame pacing sleeps in `tui/src/app.rs`
    allow_frame_limiting: bool,
    /// Configured latency in the mock API
    allow_simulated_latency: bool,
}

const POLICIES: &[SleepPolicy] = &[
    SleepPolicy {
        dir: "tui/src",
        allow_frame_limiting: true,
        allow_simulated_latency: false,
    },
    SleepPolicy {
        dir: "widget/core/src",
        allow_frame_limiting: false,
        allow_simulated_latency: true,
    },
];

#[test]
fn test_no_sleep_in_production_code() {
    let mut violations = Vec::new();
    for policy in POLICIES {
        for path in rust_files(&workspace_root().join(policy.dir)) {
            let Ok(content) = fs::read_to_string(&path) else {
                continue;
            };
            let lines: Vec<&str> = content.lines().collect();
            violations.extend(scan(&path, &lines, policy));
        }
    }

    if !violations.is_empty() {
        eprintln!("\n❌ Sleep calls found in production code!\n");
        for violation in &violations {
            eprintln!("  ❌ {violation}");
        }
        eprintln!("\n✅ ACCEPTABLE sleep uses:");
        eprintln!("  - Frame pacing in the TUI event loop");
        eprintln!("  - Simulated latency in the mock API");
        eprintln!("  - Periodic tasks using tokio::time::interval()");
        eprintln!("  - Test code");

        panic!(
            "\nFound {} sleep violation(s) in production code.",
            violations.len()
        );
    }
}

fn scan(path: &Path, lines: &[&str], policy: &SleepPolicy) -> Vec<Violation> {
    let mut found = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let code = code_part(line);
        if !(code.contains("::sleep(") || code.contains(".sleep(")) {
            continue;
        }
        if is_in_test_code(lines, idx) {
            continue;
        }
        if policy.allow_frame_limiting
            && path.ends_with("tui/src/app.rs")
            && context_mentions(lines, idx, 10, 5, &["frame", "fps"])
        {
            continue;
        }
        if policy.allow_simulated_latency
            && path.ends_with("api/mock.rs")
            && context_mentions(lines, idx, 5, 0, &["delay"])
        {
            continue;
        }
        if context_mentions(lines, idx, 20, 5, &["interval.tick()", "tokio::time::interval"]) {
            continue;
        }

        found.push(Violation {
            path: path.to_path_buf(),
            line: idx + 1,
            reason: "Sleep in production code",
            text: line.trim().to_string(),
        });
    }
    found
}

#[test]
fn test_detector_allows_frame_pacing_only_in_app() {
    let code = [
        "async fn run(&mut self) {",
        "    let frame_duration = Duration::from_millis(33);",
        "    tokio::time::sleep(frame_duration).await;",
        "}",
    ];
    let tui = &POLICIES[0];
    assert!(scan(Path::new("tui/src/app.rs"), &code, tui).is_empty());
    assert_eq!(scan(Path::new("tui/src/display.rs"), &code, tui).len(), 1);
}

#[test]
fn test_detector_flags_polling_sleep() {
    let code = [
        "async fn wait_for_config(&self) {",
        "    while self.config.is_none() {",
        "        tokio::time::sleep(Duration::from_millis(50)).await;",
        "    }",
        "}",
    ];
    let found = scan(Path::new("widget/core/src/widget.rs"), &code, &POLICIES[1]);
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].line, 3);
}

#[test]
fn test_detector_skips_test_module() {
    let code = [
        "#[cfg(test)]",
        "mod tests {",
        "    async fn helper() {",
        "        tokio::time::sleep(Duration::from_secs(61)).await;",
        "    }",
        "}",
    ];
    assert!(scan(Path::new("widget/core/src/refresh.rs"), &code, &POLICIES[1]).is_empty());
}
