//! Architectural Enforcement
//!
//! Source scanners shared by the policy tests in `tests/`:
//! - No blocking I/O inside async production code
//! - No sleeping in production code outside frame pacing and mock latency
//!
//! The scanners are line based. They recognise function headers, test
//! attributes, and the `#[cfg(test)]` module that closes most source files;
//! they do not parse Rust.

use std::fmt;
use std::path::{Path, PathBuf};

/// Production source trees checked by the policies
pub const PRODUCTION_DIRS: &[&str] = &["widget/core/src", "tui/src"];

/// One policy violation
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// File the violation is in
    pub path: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// What rule was broken
    pub reason: &'static str,
    /// The offending source line, trimmed
    pub text: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} - {}: {}",
            self.path.display(),
            self.line,
            self.reason,
            self.text
        )
    }
}

/// Workspace root (two levels above this package)
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../..")
}

/// Every `.rs` file under `dir`, sorted
pub fn rust_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("rs"))
        .map(walkdir::DirEntry::into_path)
        .collect();
    files.sort();
    files
}

/// The part of a line before any `//` comment
pub fn code_part(line: &str) -> &str {
    line.split("//").next().unwrap_or(line)
}

/// Strip visibility so `pub(crate) async fn` reads as `async fn`
fn without_visibility(line: &str) -> &str {
    let line = line.trim();
    if let Some(rest) = line.strip_prefix("pub(crate) ") {
        return rest;
    }
    if let Some(rest) = line.strip_prefix("pub(super) ") {
        return rest;
    }
    line.strip_prefix("pub ").unwrap_or(line)
}

/// Whether `line` opens a function
pub fn is_fn_header(line: &str) -> bool {
    let line = without_visibility(line);
    line.starts_with("fn ") || line.starts_with("async fn ")
}

/// Index of the function header enclosing `idx`, if any
pub fn enclosing_fn(lines: &[&str], idx: usize) -> Option<usize> {
    for i in (0..=idx).rev() {
        let line = lines[i].trim();
        if is_fn_header(line) {
            return Some(i);
        }
        if without_visibility(line).starts_with("mod ") {
            return None;
        }
    }
    None
}

/// Whether `idx` sits inside an `async fn`
pub fn is_in_async_fn(lines: &[&str], idx: usize) -> bool {
    enclosing_fn(lines, idx).is_some_and(|i| without_visibility(lines[i]).starts_with("async fn "))
}

/// Whether `idx` is test code: after a `#[cfg(test)]` marker, or in a
/// function carrying a test attribute
pub fn is_in_test_code(lines: &[&str], idx: usize) -> bool {
    if lines[..idx].iter().any(|l| l.trim() == "#[cfg(test)]") {
        return true;
    }
    let Some(header) = enclosing_fn(lines, idx) else {
        return false;
    };
    lines[..header]
        .iter()
        .rev()
        .map(|l| l.trim())
        .take_while(|l| l.starts_with("#[") || l.starts_with("///"))
        .any(|l| l.starts_with("#[test]") || l.starts_with("#[tokio::test"))
}

/// Whether any line within `before`/`after` lines of `idx` contains one of
/// `needles` (case-insensitive)
pub fn context_mentions(
    lines: &[&str],
    idx: usize,
    before: usize,
    after: usize,
    needles: &[&str],
) -> bool {
    let end = (idx + after + 1).min(lines.len());
    lines[idx.saturating_sub(before)..end].iter().any(|line| {
        let line = line.to_lowercase();
        needles.iter().any(|n| line.contains(n))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_async_detection_sees_through_visibility() {
        let code = [
            "impl Store {",
            "    pub(crate) async fn load(&self) {",
            "        let raw = std::fs::read_to_string(&self.path);",
            "    }",
            "    pub fn path(&self) -> &Path {",
            "        &self.path",
            "    }",
            "}",
        ];
        assert!(is_in_async_fn(&code, 2));
        assert!(!is_in_async_fn(&code, 5));
        assert_eq!(enclosing_fn(&code, 0), None);
    }

    #[test]
    fn test_test_code_detection() {
        let code = [
            "#[tokio::test(start_paused = true)]",
            "async fn test_poll() {",
            "    tokio::time::sleep(Duration::from_secs(1)).await;",
            "}",
            "async fn production() {",
            "    work().await;",
            "}",
            "#[cfg(test)]",
            "mod tests {",
            "    fn helper() {}",
            "}",
        ];
        assert!(is_in_test_code(&code, 2));
        assert!(!is_in_test_code(&code, 5));
        assert!(is_in_test_code(&code, 9));
    }

    #[test]
    fn test_code_part_drops_comments() {
        assert_eq!(code_part("let x = 1; // std::fs::read"), "let x = 1; ");
        assert!(context_mentions(&["a", "// Frame tick", "sleep"], 2, 2, 0, &["frame"]));
        assert!(!context_mentions(&["a", "b", "sleep"], 2, 2, 0, &["frame"]));
    }
}
