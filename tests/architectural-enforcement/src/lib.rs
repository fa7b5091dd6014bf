//! Architectural Enforcement Integration Tests
//!
//! This package contains integration tests that enforce codebase rules:
//! - No `unwrap()` / `expect()` in production code
//! - Locks come from `parking_lot`, never `std::sync`
//! - No blocking calls inside `async fn` bodies
//!
//! The helpers here walk the workspace sources and hand back the
//! production lines of each file, with test modules and comments removed.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Source directories whose code ships
pub const PRODUCTION_DIRS: [&str; 2] = ["julelys/core/src", "julelys/daemon/src"];

/// One production line of a source file
#[derive(Debug, Clone)]
pub struct SourceLine {
    /// File the line belongs to
    pub path: PathBuf,
    /// 1-based line number
    pub number: usize,
    /// Line text
    pub text: String,
}

/// Workspace root (two levels above this crate)
#[must_use]
pub fn workspace_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Every `.rs` file under the production directories
#[must_use]
pub fn production_files() -> Vec<PathBuf> {
    let root = workspace_root();
    PRODUCTION_DIRS
        .iter()
        .flat_map(|dir| WalkDir::new(root.join(dir)).into_iter().filter_map(Result::ok))
        .filter(|entry| entry.path().extension().is_some_and(|ext| ext == "rs"))
        .map(|entry| entry.into_path())
        .collect()
}

/// Lines of `source` outside `#[cfg(test)]` items and comments
///
/// A `#[cfg(test)]` attribute hides the next item: a single line, or a
/// whole braced block.
#[must_use]
pub fn production_lines(path: &Path, source: &str) -> Vec<SourceLine> {
    let mut lines = Vec::new();
    let mut skip_next_item = false;
    let mut depth: i64 = 0;

    for (index, line) in source.lines().enumerate() {
        let trimmed = line.trim();

        if depth > 0 {
            depth += brace_balance(trimmed);
            continue;
        }
        if trimmed.starts_with("#[cfg(test)]") {
            skip_next_item = true;
            continue;
        }
        if skip_next_item {
            if trimmed.starts_with("#[") || trimmed.is_empty() {
                continue;
            }
            skip_next_item = false;
            depth = brace_balance(trimmed).max(0);
            continue;
        }
        if trimmed.starts_with("//") {
            continue;
        }

        lines.push(SourceLine {
            path: path.to_path_buf(),
            number: index + 1,
            text: line.to_string(),
        });
    }
    lines
}

fn brace_balance(line: &str) -> i64 {
    let opens = line.matches('{').count() as i64;
    let closes = line.matches('}').count() as i64;
    opens - closes
}

/// Production lines of every production file
#[must_use]
pub fn all_production_lines() -> Vec<SourceLine> {
    production_files()
        .into_iter()
        .filter_map(|path| {
            let source = fs::read_to_string(&path).ok()?;
            Some(production_lines(&path, &source))
        })
        .flatten()
        .collect()
}

/// Lines matching `predicate`, formatted for an assertion message
#[must_use]
pub fn violations(predicate: impl Fn(&str) -> bool) -> Vec<String> {
    all_production_lines()
        .into_iter()
        .filter(|line| predicate(&line.text))
        .map(|line| format!("{}:{}: {}", line.path.display(), line.number, line.text.trim()))
        .collect()
}

/// Brace tracking for one `async fn`
#[derive(Debug, Default)]
struct AsyncBody {
    depth: i64,
    opened: bool,
    blocking_floor: Option<i64>,
}

impl AsyncBody {
    fn step(&mut self, line: &str) {
        self.depth += brace_balance(line);
        self.opened |= line.contains('{');
    }

    fn closed(&self) -> bool {
        self.opened && self.depth <= 0
    }
}

/// Production lines inside `async fn` bodies
///
/// Closures handed to `spawn_blocking` run off the runtime, so their lines
/// are left out.
#[must_use]
pub fn async_body_lines(path: &Path, source: &str) -> Vec<SourceLine> {
    let mut lines = Vec::new();
    let mut body: Option<AsyncBody> = None;

    for line in production_lines(path, source) {
        let text = line.text.trim().to_string();

        let Some(state) = body.as_mut() else {
            if text.contains("async fn ") && !text.ends_with(';') {
                let mut state = AsyncBody::default();
                state.step(&text);
                if !state.closed() {
                    body = Some(state);
                }
            }
            continue;
        };

        if !state.opened && text.ends_with(';') {
            body = None;
            continue;
        }

        let inside = state.opened;
        if state.blocking_floor.is_none() && text.contains("spawn_blocking(") {
            state.blocking_floor = Some(state.depth);
        }
        state.step(&text);

        let offloaded = state.blocking_floor.is_some();
        if state.blocking_floor.is_some_and(|floor| state.depth <= floor) {
            state.blocking_floor = None;
        }
        let closed = state.closed();

        if inside && !offloaded && !closed {
            lines.push(line);
        }
        if closed {
            body = None;
        }
    }
    lines
}

/// Lines of `async fn` bodies matching `predicate`
#[must_use]
pub fn async_violations(predicate: impl Fn(&str) -> bool) -> Vec<String> {
    production_files()
        .into_iter()
        .filter_map(|path| {
            let source = fs::read_to_string(&path).ok()?;
            Some(async_body_lines(&path, &source))
        })
        .flatten()
        .filter(|line| predicate(&line.text))
        .map(|line| format!("{}:{}: {}", line.path.display(), line.number, line.text.trim()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cfg_test_module_is_skipped() {
        let source = "fn a() {}\n#[cfg(test)]\nmod tests {\n    fn b() { x.unwrap(); }\n}\nfn c() {}\n";
        let lines = production_lines(Path::new("x.rs"), source);
        let texts: Vec<&str> = lines.iter().map(|l| l.text.as_str()).collect();
        assert_eq!(texts, vec!["fn a() {}", "fn c() {}"]);
    }

    #[test]
    fn test_cfg_test_single_line_is_skipped() {
        let source = "#[cfg(test)]\npub(crate) use context::testing;\nuse std::fs;\n";
        let lines = production_lines(Path::new("x.rs"), source);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].number, 3);
    }

    fn async_texts(source: &str) -> Vec<String> {
        async_body_lines(Path::new("x.rs"), source)
            .into_iter()
            .map(|l| l.text.trim().to_string())
            .collect()
    }

    #[test]
    fn test_async_body_lines() {
        let source = "\
fn sync() {
    std::fs::read(\"a\");
}
pub async fn serve(
    path: &Path,
) -> Result<()> {
    let x = load();
    if x {
        std::fs::write(\"b\");
    }
    Ok(())
}
fn after() {}
";
        assert_eq!(
            async_texts(source),
            vec!["let x = load();", "if x {", "std::fs::write(\"b\");", "}", "Ok(())"]
        );
    }

    #[test]
    fn test_spawn_blocking_closures_are_skipped() {
        let source = "\
async fn handle(c: Arc<Controller>) {
    tokio::task::spawn_blocking(move || c.turn_off()).await;
    let done = tokio::task::spawn_blocking(move || {
        c.run_sequences(&names);
    })
    .await;
    c.status();
}
";
        assert_eq!(async_texts(source), vec![".await;", "c.status();"]);
    }

    #[test]
    fn test_trait_async_declaration_has_no_body() {
        let source = "trait T {\n    async fn f(&self);\n}\nfn g() { std::fs::read(\"a\"); }\n";
        assert!(async_texts(source).is_empty());
    }

    #[test]
    fn test_production_files_found() {
        assert!(production_files().iter().any(|p| p.ends_with("lib.rs")));
    }
}
