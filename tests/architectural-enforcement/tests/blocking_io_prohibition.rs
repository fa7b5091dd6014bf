//! No blocking calls on the async runtime
//!
//! Inside an `async fn` body, file I/O goes through `tokio::fs` and
//! controller commands that take the reconfiguration lock or touch the
//! store run under `spawn_blocking`. Synchronous helpers called before the
//! server starts are not checked.

use architectural_enforcement::async_violations;

const BLOCKING_FS: [&str; 11] = [
    "fs::read",
    "fs::write",
    "fs::remove_file",
    "fs::remove_dir",
    "fs::create_dir",
    "fs::rename",
    "fs::metadata",
    "fs::set_permissions",
    "fs::copy",
    "File::open",
    "File::create",
];

const BLOCKING_COMMANDS: [&str; 8] = [
    "controller.run_sequences(",
    "controller.turn_on(",
    "controller.turn_off(",
    "controller.create_sequence(",
    "controller.update_sequence(",
    "controller.preview(",
    "controller.load_custom_sequences(",
    "controller.restore_active(",
];

fn outside_tokio(line: &str, call: &str) -> bool {
    line.match_indices(call)
        .any(|(at, _)| !line[..at].ends_with("tokio::"))
}

fn blocks_runtime(line: &str) -> bool {
    BLOCKING_FS.iter().any(|call| outside_tokio(line, call))
        || line.contains("thread::sleep")
        || line.contains("std::io::stdin()")
        || BLOCKING_COMMANDS.iter().any(|call| line.contains(call))
}

#[test]
fn test_no_blocking_calls_in_async_fns() {
    let found = async_violations(blocks_runtime);
    assert!(
        found.is_empty(),
        "Blocking calls inside async fns (use tokio::fs or spawn_blocking):\n{}",
        found.join("\n")
    );
}

#[test]
fn test_detector_matches_blocking_calls() {
    assert!(blocks_runtime("std::fs::read_to_string(&path)?;"));
    assert!(blocks_runtime("fs::remove_file(&self.socket_path)?;"));
    assert!(blocks_runtime("thread::sleep(Duration::from_millis(5));"));
    assert!(blocks_runtime("controller.create_sequence(&name, &description, &code)"));
    assert!(blocks_runtime("self.controller.restore_active();"));

    assert!(!blocks_runtime("tokio::fs::remove_file(&self.socket_path).await"));
    assert!(!blocks_runtime("tokio::fs::set_permissions(&p, fs::Permissions::from_mode(0o600)).await?;"));
    assert!(!blocks_runtime("controller.status()"));
    assert!(!blocks_runtime("blocking(controller, Controller::turn_off).await"));
}
