//! Production code propagates errors; it never panics on them.

use architectural_enforcement::violations;

#[test]
fn test_no_unwrap_in_production_code() {
    let found = violations(|line| line.contains(".unwrap()"));
    assert!(
        found.is_empty(),
        "unwrap() in production code:\n{}",
        found.join("\n")
    );
}

#[test]
fn test_no_expect_in_production_code() {
    let found = violations(|line| line.contains(".expect("));
    assert!(
        found.is_empty(),
        "expect() in production code:\n{}",
        found.join("\n")
    );
}
