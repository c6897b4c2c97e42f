//! Verify E2E test prerequisites before running tests

use std::process::{Command, Stdio};

/// Check if `npx` can be run
pub fn check_npx() -> bool {
    Command::new("npx")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[test]
#[ignore = "prerequisites check - run first"]
fn test_prerequisites() {
    println!("\n=== E2E Prerequisites Check ===\n");

    let npx_ok = check_npx();
    println!("npx: {}", if npx_ok { "✓ Found" } else { "✗ Not found" });
    println!();

    assert!(npx_ok, "npx not found. Install Node.js to run the Playwright MCP server");
}
