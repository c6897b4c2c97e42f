//! E2E test: full bridge lifecycle with `npx @playwright/mcp`

use std::sync::Arc;
use std::time::Duration;

use mcp_bridge::bridge::{Bridge, SessionContext, SessionTool};
use mcp_bridge::config::BridgeConfig;
use mcp_bridge::mcp::{Connection, ConnectionState, ToolOutcome};
use serde_json::json;

fn headless_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.server.headless = true;
    config
}

#[tokio::test]
#[ignore = "requires npx and @playwright/mcp"]
async fn test_discovers_browser_tools() {
    let ctx = SessionContext::new("e2e-discover");
    let bridge = Bridge::connect(&headless_config(), &ctx)
        .await
        .expect("Failed to start Playwright MCP server");

    let names: Vec<&str> = bridge.tools().iter().map(|t| t.name()).collect();
    println!("Discovered {} tools: {:?}", names.len(), names);

    assert!(names.contains(&"browser_navigate"));
    assert!(names.contains(&"browser_snapshot"));
    assert!(bridge.session_tools().iter().all(|t| t.parameters_schema().is_object()));

    bridge.cleanup().await;
    assert_eq!(bridge.connection().state(), ConnectionState::Closed);
}

#[tokio::test]
#[ignore = "requires npx and @playwright/mcp"]
async fn test_navigate_and_snapshot() {
    let ctx = SessionContext::new("e2e-navigate");
    let bridge = Bridge::connect(&headless_config(), &ctx)
        .await
        .expect("Failed to start Playwright MCP server");

    let navigate = bridge.tool("browser_navigate").expect("browser_navigate missing");
    let outcome = navigate
        .execute(json!({"url": "data:text/html,<h1>bridge e2e</h1>"}))
        .await;
    println!("navigate: {}", outcome.message());
    assert!(outcome.is_success(), "navigate failed: {}", outcome.message());

    let snapshot = bridge.tool("browser_snapshot").expect("browser_snapshot missing");
    let outcome = snapshot.execute(json!({})).await;
    assert!(outcome.is_success());
    assert!(outcome.message().contains("bridge e2e"));

    bridge.cleanup().await;
}

#[tokio::test]
#[ignore = "requires npx and @playwright/mcp"]
async fn test_sessions_get_separate_servers() {
    let config = headless_config();
    let first = Bridge::connect(&config, &SessionContext::new("e2e-a"))
        .await
        .expect("first bridge");
    let second = Bridge::connect(&config, &SessionContext::new("e2e-b"))
        .await
        .expect("second bridge");

    assert!(!Arc::ptr_eq(first.connection(), second.connection()));

    first.cleanup().await;
    let outcome = second
        .tool("browser_navigate")
        .unwrap()
        .execute(json!({"url": "data:text/html,<p>still alive</p>"}))
        .await;
    assert!(outcome.is_success(), "second bridge broke: {}", outcome.message());

    second.cleanup().await;
}

#[tokio::test]
#[ignore = "requires npx and @playwright/mcp"]
async fn test_cancelled_session_skips_server() {
    let ctx = SessionContext::new("e2e-cancel");
    let connection = Arc::new(Connection::from_config(&headless_config()));
    let bridge = mcp_bridge::build_bridge(connection.clone(), &ctx)
        .await
        .expect("bridge");

    ctx.cancel.cancel();
    let outcome = tokio::time::timeout(
        Duration::from_secs(1),
        bridge.tool("browser_navigate").unwrap().execute(json!({"url": "about:blank"})),
    )
    .await
    .expect("cancelled call should return immediately");
    assert_eq!(outcome, ToolOutcome::Cancelled);

    mcp_bridge::cleanup(&connection).await;
}
