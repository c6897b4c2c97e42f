//! Launch configuration for the MCP server subprocess
//!
//! Produces a deterministic command line: the same configuration always
//! yields the same arguments in the same order.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{bail, Result};
use serde::Deserialize;
use tokio::process::Command;

/// How to start the MCP server process (`[server]` in `.mcp-bridge.toml`)
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LaunchConfig {
    /// Program to run (a package runner such as `npx`)
    pub command: String,
    /// Arguments passed to the runner before the package spec
    pub runner_args: Vec<String>,
    /// Package providing the MCP server
    pub package: String,
    /// Pinned package version
    pub version: String,
    /// Start without reusing state from earlier runs
    pub isolated: bool,
    /// Additional server capabilities to enable
    pub capabilities: Vec<String>,
    /// Run the automated target without a visible window
    pub headless: bool,
    /// Persistent profile directory
    pub profile_dir: Option<PathBuf>,
    /// Appended verbatim after all generated flags
    pub extra_args: Vec<String>,
    /// Extra environment variables (values are shell-expanded)
    pub env: HashMap<String, String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            command: "npx".to_string(),
            runner_args: vec!["-y".to_string()],
            package: "@playwright/mcp".to_string(),
            version: "0.0.41".to_string(),
            isolated: true,
            capabilities: vec!["vision".to_string()],
            headless: false,
            profile_dir: None,
            extra_args: Vec::new(),
            env: HashMap::new(),
        }
    }
}

impl LaunchConfig {
    /// Reject configurations that would not be reproducible
    pub fn validate(&self) -> Result<()> {
        if self.command.trim().is_empty() {
            bail!("server command must not be empty");
        }
        if self.package.trim().is_empty() {
            bail!("server package must not be empty");
        }
        let version = self.version.trim();
        if version.is_empty() || version.eq_ignore_ascii_case("latest") {
            bail!(
                "server version must be pinned (got '{}') for package '{}'",
                self.version,
                self.package
            );
        }
        Ok(())
    }

    /// Package spec passed to the runner, e.g. `@playwright/mcp@0.0.41`
    pub fn package_spec(&self) -> String {
        format!("{}@{}", self.package, self.version)
    }

    /// Ordered argument list for the runner
    pub fn args(&self) -> Vec<String> {
        let mut args = self.runner_args.clone();
        args.push(self.package_spec());

        if self.isolated {
            args.push("--isolated".to_string());
        }
        if !self.capabilities.is_empty() {
            args.push(format!("--caps={}", self.capabilities.join(",")));
        }
        if self.headless {
            args.push("--headless".to_string());
        }
        if let Some(dir) = &self.profile_dir {
            let dir = dir.to_string_lossy();
            args.push(format!("--user-data-dir={}", shellexpand::tilde(&dir)));
        }

        args.extend(self.extra_args.iter().cloned());
        args
    }

    /// Build the process command (stdio is configured by the transport)
    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.args(self.args());

        // Sorted so the spawned environment is reproducible too
        let mut env: Vec<_> = self.env.iter().collect();
        env.sort();
        for (key, value) in env {
            let expanded = shellexpand::env(value).unwrap_or_else(|_| value.clone().into());
            cmd.env(key, expanded.as_ref());
        }
        cmd
    }

    /// Human-readable command line for logs
    pub fn display(&self) -> String {
        let mut parts = vec![self.command.clone()];
        parts.extend(self.args());
        parts.join(" ")
    }
}
