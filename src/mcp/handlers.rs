//! MCP tool handlers for mcpmend

use anyhow::{Context, Result};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::checks::{self, dependencies, ports, servers};
use crate::config::MendConfig;
use crate::fixes;
use crate::probe::{HostProbe, ProbePool};
use crate::repair;
use crate::report;
use crate::utils::block_on;

/// Everything a tool call needs; built once per server
pub struct ToolContext {
    pub config: MendConfig,
    pub probe: Arc<dyn HostProbe>,
}

impl ToolContext {
    fn manifest_path(&self, args: &Value) -> PathBuf {
        let explicit = args.get("configPath").and_then(|v| v.as_str()).map(Path::new);
        self.config.manifest_path(explicit)
    }

    fn pool(&self) -> ProbePool {
        ProbePool::from_settings(&self.config.probes)
    }
}

/// Analyze the manifest
pub fn diagnose_config(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let path = ctx.manifest_path(args);
    let report = checks::diagnose(&path, &ctx.config, ctx.probe.as_ref());
    Ok(serde_json::to_value(report)?)
}

/// Launch readiness of each server
pub fn check_server_status(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let path = ctx.manifest_path(args);
    let only = args.get("serverName").and_then(|v| v.as_str());
    let pool = ctx.pool();

    let report = block_on(servers::check_manifest_servers(
        &path,
        only,
        Arc::clone(&ctx.probe),
        &pool,
    ))?
    .with_context(|| format!("Cannot check server status for {}", path.display()))?;
    Ok(serde_json::to_value(report)?)
}

/// Repair JSON syntax in place.
///
/// An explicit `configPath` is repaired as given, never swapped for the
/// default manifest.
pub fn repair_syntax(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let path = match args.get("configPath").and_then(|v| v.as_str()) {
        Some(explicit) => PathBuf::from(explicit),
        None => ctx.config.manifest_path(None),
    };
    let create_backup = args
        .get("createBackup")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    let result = repair::apply_repair(&path, create_backup);
    Ok(serde_json::to_value(result)?)
}

pub fn probe_dependencies(ctx: &ToolContext, _args: &Value) -> Result<Value> {
    let pool = ctx.pool();
    let report = block_on(dependencies::probe_dependencies(
        &ctx.config.probes.dependencies,
        Arc::clone(&ctx.probe),
        &pool,
    ))?;
    Ok(serde_json::to_value(report)?)
}

pub fn probe_ports(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let requested = match args.get("ports") {
        Some(Value::Array(items)) if !items.is_empty() => parse_ports(items)?,
        _ => ctx.config.probes.ports.clone(),
    };
    let pool = ctx.pool();
    let report = block_on(ports::probe_ports(&requested, Arc::clone(&ctx.probe), &pool))?;
    Ok(serde_json::to_value(report)?)
}

/// Run every check and summarize
pub fn full_report(ctx: &ToolContext, args: &Value) -> Result<Value> {
    let include_logs = args
        .get("includeLogAnalysis")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);
    let path = ctx.manifest_path(args);

    let report = block_on(report::full_report(
        &path,
        include_logs,
        &ctx.config,
        Arc::clone(&ctx.probe),
    ))?;
    Ok(serde_json::to_value(report)?)
}

pub fn suggest_fixes(_ctx: &ToolContext, args: &Value) -> Result<Value> {
    let issue_type = args.get("issueType").and_then(|v| v.as_str());
    Ok(serde_json::to_value(fixes::suggest_fixes(issue_type))?)
}

fn parse_ports(items: &[Value]) -> Result<Vec<u16>> {
    items
        .iter()
        .map(|item| {
            item.as_u64()
                .filter(|p| (1..=u64::from(u16::MAX)).contains(p))
                .map(|p| p as u16)
                .with_context(|| format!("Invalid port: {}", item))
        })
        .collect()
}
