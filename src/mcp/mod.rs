//! MCP server for mcpmend
//! Line-delimited JSON-RPC on stdio exposing the diagnosis and repair tools.

pub mod handlers;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::io::{BufRead, Write};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::MendConfig;
use crate::fixes::IssueCategory;
use crate::probe::{HostProbe, SystemProbe};
use handlers::ToolContext;

pub const PROTOCOL_VERSION: &str = "2024-11-05";

pub const PARSE_ERROR: i32 = -32700;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;

type Handler = fn(&ToolContext, &Value) -> Result<Value>;

/// Shape of a tool argument in the advertised input schema
enum ParamKind {
    Text,
    Flag,
    PortList,
    OneOf(&'static [&'static str]),
}

struct Param {
    name: &'static str,
    kind: ParamKind,
    description: &'static str,
}

struct ToolSpec {
    name: &'static str,
    description: &'static str,
    params: &'static [Param],
    handler: Handler,
}

const CONFIG_PATH: Param = Param {
    name: "configPath",
    kind: ParamKind::Text,
    description: "Path to the manifest (default: the desktop host's claude_desktop_config.json)",
};

const CATEGORY_NAMES: [&str; 6] = [
    IssueCategory::ConfigSyntax.as_str(),
    IssueCategory::DependencyMissing.as_str(),
    IssueCategory::PortConflict.as_str(),
    IssueCategory::PermissionError.as_str(),
    IssueCategory::ServerCrash.as_str(),
    IssueCategory::General.as_str(),
];

/// Every tool, in the order `tools/list` reports them
static TOOLS: [ToolSpec; 7] = [
    ToolSpec {
        name: "diagnose_config",
        description: "Analyze the MCP manifest for missing files, JSON syntax errors and invalid server entries",
        params: &[CONFIG_PATH],
        handler: handlers::diagnose_config,
    },
    ToolSpec {
        name: "check_server_status",
        description: "Check whether each configured MCP server is likely to start",
        params: &[Param {
            name: "serverName",
            kind: ParamKind::Text,
            description: "Only check the server with this name",
        }],
        handler: handlers::check_server_status,
    },
    ToolSpec {
        name: "repair_syntax",
        description: "Repair common JSON syntax errors in the manifest (missing or trailing commas, unescaped Windows paths). The original is backed up first.",
        params: &[
            CONFIG_PATH,
            Param {
                name: "createBackup",
                kind: ParamKind::Flag,
                description: "Back up the manifest before rewriting it (default: true; the manifest is never rewritten without a backup)",
            },
        ],
        handler: handlers::repair_syntax,
    },
    ToolSpec {
        name: "probe_dependencies",
        description: "Check that the runtimes MCP servers need (Node.js, npm, npx, Python, uv) are installed",
        params: &[],
        handler: handlers::probe_dependencies,
    },
    ToolSpec {
        name: "probe_ports",
        description: "Check whether ports commonly used by MCP servers are already taken",
        params: &[Param {
            name: "ports",
            kind: ParamKind::PortList,
            description: "Ports to check (default: 7777, 8080, 3000, 4000, 5000, 8000)",
        }],
        handler: handlers::probe_ports,
    },
    ToolSpec {
        name: "full_report",
        description: "Run every check and summarize the overall health of the MCP setup",
        params: &[Param {
            name: "includeLogAnalysis",
            kind: ParamKind::Flag,
            description: "Scan recent MCP log files for errors (default: true)",
        }],
        handler: handlers::full_report,
    },
    ToolSpec {
        name: "suggest_fixes",
        description: "Get step-by-step remediation for a category of problem",
        params: &[Param {
            name: "issueType",
            kind: ParamKind::OneOf(&CATEGORY_NAMES),
            description: "Problem category; issue type names from diagnose_config are accepted too",
        }],
        handler: handlers::suggest_fixes,
    },
];

impl ToolSpec {
    fn describe(&self) -> Tool {
        let mut properties = Map::new();
        for param in self.params {
            let mut schema = match param.kind {
                ParamKind::Text => json!({ "type": "string" }),
                ParamKind::Flag => json!({ "type": "boolean" }),
                ParamKind::PortList => json!({ "type": "array", "items": { "type": "number" } }),
                ParamKind::OneOf(choices) => json!({ "type": "string", "enum": choices }),
            };
            schema["description"] = Value::from(param.description);
            properties.insert(param.name.to_string(), schema);
        }

        Tool {
            name: self.name.to_string(),
            description: self.description.to_string(),
            input_schema: json!({
                "type": "object",
                "properties": properties,
                "required": []
            }),
        }
    }
}

/// MCP tool server bound to one settings/probe pair
pub struct McpServer {
    pub name: String,
    pub version: String,
    context: ToolContext,
}

impl Default for McpServer {
    fn default() -> Self {
        Self::with_config(MendConfig::default())
    }
}

/// JSON-RPC request structure
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: &str) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.to_string(),
                data: None,
            }),
        }
    }
}

/// Entry of the `tools/list` result
#[derive(Debug, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

impl McpServer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: MendConfig) -> Self {
        let probe: Arc<dyn HostProbe> = Arc::new(SystemProbe::from_settings(&config.probes));
        Self {
            name: "mcpmend-mcp".to_string(),
            version: crate::VERSION.to_string(),
            context: ToolContext { config, probe },
        }
    }

    /// Replace the host probe
    pub fn with_probe(mut self, probe: Arc<dyn HostProbe>) -> Self {
        self.context.probe = probe;
        self
    }

    /// Serve requests from stdin until it closes
    pub fn run(&self) -> Result<()> {
        let stdin = std::io::stdin();
        let mut out = std::io::stdout().lock();

        for line in stdin.lock().lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            if let Some(response) = self.handle_request(&line) {
                serde_json::to_writer(&mut out, &response)?;
                out.write_all(b"\n")?;
                out.flush()?;
            }
        }

        debug!("stdin closed, shutting down");
        Ok(())
    }

    /// Handle a single JSON-RPC message; notifications get no response
    pub fn handle_request(&self, input: &str) -> Option<JsonRpcResponse> {
        let request: JsonRpcRequest = match serde_json::from_str(input) {
            Ok(request) => request,
            Err(e) => {
                return Some(JsonRpcResponse::error(
                    None,
                    PARSE_ERROR,
                    &format!("Parse error: {}", e),
                ));
            }
        };

        let Some(id) = request.id else {
            debug!(method = %request.method, "notification");
            return None;
        };

        let response = match request.method.as_str() {
            "initialize" => JsonRpcResponse::success(Some(id), self.server_info()),
            "tools/list" => {
                let tools: Vec<Tool> = TOOLS.iter().map(ToolSpec::describe).collect();
                JsonRpcResponse::success(Some(id), json!({ "tools": tools }))
            }
            "tools/call" => self.call_tool(id, &request.params),
            other => JsonRpcResponse::error(
                Some(id),
                METHOD_NOT_FOUND,
                &format!("Method not found: {}", other),
            ),
        };
        Some(response)
    }

    fn server_info(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "serverInfo": {
                "name": self.name,
                "version": self.version
            },
            "capabilities": {
                "tools": {}
            }
        })
    }

    fn call_tool(&self, id: Value, params: &Value) -> JsonRpcResponse {
        let name = params.get("name").and_then(Value::as_str).unwrap_or("");
        let Some(spec) = TOOLS.iter().find(|spec| spec.name == name) else {
            return JsonRpcResponse::error(
                Some(id),
                INVALID_PARAMS,
                &format!("Unknown tool: {}", name),
            );
        };

        let empty = json!({});
        let arguments = params.get("arguments").unwrap_or(&empty);

        let outcome = catch_unwind(AssertUnwindSafe(|| (spec.handler)(&self.context, arguments)));
        let result = match outcome {
            Ok(Ok(payload)) => {
                let text = serde_json::to_string_pretty(&payload)
                    .unwrap_or_else(|_| payload.to_string());
                json!({ "content": [{ "type": "text", "text": text }] })
            }
            Ok(Err(e)) => {
                let message = format!("{:#}", e);
                debug!(tool = name, error = %message, "tool failed");
                tool_error(name, &message)
            }
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "tool panicked".to_string());
                warn!(tool = name, message = %message, "tool panicked");
                tool_error(name, &message)
            }
        };

        JsonRpcResponse::success(Some(id), result)
    }
}

fn tool_error(name: &str, message: &str) -> Value {
    json!({
        "content": [{
            "type": "text",
            "text": format!("Error executing {}: {}", name, message)
        }],
        "isError": true
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_names_are_unique() {
        for (i, spec) in TOOLS.iter().enumerate() {
            assert!(TOOLS[i + 1..].iter().all(|other| other.name != spec.name));
        }
    }

    #[test]
    fn test_schema_lists_every_param() {
        let repair = TOOLS.iter().find(|t| t.name == "repair_syntax").unwrap().describe();
        let props = repair.input_schema["properties"].as_object().unwrap();
        assert_eq!(props.len(), 2);
        assert_eq!(props["createBackup"]["type"], "boolean");
        assert_eq!(props["configPath"]["type"], "string");

        let ports = TOOLS.iter().find(|t| t.name == "probe_ports").unwrap().describe();
        assert_eq!(ports.input_schema["properties"]["ports"]["items"]["type"], "number");
    }
}
