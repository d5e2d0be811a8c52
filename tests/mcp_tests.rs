//! MCP (Model Context Protocol) tests for mcpmend
//!
//! Drives the tool server one JSON-RPC line at a time.

mod common;

use serde_json::{json, Value};
use tempfile::TempDir;

use common::{backups_in, test_config, write_manifest, StubProbe};
use mcpmend::mcp::{McpServer, INVALID_PARAMS, METHOD_NOT_FOUND, PARSE_ERROR};
use mcpmend::repair::writer::backup_path_for;

fn server(dir: &TempDir) -> McpServer {
    McpServer::with_config(test_config(dir))
        .with_probe(StubProbe::with_commands(&["node", "npm", "npx"]).shared())
}

fn call(server: &McpServer, request: Value) -> Value {
    let response = server
        .handle_request(&request.to_string())
        .expect("Request with an id should get a response");
    serde_json::to_value(response).unwrap()
}

fn call_tool(server: &McpServer, name: &str, arguments: Value) -> Value {
    call(
        server,
        json!({
            "jsonrpc": "2.0",
            "id": 7,
            "method": "tools/call",
            "params": { "name": name, "arguments": arguments }
        }),
    )
}

/// Parse the text content of a successful tool result
fn tool_payload(response: &Value) -> Value {
    assert!(response["result"].get("isError").is_none(), "unexpected tool error: {}", response);
    let text = response["result"]["content"][0]["text"]
        .as_str()
        .expect("Tool result should carry text content");
    serde_json::from_str(text).expect("Tool text should be JSON")
}

// ============================================================================
// Protocol Tests
// ============================================================================

#[test]
fn test_initialize_response_structure() {
    let dir = TempDir::new().unwrap();
    let response = call(
        &server(&dir),
        json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
    );

    assert_eq!(response["jsonrpc"], "2.0");
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(response["result"]["serverInfo"]["name"], "mcpmend-mcp");
    assert!(response["result"]["capabilities"]["tools"].is_object());
}

#[test]
fn test_request_with_string_id_is_echoed() {
    let dir = TempDir::new().unwrap();
    let response = call(
        &server(&dir),
        json!({"jsonrpc": "2.0", "id": "abc-123", "method": "initialize"}),
    );
    assert_eq!(response["id"], "abc-123");
}

#[test]
fn test_notification_gets_no_response() {
    let dir = TempDir::new().unwrap();
    let server = server(&dir);
    let notification = json!({"jsonrpc": "2.0", "method": "notifications/initialized"});
    assert!(server.handle_request(&notification.to_string()).is_none());
}

#[test]
fn test_parse_error_code() {
    let dir = TempDir::new().unwrap();
    let response = server(&dir)
        .handle_request("{not json")
        .expect("Parse errors are answered");
    let value = serde_json::to_value(response).unwrap();
    assert_eq!(value["error"]["code"], PARSE_ERROR);
    assert!(value.get("result").is_none());
}

#[test]
fn test_method_not_found_error_code() {
    let dir = TempDir::new().unwrap();
    let response = call(
        &server(&dir),
        json!({"jsonrpc": "2.0", "id": 2, "method": "resources/list"}),
    );
    assert_eq!(response["error"]["code"], METHOD_NOT_FOUND);
    assert!(response["error"]["message"]
        .as_str()
        .unwrap()
        .contains("resources/list"));
}

#[test]
fn test_unknown_tool_is_invalid_params() {
    let dir = TempDir::new().unwrap();
    let response = call_tool(&server(&dir), "format_disk", json!({}));
    assert_eq!(response["error"]["code"], INVALID_PARAMS);
}

#[test]
fn test_tools_list_response_structure() {
    let dir = TempDir::new().unwrap();
    let response = call(
        &server(&dir),
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/list"}),
    );

    let tools = response["result"]["tools"].as_array().expect("tools array");
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert_eq!(
        names,
        vec![
            "diagnose_config",
            "check_server_status",
            "repair_syntax",
            "probe_dependencies",
            "probe_ports",
            "full_report",
            "suggest_fixes"
        ]
    );

    for tool in tools {
        assert!(tool["description"].as_str().map_or(false, |d| !d.is_empty()));
        assert_eq!(tool["inputSchema"]["type"], "object");
    }
}

#[test]
fn test_suggest_fixes_schema_lists_categories() {
    let dir = TempDir::new().unwrap();
    let response = call(
        &server(&dir),
        json!({"jsonrpc": "2.0", "id": 4, "method": "tools/list"}),
    );
    let tools = response["result"]["tools"].as_array().unwrap();
    let suggest = tools
        .iter()
        .find(|t| t["name"] == "suggest_fixes")
        .expect("suggest_fixes tool");
    let categories = suggest["inputSchema"]["properties"]["issueType"]["enum"]
        .as_array()
        .unwrap();
    assert!(categories.contains(&json!("config_syntax")));
    assert!(categories.contains(&json!("general")));
}

// ============================================================================
// Tool Call Tests
// ============================================================================

#[test]
fn test_diagnose_config_with_config_path() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, r#"{"mcpServers":{"a":{"command":"node"}}}"#);

    let response = call_tool(
        &server(&dir),
        "diagnose_config",
        json!({ "configPath": path.to_str().unwrap() }),
    );
    let report = tool_payload(&response);

    assert_eq!(report["exists"], true);
    assert_eq!(report["valid"], true);
    assert_eq!(report["serverCount"], 1);
    assert_eq!(report["issues"], json!([]));
}

#[test]
fn test_diagnose_config_reports_missing_command() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, r#"{"mcpServers":{"a":{}}}"#);

    let response = call_tool(
        &server(&dir),
        "diagnose_config",
        json!({ "configPath": path.to_str().unwrap() }),
    );
    let report = tool_payload(&response);

    let issues = report["issues"].as_array().unwrap();
    assert_eq!(issues.len(), 1);
    assert_eq!(issues[0]["type"], "missing_command");
    assert_eq!(issues[0]["severity"], "critical");
    assert_eq!(issues[0]["server"], "a");
}

#[test]
fn test_repair_syntax_tool_writes_backup() {
    let dir = TempDir::new().unwrap();
    let broken = r#"{"mcpServers":{"a":{"command":"node"},}}"#;
    let path = write_manifest(&dir, broken);

    let response = call_tool(
        &server(&dir),
        "repair_syntax",
        json!({ "configPath": path.to_str().unwrap() }),
    );
    let result = tool_payload(&response);

    assert_eq!(result["success"], true);
    assert_eq!(result["backupCreated"], true);
    let backup = result["backupPath"].as_str().unwrap();
    assert_eq!(std::fs::read_to_string(backup).unwrap(), broken);

    let repaired = std::fs::read_to_string(&path).unwrap();
    assert!(serde_json::from_str::<Value>(&repaired).is_ok());
}

#[test]
fn test_repair_syntax_tool_reports_backup_failure() {
    let dir = TempDir::new().unwrap();
    let broken = r#"{"mcpServers":{"a":{"command":"node"},}}"#;
    let path = write_manifest(&dir, broken);

    // Directories on every nearby backup name make the backup step fail
    let now = chrono::Utc::now().timestamp_millis() as u64;
    for offset in 0..2000 {
        std::fs::create_dir(backup_path_for(&path, now + offset)).unwrap();
    }

    let response = call_tool(
        &server(&dir),
        "repair_syntax",
        json!({ "configPath": path.to_str().unwrap() }),
    );
    let result = tool_payload(&response);

    assert_eq!(result["success"], false);
    assert_eq!(result["backupCreated"], false);
    assert_eq!(result["fixesApplied"], json!(["remove_trailing_separator"]));
    assert_eq!(result["configPath"], path.to_str().unwrap());
    let errors = result["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].as_str().unwrap().starts_with("Failed to create backup"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), broken);
}

#[test]
fn test_repair_syntax_tool_never_falls_back_from_explicit_path() {
    let dir = TempDir::new().unwrap();
    let broken = r#"{"mcpServers":{"a":{"command":"node"},}}"#;
    let real = write_manifest(&dir, broken);
    let mut config = test_config(&dir);
    config.manifest.path = Some(real.clone());
    let server = McpServer::with_config(config);

    let typo = dir.path().join("claude_desktop_confg.json");
    let response = call_tool(
        &server,
        "repair_syntax",
        json!({ "configPath": typo.to_str().unwrap() }),
    );
    let result = tool_payload(&response);

    assert_eq!(result["success"], false);
    assert_eq!(result["configPath"], typo.to_str().unwrap());
    assert_eq!(result["errors"], json!(["Config file does not exist"]));
    assert_eq!(std::fs::read_to_string(&real).unwrap(), broken);
    assert!(backups_in(&dir).is_empty());
}

#[test]
fn test_probe_ports_tool_uses_requested_ports() {
    let dir = TempDir::new().unwrap();
    let server = McpServer::with_config(test_config(&dir))
        .with_probe(StubProbe::default().with_busy_port(9100).shared());

    let response = call_tool(&server, "probe_ports", json!({ "ports": [9100, 9101] }));
    let report = tool_payload(&response);

    assert_eq!(report["ports"]["9100"]["status"], "in_use");
    assert_eq!(report["ports"]["9101"]["status"], "available");
    assert_eq!(report["conflicts"], json!([9100]));
}

#[test]
fn test_probe_ports_rejects_invalid_port() {
    let dir = TempDir::new().unwrap();
    let response = call_tool(&server(&dir), "probe_ports", json!({ "ports": [70000] }));

    assert_eq!(response["result"]["isError"], true);
    let text = response["result"]["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Error executing probe_ports:"));
}

#[test]
fn test_check_server_status_missing_manifest_is_tool_error() {
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&dir);
    config.manifest.path = Some(dir.path().join("absent.json"));
    let server = McpServer::with_config(config).with_probe(StubProbe::default().shared());

    let response = call_tool(&server, "check_server_status", json!({}));
    assert!(response.get("error").is_none());
    assert_eq!(response["result"]["isError"], true);
}

#[test]
fn test_check_server_status_single_server() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(
        &dir,
        r#"{"mcpServers":{"fs":{"command":"npx","args":["-y","server-filesystem"]},"py":{"command":"python"}}}"#,
    );
    let mut config = test_config(&dir);
    config.manifest.path = Some(path);
    let server = McpServer::with_config(config)
        .with_probe(StubProbe::with_commands(&["npx"]).shared());

    let response = call_tool(&server, "check_server_status", json!({ "serverName": "fs" }));
    let report = tool_payload(&response);

    assert_eq!(report["summary"]["total"], 1);
    assert_eq!(report["servers"]["fs"]["status"], "assumed_ok");
    assert!(report["servers"].get("py").is_none());
}

#[test]
fn test_suggest_fixes_defaults_to_general() {
    let dir = TempDir::new().unwrap();
    let response = call_tool(&server(&dir), "suggest_fixes", json!({}));
    let suggestions = tool_payload(&response);

    assert_eq!(suggestions["issueType"], "general");
    assert!(!suggestions["fixes"].as_array().unwrap().is_empty());
}

#[test]
fn test_full_report_without_logs() {
    let dir = TempDir::new().unwrap();
    let path = write_manifest(&dir, r#"{"mcpServers":{"a":{"command":"node"}}}"#);
    let mut config = test_config(&dir);
    config.manifest.path = Some(path);
    let server = McpServer::with_config(config)
        .with_probe(StubProbe::with_commands(&["node", "npm", "npx", "python", "uv"]).shared());

    let response = call_tool(&server, "full_report", json!({ "includeLogAnalysis": false }));
    let report = tool_payload(&response);

    assert!(report["sections"].get("logAnalysis").is_none());
    assert_eq!(report["summary"]["overallStatus"], "healthy");
    assert_eq!(report["summary"]["criticalIssues"], 0);
}
