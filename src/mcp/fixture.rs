//! Minimal stdio MCP server for tests
//!
//! A `sh` script answering `initialize`, `tools/list` and `tools/call` with
//! a single `echo` tool. The reply to a call names the tool it was called
//! under, so tests can see which name reached the server.

use std::path::Path;
use std::time::Duration;

use super::config::MCPServerConfig;

const ECHO_SERVER: &str = r#"echo $$ > "$1"
while IFS= read -r line; do
  id=$(printf '%s\n' "$line" | sed -n 's/.*"id":\([0-9][0-9]*\).*/\1/p')
  case "$line" in
    *'"method":"initialize"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"protocolVersion":"2024-11-05","capabilities":{"tools":{}},"serverInfo":{"name":"echo-fixture","version":"0.1.0"}}}\n' "$id" ;;
    *'"method":"tools/list"'*)
      printf '{"jsonrpc":"2.0","id":%s,"result":{"tools":[{"name":"echo","description":"Echo the text back","inputSchema":{"type":"object","properties":{"text":{"type":"string"}}}}]}}\n' "$id" ;;
    *'"method":"tools/call"'*)
      name=$(printf '%s\n' "$line" | sed -n 's/.*"name":"\([^"]*\)".*/\1/p')
      text=$(printf '%s\n' "$line" | sed -n 's/.*"text":"\([^"]*\)".*/\1/p')
      printf '{"jsonrpc":"2.0","id":%s,"result":{"content":[{"type":"text","text":"%s: %s"}],"isError":false}}\n' "$id" "$name" "$text" ;;
  esac
done
"#;

/// Launch config for the echo server; its PID is written to `pid_file`
pub(crate) fn echo_server(id: &str, pid_file: &Path) -> MCPServerConfig {
    MCPServerConfig::new(id, "sh")
        .with_args(vec![
            "-c".into(),
            ECHO_SERVER.into(),
            "echo-fixture".into(),
            pid_file.display().to_string(),
        ])
        .with_startup_timeout(10)
}

/// PID the echo server recorded at startup
pub(crate) fn read_pid(pid_file: &Path) -> u32 {
    std::fs::read_to_string(pid_file)
        .unwrap()
        .trim()
        .parse()
        .unwrap()
}

/// Whether the process is alive; zombies count as gone
pub(crate) fn is_running(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit(')')
            .next()
            .map(|rest| !rest.trim_start().starts_with('Z'))
            .unwrap_or(false),
        Err(_) => false,
    }
}

/// Poll until the process is gone; false if it outlives the wait
pub(crate) async fn wait_for_exit(pid: u32) -> bool {
    for _ in 0..50 {
        if !is_running(pid) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}
