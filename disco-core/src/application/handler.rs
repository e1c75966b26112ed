// disco-core/src/application/handler.rs
//
// Handler contract: the matched rule's data is written to the handler's
// stdin as one JSON object -- the merge of every validated dependency's
// top-level interface mapping, later deps shadowing earlier. Exit zero
// means the rule completed.

use std::process::Stdio;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::domain::error::DomainError;
use crate::domain::knowledge::Knowledge;
use crate::domain::rule::{Rule, interface_of};
use crate::error::DiscoError;
use crate::infrastructure::error::InfrastructureError;

pub const DEFAULT_FAIL_LIMIT: u32 = 5;
pub const DEFAULT_TIMEOUT_SECS: f64 = 60.0;

/// Run a matched rule's handler once. Returns whether the rule is now
/// complete; raises the fatal repeatedly-failing condition when the fail
/// count reaches `fail_limit`.
#[instrument(skip(rule, kb), fields(cmd = %rule.cmd()))]
pub async fn execute(
    rule: &mut Rule,
    kb: &Knowledge,
    path: &str,
    fail_limit: u32,
    timeout: Duration,
) -> Result<bool, DiscoError> {
    let payload = assemble_payload(rule, kb);
    let encoded = serde_json::to_vec(&Value::Object(payload)).map_err(InfrastructureError::Json)?;

    // Handlers resolve against the engine path only, not the agent's own
    // environment.
    let spawned = Command::new(rule.cmd())
        .env_clear()
        .env("PATH", path)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(cmd = %rule.cmd(), path = %path, "handler not on path");
            return failed_attempt(rule, fail_limit);
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(mut stdin) = child.stdin.take() {
        // A handler that exits without reading produces EPIPE, not a bug.
        if let Err(e) = stdin.write_all(&encoded).await {
            debug!(cmd = %rule.cmd(), error = %e, "handler closed stdin early");
        }
    }

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => {
            // kill_on_drop reaps the child when the future is dropped
            warn!(cmd = %rule.cmd(), timeout = ?timeout, "handler timed out");
            return failed_attempt(rule, fail_limit);
        }
    };

    debug!(cmd = %rule.cmd(), code = ?output.status.code(), "handler exited");
    if !output.stdout.is_empty() {
        debug!(cmd = %rule.cmd(), "stdout: {}", String::from_utf8_lossy(&output.stdout));
    }
    if !output.stderr.is_empty() {
        debug!(cmd = %rule.cmd(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    }

    if output.status.success() {
        rule.set_complete(true);
        rule.reset_failures();
        Ok(true)
    } else {
        failed_attempt(rule, fail_limit)
    }
}

/// Stack the top-level interface mappings of every dependency that
/// validates, in dep order; later deps shadow earlier on key collision.
fn assemble_payload(rule: &Rule, kb: &Knowledge) -> Map<String, Value> {
    let mut payload = Map::new();
    for dep in rule.deps() {
        let interface = interface_of(dep);
        if !kb.is_valid(interface, Some(dep)) {
            continue;
        }
        if let Some(Value::Object(mapping)) = kb.get(interface) {
            for (key, value) in mapping {
                payload.insert(key.clone(), value.clone());
            }
        }
    }
    payload
}

fn failed_attempt(rule: &mut Rule, fail_limit: u32) -> Result<bool, DiscoError> {
    let attempts = rule.record_failure();
    if fail_limit > 0 && attempts >= fail_limit {
        return Err(DomainError::HandlerRepeatedlyFailing {
            cmd: rule.cmd().to_string(),
            attempts,
        }
        .into());
    }
    Ok(false)
}
