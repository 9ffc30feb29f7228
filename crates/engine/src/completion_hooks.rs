// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Completion hooks: user-configured scripts run after a ticket is
//! marked complete, so a team can wire Actifix into whatever else
//! needs to know (chat notification, deploy gate, metrics pipeline).
//!
//! Grounded on `original_source/src/actifix/completion_hooks.py`.
//! Execution is synchronous (`std::process::Command` polled with
//! `try_wait`, matching this crate's sync dispatch loop rather than
//! reaching for `tokio::process` the way the adapters crate's
//! subprocess helper does) since hooks run inline at ticket-completion
//! time, off the dispatcher's own thread.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use actifix_core::Ticket;

/// Longest a single hook script may run before it's killed.
pub const HOOK_TIMEOUT: Duration = Duration::from_secs(30);
/// Hook scripts truncate stderr in failure reports past this length.
const STDERR_PREVIEW_LEN: usize = 500;
/// `ACTIFIX_TICKET_JSON` is truncated past this length so a misbehaving
/// hook can't blow up its own environment block.
const TICKET_JSON_ENV_LEN: usize = 10_000;

/// One hook script that failed, with a truncated stderr for diagnosis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookFailure {
    pub script: String,
    pub stderr: String,
}

/// Summary of a single `execute_completion_hooks` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionHookSummary {
    pub hooks_run: usize,
    pub hooks_succeeded: usize,
    pub hooks_failed: usize,
    pub failures: Vec<HookFailure>,
}

/// Run every configured hook script against `ticket`, in order. A
/// failing or missing script never aborts the batch; it's recorded in
/// `failures` and the next script still runs.
pub fn execute_completion_hooks(scripts: &[String], ticket: &Ticket) -> CompletionHookSummary {
    let mut summary = CompletionHookSummary::default();

    for script in scripts {
        let script = script.trim();
        if script.is_empty() {
            continue;
        }
        summary.hooks_run += 1;

        match run_hook(script, ticket, HOOK_TIMEOUT) {
            Ok(()) => summary.hooks_succeeded += 1,
            Err(stderr) => {
                summary.hooks_failed += 1;
                summary.failures.push(HookFailure {
                    script: script.to_string(),
                    stderr: truncate(&stderr, STDERR_PREVIEW_LEN),
                });
            }
        }
    }

    summary
}

fn run_hook(script_path: &str, ticket: &Ticket, timeout: Duration) -> Result<(), String> {
    let path = std::path::Path::new(script_path);
    if !path.exists() {
        return Err(format!("script not found: {script_path}"));
    }
    if !is_executable(path) {
        return Err(format!("script not executable: {script_path}"));
    }

    let mut cmd = Command::new(path);
    cmd.env("ACTIFIX_TICKET_ID", ticket.id.as_str())
        .env("ACTIFIX_TICKET_PRIORITY", ticket.priority.as_str())
        .env("ACTIFIX_TICKET_ERROR_TYPE", &ticket.error_type)
        .env("ACTIFIX_TICKET_SOURCE", &ticket.source)
        .env("ACTIFIX_TICKET_STATUS", ticket.status.as_str())
        .env("ACTIFIX_TICKET_JSON", ticket_json_env(ticket))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| format!("failed to start {script_path}: {e}"))?;

    let started = Instant::now();
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if started.elapsed() >= timeout {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(format!("script exceeded timeout of {}s", timeout.as_secs()));
                }
                std::thread::sleep(Duration::from_millis(25));
            }
            Err(e) => return Err(format!("failed waiting on {script_path}: {e}")),
        }
    };

    if status.success() {
        Ok(())
    } else {
        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            let _ = pipe.read_to_string(&mut stderr);
        }
        Err(stderr)
    }
}

fn ticket_json_env(ticket: &Ticket) -> String {
    let json = serde_json::to_string(ticket).unwrap_or_default();
    truncate(&json, TICKET_JSON_ENV_LEN)
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut end = max_len;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}

#[cfg(unix)]
fn is_executable(path: &std::path::Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &std::path::Path) -> bool {
    path.exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actifix_core::{Priority, TicketId, TicketStatus};
    use std::io::Write;
    use std::os::unix::fs::PermissionsExt;

    fn sample_ticket() -> Ticket {
        Ticket {
            id: TicketId::new("ACT-20260101-AAAAA"),
            duplicate_guard: "dg".to_string(),
            priority: Priority::P2,
            error_type: "RuntimeError".to_string(),
            message: "boom".to_string(),
            source: "test".to_string(),
            run_label: "unknown".to_string(),
            correlation_id: None,
            created_at_ms: 0,
            updated_at_ms: 0,
            format_version: 1,
            status: TicketStatus::Completed,
            documented: true,
            functioning: true,
            tested: true,
            completed: true,
            locked_by: None,
            locked_at_ms: None,
            lease_expires_ms: None,
            owner: None,
            branch: None,
            stack_trace: None,
            file_context: Default::default(),
            system_state: Default::default(),
            ai_remediation_notes: None,
            completion_summary: None,
        }
    }

    fn write_script(dir: &std::path::Path, name: &str, body: &str) -> String {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        let mut perms = f.metadata().unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path.display().to_string()
    }

    #[test]
    fn runs_and_counts_successful_hooks() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "ok.sh", "#!/bin/sh\nexit 0\n");

        let summary = execute_completion_hooks(&[script], &sample_ticket());
        assert_eq!(summary.hooks_run, 1);
        assert_eq!(summary.hooks_succeeded, 1);
        assert_eq!(summary.hooks_failed, 0);
        assert!(summary.failures.is_empty());
    }

    #[test]
    fn records_failure_with_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let script = write_script(dir.path(), "bad.sh", "#!/bin/sh\necho oops 1>&2\nexit 1\n");

        let summary = execute_completion_hooks(&[script.clone()], &sample_ticket());
        assert_eq!(summary.hooks_failed, 1);
        assert_eq!(summary.failures[0].script, script);
        assert!(summary.failures[0].stderr.contains("oops"));
    }

    #[test]
    fn missing_script_is_a_failure_not_a_panic() {
        let summary = execute_completion_hooks(
            &["/nonexistent/hook.sh".to_string()],
            &sample_ticket(),
        );
        assert_eq!(summary.hooks_failed, 1);
    }

    #[test]
    fn blank_entries_are_skipped() {
        let summary = execute_completion_hooks(&["   ".to_string(), "".to_string()], &sample_ticket());
        assert_eq!(summary.hooks_run, 0);
    }
}
