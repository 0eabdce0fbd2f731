use std::fmt::Write as _;

use client_core::DashboardView;
use shared::{
    domain::{ActivityLogEntry, AttendanceResult},
    error::WorkflowError,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub fn connectivity_banner(connected: bool) -> &'static str {
    if connected {
        "backend: online"
    } else {
        "backend: OFFLINE (check the recognition server)"
    }
}

pub fn dashboard(view: &DashboardView) -> String {
    let mut out = String::new();
    let registered = match view.total_registered {
        Some(count) => count.to_string(),
        None => format!("{} (offline)", view.registered_or_zero()),
    };
    let mean = view
        .summary
        .mean_confidence
        .map(|mean| format!("{mean:.1}%"))
        .unwrap_or_else(|| "-".to_string());

    let _ = writeln!(out, "{}", connectivity_banner(view.backend_connected));
    let _ = writeln!(out, "registered users : {registered}");
    let _ = writeln!(out, "total attendance : {}", view.summary.total_attendance);
    let _ = writeln!(out, "mean confidence  : {mean}");
    out.push('\n');
    out.push_str(&log_table(&view.recent));
    out
}

pub fn attendance_result(result: &AttendanceResult) -> String {
    match result {
        AttendanceResult::Success {
            identity,
            model,
            observed_at,
        } => format!(
            "PRESENT  {} ({})\n  confidence {}  distance {}  model {}  at {}\n",
            identity.name,
            identity.nim,
            identity.confidence,
            identity.distance,
            model.label(),
            observed_at.format(TIMESTAMP_FORMAT),
        ),
        AttendanceResult::Failure { kind, reason } => {
            format!("NOT RECORDED  {reason}\n  reason: {kind:?}\n")
        }
    }
}

/// Operator guidance printed after a failed command.
pub fn failure_hint(err: &WorkflowError) -> &'static str {
    if err.is_retryable() {
        "nothing was lost; run the same command again"
    } else {
        "fix the input or camera and start over"
    }
}

pub fn log_table(entries: &[ActivityLogEntry]) -> String {
    if entries.is_empty() {
        return "no attendance recorded yet\n".to_string();
    }

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<19}  {:<24}  {:<12}  {:>10}  {:>8}  {}",
        "time", "name", "nim", "confidence", "distance", "model"
    );
    for entry in entries {
        let _ = writeln!(
            out,
            "{:<19}  {:<24}  {:<12}  {:>10}  {:>8}  {}",
            entry.timestamp.format(TIMESTAMP_FORMAT),
            entry.name,
            entry.nim,
            entry.confidence,
            entry.distance,
            entry.model.label(),
        );
    }
    out
}
