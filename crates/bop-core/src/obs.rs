//! Structured lifecycle events for dispatch decisions and build attempts.
//!
//! Every event carries an `event` field so log pipelines can select them,
//! e.g. `event=dispatch.decided branch=rhel-7.3-staging targets=1`.

use tracing::info;
use uuid::Uuid;

/// Span tagging everything logged during one dispatch decision with a
/// fresh `dispatch_id`, the component and the branch.
///
/// ```ignore
/// async { /* ... */ }.instrument(dispatch_span("bash", "rhel-7.3-staging")).await
/// ```
pub fn dispatch_span(component: &str, branch: &str) -> tracing::Span {
    tracing::info_span!(
        "bop.dispatch",
        dispatch_id = %Uuid::new_v4(),
        component = %component,
        branch = %branch,
    )
}

pub fn emit_dispatch_decided(branch: &str, branch_type: &str, target_count: usize) {
    info!(
        event = "dispatch.decided",
        branch = %branch,
        branch_type = %branch_type,
        targets = target_count,
    );
}

pub fn emit_job_enabled(job: &str, created: bool) {
    info!(event = "job.enabled", job = %job, created = created);
}

pub fn emit_job_triggered(job: &str, targets: &str) {
    info!(event = "job.triggered", job = %job, targets = %targets);
}

pub fn emit_attempt_started(target: &str) {
    info!(event = "attempt.started", target_name = %target);
}

pub fn emit_attempt_finished(target: &str, passed: bool, task_id: Option<&str>) {
    info!(
        event = "attempt.finished",
        target_name = %target,
        passed = passed,
        task_id = task_id.unwrap_or("none"),
    );
}
