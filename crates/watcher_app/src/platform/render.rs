use std::fmt::Write;

use watcher_core::{ActivationState, StatusView};

fn activation_label(activation: ActivationState) -> &'static str {
    match activation {
        ActivationState::Idle => "idle",
        ActivationState::Active => "active",
    }
}

/// Multi-line status block printed for the `status` command.
pub fn format_status(view: &StatusView) -> String {
    let mut out = String::new();
    let totals = &view.totals;
    let _ = writeln!(out, "state:     {}", activation_label(view.activation));
    let _ = writeln!(out, "folder:    {}", view.folder);
    let _ = writeln!(out, "pattern:   {}", view.pattern);
    let _ = writeln!(
        out,
        "reserved:  {} ({} in flight, {} delivered)",
        view.reserved, view.in_flight, view.delivered
    );
    let _ = writeln!(
        out,
        "totals:    {} dispatched, {} delivered, {} failed, {} timed out, {} ignored while idle",
        totals.dispatched,
        totals.delivered,
        totals.failed,
        totals.timed_out,
        totals.ignored_while_idle
    );
    for job in &view.jobs {
        let _ = writeln!(out, "  #{} {} -> {}", job.job_id, job.key, job.destination);
    }
    if let Some(error) = &view.last_error {
        let _ = writeln!(out, "last error: {error}");
    }
    out
}

/// One-line form for the log.
pub fn summary_line(view: &StatusView) -> String {
    format!(
        "{} folder={} reserved={} in_flight={} delivered={} failed={} timed_out={}",
        activation_label(view.activation),
        view.folder,
        view.reserved,
        view.in_flight,
        view.totals.delivered,
        view.totals.failed,
        view.totals.timed_out
    )
}
