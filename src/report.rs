use std::fmt::Write;

use crate::model::AffectedResource;
use crate::offboard::OffboardReport;

fn section(out: &mut String, title: &str, items: &[AffectedResource]) {
    let _ = writeln!(out, "{}:", title);
    if items.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for item in items {
        let _ = writeln!(out, "  - {} ({})", item.name, item.id);
    }
}

/// Console summary of a run: the three affected-resource lists, anything
/// skipped or warned about, then the outcome for the user account.
pub fn render(report: &OffboardReport) -> String {
    let mut out = String::new();

    section(&mut out, "Schedules affected", &report.schedules);
    section(
        &mut out,
        "Escalation policies affected",
        &report.escalation_policies,
    );
    section(&mut out, "Teams affected", &report.teams);

    if !report.skipped.is_empty() {
        let _ = writeln!(out, "Deletions declined:");
        for skipped in &report.skipped {
            let _ = writeln!(out, "  - {} {} ({})", skipped.kind, skipped.name, skipped.id);
        }
    }

    if !report.warnings.is_empty() {
        let _ = writeln!(out, "Warnings:");
        for warning in &report.warnings {
            let _ = writeln!(out, "  - {}", warning);
        }
    }

    if report.user_deleted {
        let _ = writeln!(out, "User {} has been successfully removed!", report.email);
    } else if report.user_id.is_some() {
        let _ = writeln!(out, "User {} was not deleted.", report.email);
    }

    out
}
