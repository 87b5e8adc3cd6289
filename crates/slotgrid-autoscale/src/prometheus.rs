//! Prometheus text exposition format.
//!
//! Renders a scale report into the Prometheus text exposition format for
//! scraping by a Prometheus server or compatible agent.

use crate::scaler::ScaleReport;

fn gauge(out: &mut String, name: &str, help: &str, value: impl std::fmt::Display) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} gauge\n"));
    out.push_str(&format!("{name} {value}\n"));
}

/// Escape a label value: backslash, double quote, and newline.
fn escape_label(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

/// Render a scale report into Prometheus text format.
///
/// Cluster-wide values are unlabelled gauges; per-group demand carries a
/// `group` label.
pub fn render_prometheus(report: &ScaleReport) -> String {
    let mut out = String::new();
    let demand = &report.demand;

    gauge(
        &mut out,
        "slotgrid_ledger_version",
        "Ledger version the last decision was computed from.",
        report.version,
    );
    gauge(
        &mut out,
        "slotgrid_slots_per_agent",
        "Slots offered by one agent.",
        report.settings.slots_per_agent,
    );
    gauge(
        &mut out,
        "slotgrid_desired_agents",
        "Additional agents requested.",
        report.desired_agents,
    );
    gauge(
        &mut out,
        "slotgrid_feasible_demand_slots",
        "Slots worth provisioning for.",
        demand.feasible_slots,
    );
    gauge(
        &mut out,
        "slotgrid_pending_pool_slots",
        "Pending slots of tasks that fit on one agent.",
        demand.pending_pool,
    );
    gauge(
        &mut out,
        "slotgrid_distributed_slots",
        "Slots of unstarted multi-agent tasks.",
        demand.distributed_slots,
    );
    gauge(
        &mut out,
        "slotgrid_ungrouped_pending_slots",
        "Pending slots of tasks outside any group.",
        demand.ungrouped_pending,
    );
    gauge(
        &mut out,
        "slotgrid_unschedulable_tasks",
        "Multi-agent tasks that do not divide into whole agents.",
        demand.unschedulable.len(),
    );
    gauge(
        &mut out,
        "slotgrid_partially_allocated_tasks",
        "Tasks holding some but not all of their slots.",
        demand.partially_allocated,
    );

    out.push_str("# HELP slotgrid_group_pending_slots Pending slots per group before max_slots.\n");
    out.push_str("# TYPE slotgrid_group_pending_slots gauge\n");
    for g in &demand.groups {
        out.push_str(&format!(
            "slotgrid_group_pending_slots{{group=\"{}\"}} {}\n",
            escape_label(&g.group),
            g.pending
        ));
    }

    out.push_str("# HELP slotgrid_group_counted_slots Slots per group counted toward demand.\n");
    out.push_str("# TYPE slotgrid_group_counted_slots gauge\n");
    for g in &demand.groups {
        out.push_str(&format!(
            "slotgrid_group_counted_slots{{group=\"{}\"}} {}\n",
            escape_label(&g.group),
            g.counted
        ));
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scaler::{AutoscaleSettings, evaluate_snapshot};
    use slotgrid_state::{ClusterSnapshot, GroupRecord, TaskLedger, TaskRecord};

    const SETTINGS: AutoscaleSettings = AutoscaleSettings {
        slots_per_agent: 4,
        scale_bound: 0,
    };

    #[test]
    fn render_empty() {
        let report = evaluate_snapshot(&ClusterSnapshot::default(), SETTINGS);
        let output = render_prometheus(&report);

        assert!(output.contains("# TYPE slotgrid_desired_agents gauge"));
        assert!(output.contains("slotgrid_desired_agents 0\n"));
        assert!(output.contains("# HELP slotgrid_group_counted_slots"));
    }

    #[test]
    fn render_ungrouped_report() {
        let snapshot = ClusterSnapshot {
            version: 7,
            ledger: TaskLedger::from_tasks(vec![
                TaskRecord::new("a", 2),
                TaskRecord::new("b", 8),
                TaskRecord::new("c", 6),
                TaskRecord::new("d", 8).with_allocated(4),
            ])
            .unwrap(),
            ..ClusterSnapshot::default()
        };
        let output = render_prometheus(&evaluate_snapshot(&snapshot, SETTINGS));

        assert!(output.contains("slotgrid_ledger_version 7\n"));
        assert!(output.contains("slotgrid_pending_pool_slots 2\n"));
        assert!(output.contains("slotgrid_distributed_slots 8\n"));
        assert!(output.contains("slotgrid_feasible_demand_slots 10\n"));
        assert!(output.contains("slotgrid_desired_agents 3\n"));
        assert!(output.contains("slotgrid_unschedulable_tasks 1\n"));
        assert!(output.contains("slotgrid_partially_allocated_tasks 1\n"));
    }

    #[test]
    fn render_group_labels() {
        let mut snapshot = ClusterSnapshot {
            ledger: TaskLedger::from_tasks(vec![TaskRecord::new("a", 9).in_group("research")])
                .unwrap(),
            ..ClusterSnapshot::default()
        };
        snapshot.groups.insert(
            "research".to_string(),
            GroupRecord::new("research").with_max_slots(4),
        );
        let output = render_prometheus(&evaluate_snapshot(&snapshot, SETTINGS));

        assert!(output.contains("slotgrid_group_pending_slots{group=\"research\"} 9"));
        assert!(output.contains("slotgrid_group_counted_slots{group=\"research\"} 4"));
    }

    #[test]
    fn render_escapes_group_label_values() {
        let id = "a\"b\nc\\d";
        let mut snapshot = ClusterSnapshot {
            ledger: TaskLedger::from_tasks(vec![TaskRecord::new("t", 1).in_group(id)]).unwrap(),
            ..ClusterSnapshot::default()
        };
        snapshot.groups.insert(id.to_string(), GroupRecord::new(id));
        let output = render_prometheus(&evaluate_snapshot(&snapshot, SETTINGS));

        assert!(output.contains(r#"slotgrid_group_pending_slots{group="a\"b\nc\\d"} 1"#));
        assert!(output.contains(r#"slotgrid_group_counted_slots{group="a\"b\nc\\d"} 1"#));
        for line in output.lines() {
            if line.starts_with('#') {
                continue;
            }
            assert!(line.starts_with("slotgrid_"), "malformed line: {line:?}");
            let value = line.rsplit(' ').next().unwrap();
            assert!(value.parse::<f64>().is_ok(), "bad value: {line:?}");
        }
    }

    #[test]
    fn escape_label_leaves_plain_ids_alone() {
        assert_eq!(escape_label("research-1"), "research-1");
        assert_eq!(escape_label("x\\y"), "x\\\\y");
    }

    #[test]
    fn render_format_is_prometheus_compatible() {
        let report = evaluate_snapshot(&ClusterSnapshot::default(), SETTINGS);
        let output = render_prometheus(&report);

        // Every non-comment line should match: metric_name[{labels}] value
        for line in output.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let parts: Vec<_> = line.split_whitespace().collect();
            assert_eq!(parts.len(), 2, "unexpected line: {line}");
            assert!(parts[0].starts_with("slotgrid_"), "bad metric name: {line}");
            assert!(parts[1].parse::<f64>().is_ok(), "bad value: {line}");
        }
    }
}
