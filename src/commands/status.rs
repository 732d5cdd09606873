//! `stackadm status`: one line per service or per deploy entry

use anyhow::Result;
use colored::Colorize;
use playbook::Options;
use std::collections::BTreeMap;
use topology::Filter;

use super::{build_playbook, open_session, run_playbook, select};
use crate::Context;
use crate::tasks::{self, Op, StatusRow, StatusTable};
use crate::ui;

const STATUS_RUNNING: &str = "RUNNING";
const STATUS_STOPPED: &str = "STOPPED";
const STATUS_ABNORMAL: &str = "ABNORMAL";
const MERGED_ID: &str = "<instances>";

const TITLES: [&str; 9] = [
    "Id",
    "Role",
    "Host",
    "Instances",
    "Container Id",
    "Status",
    "Ports",
    "Log Dir",
    "Data Dir",
];

// ============================================================================
// Merging replicas
// ============================================================================

/// The single item, or a placeholder for many
fn merge_id(items: &[String]) -> String {
    match items {
        [one] => one.clone(),
        _ => MERGED_ID.to_string(),
    }
}

/// Shared status of all replicas, `ABNORMAL` when they disagree
fn merge_status(items: &[String]) -> String {
    if let [one] = items {
        return one.clone();
    }
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for item in items {
        let status = if item.starts_with("Up") {
            STATUS_RUNNING
        } else if item.starts_with("Exited") {
            STATUS_STOPPED
        } else {
            item.as_str()
        };
        *counts.entry(status).or_default() += 1;
    }
    match counts.into_iter().find(|(_, n)| *n == items.len()) {
        Some((status, _)) => status.to_string(),
        None => STATUS_ABNORMAL.to_string(),
    }
}

/// `/data/{app_0...app_2}` style summary of replica directories
fn merge_dir(items: &[String]) -> String {
    let (Some(first), Some(last)) = (items.first(), items.last()) else {
        return String::new();
    };
    if items.len() == 1 {
        return first.clone();
    }
    let prefix_len = items.iter().skip(1).fold(first.len(), |len, item| {
        first
            .char_indices()
            .zip(item.chars())
            .take_while(|((i, a), b)| *i < len && a == b)
            .map(|((i, a), _)| i + a.len_utf8())
            .last()
            .unwrap_or(0)
    });
    let prefix = &first[..prefix_len];
    let head = &first[prefix_len..];
    let tail = &last[prefix_len..];
    let limit = 5.min(head.chars().count()).min(tail.chars().count());
    let cut = |s: &str| s.chars().take(limit).collect::<String>();
    format!("{prefix}{{{}...{}}}", cut(head), cut(tail))
}

fn merge_group(group: &[StatusRow]) -> StatusRow {
    let collect = |get: fn(&StatusRow) -> &String| {
        let mut items: Vec<String> = group.iter().map(|r| get(r).clone()).collect();
        items.sort();
        items
    };
    let first = &group[0];
    let declared = first.instances.split('/').nth(1).unwrap_or("1");
    StatusRow {
        id: merge_id(&collect(|r| &r.id)),
        instances: format!("{}/{declared}", group.len()),
        container_id: merge_id(&collect(|r| &r.container_id)),
        status: merge_status(&collect(|r| &r.status)),
        ports: merge_id(&collect(|r| &r.ports)),
        log_dir: merge_dir(&collect(|r| &r.log_dir)),
        data_dir: merge_dir(&collect(|r| &r.data_dir)),
        ..first.clone()
    }
}

/// Collapse consecutive rows of the same deploy entry
fn merge_rows(rows: Vec<StatusRow>) -> Vec<StatusRow> {
    let mut merged = Vec::new();
    let mut group: Vec<StatusRow> = Vec::new();
    for row in rows {
        if group.last().is_some_and(|r| r.parent_id != row.parent_id) {
            merged.push(merge_group(&group));
            group.clear();
        }
        group.push(row);
    }
    if !group.is_empty() {
        merged.push(merge_group(&group));
    }
    merged
}

// ============================================================================
// Rendering
// ============================================================================

fn decorate(status: &str) -> String {
    match status {
        tasks::STATUS_CLEANED => status.blue().to_string(),
        tasks::STATUS_LOSED | STATUS_ABNORMAL => status.red().to_string(),
        s if s.starts_with("Up") || s == STATUS_RUNNING => s.green().to_string(),
        s => s.to_string(),
    }
}

fn cells(row: &StatusRow) -> Vec<String> {
    let dash = |s: &str| if s.is_empty() { "-".to_string() } else { s.to_string() };
    vec![
        row.id.clone(),
        row.role.to_string(),
        row.host.clone(),
        row.instances.clone(),
        dash(&row.container_id),
        decorate(&row.status),
        dash(&row.ports),
        dash(&row.log_dir),
        dash(&row.data_dir),
    ]
}

/// Left aligned columns; widths ignore color codes
fn render(rows: &[StatusRow]) -> String {
    let mut lines: Vec<Vec<String>> = vec![
        TITLES.iter().map(ToString::to_string).collect(),
        TITLES.iter().map(|t| "-".repeat(t.len())).collect(),
    ];
    lines.extend(rows.iter().map(cells));

    let mut widths = vec![0; TITLES.len()];
    for line in &lines {
        for (width, cell) in widths.iter_mut().zip(line) {
            *width = (*width).max(console::measure_text_width(cell));
        }
    }

    let mut out = String::new();
    for line in &lines {
        let padded: Vec<String> = line
            .iter()
            .zip(&widths)
            .map(|(cell, width)| {
                let pad = width - console::measure_text_width(cell);
                format!("{cell}{}", " ".repeat(pad))
            })
            .collect();
        out.push_str(padded.join("  ").trim_end());
        out.push('\n');
    }
    out
}

pub fn run(ctx: &Context, filter: &Filter, jobs: Option<usize>, verbose: bool) -> Result<()> {
    let session = open_session(jobs)?;
    let instances = select(&session, session.instances()?, filter);

    let table = StatusTable::new();
    let mut compiler = tasks::compiler(&session);
    tasks::register_status(&mut compiler, &session, &table);
    let playbook = build_playbook(&session, &[Op::ServiceStatus], &instances, &Options::new());
    let quiet_ctx = Context {
        verbose: ctx.verbose,
        quiet: true,
    };
    run_playbook(&quiet_ctx, &compiler, playbook)?;

    let rows = table.rows();
    let rows = if verbose { rows } else { merge_rows(rows) };

    if !ctx.quiet {
        ui::kv("cluster", &session.cluster.name);
        ui::kv("uuid", &session.cluster.uuid);
        println!();
    }
    print!("{}", render(&rows));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use topology::Role;

    fn row(id: &str, parent: &str, status: &str, data_dir: &str) -> StatusRow {
        StatusRow {
            id: id.to_string(),
            parent_id: parent.to_string(),
            role: Role::Etcd,
            host: "h1".to_string(),
            host_sequence: 0,
            instance_sequence: 0,
            instances: "1/3".to_string(),
            container_id: format!("c-{id}"),
            status: status.to_string(),
            ports: "2380,2379".to_string(),
            log_dir: String::new(),
            data_dir: data_dir.to_string(),
        }
    }

    #[test]
    fn test_merge_status() {
        let s = |v: &[&str]| v.iter().map(ToString::to_string).collect::<Vec<_>>();
        assert_eq!(merge_status(&s(&["Up 1 hour"])), "Up 1 hour");
        assert_eq!(merge_status(&s(&["Up 1 hour", "Up 2 hours"])), "RUNNING");
        assert_eq!(merge_status(&s(&["Exited (0)", "Exited (1)"])), "STOPPED");
        assert_eq!(merge_status(&s(&["Up 1 hour", "Losed"])), "ABNORMAL");
        assert_eq!(merge_status(&s(&["Cleaned", "Cleaned"])), "Cleaned");
    }

    #[test]
    fn test_merge_dir() {
        let dirs = vec!["/data/etcd0".to_string(), "/data/etcd2".to_string()];
        assert_eq!(merge_dir(&dirs), "/data/etcd{0...2}");
        assert_eq!(merge_dir(&["/data".to_string()]), "/data");
    }

    #[test]
    fn test_merge_rows_by_parent() {
        let rows = vec![
            row("a", "etcd_h1_0", "Up 1 hour", "/data/etcd0"),
            row("b", "etcd_h1_0", "Up 3 hours", "/data/etcd1"),
            row("c", "etcd_h2_0", "Exited (0)", "/data/etcd"),
        ];
        let merged = merge_rows(rows);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].id, "<instances>");
        assert_eq!(merged[0].instances, "2/3");
        assert_eq!(merged[0].status, "RUNNING");
        assert_eq!(merged[0].ports, "2380,2379");
        assert_eq!(merged[0].data_dir, "/data/etcd{0...1}");
        assert_eq!(merged[1].id, "c");
        assert_eq!(merged[1].instances, "1/3");
    }

    #[test]
    fn test_render_aligns_columns() {
        colored::control::set_override(false);
        let out = render(&[row("abc", "p", "Up 1 hour", "/d")]);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Id   Role  Host"));
        assert!(lines[2].starts_with("abc  etcd  h1"));
        assert!(lines[2].ends_with("/d"));
    }
}
