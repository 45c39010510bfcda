use std::fmt::Write as _;

use resource_tree::{Breadcrumb, ListProjection};

/// Text frame for the prompt: breadcrumb line, then one numbered line per row.
pub fn render_frame(breadcrumb: &Breadcrumb, rows: &ListProjection) -> String {
    let mut out = String::new();
    if breadcrumb.is_empty() {
        out.push_str("[Connections]\n");
    } else {
        let _ = writeln!(out, "[{breadcrumb}]");
    }
    for (index, row) in rows.iter().enumerate() {
        let marker = row
            .node_id()
            .map(|id| format!("#{id}"))
            .unwrap_or_default();
        let _ = writeln!(
            out,
            "{index:>3}  {:<28} {:<30} {marker}",
            row.title(),
            row.subtitle()
        );
    }
    out
}
