//! Text reports over profiled functions and the container tree.

use std::fmt::Write as _;
use std::sync::Arc;

use tempo_runtime::{ChildFilter, Container, ContainerRegistry, ProfiledFunction, TimeUnit};

/// Format lifetime totals as a text table sorted by isolated time descending.
///
/// Functions that were never called are hidden unless `show_all` is set.
pub fn format_functions(
    functions: &[Arc<ProfiledFunction>],
    unit: TimeUnit,
    show_all: bool,
) -> String {
    let mut rows: Vec<_> = functions
        .iter()
        .map(|f| (f.path(), f.totals()))
        .filter(|(_, t)| show_all || t.calls > 0)
        .collect();
    rows.sort_by(|a, b| {
        b.1.isolated_time
            .cmp(&a.1.isolated_time)
            .then_with(|| a.0.cmp(b.0))
    });

    let width = name_width(rows.iter().map(|(path, _)| *path));
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$} {:>8} {:>12} {:>12}",
        "Function", "Calls", "Whole", "Isolated"
    );
    let _ = writeln!(out, "{}", "-".repeat(width + 34));
    for (path, t) in &rows {
        let _ = writeln!(
            out,
            "{:<width$} {:>8} {:>12} {:>12}",
            path,
            t.calls,
            unit.format(t.whole_time),
            unit.format(t.isolated_time)
        );
    }
    out
}

/// Show each function's activity since its most recent checkpoint.
pub fn format_window(functions: &[Arc<ProfiledFunction>], unit: TimeUnit) -> String {
    let mut rows: Vec<_> = functions
        .iter()
        .map(|f| (f.path(), f.since_last_checkpoint()))
        .filter(|(_, w)| w.calls > 0)
        .collect();
    rows.sort_by(|a, b| {
        b.1.isolated_time
            .cmp(&a.1.isolated_time)
            .then_with(|| a.0.cmp(b.0))
    });

    let width = name_width(rows.iter().map(|(path, _)| *path));
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<width$} {:>8} {:>12} {:>12}",
        "Function", "+Calls", "+Whole", "+Isolated"
    );
    let _ = writeln!(out, "{}", "-".repeat(width + 34));
    for (path, w) in &rows {
        let _ = writeln!(
            out,
            "{:<width$} {:>+8} {:>12} {:>12}",
            path,
            w.calls,
            format!("+{}", unit.format(w.whole_time)),
            format!("+{}", unit.format(w.isolated_time))
        );
    }
    out
}

/// Render the container tree, one container per line, indented by depth.
///
/// Each line shows the container's last path segment, its kind, the number of
/// functions it owns and the number of constructible types directly beneath
/// it. Function names follow under their container.
pub fn format_tree(registry: &ContainerRegistry) -> String {
    let mut out = String::new();
    write_container(&mut out, registry, registry.root(), 0, true);
    out
}

fn write_container(
    out: &mut String,
    registry: &ContainerRegistry,
    container: &Container,
    depth: usize,
    is_root: bool,
) {
    let indent = "  ".repeat(depth);
    let label = if is_root {
        container.path()
    } else {
        container.name()
    };
    let _ = write!(out, "{indent}{label} [{}]", container.kind().label());
    let functions = registry.child_function_count(container.path());
    let types = registry.child_class_like_count(container.path());
    if functions > 0 {
        let _ = write!(out, " functions={functions}");
    }
    if types > 0 {
        let _ = write!(out, " types={types}");
    }
    out.push('\n');

    for function in container.functions() {
        let _ = writeln!(out, "{indent}  - {}", function.name());
    }
    for child in registry.child_containers(container.path(), ChildFilter::All) {
        write_container(out, registry, child, depth + 1, false);
    }
}

fn name_width<'a>(names: impl Iterator<Item = &'a str>) -> usize {
    names.map(str::len).max().unwrap_or(0).max(40)
}
