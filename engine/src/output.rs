//! Output formatting for operation results.
//!
//! Human-readable reports go to stderr; the JSON layout is the only
//! machine-readable output and goes to stdout.

use crate::engine::{OperationResult, Status};
use crate::layout::ProjectLayout;

/// Format an operation result for the terminal.
///
/// Affected paths are listed when `verbose` is set or the run did not fully
/// succeed, so partial failures always show every path they touched.
#[must_use]
pub fn format_human(result: &OperationResult, verbose: bool) -> String {
    let mut output = format!("{} {}: {}\n", result.operation, result.status, result.summary);

    if verbose || result.status == Status::PartialFailure {
        for path in &result.affected {
            output.push_str(&format!("  done: {path}\n"));
        }
    }
    for warning in &result.warnings {
        output.push_str(&format!("  warning: {warning}\n"));
    }
    for failure in &result.failures {
        output.push_str(&format!("  failed: {}: {}\n", failure.path, failure.error));
    }

    output
}

/// Format a resolved layout as aligned `key: value` lines.
#[must_use]
pub fn format_layout_human(layout: &ProjectLayout) -> String {
    let versions: Vec<String> = layout
        .runtime_versions()
        .iter()
        .map(ToString::to_string)
        .collect();
    let rows = [
        ("root", layout.root().to_string()),
        ("source", layout.source_dir().to_string()),
        ("library", layout.library_root().to_string()),
        ("envs", layout.envs_dir().to_string()),
        ("stubs", layout.stubs_dir().to_string()),
        ("dist", layout.dist_dir().to_string()),
        ("recipe", layout.recipe_dir().to_string()),
        ("build", layout.build_dir().to_string()),
        ("os tags", layout.os_tags().join(", ")),
        ("runtimes", versions.join(", ")),
    ];
    rows.iter()
        .map(|(key, value)| format!("{:<10}{value}\n", format!("{key}:")))
        .collect()
}

/// Format a resolved layout as JSON.
#[must_use]
pub fn format_layout_json(layout: &ProjectLayout) -> String {
    serde_json::to_string_pretty(layout).unwrap_or_else(|_| "{}".to_owned())
}
