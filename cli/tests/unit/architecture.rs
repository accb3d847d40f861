//! Structural tests for architectural boundary enforcement.
//!
//! These tests scan source files to verify that the layer boundaries
//! (domain → application → infra → commands/output) are maintained.

use std::path::{Path, PathBuf};

/// Collect all `.rs` files under a directory recursively.
fn collect_rs_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                files.extend(collect_rs_files(&path));
            } else if path.extension().and_then(|e| e.to_str()) == Some("rs") {
                files.push(path);
            }
        }
    }
    files
}

fn src_dir(layer: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("src").join(layer)
}

fn relative(file: &Path) -> String {
    file.strip_prefix(env!("CARGO_MANIFEST_DIR"))
        .unwrap_or(file)
        .display()
        .to_string()
}

/// Track brace depth and return whether a line is inside a `#[cfg(test)]` block.
struct CfgTestTracker {
    in_test_block: bool,
    brace_depth: i32,
    test_block_start_depth: i32,
}

impl CfgTestTracker {
    fn new() -> Self {
        Self {
            in_test_block: false,
            brace_depth: 0,
            test_block_start_depth: 0,
        }
    }

    /// Process a line and return `true` if it's inside a `#[cfg(test)]` block.
    fn process_line(&mut self, line: &str) -> bool {
        let trimmed = line.trim();
        if trimmed.contains("#[cfg(test)]") {
            self.in_test_block = true;
            self.test_block_start_depth = self.brace_depth;
        }
        for ch in line.chars() {
            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    self.brace_depth -= 1;
                    if self.in_test_block && self.brace_depth <= self.test_block_start_depth {
                        self.in_test_block = false;
                    }
                }
                _ => {}
            }
        }
        self.in_test_block
    }
}

/// Non-test, non-comment lines of `file` that contain any of `patterns`.
fn offending_lines(file: &Path, patterns: &[&str]) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(file) else {
        return Vec::new();
    };
    let rel = relative(file);
    let mut tracker = CfgTestTracker::new();
    let mut found = Vec::new();
    for (i, line) in content.lines().enumerate() {
        let in_test = tracker.process_line(line);
        let trimmed = line.trim();
        if in_test || trimmed.starts_with("//") {
            continue;
        }
        if let Some(pattern) = patterns.iter().find(|p| line.contains(*p)) {
            found.push(format!("{rel}:{}: `{pattern}`: {trimmed}", i + 1));
        }
    }
    found
}

fn check_layer(layer: &str, patterns: &[&str]) -> Vec<String> {
    collect_rs_files(&src_dir(layer))
        .iter()
        .flat_map(|file| offending_lines(file, patterns))
        .collect()
}

#[test]
fn domain_is_pure() {
    let violations = check_layer(
        "domain",
        &[
            "crate::infra",
            "crate::application",
            "crate::commands",
            "crate::output",
            "tokio::",
            "std::fs",
            "std::process",
            "std::net",
        ],
    );
    assert!(
        violations.is_empty(),
        "domain/ must stay free of I/O and outer layers:\n{}",
        violations.join("\n")
    );
}

#[test]
fn application_has_no_imports_from_outer_layers() {
    let violations = check_layer(
        "application",
        &["crate::infra", "crate::commands", "crate::output"],
    );
    assert!(
        violations.is_empty(),
        "application/ must depend on ports only:\n{}",
        violations.join("\n")
    );
}

#[test]
fn application_spawns_no_processes() {
    let violations = check_layer(
        "application",
        &["TokioCommandRunner", "tokio::process", "std::process::Command"],
    );
    assert!(
        violations.is_empty(),
        "application/ must run processes through the CommandRunner port:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_imports_from_commands_or_output() {
    let violations = check_layer("infra", &["crate::commands", "crate::output"]);
    assert!(
        violations.is_empty(),
        "infra/ must not import from commands/ or output/:\n{}",
        violations.join("\n")
    );
}

#[test]
fn infra_has_no_print_macros_outside_tests() {
    let violations = check_layer("infra", &["println!", "eprintln!"]);
    assert!(
        violations.is_empty(),
        "infra/ must not use println!/eprintln! outside #[cfg(test)]:\n{}",
        violations.join("\n")
    );
}

#[test]
fn services_take_trait_bounds_not_concrete_backends() {
    let violations: Vec<String> = collect_rs_files(&src_dir("application").join("services"))
        .iter()
        .flat_map(|file| offending_lines(file, &["HostBackend", "QcowImageStore", "QemuRunner"]))
        .collect();
    assert!(
        violations.is_empty(),
        "services must accept port traits, not infra types:\n{}",
        violations.join("\n")
    );
}
