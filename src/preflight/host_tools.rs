//! Host tool validation.

use super::CheckResult;
use crate::process::{exists, which};

/// Required host tools with their install suggestions.
const REQUIRED_TOOLS: &[(&str, &str, &str)] = &[
    ("git", "Clone common, json-c and driver sources", "sudo apt-get install git"),
    ("curl", "Download source tarballs", "sudo apt-get install curl"),
    ("tar", "Extract source tarballs", "sudo apt-get install tar"),
    ("make", "Build autotools projects", "sudo apt-get install make"),
    ("patch", "Apply device patches", "sudo apt-get install patch"),
    ("gcc", "Compile sources", "sudo apt-get install gcc"),
];

/// Tools that are built or installed by the environment run itself.
const OPTIONAL_TOOLS: &[(&str, &str)] = &[
    ("cmake", "built from source when missing"),
    ("ninja", "default generator for project packaging"),
    ("cpack", "ships with cmake"),
];

/// Check required and optional host tools.
pub fn check_host_tools() -> Vec<CheckResult> {
    let required = REQUIRED_TOOLS
        .iter()
        .map(|(tool, purpose, install)| check_tool(tool, purpose, install));
    let optional = OPTIONAL_TOOLS.iter().map(|(tool, note)| {
        let message = match which(tool) {
            Some(path) => format!("Found at {}", path),
            None => format!("Not found ({})", note),
        };
        CheckResult::pass(format!("{} tool", tool), message)
    });
    required.chain(optional).collect()
}

fn check_tool(tool: &str, purpose: &str, install_cmd: &str) -> CheckResult {
    match which(tool) {
        Some(path) => CheckResult::pass(
            format!("{} tool", tool),
            format!("Found at {} ({})", path, purpose),
        ),
        None => CheckResult::fail(
            format!("{} tool", tool),
            format!("Not found (needed for: {})", purpose),
            install_cmd,
        ),
    }
}

/// Quick check for a single tool.
pub fn has_tool(tool: &str) -> bool {
    exists(tool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_tool_existing() {
        assert!(has_tool("sh"));
    }

    #[test]
    fn test_has_tool_nonexistent() {
        assert!(!has_tool("definitely_not_a_real_command_12345"));
    }

    #[test]
    fn test_check_host_tools_returns_results() {
        let results = check_host_tools();
        assert_eq!(results.len(), REQUIRED_TOOLS.len() + OPTIONAL_TOOLS.len());
        // missing optional tools never fail the report
        assert!(results[REQUIRED_TOOLS.len()..].iter().all(|r| r.passed));
    }
}
