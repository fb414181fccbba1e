//! Disk space check for the build workspace.

use super::CheckResult;
use crate::process::{Cmd, CommandRunner};
use std::path::Path;

/// Minimum free space in the workspace (3 GB).
///
/// FFmpeg and OpenSSL object trees dominate; sources are removed after each
/// install so the peak is one dependency at a time.
const MIN_DISK_SPACE_BYTES: u64 = 3 * 1024 * 1024 * 1024;

const GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Check free space on the filesystem holding `dir`.
///
/// `dir` may not exist yet; its nearest existing ancestor is checked.
pub fn check_disk_space(runner: &dyn CommandRunner, dir: &Path) -> CheckResult {
    let probe_dir = dir.ancestors().find(|p| p.exists()).unwrap_or(Path::new("."));

    match available_space(runner, probe_dir) {
        Some(available) => {
            let available_gb = available as f64 / GB;
            let required_gb = MIN_DISK_SPACE_BYTES as f64 / GB;

            if available >= MIN_DISK_SPACE_BYTES {
                CheckResult::pass(
                    "Disk space",
                    format!("{:.1} GB available (need {:.1} GB)", available_gb, required_gb),
                )
            } else {
                CheckResult::fail(
                    "Disk space",
                    format!("Only {:.1} GB available, need {:.1} GB", available_gb, required_gb),
                    "Free up disk space or use a different build directory",
                )
            }
        }
        None => CheckResult::fail(
            "Disk space",
            "Failed to check available disk space",
            "Ensure df command is available",
        ),
    }
}

/// Available bytes on the filesystem holding `path`.
pub fn available_space(runner: &dyn CommandRunner, path: &Path) -> Option<u64> {
    Cmd::new("df")
        .args(["--output=avail", "-B1"])
        .arg_path(path)
        .allow_fail()
        .run_with(runner)
        .ok()
        .filter(|r| r.success())
        .and_then(|r| parse_df_avail(&r.stdout))
}

/// Skip the header line, parse the first number.
fn parse_df_avail(stdout: &str) -> Option<u64> {
    stdout.lines().nth(1).and_then(|line| line.trim().parse().ok())
}
