//! Preflight checks for environment builds.
//!
//! Validates prerequisites BEFORE any package install or source build.
//!
//! # Checks Performed
//!
//! - **Host tools**: git, curl, tar, make, patch are installed
//! - **Network**: source hosts (libsdl.org, ffmpeg.org, ...) are reachable
//! - **Disk space**: enough room in the workspace for sources and builds
//! - **Install status**: reports which dependencies are already in the prefix
//!
//! # Usage
//!
//! ```rust,ignore
//! use fastotv_env::preflight::PreflightChecker;
//!
//! let checker = PreflightChecker::new(work_dir, prefix);
//! let report = checker.run_all().await;
//!
//! if !report.is_ok() {
//!     for error in report.errors() {
//!         eprintln!("  - {}", error.message);
//!     }
//!     std::process::exit(1);
//! }
//! ```

mod disk_space;
mod host_tools;
mod network;

pub use disk_space::{available_space, check_disk_space};
pub use host_tools::{check_host_tools, has_tool};
pub use network::check_network;

use std::path::{Path, PathBuf};

use crate::process::SystemRunner;

/// Result of a single preflight check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
    pub message: String,
    /// How to fix a failure.
    pub suggestion: Option<String>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: message.into(),
            suggestion: None,
        }
    }

    pub fn fail(
        name: impl Into<String>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }
}

/// Preflight report.
#[derive(Debug, Default)]
pub struct PreflightReport {
    pub checks: Vec<CheckResult>,
    pub install_status: InstallStatus,
}

impl PreflightReport {
    pub fn is_ok(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn errors(&self) -> Vec<&CheckResult> {
        self.checks.iter().filter(|c| !c.passed).collect()
    }

    pub fn passed_count(&self) -> usize {
        self.checks.iter().filter(|c| c.passed).count()
    }

    pub fn total_count(&self) -> usize {
        self.checks.len()
    }

    pub fn print_summary(&self) {
        println!("=== Preflight Check Results ===\n");

        for check in &self.checks {
            let status = if check.passed { "[OK]" } else { "[FAIL]" };
            println!("{} {}: {}", status, check.name, check.message);
            if let Some(suggestion) = &check.suggestion {
                println!("     Suggestion: {}", suggestion);
            }
        }

        println!();
        println!("=== Install Status ===\n");
        self.install_status.print();

        println!();
        if self.is_ok() {
            println!("All preflight checks passed ({}/{})", self.passed_count(), self.total_count());
        } else {
            println!(
                "Preflight checks failed: {} of {} passed",
                self.passed_count(),
                self.total_count()
            );
        }
    }
}

/// Dependencies already present in the install prefix.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct InstallStatus {
    pub has_cmake: bool,
    pub has_common: bool,
    pub has_jsonc: bool,
    pub has_libpng: bool,
    pub has_sdl2: bool,
    pub has_openssl: bool,
    pub has_ffmpeg: bool,
}

impl InstallStatus {
    /// Probe `prefix` for the files each dependency installs.
    pub fn probe(prefix: &Path) -> Self {
        let lib = |name: &str| prefix.join("lib").join(name).exists();

        Self {
            has_cmake: prefix.join("bin/cmake").exists(),
            has_common: prefix.join("include/common").is_dir(),
            has_jsonc: lib("libjson-c.a"),
            has_libpng: lib("libpng16.a") || lib("libpng.a"),
            has_sdl2: lib("libSDL2.a"),
            has_openssl: lib("libssl.a"),
            has_ffmpeg: lib("libavcodec.a"),
        }
    }

    pub fn print(&self) {
        let status = |b: bool| if b { "[installed]" } else { "[missing]  " };

        println!("{}  cmake", status(self.has_cmake));
        println!("{}  common", status(self.has_common));
        println!("{}  json-c", status(self.has_jsonc));
        println!("{}  libpng", status(self.has_libpng));
        println!("{}  SDL2", status(self.has_sdl2));
        println!("{}  OpenSSL", status(self.has_openssl));
        println!("{}  FFmpeg", status(self.has_ffmpeg));
    }
}

/// Runs every preflight check for one workspace and prefix.
pub struct PreflightChecker {
    work_dir: PathBuf,
    prefix: PathBuf,
}

impl PreflightChecker {
    pub fn new(work_dir: impl Into<PathBuf>, prefix: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            prefix: prefix.into(),
        }
    }

    pub async fn run_all(&self) -> PreflightReport {
        let mut report = PreflightReport::default();

        report.checks.extend(check_host_tools());
        report
            .checks
            .push(check_disk_space(&SystemRunner, &self.work_dir));
        report.checks.extend(check_network().await);
        report.install_status = InstallStatus::probe(&self.prefix);

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_check_result_fail_has_suggestion() {
        let result = CheckResult::fail("git tool", "Not found", "sudo apt-get install git");
        assert!(!result.passed);
        assert!(result.suggestion.is_some());
        assert!(CheckResult::pass("git tool", "ok").suggestion.is_none());
    }

    #[test]
    fn test_preflight_report_is_ok() {
        let mut report = PreflightReport::default();
        assert!(report.is_ok());

        report.checks.push(CheckResult::pass("test1", "ok"));
        assert!(report.is_ok());

        report.checks.push(CheckResult::fail("test2", "bad", "fix"));
        assert!(!report.is_ok());
        assert_eq!(report.errors().len(), 1);
        assert_eq!(report.passed_count(), 1);
    }

    #[test]
    fn test_install_status_probe() {
        let dir = tempdir().unwrap();
        assert_eq!(InstallStatus::probe(dir.path()), InstallStatus::default());

        fs::create_dir_all(dir.path().join("lib")).unwrap();
        fs::write(dir.path().join("lib/libSDL2.a"), "").unwrap();
        fs::write(dir.path().join("lib/libavcodec.a"), "").unwrap();

        let status = InstallStatus::probe(dir.path());
        assert!(status.has_sdl2);
        assert!(status.has_ffmpeg);
        assert!(!status.has_openssl);
    }
}
