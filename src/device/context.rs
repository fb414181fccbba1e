//! Context handed to device post-install hooks.

use std::path::{Path, PathBuf};

use crate::process::CommandRunner;

/// `path` (absolute, e.g. `/usr/bin/ninja`) re-rooted below `root`.
pub fn system_path(root: &Path, path: &str) -> PathBuf {
    root.join(path.trim_start_matches('/'))
}

/// Paths and runner a post-install hook works with.
///
/// Hooks never touch the process working directory; clones go under
/// `work_dir` and system files are written below `root`.
pub struct InstallContext<'a> {
    /// Root of the system being provisioned (`/` on a real device).
    pub root: PathBuf,
    /// Scratch directory for clones (the build workspace).
    pub work_dir: PathBuf,
    /// Directory holding bundled files such as `hardware/lirc/hardware.conf`.
    pub resource_dir: PathBuf,
    pub runner: &'a dyn CommandRunner,
}

impl<'a> InstallContext<'a> {
    pub fn new(
        root: impl Into<PathBuf>,
        work_dir: impl Into<PathBuf>,
        resource_dir: impl Into<PathBuf>,
        runner: &'a dyn CommandRunner,
    ) -> Self {
        Self {
            root: root.into(),
            work_dir: work_dir.into(),
            resource_dir: resource_dir.into(),
            runner,
        }
    }

    /// Resolve an absolute system path (`/etc/asound.conf`) below `root`.
    pub fn system_path(&self, path: &str) -> PathBuf {
        system_path(&self.root, path)
    }

    pub fn resource(&self, path: &str) -> PathBuf {
        self.resource_dir.join(path)
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::RecordingRunner;

    #[test]
    fn test_system_path_stays_under_root() {
        let runner = RecordingRunner::new();
        let ctx = InstallContext::new("/tmp/sysroot", "/tmp/work", "/tmp/res", &runner);
        assert_eq!(
            ctx.system_path("/etc/asound.conf"),
            PathBuf::from("/tmp/sysroot/etc/asound.conf")
        );
        assert_eq!(
            ctx.resource("hardware/lirc/hardware.conf"),
            PathBuf::from("/tmp/res/hardware/lirc/hardware.conf")
        );
    }
}
