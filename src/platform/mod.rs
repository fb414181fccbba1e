//! Platform and architecture registry.
//!
//! Maps a platform name (`linux`, `windows`, `macosx`, `android`) and an
//! architecture name or bit width to static descriptors. A platform bound to
//! one architecture and a set of package formats is a [`BuildTarget`].
//!
//! # Example
//!
//! ```rust
//! use fastotv_env::platform::resolve_platform;
//!
//! let linux = resolve_platform("linux").unwrap();
//! let arch = linux.architecture("64").unwrap();
//! assert_eq!(arch.name(), "x86_64");
//! assert_eq!(arch.default_install_prefix(), "/usr/local");
//! ```

mod packages;

pub use packages::base_system_libs;

use anyhow::Result;
use std::fmt;
use std::path::Path;

use crate::error::ConfigError;
use crate::process::{Cmd, CommandRunner};

/// CPU architecture a platform can be built for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Architecture {
    name: &'static str,
    bit: u32,
    default_prefix: &'static str,
}

impl Architecture {
    pub const fn new(name: &'static str, bit: u32, default_prefix: &'static str) -> Self {
        Self {
            name,
            bit,
            default_prefix,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn bit(&self) -> u32 {
        self.bit
    }

    pub fn default_install_prefix(&self) -> &'static str {
        self.default_prefix
    }
}

/// Package output format understood by cpack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageType {
    Deb,
    Rpm,
    Tgz,
    Zip,
    Nsis,
    DragNDrop,
    Apk,
}

impl PackageType {
    pub const ALL: &'static [PackageType] = &[
        PackageType::Deb,
        PackageType::Rpm,
        PackageType::Tgz,
        PackageType::Zip,
        PackageType::Nsis,
        PackageType::DragNDrop,
        PackageType::Apk,
    ];

    /// Generator name passed to `cpack -G`.
    pub fn generator(&self) -> &'static str {
        match self {
            PackageType::Deb => "DEB",
            PackageType::Rpm => "RPM",
            PackageType::Tgz => "TGZ",
            PackageType::Zip => "ZIP",
            PackageType::Nsis => "NSIS",
            PackageType::DragNDrop => "DragNDrop",
            PackageType::Apk => "APK",
        }
    }

    /// File extension of the package cpack produces.
    pub fn extension(&self) -> &'static str {
        match self {
            PackageType::Deb => "deb",
            PackageType::Rpm => "rpm",
            PackageType::Tgz => "tar.gz",
            PackageType::Zip => "zip",
            PackageType::Nsis => "exe",
            PackageType::DragNDrop => "dmg",
            PackageType::Apk => "apk",
        }
    }

    pub fn from_generator(name: &str) -> Option<PackageType> {
        Self::ALL
            .iter()
            .copied()
            .find(|p| p.generator().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.generator())
    }
}

/// File extension for a cpack generator name, if known.
pub fn extension_by_package(generator: &str) -> Option<&'static str> {
    PackageType::from_generator(generator).map(|p| p.extension())
}

/// Linux distribution family, used to pick the package manager and the
/// base package list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinuxDistribution {
    Debian,
    Rhel,
    Arch,
    Unknown,
}

impl LinuxDistribution {
    /// Detect the host distribution from `/etc/os-release`.
    pub fn detect() -> Self {
        Self::detect_in(Path::new("/"))
    }

    /// Detect the distribution of the system rooted at `root`.
    pub fn detect_in(root: &Path) -> Self {
        match std::fs::read_to_string(root.join("etc/os-release")) {
            Ok(content) => Self::from_os_release(&content),
            Err(_) => LinuxDistribution::Unknown,
        }
    }

    /// Classify an `os-release` file by its `ID` and `ID_LIKE` fields.
    pub fn from_os_release(content: &str) -> Self {
        let mut ids = Vec::new();
        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            if key.trim() == "ID" || key.trim() == "ID_LIKE" {
                let value = value.trim().trim_matches('"').to_ascii_lowercase();
                ids.extend(value.split_whitespace().map(str::to_string));
            }
        }

        let has = |names: &[&str]| ids.iter().any(|id| names.contains(&id.as_str()));
        if has(&["debian", "ubuntu", "raspbian", "armbian"]) {
            LinuxDistribution::Debian
        } else if has(&["rhel", "centos", "fedora", "rocky", "almalinux"]) {
            LinuxDistribution::Rhel
        } else if has(&["arch", "manjaro"]) {
            LinuxDistribution::Arch
        } else {
            LinuxDistribution::Unknown
        }
    }
}

/// Host package manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Yum,
    Pacman,
    Port,
    None,
}

impl PackageManager {
    /// Command that installs one package, or `None` if there is no manager.
    pub fn install_command(&self, package: &str) -> Option<Cmd> {
        let cmd = match self {
            PackageManager::Apt => Cmd::new("apt-get").args(["install", "-y", package]),
            PackageManager::Yum => Cmd::new("yum").args(["install", "-y", package]),
            PackageManager::Pacman => {
                Cmd::new("pacman").args(["-S", "--noconfirm", "--needed", package])
            }
            PackageManager::Port => Cmd::new("port").args(["-N", "install", package]),
            PackageManager::None => return None,
        };
        Some(cmd)
    }
}

/// A platform the environment can be provisioned for.
#[derive(Debug, PartialEq, Eq)]
pub struct SupportedPlatform {
    name: &'static str,
    architectures: &'static [Architecture],
    package_types: &'static [PackageType],
}

impl SupportedPlatform {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn architectures(&self) -> &'static [Architecture] {
        self.architectures
    }

    pub fn package_types(&self) -> &'static [PackageType] {
        self.package_types
    }

    /// Look up an architecture by name, alias, or bit width (`"64"`).
    pub fn architecture(&self, name_or_bit: &str) -> Result<&'static Architecture, ConfigError> {
        let wanted = name_or_bit.trim();
        let found = match wanted.parse::<u32>() {
            Ok(bit) => self.architectures.iter().find(|a| a.bit == bit),
            Err(_) => {
                let canonical = canonical_arch_name(wanted);
                self.architectures.iter().find(|a| a.name == canonical)
            }
        };

        found.ok_or_else(|| ConfigError::InvalidArch {
            name: wanted.to_string(),
            platform: self.name.to_string(),
            available: self
                .architectures
                .iter()
                .map(|a| a.name)
                .collect::<Vec<_>>()
                .join(", "),
        })
    }

    /// Bind this platform to an architecture and package formats.
    ///
    /// On linux the host distribution is detected here.
    pub fn make_target(
        &'static self,
        arch: Architecture,
        package_types: Vec<PackageType>,
    ) -> BuildTarget {
        let distribution = if self.name == "linux" {
            LinuxDistribution::detect()
        } else {
            LinuxDistribution::Unknown
        };
        BuildTarget {
            platform: self,
            arch,
            package_types,
            distribution,
        }
    }
}

fn canonical_arch_name(name: &str) -> &str {
    match name {
        "amd64" | "x64" => "x86_64",
        "x86" | "i686" | "i586" | "i486" => "i386",
        "arm" | "armhf" => "armv7l",
        "arm64" => "aarch64",
        other => other,
    }
}

const LINUX_ARCHS: &[Architecture] = &[
    Architecture::new("x86_64", 64, "/usr/local"),
    Architecture::new("i386", 32, "/usr/local"),
    Architecture::new("armv7l", 32, "/usr/local"),
    Architecture::new("aarch64", 64, "/usr/local"),
];

const WINDOWS_ARCHS: &[Architecture] = &[
    Architecture::new("x86_64", 64, "/mingw64"),
    Architecture::new("i386", 32, "/mingw32"),
];

const MACOSX_ARCHS: &[Architecture] = &[Architecture::new("x86_64", 64, "/usr/local")];

const ANDROID_ARCHS: &[Architecture] = &[Architecture::new(
    "armv7",
    32,
    "/opt/android-ndk/platforms/android-9/arch-arm/usr",
)];

/// All supported platforms, in lookup order.
pub static SUPPORTED_PLATFORMS: &[SupportedPlatform] = &[
    SupportedPlatform {
        name: "linux",
        architectures: LINUX_ARCHS,
        package_types: &[PackageType::Deb, PackageType::Rpm, PackageType::Tgz],
    },
    SupportedPlatform {
        name: "windows",
        architectures: WINDOWS_ARCHS,
        package_types: &[PackageType::Nsis, PackageType::Zip],
    },
    SupportedPlatform {
        name: "macosx",
        architectures: MACOSX_ARCHS,
        package_types: &[PackageType::DragNDrop, PackageType::Zip],
    },
    SupportedPlatform {
        name: "android",
        architectures: ANDROID_ARCHS,
        package_types: &[PackageType::Apk],
    },
];

/// Resolve a platform by name.
pub fn resolve_platform(name: &str) -> Result<&'static SupportedPlatform, ConfigError> {
    SUPPORTED_PLATFORMS
        .iter()
        .find(|p| p.name == name)
        .ok_or_else(|| ConfigError::InvalidPlatform {
            name: name.to_string(),
            available: available_platforms().join(", "),
        })
}

pub fn available_platforms() -> Vec<&'static str> {
    SUPPORTED_PLATFORMS.iter().map(|p| p.name).collect()
}

/// Platform name of the host, in registry spelling.
pub fn host_os() -> &'static str {
    match std::env::consts::OS {
        "macos" => "macosx",
        other => other,
    }
}

/// Architecture name of the host, in registry spelling.
pub fn host_arch() -> &'static str {
    match std::env::consts::ARCH {
        "x86" => "i386",
        "arm" => "armv7l",
        other => other,
    }
}

/// A platform bound to one architecture and a set of package formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildTarget {
    platform: &'static SupportedPlatform,
    arch: Architecture,
    package_types: Vec<PackageType>,
    distribution: LinuxDistribution,
}

impl BuildTarget {
    pub fn name(&self) -> &'static str {
        self.platform.name
    }

    pub fn platform(&self) -> &'static SupportedPlatform {
        self.platform
    }

    pub fn arch(&self) -> &Architecture {
        &self.arch
    }

    pub fn package_types(&self) -> &[PackageType] {
        &self.package_types
    }

    pub fn distribution(&self) -> LinuxDistribution {
        self.distribution
    }

    /// Override the detected distribution.
    pub fn with_distribution(mut self, distribution: LinuxDistribution) -> Self {
        self.distribution = distribution;
        self
    }

    pub fn package_manager(&self) -> PackageManager {
        match self.platform.name {
            "linux" => match self.distribution {
                LinuxDistribution::Debian => PackageManager::Apt,
                LinuxDistribution::Rhel => PackageManager::Yum,
                LinuxDistribution::Arch => PackageManager::Pacman,
                LinuxDistribution::Unknown => PackageManager::None,
            },
            "windows" => PackageManager::Pacman,
            "macosx" => PackageManager::Port,
            _ => PackageManager::None,
        }
    }

    /// Install one package. Best-effort: failures are logged, not returned.
    ///
    /// Returns whether the package manager reported success.
    pub fn install_package(&self, runner: &dyn CommandRunner, package: &str) -> bool {
        let Some(cmd) = self.package_manager().install_command(package) else {
            log::warn!(
                "no package manager for {} ({:?}), skipping {}",
                self.name(),
                self.distribution,
                package
            );
            return false;
        };

        match cmd.allow_fail().run_with(runner) {
            Ok(result) if result.success() => true,
            Ok(result) => {
                log::warn!(
                    "failed to install {} (exit status {:?}), continuing",
                    package,
                    result.status
                );
                false
            }
            Err(e) => {
                log::warn!("failed to install {}: {:#}, continuing", package, e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::RecordingRunner;

    #[test]
    fn test_every_platform_has_architectures() {
        for platform in SUPPORTED_PLATFORMS {
            let resolved = resolve_platform(platform.name()).unwrap();
            assert!(!resolved.architectures().is_empty(), "{}", platform.name());
            assert!(!resolved.package_types().is_empty(), "{}", platform.name());
        }
    }

    #[test]
    fn test_unknown_platform() {
        let err = resolve_platform("beos").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPlatform { ref name, .. } if name == "beos"));
    }

    #[test]
    fn test_architecture_by_name_bit_and_alias() {
        let linux = resolve_platform("linux").unwrap();
        assert_eq!(linux.architecture("x86_64").unwrap().bit(), 64);
        assert_eq!(linux.architecture("32").unwrap().name(), "i386");
        assert_eq!(linux.architecture("amd64").unwrap().name(), "x86_64");
        assert_eq!(linux.architecture("i686").unwrap().name(), "i386");
        assert_eq!(linux.architecture("armhf").unwrap().name(), "armv7l");

        let windows = resolve_platform("windows").unwrap();
        assert_eq!(
            windows.architecture("32").unwrap().default_install_prefix(),
            "/mingw32"
        );
        assert_eq!(resolve_platform("android").unwrap().architecture("armv7").unwrap().bit(), 32);
    }

    #[test]
    fn test_unknown_architecture() {
        let macosx = resolve_platform("macosx").unwrap();
        let err = macosx.architecture("armv7l").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidArch { ref platform, .. } if platform == "macosx"));
        assert!(macosx.architecture("16").is_err());
    }

    #[test]
    fn test_os_release_classification() {
        let debian = "PRETTY_NAME=\"Debian GNU/Linux 12\"\nID=debian\n";
        assert_eq!(LinuxDistribution::from_os_release(debian), LinuxDistribution::Debian);

        let ubuntu_like = "ID=linuxmint\nID_LIKE=\"ubuntu debian\"\n";
        assert_eq!(LinuxDistribution::from_os_release(ubuntu_like), LinuxDistribution::Debian);

        let centos = "ID=\"centos\"\nID_LIKE=\"rhel fedora\"\n";
        assert_eq!(LinuxDistribution::from_os_release(centos), LinuxDistribution::Rhel);

        assert_eq!(LinuxDistribution::from_os_release("ID=arch\n"), LinuxDistribution::Arch);
        assert_eq!(LinuxDistribution::from_os_release("ID=gentoo\n"), LinuxDistribution::Unknown);
        assert_eq!(LinuxDistribution::from_os_release(""), LinuxDistribution::Unknown);
    }

    #[test]
    fn test_detect_in_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(LinuxDistribution::detect_in(dir.path()), LinuxDistribution::Unknown);
    }

    #[test]
    fn test_package_manager_by_target() {
        let linux = resolve_platform("linux").unwrap();
        let arch = *linux.architecture("x86_64").unwrap();
        let target = linux.make_target(arch, linux.package_types().to_vec());

        let debian = target.clone().with_distribution(LinuxDistribution::Debian);
        assert_eq!(debian.package_manager(), PackageManager::Apt);
        let rhel = target.with_distribution(LinuxDistribution::Rhel);
        assert_eq!(rhel.package_manager(), PackageManager::Yum);

        let windows = resolve_platform("windows").unwrap();
        let target = windows.make_target(*windows.architecture("64").unwrap(), vec![]);
        assert_eq!(target.package_manager(), PackageManager::Pacman);
    }

    #[test]
    fn test_install_package_is_best_effort() {
        let linux = resolve_platform("linux").unwrap();
        let target = linux
            .make_target(*linux.architecture("x86_64").unwrap(), vec![])
            .with_distribution(LinuxDistribution::Debian);

        let runner = RecordingRunner::new().fail_program("apt-get");
        assert!(!target.install_package(&runner, "libump-dev"));
        assert_eq!(runner.command_lines(), vec!["apt-get install -y libump-dev"]);

        let runner = RecordingRunner::new();
        assert!(target.install_package(&runner, "yasm"));
    }

    #[test]
    fn test_install_without_package_manager_runs_nothing() {
        let android = resolve_platform("android").unwrap();
        let target = android.make_target(*android.architecture("armv7").unwrap(), vec![]);
        let runner = RecordingRunner::new();
        assert!(!target.install_package(&runner, "git"));
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_package_extensions() {
        assert_eq!(extension_by_package("DEB"), Some("deb"));
        assert_eq!(extension_by_package("tgz"), Some("tar.gz"));
        assert_eq!(extension_by_package("NSIS"), Some("exe"));
        assert_eq!(extension_by_package("SNAP"), None);
    }
}
