//! Base OS packages every build target needs before any source build.

use super::{BuildTarget, LinuxDistribution};

// Centos 7 has no libtoolize, libdri2-devel or libump-devel and Debian 8
// has no libdri2-dev or libump-dev; installs are best-effort so they stay.
#[rustfmt::skip]
const DEBIAN_LIBS: &[&str] = &[
    "git", "gcc", "g++", "yasm", "ninja-build", "pkg-config", "libtool", "rpm", "make",
    "libz-dev", "libbz2-dev", "libpcre3-dev",
    "libasound2-dev",
    "libx11-dev",
    "libdrm-dev", "libdri2-dev", "libump-dev",
    "xorg-dev", "xutils-dev", "xserver-xorg", "xinit",
];

#[rustfmt::skip]
const RHEL_LIBS: &[&str] = &[
    "git", "gcc", "gcc-c++", "yasm", "ninja-build", "pkgconfig", "libtoolize", "rpm-build", "make",
    "zlib-devel", "bzip2-devel", "pcre-devel",
    "alsa-lib-devel",
    "libX11-devel",
    "libdrm-devel", "libdri2-devel", "libump-devel",
    "xorg-x11-server-devel", "xorg-x11-server-source", "xorg-x11-xinit",
];

#[rustfmt::skip]
const ARCH_LIBS: &[&str] = &[
    "git", "gcc", "yasm", "ninja", "pkgconf", "libtool", "make",
    "zlib", "bzip2", "pcre",
    "alsa-lib",
    "libx11",
    "libdrm",
    "xorg-server-devel", "xorg-xinit",
];

#[rustfmt::skip]
const MINGW64_LIBS: &[&str] = &[
    "git", "mingw-w64-x86_64-gcc", "mingw-w64-x86_64-yasm",
    "mingw-w64-x86_64-make", "mingw-w64-x86_64-ninja",
];

#[rustfmt::skip]
const MINGW32_LIBS: &[&str] = &[
    "git", "mingw-w64-i686-gcc", "mingw-w64-i686-yasm",
    "mingw-w64-i686-make", "mingw-w64-i686-ninja",
];

const MACOSX_LIBS: &[&str] = &["git", "yasm", "make", "ninja"];

/// Base package list for a build target, before device additions.
///
/// Unknown linux distributions and android get an empty list.
pub fn base_system_libs(target: &BuildTarget) -> Vec<&'static str> {
    let libs: &[&str] = match target.name() {
        "linux" => match target.distribution() {
            LinuxDistribution::Debian => DEBIAN_LIBS,
            LinuxDistribution::Rhel => RHEL_LIBS,
            LinuxDistribution::Arch => ARCH_LIBS,
            LinuxDistribution::Unknown => {
                log::warn!("unknown linux distribution, no base packages selected");
                &[]
            }
        },
        "windows" => match target.arch().name() {
            "x86_64" => MINGW64_LIBS,
            "i386" => MINGW32_LIBS,
            _ => &[],
        },
        "macosx" => MACOSX_LIBS,
        _ => &[],
    };
    libs.to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::resolve_platform;

    fn target(platform: &str, arch: &str) -> BuildTarget {
        let p = resolve_platform(platform).unwrap();
        p.make_target(*p.architecture(arch).unwrap(), p.package_types().to_vec())
    }

    #[test]
    fn test_linux_lists_follow_distribution() {
        let debian = target("linux", "x86_64").with_distribution(LinuxDistribution::Debian);
        let libs = base_system_libs(&debian);
        assert_eq!(libs.first(), Some(&"git"));
        assert!(libs.contains(&"libasound2-dev"));

        let rhel = target("linux", "x86_64").with_distribution(LinuxDistribution::Rhel);
        assert!(base_system_libs(&rhel).contains(&"alsa-lib-devel"));

        let unknown = target("linux", "x86_64").with_distribution(LinuxDistribution::Unknown);
        assert!(base_system_libs(&unknown).is_empty());
    }

    #[test]
    fn test_windows_lists_follow_arch() {
        assert!(base_system_libs(&target("windows", "64")).contains(&"mingw-w64-x86_64-gcc"));
        assert!(base_system_libs(&target("windows", "32")).contains(&"mingw-w64-i686-gcc"));
    }

    #[test]
    fn test_macosx_and_android() {
        assert_eq!(base_system_libs(&target("macosx", "x86_64")), MACOSX_LIBS.to_vec());
        assert!(base_system_libs(&target("android", "armv7")).is_empty());
    }
}
