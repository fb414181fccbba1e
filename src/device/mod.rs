//! Device registry.
//!
//! A device is a target hardware profile: the extra OS packages it needs,
//! the compile flags SDL2 and FFmpeg get on it, and an optional post-install
//! hook (GPU drivers, symlinks, config files).
//!
//! Devices are plain records in a static table. Variants of the same board
//! share a [`DeviceProfile`] and differ only in extra packages, flag
//! overrides, or the hook they run.
//!
//! # Example
//!
//! ```rust
//! use fastotv_env::device::resolve_device;
//!
//! let lite = resolve_device("orange-pi-lite").unwrap();
//! let one = resolve_device("orange-pi-one").unwrap();
//! assert_eq!(lite.sdl2_flags(), one.sdl2_flags());
//! assert!(lite.system_libs("linux").contains(&"liblircclient-dev"));
//! ```

mod context;
mod orange_pi;
mod raspberry_pi;

pub use context::{system_path, InstallContext};

use anyhow::Result;

use crate::error::ConfigError;

/// Patch directories and configure flags for one dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileInfo {
    /// Directories (relative to the patch root) whose files are applied in
    /// name order before configuring.
    pub patches: &'static [&'static str],
    pub flags: &'static [&'static str],
}

impl CompileInfo {
    pub const EMPTY: CompileInfo = CompileInfo {
        patches: &[],
        flags: &[],
    };

    pub const fn flags(flags: &'static [&'static str]) -> Self {
        Self { patches: &[], flags }
    }
}

/// Packages keyed by platform name.
pub type PlatformLibs = &'static [(&'static str, &'static [&'static str])];

/// Device-specific setup run after system packages are installed.
pub type PostInstall = fn(&InstallContext<'_>) -> Result<()>;

/// Settings shared by a family of devices.
#[derive(Debug)]
pub struct DeviceProfile {
    system_libs: PlatformLibs,
    sdl2: CompileInfo,
    ffmpeg: CompileInfo,
}

/// A supported target device.
pub struct Device {
    name: &'static str,
    profile: &'static DeviceProfile,
    extra_libs: PlatformLibs,
    sdl2_override: Option<CompileInfo>,
    ffmpeg_override: Option<CompileInfo>,
    install: Option<PostInstall>,
}

impl std::fmt::Debug for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("name", &self.name)
            .field("has_post_install", &self.install.is_some())
            .finish()
    }
}

impl Device {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Extra OS packages for `platform`: profile packages first, then the
    /// device's own additions. Empty if the platform has no entry.
    pub fn system_libs(&self, platform: &str) -> Vec<&'static str> {
        let mut libs = lookup(self.profile.system_libs, platform);
        libs.extend(lookup(self.extra_libs, platform));
        libs
    }

    pub fn sdl2_compile_info(&self) -> CompileInfo {
        self.sdl2_override.unwrap_or(self.profile.sdl2)
    }

    pub fn ffmpeg_compile_info(&self) -> CompileInfo {
        self.ffmpeg_override.unwrap_or(self.profile.ffmpeg)
    }

    pub fn sdl2_flags(&self) -> &'static [&'static str] {
        self.sdl2_compile_info().flags
    }

    pub fn ffmpeg_flags(&self) -> &'static [&'static str] {
        self.ffmpeg_compile_info().flags
    }

    pub fn has_post_install(&self) -> bool {
        self.install.is_some()
    }

    /// Run the post-install hook, if the device has one.
    pub fn install_specific(&self, ctx: &InstallContext) -> Result<()> {
        match self.install {
            Some(hook) => hook(ctx),
            None => Ok(()),
        }
    }
}

fn lookup(libs: PlatformLibs, platform: &str) -> Vec<&'static str> {
    libs.iter()
        .filter(|(name, _)| *name == platform)
        .flat_map(|(_, packages)| packages.iter().copied())
        .collect()
}

// =============================================================================
// Profiles
// =============================================================================

static PC: DeviceProfile = DeviceProfile {
    system_libs: &[(
        "linux",
        &["libvdpau-devel", "libva-devel", "libvdpau-dev", "libva-dev"],
    )],
    sdl2: CompileInfo::EMPTY,
    ffmpeg: CompileInfo::EMPTY,
};

const GLES2_SDL2_FLAGS: &[&str] = &[
    "--disable-video-opengl",
    "--disable-video-opengles1",
    "--enable-video-opengles2",
];

static RASPBERRY_PI: DeviceProfile = DeviceProfile {
    system_libs: &[("linux", &["libraspberrypi-dev", "liblircclient-dev"])],
    sdl2: CompileInfo::flags(&[
        "--disable-video-opengl",
        "--disable-video-opengles1",
        "--enable-video-opengles2",
        "--disable-video-mir",
        "--disable-video-wayland",
        "--disable-pulseaudio",
        "--disable-esd",
    ]),
    ffmpeg: CompileInfo::flags(&["--enable-mmal", "--enable-omx", "--enable-omx-rpi"]),
};

static ORANGE_PI_H3: DeviceProfile = DeviceProfile {
    system_libs: &[(
        "linux",
        &[
            "libgles2-mesa-dev",
            "xserver-xorg-video-fbturbo",
            "libcedrus1-dev",
            "libvdpau-dev",
        ],
    )],
    sdl2: CompileInfo {
        patches: &["orange-pi/sdl2"],
        flags: GLES2_SDL2_FLAGS,
    },
    ffmpeg: CompileInfo::EMPTY,
};

static ORANGE_PI_H5: DeviceProfile = DeviceProfile {
    system_libs: &[("linux", &["libgles2-mesa-dev", "liblircclient-dev"])],
    sdl2: CompileInfo::flags(GLES2_SDL2_FLAGS),
    ffmpeg: CompileInfo::EMPTY,
};

static ANDROID: DeviceProfile = DeviceProfile {
    system_libs: &[],
    sdl2: CompileInfo::EMPTY,
    ffmpeg: CompileInfo::flags(&["--target-os=android", "--enable-cross-compile"]),
};

// =============================================================================
// Devices
// =============================================================================

/// All supported devices. The first entry is the default.
pub static SUPPORTED_DEVICES: &[Device] = &[
    Device {
        name: "pc",
        profile: &PC,
        extra_libs: &[],
        sdl2_override: None,
        ffmpeg_override: None,
        install: None,
    },
    Device {
        name: "raspberry-pi-1-model-b+",
        profile: &RASPBERRY_PI,
        extra_libs: &[],
        sdl2_override: None,
        // ARMv6 core, no NEON
        ffmpeg_override: Some(CompileInfo::flags(&[
            "--enable-mmal",
            "--enable-omx",
            "--enable-omx-rpi",
            "--cpu=arm1176jzf-s",
            "--disable-neon",
        ])),
        install: Some(raspberry_pi::install_raspberry_pi),
    },
    Device {
        name: "raspberry-pi-2-model-b",
        profile: &RASPBERRY_PI,
        extra_libs: &[],
        sdl2_override: None,
        ffmpeg_override: None,
        install: Some(raspberry_pi::install_raspberry_pi),
    },
    Device {
        name: "raspberry-pi-3-model-b",
        profile: &RASPBERRY_PI,
        extra_libs: &[],
        sdl2_override: None,
        ffmpeg_override: None,
        install: Some(raspberry_pi::install_raspberry_pi),
    },
    Device {
        name: "orange-pi-one",
        profile: &ORANGE_PI_H3,
        extra_libs: &[],
        sdl2_override: None,
        ffmpeg_override: None,
        install: Some(orange_pi::install_orange_pi_h3),
    },
    Device {
        name: "orange-pi-lite",
        profile: &ORANGE_PI_H3,
        extra_libs: &[("linux", &["liblircclient-dev"])],
        sdl2_override: None,
        ffmpeg_override: None,
        install: Some(orange_pi::install_orange_pi_h3),
    },
    Device {
        name: "orange-pi-pc2",
        profile: &ORANGE_PI_H5,
        extra_libs: &[],
        sdl2_override: None,
        ffmpeg_override: None,
        install: Some(orange_pi::install_orange_pi_h5),
    },
    Device {
        name: "android",
        profile: &ANDROID,
        extra_libs: &[],
        sdl2_override: None,
        ffmpeg_override: None,
        install: None,
    },
];

/// Resolve a device by name.
pub fn resolve_device(name: &str) -> Result<&'static Device, ConfigError> {
    SUPPORTED_DEVICES
        .iter()
        .find(|d| d.name == name)
        .ok_or_else(|| ConfigError::InvalidDevice {
            name: name.to_string(),
            available: available_devices().join(", "),
        })
}

pub fn default_device() -> &'static Device {
    &SUPPORTED_DEVICES[0]
}

pub fn available_devices() -> Vec<&'static str> {
    SUPPORTED_DEVICES.iter().map(|d| d.name).collect()
}
