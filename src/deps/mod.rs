//! Third-party source dependencies.
//!
//! A [`DependencySpec`] says where a dependency's sources come from, which
//! native build procedure it uses, and which flags and patches apply. Specs
//! are built per run from the requested version, the device and the build
//! target; [`build::build_dependency`] executes them.
//!
//! # Build Order
//!
//! ```text
//! cmake -> common -> json-c -> libpng -> SDL2 -> SDL2_image -> SDL2_ttf -> OpenSSL -> FFmpeg
//! ```

pub mod build;

pub use build::{build_dependency, BuildEnv};

use anyhow::{bail, Result};
use std::fmt;
use std::str::FromStr;

use crate::device::Device;
use crate::error::ConfigError;
use crate::platform::BuildTarget;

pub const CMAKE_SRC_ROOT: &str = "https://cmake.org/files/";
pub const SDL_SRC_ROOT: &str = "https://www.libsdl.org/release/";
pub const SDL_IMAGE_SRC_ROOT: &str = "https://www.libsdl.org/projects/SDL_image/release/";
pub const SDL_TTF_SRC_ROOT: &str = "https://www.libsdl.org/projects/SDL_ttf/release/";
pub const FFMPEG_SRC_ROOT: &str = "http://ffmpeg.org/releases/";
pub const PNG_SRC_ROOT: &str = "https://downloads.sourceforge.net/project/libpng/libpng16/";
pub const OPENSSL_SRC_ROOT: &str = "https://www.openssl.org/source/";

pub const COMMON_REPO: &str = "https://github.com/fastogt/common.git";
pub const JSONC_REPO: &str = "https://github.com/fastogt/json-c.git";

const ARCH_CMAKE_EXT: &str = "tar.gz";
const ARCH_SDL_EXT: &str = "tar.gz";
const ARCH_FFMPEG_EXT: &str = "tar.bz2";
const ARCH_PNG_EXT: &str = "tar.xz";
const ARCH_OPENSSL_EXT: &str = "tar.gz";

/// FFmpeg flags applied on every platform, after the device's.
const FFMPEG_BASE_FLAGS: &[&str] = &[
    "--disable-doc",
    "--disable-programs",
    "--disable-opencl",
    "--disable-encoders",
    "--disable-lzma",
    "--disable-iconv",
    "--disable-shared",
    "--enable-static",
    "--disable-debug",
    "--disable-jni",
    "--enable-avfilter",
    "--enable-avcodec",
    "--enable-avdevice",
    "--enable-avformat",
    "--enable-swscale",
    "--enable-swresample",
    "--extra-version=static",
];

/// A buildable third-party dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dependency {
    Cmake,
    Common,
    JsonC,
    Libpng,
    Sdl2,
    Sdl2Image,
    Sdl2Ttf,
    Openssl,
    Ffmpeg,
}

impl Dependency {
    /// Every dependency, in the order they must be built.
    pub const BUILD_ORDER: &'static [Dependency] = &[
        Dependency::Cmake,
        Dependency::Common,
        Dependency::JsonC,
        Dependency::Libpng,
        Dependency::Sdl2,
        Dependency::Sdl2Image,
        Dependency::Sdl2Ttf,
        Dependency::Openssl,
        Dependency::Ffmpeg,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Dependency::Cmake => "cmake",
            Dependency::Common => "common",
            Dependency::JsonC => "jsonc",
            Dependency::Libpng => "libpng",
            Dependency::Sdl2 => "sdl2",
            Dependency::Sdl2Image => "sdl2_image",
            Dependency::Sdl2Ttf => "sdl2_ttf",
            Dependency::Openssl => "openssl",
            Dependency::Ffmpeg => "ffmpeg",
        }
    }

    /// Whether sources come from git master rather than a versioned tarball.
    pub fn is_git(&self) -> bool {
        matches!(self, Dependency::Common | Dependency::JsonC)
    }

    /// Position in [`Dependency::BUILD_ORDER`].
    pub fn priority(&self) -> usize {
        Self::BUILD_ORDER
            .iter()
            .position(|d| d == self)
            .unwrap_or(usize::MAX)
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dependency {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        let dep = match normalized.as_str() {
            "cmake" => Dependency::Cmake,
            "common" => Dependency::Common,
            "jsonc" | "json_c" => Dependency::JsonC,
            "libpng" | "png" => Dependency::Libpng,
            "sdl2" => Dependency::Sdl2,
            "sdl2_image" => Dependency::Sdl2Image,
            "sdl2_ttf" => Dependency::Sdl2Ttf,
            "openssl" => Dependency::Openssl,
            "ffmpeg" => Dependency::Ffmpeg,
            _ => return Err(ConfigError::InvalidDependency(s.to_string())),
        };
        Ok(dep)
    }
}

/// Where sources come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// Versioned release archive.
    Tarball(String),
    /// Git repository (cloned with submodules).
    Git(String),
}

/// Native build procedure of a dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildStyle {
    /// `./configure --prefix=<prefix> <flags>`, `make`, `make install`.
    Configure,
    /// `sh autogen.sh`, then [`BuildStyle::Configure`].
    Autogen,
    /// `./config --prefix=<prefix> <flags>`, `make`, `make install_sw`.
    OpensslConfig,
    /// Out-of-tree `cmake` + the build system's `install` target.
    Cmake,
}

/// Everything needed to build one dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencySpec {
    pub dependency: Dependency,
    pub source: Source,
    pub style: BuildStyle,
    pub flags: Vec<String>,
    /// Patch directories, relative to the patch root.
    pub patches: Vec<String>,
}

impl DependencySpec {
    /// Build the spec for `dependency` at `version`.
    ///
    /// `version` is ignored for git dependencies, which always build master.
    pub fn new(
        dependency: Dependency,
        version: &str,
        device: &Device,
        target: &BuildTarget,
    ) -> Result<Self> {
        let mut patches = Vec::new();
        let mut flags: Vec<String> = Vec::new();

        let (source, style) = match dependency {
            Dependency::Cmake => (Source::Tarball(cmake_url(version)?), BuildStyle::Configure),
            Dependency::Common => {
                flags.push("-DQT_ENABLED=OFF".to_string());
                (Source::Git(COMMON_REPO.to_string()), BuildStyle::Cmake)
            }
            Dependency::JsonC => {
                flags.extend(["--disable-shared", "--enable-static"].map(String::from));
                (Source::Git(JSONC_REPO.to_string()), BuildStyle::Autogen)
            }
            Dependency::Libpng => (Source::Tarball(libpng_url(version)), BuildStyle::Configure),
            Dependency::Sdl2 => {
                let info = device.sdl2_compile_info();
                patches.extend(info.patches.iter().map(|p| p.to_string()));
                flags.extend(info.flags.iter().map(|f| f.to_string()));
                (Source::Tarball(sdl2_url(version)), BuildStyle::Configure)
            }
            Dependency::Sdl2Image => {
                (Source::Tarball(sdl2_image_url(version)), BuildStyle::Configure)
            }
            Dependency::Sdl2Ttf => (Source::Tarball(sdl2_ttf_url(version)), BuildStyle::Configure),
            Dependency::Openssl => {
                flags.push("no-shared".to_string());
                (Source::Tarball(openssl_url(version)), BuildStyle::OpensslConfig)
            }
            Dependency::Ffmpeg => {
                let info = device.ffmpeg_compile_info();
                patches.extend(info.patches.iter().map(|p| p.to_string()));
                flags.extend(info.flags.iter().map(|f| f.to_string()));
                flags.extend(ffmpeg_platform_flags(target.name()));
                (Source::Tarball(ffmpeg_url(version)), BuildStyle::Configure)
            }
        };

        Ok(Self {
            dependency,
            source,
            style,
            flags,
            patches,
        })
    }
}

fn ffmpeg_platform_flags(platform: &str) -> Vec<String> {
    let mut flags: Vec<String> = FFMPEG_BASE_FLAGS.iter().map(|f| f.to_string()).collect();
    match platform {
        "linux" => flags.push("--disable-libxcb".to_string()),
        "macosx" => flags.extend(["--cc=clang", "--cxx=clang++"].map(String::from)),
        _ => {}
    }
    flags
}

/// `https://cmake.org/files/v3.8/cmake-3.8.0.tar.gz`
pub fn cmake_url(version: &str) -> Result<String> {
    let mut parts = version.split('.');
    let (Some(major), Some(minor)) = (parts.next(), parts.next()) else {
        bail!("Invalid cmake version '{}', expected <major>.<minor>[.<patch>]", version);
    };
    if major.is_empty() || minor.is_empty() {
        bail!("Invalid cmake version '{}', expected <major>.<minor>[.<patch>]", version);
    }
    Ok(format!(
        "{}v{}.{}/cmake-{}.{}",
        CMAKE_SRC_ROOT, major, minor, version, ARCH_CMAKE_EXT
    ))
}

/// `https://www.libsdl.org/release/SDL2-2.0.9.tar.gz`
pub fn sdl2_url(version: &str) -> String {
    format!("{}SDL2-{}.{}", SDL_SRC_ROOT, version, ARCH_SDL_EXT)
}

pub fn sdl2_image_url(version: &str) -> String {
    format!("{}SDL2_image-{}.{}", SDL_IMAGE_SRC_ROOT, version, ARCH_SDL_EXT)
}

pub fn sdl2_ttf_url(version: &str) -> String {
    format!("{}SDL2_ttf-{}.{}", SDL_TTF_SRC_ROOT, version, ARCH_SDL_EXT)
}

pub fn ffmpeg_url(version: &str) -> String {
    format!("{}ffmpeg-{}.{}", FFMPEG_SRC_ROOT, version, ARCH_FFMPEG_EXT)
}

pub fn libpng_url(version: &str) -> String {
    format!("{0}{1}/libpng-{1}.{2}", PNG_SRC_ROOT, version, ARCH_PNG_EXT)
}

pub fn openssl_url(version: &str) -> String {
    format!("{}openssl-{}.{}", OPENSSL_SRC_ROOT, version, ARCH_OPENSSL_EXT)
}
