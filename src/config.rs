//! Defaults and environment overrides.
//!
//! Default dependency versions live here, next to the names of the
//! environment variables the CLI falls back to. The CLI (clap) layers
//! flags over environment variables over these constants.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Default source versions.
pub mod versions {
    pub const CMAKE: &str = "3.8.0";
    pub const LIBPNG: &str = "1.6.29";
    pub const SDL2: &str = "2.0.9";
    pub const SDL2_IMAGE: &str = "2.0.4";
    pub const SDL2_TTF: &str = "2.0.15";
    pub const OPENSSL: &str = "1.1.1b";
    pub const FFMPEG: &str = "4.1";
}

/// Install prefix override (default: the architecture's prefix).
pub const PREFIX_PATH_ENV: &str = "FASTOTV_PREFIX";
/// Device to provision for.
pub const DEVICE_ENV: &str = "FASTOTV_DEVICE";
/// Directory holding source patches (`<dir>/orange-pi/sdl2/*.patch`).
pub const PATCH_DIR_ENV: &str = "FASTOTV_PATCH_DIR";
/// Directory holding bundled device files (`hardware/lirc/hardware.conf`).
pub const RESOURCE_DIR_ENV: &str = "FASTOTV_RESOURCE_DIR";
/// Root of the system device hooks write to.
pub const SYSROOT_ENV: &str = "FASTOTV_SYSROOT";

pub const DEFAULT_PATCH_DIR: &str = "patch";
pub const DEFAULT_RESOURCE_DIR: &str = "devices";
pub const DEFAULT_BRANDING_FILE: &str = "brands/fastotv/fastotv.txt";

/// Workspace directory for `env` runs.
pub fn env_build_dir_name(platform: &str) -> String {
    format!("build_{}_env", platform)
}

/// Workspace directory for `package` runs.
pub fn package_build_dir_name(platform: &str) -> String {
    format!("build_{}", platform)
}

/// Read cmake branding options, one per line.
///
/// Blank lines and `#` comments are skipped.
pub fn read_branding_options(path: &Path) -> Result<Vec<String>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read branding file {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}
