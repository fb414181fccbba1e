//! Native build tools cmake can generate for.

use crate::error::ConfigError;

/// A cmake generator plus the command that drives it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSystem {
    name: &'static str,
    cmd_line: &'static [&'static str],
    cmake_generator_arg: &'static str,
}

impl BuildSystem {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Program and arguments, without the target (`install`).
    pub fn cmd_line(&self) -> &'static [&'static str] {
        self.cmd_line
    }

    pub fn cmake_generator_arg(&self) -> &'static str {
        self.cmake_generator_arg
    }
}

/// Supported build systems. The first entry is the default for packaging.
pub static SUPPORTED_BUILD_SYSTEMS: &[BuildSystem] = &[
    BuildSystem {
        name: "ninja",
        cmd_line: &["ninja"],
        cmake_generator_arg: "-GNinja",
    },
    BuildSystem {
        name: "make",
        cmd_line: &["make", "-j2"],
        cmake_generator_arg: "-GUnix Makefiles",
    },
];

pub fn resolve_build_system(name: &str) -> Result<&'static BuildSystem, ConfigError> {
    SUPPORTED_BUILD_SYSTEMS
        .iter()
        .find(|bs| bs.name == name)
        .ok_or_else(|| ConfigError::InvalidBuildSystem {
            name: name.to_string(),
            available: available_build_systems().join(", "),
        })
}

pub fn default_build_system() -> &'static BuildSystem {
    &SUPPORTED_BUILD_SYSTEMS[0]
}

pub fn available_build_systems() -> Vec<&'static str> {
    SUPPORTED_BUILD_SYSTEMS.iter().map(|bs| bs.name).collect()
}
