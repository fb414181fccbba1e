//! Configuration errors.
//!
//! These are raised while resolving names given on the command line, before
//! the build directory or the host system is touched. Everything that goes
//! wrong after resolution is reported through `anyhow` with context.

use thiserror::Error;

/// A name given by the caller did not resolve to a registered descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid platform '{name}' (available: {available})")]
    InvalidPlatform { name: String, available: String },

    #[error("invalid arch '{name}' for platform '{platform}' (available: {available})")]
    InvalidArch {
        name: String,
        platform: String,
        available: String,
    },

    #[error("invalid device '{name}' (available: {available})")]
    InvalidDevice { name: String, available: String },

    #[error("invalid build system '{name}' (available: {available})")]
    InvalidBuildSystem { name: String, available: String },

    #[error("invalid dependency '{0}'")]
    InvalidDependency(String),
}
