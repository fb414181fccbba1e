//! FastoTV build environment library.
//!
//! Provisions a host for building the FastoTV player: OS packages through
//! the host package manager, third-party sources (cmake, common, json-c,
//! libpng, SDL2, OpenSSL, FFmpeg) built into an install prefix, and
//! device-specific setup for Raspberry Pi and Orange Pi boards. The
//! [`package`] module builds the player itself and wraps it with cpack.
//!
//! Every external tool runs through [`process::CommandRunner`], so whole runs
//! can be recorded instead of executed.

pub mod build_system;
pub mod config;
pub mod deps;
pub mod device;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod package;
pub mod platform;
pub mod preflight;
pub mod process;
pub mod timing;
pub mod workspace;

pub use error::ConfigError;
pub use timing::Timer;
