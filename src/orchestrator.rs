//! Environment build orchestration.
//!
//! A run is a linear sequence:
//!
//! 1. Resolve platform, architecture, device, build system and dependency
//!    specs. Nothing on disk is touched until all of them resolve.
//! 2. Recreate the workspace directory.
//! 3. Install base and device system packages (best-effort).
//! 4. Run the device post-install hook, if any.
//! 5. Build the enabled dependencies in [`Dependency::BUILD_ORDER`].
//!
//! The process working directory is never changed; every step receives the
//! workspace path explicitly.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::build_system::{resolve_build_system, BuildSystem};
use crate::config;
use crate::deps::{build_dependency, BuildEnv, Dependency, DependencySpec};
use crate::device::{resolve_device, system_path, Device, InstallContext};
use crate::platform::{base_system_libs, resolve_platform, BuildTarget, LinuxDistribution};
use crate::process::{Cmd, CommandRunner};
use crate::workspace::prepare_workspace;

/// RHEL ships ninja as `ninja-build`.
const NINJA_BUILD: &str = "/usr/bin/ninja-build";
const NINJA: &str = "/usr/bin/ninja";

/// Build system for cmake-based dependencies.
const DEPS_BUILD_SYSTEM: &str = "make";

/// A dependency the caller wants built, at a version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyRequest {
    pub dependency: Dependency,
    /// Ignored for git dependencies.
    pub version: String,
}

impl DependencyRequest {
    pub fn new(dependency: Dependency, version: impl Into<String>) -> Self {
        Self {
            dependency,
            version: version.into(),
        }
    }
}

/// Caller-supplied options of an `env` run.
#[derive(Debug, Clone)]
pub struct EnvOptions {
    pub device: String,
    pub platform: String,
    pub architecture: String,
    /// Install prefix; the architecture's default when `None`.
    pub prefix: Option<PathBuf>,
    pub with_system: bool,
    pub with_device: bool,
    /// Enabled dependencies, in any order.
    pub dependencies: Vec<DependencyRequest>,
    /// Workspace; `build_<platform>_env` in the current directory when `None`.
    pub build_dir: Option<PathBuf>,
    pub patch_dir: PathBuf,
    pub resource_dir: PathBuf,
    /// Root of the system device hooks and symlinks write to.
    pub sysroot: PathBuf,
    /// Skip host distribution detection.
    pub distribution: Option<LinuxDistribution>,
}

impl EnvOptions {
    /// Options for the default device on `platform`/`architecture` with every
    /// dependency enabled at its default version.
    pub fn new(platform: impl Into<String>, architecture: impl Into<String>) -> Self {
        Self {
            device: crate::device::default_device().name().to_string(),
            platform: platform.into(),
            architecture: architecture.into(),
            prefix: None,
            with_system: true,
            with_device: true,
            dependencies: default_dependencies(),
            build_dir: None,
            patch_dir: PathBuf::from(config::DEFAULT_PATCH_DIR),
            resource_dir: PathBuf::from(config::DEFAULT_RESOURCE_DIR),
            sysroot: PathBuf::from("/"),
            distribution: None,
        }
    }
}

/// Every dependency at its default version.
pub fn default_dependencies() -> Vec<DependencyRequest> {
    use config::versions;

    Dependency::BUILD_ORDER
        .iter()
        .map(|&dep| {
            let version = match dep {
                Dependency::Cmake => versions::CMAKE,
                Dependency::Libpng => versions::LIBPNG,
                Dependency::Sdl2 => versions::SDL2,
                Dependency::Sdl2Image => versions::SDL2_IMAGE,
                Dependency::Sdl2Ttf => versions::SDL2_TTF,
                Dependency::Openssl => versions::OPENSSL,
                Dependency::Ffmpeg => versions::FFMPEG,
                Dependency::Common | Dependency::JsonC => "",
            };
            DependencyRequest::new(dep, version)
        })
        .collect()
}

/// A fully resolved `env` run.
#[derive(Debug)]
pub struct BuildRequest {
    pub target: BuildTarget,
    pub device: &'static Device,
    pub build_system: &'static BuildSystem,
    pub prefix: PathBuf,
    pub build_dir: PathBuf,
    pub patch_dir: PathBuf,
    pub resource_dir: PathBuf,
    pub sysroot: PathBuf,
    pub with_system: bool,
    pub with_device: bool,
    /// In build order.
    pub specs: Vec<DependencySpec>,
}

impl BuildRequest {
    /// Resolve every name in `options`. Performs no filesystem mutation.
    pub fn resolve(options: &EnvOptions) -> Result<Self> {
        let platform = resolve_platform(&options.platform)?;
        let arch = *platform.architecture(&options.architecture)?;
        let device = resolve_device(&options.device)?;
        let build_system = resolve_build_system(DEPS_BUILD_SYSTEM)?;

        let mut target = platform.make_target(arch, platform.package_types().to_vec());
        if let Some(distribution) = options.distribution {
            target = target.with_distribution(distribution);
        }

        let mut requests = options.dependencies.clone();
        requests.sort_by_key(|r| r.dependency.priority());
        requests.dedup_by_key(|r| r.dependency);

        let specs = requests
            .iter()
            .map(|r| {
                DependencySpec::new(r.dependency, &r.version, device, &target)
                    .with_context(|| format!("Invalid {} request", r.dependency))
            })
            .collect::<Result<Vec<_>>>()?;

        let prefix = options
            .prefix
            .clone()
            .unwrap_or_else(|| PathBuf::from(arch.default_install_prefix()));
        let build_dir = options
            .build_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(config::env_build_dir_name(platform.name())));

        Ok(Self {
            target,
            device,
            build_system,
            prefix,
            build_dir,
            patch_dir: absolute(&options.patch_dir)?,
            resource_dir: absolute(&options.resource_dir)?,
            sysroot: options.sysroot.clone(),
            with_system: options.with_system,
            with_device: options.with_device,
            specs,
        })
    }
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("Failed to read current directory")?
        .join(path))
}

/// One executed orchestration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Resolve,
    PrepareWorkspace,
    InstallSystemPackages,
    DevicePostInstall,
    BuildDependency(Dependency),
}

/// What a run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    pub steps: Vec<Step>,
    pub workspace: PathBuf,
    pub prefix: PathBuf,
    /// Packages the package manager failed to install.
    pub failed_packages: Vec<String>,
}

/// Resolve `options` and run every step.
pub fn run_env(runner: &dyn CommandRunner, options: &EnvOptions) -> Result<BuildReport> {
    let request = BuildRequest::resolve(options)?;
    execute(runner, &request)
}

/// Run the steps of an already resolved request.
pub fn execute(runner: &dyn CommandRunner, request: &BuildRequest) -> Result<BuildReport> {
    let mut steps = vec![Step::Resolve];
    println!(
        "=== Provisioning {} ({}) for {} ===",
        request.target.name(),
        request.target.arch().name(),
        request.device.name()
    );
    println!("  Prefix: {}", request.prefix.display());

    let workspace = prepare_workspace(&request.build_dir)?;
    steps.push(Step::PrepareWorkspace);
    println!("  Workspace: {}", workspace.display());

    let mut failed_packages = Vec::new();
    if request.with_system {
        println!("=== Installing system packages ===");
        failed_packages = install_system_packages(runner, request)?;
        steps.push(Step::InstallSystemPackages);
    } else {
        println!("  [SKIP] System packages");
    }

    if request.with_device && request.device.has_post_install() {
        println!("=== Device setup: {} ===", request.device.name());
        let ctx = InstallContext::new(
            &request.sysroot,
            &workspace,
            &request.resource_dir,
            runner,
        );
        request
            .device
            .install_specific(&ctx)
            .with_context(|| format!("Post-install for {} failed", request.device.name()))?;
        steps.push(Step::DevicePostInstall);
    } else if !request.with_device {
        println!("  [SKIP] Device setup");
    }

    let env = BuildEnv {
        runner,
        work_dir: &workspace,
        prefix: &request.prefix,
        patch_root: &request.patch_dir,
        build_system: request.build_system,
    };
    for spec in &request.specs {
        build_dependency(&env, spec)
            .with_context(|| format!("Failed to build {}", spec.dependency))?;
        steps.push(Step::BuildDependency(spec.dependency));
    }

    println!("=== Environment ready ===");
    Ok(BuildReport {
        steps,
        workspace,
        prefix: request.prefix.clone(),
        failed_packages,
    })
}

/// Install base and device packages one at a time. Returns the failures.
fn install_system_packages(
    runner: &dyn CommandRunner,
    request: &BuildRequest,
) -> Result<Vec<String>> {
    let target = &request.target;
    let mut packages = base_system_libs(target);
    packages.extend(request.device.system_libs(target.name()));

    let mut failed = Vec::new();
    for package in packages {
        if !target.install_package(runner, package) {
            failed.push(package.to_string());
        }
    }
    if !failed.is_empty() {
        log::warn!("{} package(s) failed to install: {}", failed.len(), failed.join(" "));
    }

    if target.distribution() == LinuxDistribution::Rhel {
        Cmd::new("ln")
            .arg("-sf")
            .arg(NINJA_BUILD)
            .arg_path(&system_path(&request.sysroot, NINJA))
            .allow_fail()
            .run_with(runner)?;
    }

    Ok(failed)
}
