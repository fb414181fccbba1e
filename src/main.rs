//! FastoTV build environment CLI
//!
//! Provisions a host for building the FastoTV player and packages the
//! player itself.
//!
//! # Usage
//!
//! ```bash
//! # Install system packages, build every dependency into /usr/local
//! fastotv-env env
//!
//! # Orange Pi One, skip system packages, only SDL2 and FFmpeg
//! fastotv-env env --device orange-pi-one --without-system --only sdl2,ffmpeg
//!
//! # Build and package the player (DEB + RPM)
//! fastotv-env package ~/work/fastotv --packages "DEB RPM"
//!
//! # Check host tools, network and install status
//! fastotv-env preflight
//! ```

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use fastotv_env::build_system::{available_build_systems, resolve_build_system};
use fastotv_env::config::{self, versions};
use fastotv_env::deps::Dependency;
use fastotv_env::device::{available_devices, resolve_device};
use fastotv_env::orchestrator::{run_env, DependencyRequest, EnvOptions};
use fastotv_env::package::{parse_package_types, PackageOptions, PackageRequest, ProgressSaver};
use fastotv_env::platform::{host_arch, host_os, resolve_platform, SUPPORTED_PLATFORMS};
use fastotv_env::preflight::{has_tool, PreflightChecker};
use fastotv_env::process::SystemRunner;
use fastotv_env::Timer;

#[derive(Parser)]
#[command(name = "fastotv-env")]
#[command(author, version, about = "FastoTV build environment provisioning", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install system packages and build third-party dependencies
    Env(EnvArgs),

    /// Build the player with cmake and package it with cpack
    Package(PackageArgs),

    /// List supported devices
    Devices,

    /// List supported platforms and architectures
    Platforms,

    /// Check host tools, disk space, network and installed dependencies
    Preflight {
        /// Install prefix to inspect
        #[arg(long, env = config::PREFIX_PATH_ENV)]
        prefix_path: Option<PathBuf>,

        /// Target platform (default: host)
        #[arg(long)]
        platform: Option<String>,

        /// Target architecture, name or bit width (default: host)
        #[arg(long)]
        architecture: Option<String>,
    },
}

#[derive(Args)]
struct TargetArgs {
    /// Target platform (default: host)
    #[arg(long)]
    platform: Option<String>,

    /// Target architecture, name or bit width (default: host)
    #[arg(long)]
    architecture: Option<String>,
}

impl TargetArgs {
    fn platform(&self) -> String {
        self.platform.clone().unwrap_or_else(|| host_os().to_string())
    }

    fn architecture(&self) -> String {
        self.architecture.clone().unwrap_or_else(|| host_arch().to_string())
    }
}

#[derive(Args)]
struct EnvArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Device to provision for
    #[arg(long, env = config::DEVICE_ENV, default_value = "pc")]
    device: String,

    /// Install prefix (default: the architecture's)
    #[arg(long, env = config::PREFIX_PATH_ENV)]
    prefix_path: Option<PathBuf>,

    /// Directory holding source patches
    #[arg(long, env = config::PATCH_DIR_ENV, default_value = config::DEFAULT_PATCH_DIR)]
    patch_dir: PathBuf,

    /// Directory holding bundled device files
    #[arg(long, env = config::RESOURCE_DIR_ENV, default_value = config::DEFAULT_RESOURCE_DIR)]
    resource_dir: PathBuf,

    /// Root of the system device setup writes to
    #[arg(long, env = config::SYSROOT_ENV, default_value = "/")]
    sysroot: PathBuf,

    /// Build only these dependencies (comma separated)
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    #[arg(long, overrides_with = "without_system")]
    with_system: bool,
    /// Skip system package installation
    #[arg(long)]
    without_system: bool,

    #[arg(long, overrides_with = "without_device")]
    with_device: bool,
    /// Skip device post-install setup
    #[arg(long)]
    without_device: bool,

    #[arg(long, overrides_with = "without_cmake")]
    with_cmake: bool,
    #[arg(long)]
    without_cmake: bool,
    #[arg(long, default_value = versions::CMAKE)]
    cmake_version: String,

    #[arg(long, overrides_with = "without_common")]
    with_common: bool,
    #[arg(long)]
    without_common: bool,

    #[arg(long, overrides_with = "without_jsonc")]
    with_jsonc: bool,
    #[arg(long)]
    without_jsonc: bool,

    #[arg(long, overrides_with = "without_libpng")]
    with_libpng: bool,
    #[arg(long)]
    without_libpng: bool,
    #[arg(long, default_value = versions::LIBPNG)]
    libpng_version: String,

    #[arg(long, overrides_with = "without_sdl2")]
    with_sdl2: bool,
    #[arg(long)]
    without_sdl2: bool,
    #[arg(long, default_value = versions::SDL2)]
    sdl2_version: String,

    #[arg(long, overrides_with = "without_sdl2_image")]
    with_sdl2_image: bool,
    #[arg(long)]
    without_sdl2_image: bool,
    #[arg(long, default_value = versions::SDL2_IMAGE)]
    sdl2_image_version: String,

    #[arg(long, overrides_with = "without_sdl2_ttf")]
    with_sdl2_ttf: bool,
    #[arg(long)]
    without_sdl2_ttf: bool,
    #[arg(long, default_value = versions::SDL2_TTF)]
    sdl2_ttf_version: String,

    #[arg(long, overrides_with = "without_openssl")]
    with_openssl: bool,
    #[arg(long)]
    without_openssl: bool,
    #[arg(long, default_value = versions::OPENSSL)]
    openssl_version: String,

    #[arg(long, overrides_with = "without_ffmpeg")]
    with_ffmpeg: bool,
    #[arg(long)]
    without_ffmpeg: bool,
    #[arg(long, default_value = versions::FFMPEG)]
    ffmpeg_version: String,
}

impl EnvArgs {
    /// Enabled dependencies with their versions.
    fn dependencies(&self) -> Result<Vec<DependencyRequest>> {
        let all = [
            (
                Dependency::Cmake,
                enabled(self.with_cmake, self.without_cmake),
                self.cmake_version.as_str(),
            ),
            (
                Dependency::Common,
                enabled(self.with_common, self.without_common),
                "",
            ),
            (
                Dependency::JsonC,
                enabled(self.with_jsonc, self.without_jsonc),
                "",
            ),
            (
                Dependency::Libpng,
                enabled(self.with_libpng, self.without_libpng),
                self.libpng_version.as_str(),
            ),
            (
                Dependency::Sdl2,
                enabled(self.with_sdl2, self.without_sdl2),
                self.sdl2_version.as_str(),
            ),
            (
                Dependency::Sdl2Image,
                enabled(self.with_sdl2_image, self.without_sdl2_image),
                self.sdl2_image_version.as_str(),
            ),
            (
                Dependency::Sdl2Ttf,
                enabled(self.with_sdl2_ttf, self.without_sdl2_ttf),
                self.sdl2_ttf_version.as_str(),
            ),
            (
                Dependency::Openssl,
                enabled(self.with_openssl, self.without_openssl),
                self.openssl_version.as_str(),
            ),
            (
                Dependency::Ffmpeg,
                enabled(self.with_ffmpeg, self.without_ffmpeg),
                self.ffmpeg_version.as_str(),
            ),
        ];

        let only = self
            .only
            .iter()
            .map(|name| name.parse::<Dependency>())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(all
            .into_iter()
            .filter(|(dep, on, _)| *on && (only.is_empty() || only.contains(dep)))
            .map(|(dep, _, version)| DependencyRequest::new(dep, version))
            .collect())
    }

    fn options(&self) -> Result<EnvOptions> {
        let mut options = EnvOptions::new(self.target.platform(), self.target.architecture());
        options.device = self.device.clone();
        options.prefix = self.prefix_path.clone();
        options.with_system = enabled(self.with_system, self.without_system);
        options.with_device = enabled(self.with_device, self.without_device);
        options.dependencies = self.dependencies()?;
        options.patch_dir = self.patch_dir.clone();
        options.resource_dir = self.resource_dir.clone();
        options.sysroot = self.sysroot.clone();
        Ok(options)
    }
}

/// `--with-X` wins when given last; everything is enabled by default.
fn enabled(with: bool, without: bool) -> bool {
    with || !without
}

#[derive(Args)]
struct PackageArgs {
    /// Root of the player's cmake project
    cmake_root: PathBuf,

    #[command(flatten)]
    target: TargetArgs,

    /// File with one cmake branding option per line
    #[arg(long, default_value = config::DEFAULT_BRANDING_FILE)]
    branding_file: PathBuf,

    /// Build system driving cmake
    #[arg(long, default_value = "ninja")]
    build_system: String,

    /// Package generators, space separated (default: the platform's)
    #[arg(long)]
    packages: Option<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Env(args) => cmd_env(&args),
        Commands::Package(args) => cmd_package(&args),
        Commands::Devices => cmd_devices(),
        Commands::Platforms => cmd_platforms(),
        Commands::Preflight {
            prefix_path,
            platform,
            architecture,
        } => cmd_preflight(prefix_path, TargetArgs { platform, architecture }),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn cmd_env(args: &EnvArgs) -> Result<()> {
    let options = args.options()?;
    let t = Timer::start("Environment");
    let report = run_env(&SystemRunner, &options)?;
    t.finish();

    println!("  Workspace: {}", report.workspace.display());
    println!("  Prefix:    {}", report.prefix.display());
    if !report.failed_packages.is_empty() {
        println!(
            "  [WARN] {} system package(s) not installed: {}",
            report.failed_packages.len(),
            report.failed_packages.join(" ")
        );
    }
    Ok(())
}

fn cmd_package(args: &PackageArgs) -> Result<()> {
    let platform = args.target.platform();
    let build_system = resolve_build_system(&args.build_system)?;
    if !has_tool(build_system.cmd_line()[0]) {
        log::warn!("{} not found on PATH", build_system.name());
    }

    let package_types = match &args.packages {
        Some(list) => parse_package_types(list)?,
        None => Vec::new(),
    };
    let branding_options = config::read_branding_options(&args.branding_file)?;
    let build_dir = PathBuf::from(config::package_build_dir_name(&platform));

    let request = PackageRequest::new(&platform, &args.target.architecture())?;
    let options = PackageOptions {
        cmake_root: &args.cmake_root,
        branding_options: &branding_options,
        build_dir: &build_dir,
        build_system: Some(build_system),
        package_types: &package_types,
    };

    let files = request.build(&SystemRunner, &options, &mut ProgressSaver::printing())?;
    for file in files {
        println!("  {}", file.display());
    }
    Ok(())
}

fn cmd_devices() -> Result<()> {
    println!("Supported devices:");
    for name in available_devices() {
        let device = resolve_device(name)?;
        let hook = if device.has_post_install() { " (post-install)" } else { "" };
        println!("  {}{}", name, hook);
        let libs = device.system_libs("linux");
        if !libs.is_empty() {
            println!("    linux packages: {}", libs.join(" "));
        }
    }
    Ok(())
}

fn cmd_platforms() -> Result<()> {
    println!("Supported platforms:");
    for platform in SUPPORTED_PLATFORMS {
        let packages: Vec<_> = platform
            .package_types()
            .iter()
            .map(|p| p.generator())
            .collect();
        println!("  {} [{}]", platform.name(), packages.join(" "));
        for arch in platform.architectures() {
            println!(
                "    {:<8} {}-bit  prefix {}",
                arch.name(),
                arch.bit(),
                arch.default_install_prefix()
            );
        }
    }
    println!();
    println!("Build systems: {}", available_build_systems().join(", "));
    Ok(())
}

fn cmd_preflight(prefix_path: Option<PathBuf>, target: TargetArgs) -> Result<()> {
    let platform = resolve_platform(&target.platform())?;
    let arch = platform.architecture(&target.architecture())?;
    let prefix = prefix_path.unwrap_or_else(|| PathBuf::from(arch.default_install_prefix()));
    let work_dir = PathBuf::from(config::env_build_dir_name(platform.name()));

    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;
    let checker = PreflightChecker::new(work_dir, prefix);
    let report = runtime.block_on(checker.run_all());
    report.print_summary();

    if !report.is_ok() {
        anyhow::bail!("{} preflight check(s) failed", report.errors().len());
    }
    Ok(())
}
