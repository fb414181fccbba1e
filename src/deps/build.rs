//! Execute a [`DependencySpec`]: fetch, patch, configure, build, install,
//! clean up.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::{BuildStyle, DependencySpec, Source};
use crate::build_system::BuildSystem;
use crate::fetch::{download, extract, git_clone, remove_if_exists};
use crate::process::{Cmd, CommandRunner};
use crate::timing::Timer;

/// Out-of-tree cmake build directory inside a checkout.
const CMAKE_BUILD_DIR: &str = "build_cmake_release";

/// Where and how dependencies are built.
#[derive(Clone, Copy)]
pub struct BuildEnv<'a> {
    pub runner: &'a dyn CommandRunner,
    /// Fresh workspace sources are fetched into.
    pub work_dir: &'a Path,
    /// Install prefix (`--prefix`, `CMAKE_INSTALL_PREFIX`).
    pub prefix: &'a Path,
    /// Root of the patch directories named in specs.
    pub patch_root: &'a Path,
    /// Drives cmake-style builds.
    pub build_system: &'a BuildSystem,
}

/// Build and install one dependency.
///
/// Sources and downloaded archives are removed after a successful install.
/// Any failure aborts and leaves them in the workspace.
pub fn build_dependency(env: &BuildEnv<'_>, spec: &DependencySpec) -> Result<()> {
    println!("=== Building {} ===", spec.dependency);
    let timer = Timer::start(spec.dependency.name());

    let (src_dir, archive) = fetch_sources(env, &spec.source)?;
    apply_patches(env, &spec.patches, &src_dir)?;

    match spec.style {
        BuildStyle::Configure => configure_make_install(env, &src_dir, "./configure", &spec.flags)?,
        BuildStyle::Autogen => {
            Cmd::new("sh")
                .arg("autogen.sh")
                .current_dir(&src_dir)
                .error_msg(format!("autogen.sh failed for {}", spec.dependency))
                .interactive()
                .run_with(env.runner)?;
            configure_make_install(env, &src_dir, "./configure", &spec.flags)?;
        }
        BuildStyle::OpensslConfig => {
            run_configure(env, &src_dir, "./config", &spec.flags)?;
            run_make(env, &src_dir, &[])?;
            run_make(env, &src_dir, &["install_sw"])?;
        }
        BuildStyle::Cmake => cmake_install(env, &src_dir, &spec.flags)?,
    }

    remove_if_exists(&src_dir)?;
    if let Some(archive) = archive {
        remove_if_exists(&archive)?;
    }

    println!("  [OK] {} installed to {}", spec.dependency, env.prefix.display());
    timer.finish();
    Ok(())
}

/// Returns the source directory and, for tarballs, the archive path.
fn fetch_sources(env: &BuildEnv<'_>, source: &Source) -> Result<(PathBuf, Option<PathBuf>)> {
    match source {
        Source::Git(url) => Ok((git_clone(env.runner, url, env.work_dir)?, None)),
        Source::Tarball(url) => {
            let archive = download(env.runner, url, env.work_dir)?;
            let src_dir = extract(env.runner, &archive, env.work_dir)?;
            Ok((src_dir, Some(archive)))
        }
    }
}

/// Apply every file of every patch directory, in name order.
fn apply_patches(env: &BuildEnv<'_>, patches: &[String], src_dir: &Path) -> Result<()> {
    for patch_dir in patches {
        let dir = env.patch_root.join(patch_dir);
        if !dir.is_dir() {
            bail!("Patch directory not found: {}", dir.display());
        }

        for patch in sorted_files(&dir)? {
            println!("  Applying {}", patch.display());
            Cmd::new("patch")
                .args(["-p1", "-i"])
                .arg_path(&patch)
                .current_dir(src_dir)
                .error_msg(format!("Failed to apply {}", patch.display()))
                .run_with(env.runner)?;
        }
    }
    Ok(())
}

fn sorted_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn configure_make_install(
    env: &BuildEnv<'_>,
    src_dir: &Path,
    script: &str,
    flags: &[String],
) -> Result<()> {
    run_configure(env, src_dir, script, flags)?;
    run_make(env, src_dir, &[])?;
    run_make(env, src_dir, &["install"])
}

fn run_configure(env: &BuildEnv<'_>, src_dir: &Path, script: &str, flags: &[String]) -> Result<()> {
    Cmd::new(script)
        .arg(format!("--prefix={}", env.prefix.display()))
        .args(flags)
        .current_dir(src_dir)
        .error_msg(format!("{} failed in {}", script, src_dir.display()))
        .interactive()
        .run_with(env.runner)?;
    Ok(())
}

fn run_make(env: &BuildEnv<'_>, src_dir: &Path, targets: &[&str]) -> Result<()> {
    Cmd::new("make")
        .arg(format!("-j{}", make_jobs()))
        .args(targets.iter().copied())
        .current_dir(src_dir)
        .error_msg(format!("make {} failed in {}", targets.join(" "), src_dir.display()))
        .interactive()
        .run_with(env.runner)?;
    Ok(())
}

fn cmake_install(env: &BuildEnv<'_>, src_dir: &Path, flags: &[String]) -> Result<()> {
    let build_dir = src_dir.join(CMAKE_BUILD_DIR);
    fs::create_dir_all(&build_dir)
        .with_context(|| format!("Failed to create {}", build_dir.display()))?;

    Cmd::new("cmake")
        .arg("..")
        .arg(env.build_system.cmake_generator_arg())
        .arg("-DCMAKE_BUILD_TYPE=RELEASE")
        .arg(format!("-DCMAKE_INSTALL_PREFIX={}", env.prefix.display()))
        .args(flags)
        .current_dir(&build_dir)
        .error_msg(format!("cmake configure failed in {}", src_dir.display()))
        .interactive()
        .run_with(env.runner)?;

    let (program, args) = env
        .build_system
        .cmd_line()
        .split_first()
        .context("build system has an empty command line")?;
    Cmd::new(*program)
        .args(args.iter().copied())
        .arg("install")
        .current_dir(&build_dir)
        .error_msg(format!("{} install failed in {}", program, src_dir.display()))
        .interactive()
        .run_with(env.runner)?;
    Ok(())
}

fn make_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}
