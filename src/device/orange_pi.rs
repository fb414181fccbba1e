//! Orange Pi post-install steps (Allwinner H3 / H5 boards).
//!
//! H3 boards need the sunxi Mali blob and the sunxi VDPAU driver built from
//! source, udev rules for the GPU nodes, and mesa's EGL moved out of the way
//! so the Mali one is picked up. Both families route ALSA to card 1 and
//! install the LIRC hardware config when LIRC is present.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::InstallContext;
use crate::fetch::{git_clone, remove_if_exists};
use crate::process::Cmd;

const SUNXI_MALI_REPO: &str = "https://github.com/linux-sunxi/sunxi-mali.git";
const LIBVDPAU_SUNXI_REPO: &str = "https://github.com/fastogt/libvdpau-sunxi.git";

const MALI_UDEV_RULES_PATH: &str = "/etc/udev/rules.d/50-mali.rules";
const MALI_UDEV_RULES: &str = "KERNEL==\"mali\", MODE=\"0660\", GROUP=\"video\"\n\
                               KERNEL==\"ump\", MODE=\"0660\", GROUP=\"video\"";

const ASOUND_CONF_PATH: &str = "/etc/asound.conf";
const ASOUND_CONF: &str = "pcm.!default {\ntype hw\ncard 1\n}\nctl.!default {\ntype hw\ncard 1\n}";

const MESA_EGL_PATH: &str = "/usr/lib/arm-linux-gnueabihf/mesa-egl/";
const MESA_EGL_HIDDEN_PATH: &str = "/usr/lib/arm-linux-gnueabihf/.mesa-egl/";

const LIRC_FOLDER: &str = "/etc/lirc/";
const LIRC_HARDWARE_CONF: &str = "hardware/lirc/hardware.conf";

/// Post-install for H3 boards (Orange Pi One, Lite).
pub fn install_orange_pi_h3(ctx: &InstallContext) -> Result<()> {
    println!("  Loading mali kernel module...");
    Cmd::new("modprobe").arg("mali").allow_fail().run_with(ctx.runner)?;

    build_in_clone(ctx, SUNXI_MALI_REPO, &[&["make", "config"], &["make", "install"]])?;
    build_in_clone(ctx, LIBVDPAU_SUNXI_REPO, &[&["make", "install"]])?;

    write_system_file(ctx, MALI_UDEV_RULES_PATH, MALI_UDEV_RULES)?;
    write_system_file(ctx, ASOUND_CONF_PATH, ASOUND_CONF)?;

    let mesa_egl = ctx.system_path(MESA_EGL_PATH);
    if mesa_egl.exists() {
        let hidden = ctx.system_path(MESA_EGL_HIDDEN_PATH);
        println!("  Hiding mesa EGL: {} -> {}", mesa_egl.display(), hidden.display());
        // A mesa upgrade restores mesa-egl; the stale hidden copy goes.
        remove_if_exists(&hidden)?;
        fs::rename(&mesa_egl, &hidden).with_context(|| {
            format!("Failed to move {} to {}", mesa_egl.display(), hidden.display())
        })?;
    }

    install_lirc_config(ctx)
}

/// Post-install for H5 boards (Orange Pi PC2).
pub fn install_orange_pi_h5(ctx: &InstallContext) -> Result<()> {
    write_system_file(ctx, ASOUND_CONF_PATH, ASOUND_CONF)?;
    install_lirc_config(ctx)
}

/// Clone a repository, run `steps` inside it, then remove the clone.
///
/// Step exit codes are not checked; the drivers' makefiles return non-zero
/// for warnings on some kernels.
fn build_in_clone(ctx: &InstallContext, url: &str, steps: &[&[&str]]) -> Result<()> {
    let cloned_dir = git_clone(ctx.runner, url, ctx.work_dir())?;

    for step in steps {
        let (program, args) = step.split_first().context("empty build step")?;
        Cmd::new(*program)
            .args(args.iter().copied())
            .current_dir(&cloned_dir)
            .allow_fail()
            .interactive()
            .run_with(ctx.runner)?;
    }

    remove_if_exists(&cloned_dir)
}

fn write_system_file(ctx: &InstallContext, path: &str, content: &str) -> Result<()> {
    let full_path = ctx.system_path(path);
    if let Some(parent) = full_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&full_path, content)
        .with_context(|| format!("Failed to write {}", full_path.display()))?;
    println!("  Wrote {}", full_path.display());
    Ok(())
}

fn install_lirc_config(ctx: &InstallContext) -> Result<()> {
    let lirc_dir = ctx.system_path(LIRC_FOLDER);
    if !lirc_dir.exists() {
        log::info!("{} not present, skipping LIRC config", lirc_dir.display());
        return Ok(());
    }

    let src = ctx.resource(LIRC_HARDWARE_CONF);
    let dst = lirc_dir.join("hardware.conf");
    copy_file(&src, &dst)?;
    println!("  Installed LIRC config: {}", dst.display());
    Ok(())
}

fn copy_file(src: &Path, dst: &Path) -> Result<()> {
    fs::copy(src, dst)
        .map(|_| ())
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::RecordingRunner;
    use tempfile::tempdir;

    fn context<'a>(dir: &Path, runner: &'a RecordingRunner) -> InstallContext<'a> {
        InstallContext::new(dir.join("root"), dir.join("work"), dir.join("res"), runner)
    }

    #[test]
    fn test_h3_writes_config_and_builds_drivers() {
        let dir = tempdir().unwrap();
        let runner = RecordingRunner::new();
        let ctx = context(dir.path(), &runner);
        fs::create_dir_all(ctx.system_path(MESA_EGL_PATH)).unwrap();

        install_orange_pi_h3(&ctx).unwrap();

        let rules = fs::read_to_string(ctx.system_path(MALI_UDEV_RULES_PATH)).unwrap();
        assert!(rules.contains("KERNEL==\"ump\""));
        let asound = fs::read_to_string(ctx.system_path(ASOUND_CONF_PATH)).unwrap();
        assert!(asound.starts_with("pcm.!default {"));

        assert!(!ctx.system_path(MESA_EGL_PATH).exists());
        assert!(ctx.system_path(MESA_EGL_HIDDEN_PATH).exists());

        let lines = runner.command_lines();
        assert_eq!(lines[0], "modprobe mali");
        assert_eq!(runner.invocations_of("make").len(), 3);
        let vdpau_make = runner.invocations_of("make").pop().unwrap();
        assert_eq!(
            vdpau_make.dir(),
            Some(dir.path().join("work/libvdpau-sunxi").as_path())
        );
    }

    #[test]
    fn test_h3_replaces_previously_hidden_mesa() {
        let dir = tempdir().unwrap();
        let runner = RecordingRunner::new();
        let ctx = context(dir.path(), &runner);

        let mesa = ctx.system_path(MESA_EGL_PATH);
        let hidden = ctx.system_path(MESA_EGL_HIDDEN_PATH);
        fs::create_dir_all(&mesa).unwrap();
        fs::write(mesa.join("libEGL.so.1"), "new").unwrap();
        fs::create_dir_all(&hidden).unwrap();
        fs::write(hidden.join("libEGL.so.1"), "old").unwrap();

        install_orange_pi_h3(&ctx).unwrap();

        assert!(!mesa.exists());
        assert_eq!(fs::read_to_string(hidden.join("libEGL.so.1")).unwrap(), "new");
    }

    #[test]
    fn test_h3_ignores_modprobe_failure() {
        let dir = tempdir().unwrap();
        let runner = RecordingRunner::new().fail_program("modprobe");
        let ctx = context(dir.path(), &runner);
        install_orange_pi_h3(&ctx).unwrap();
    }

    #[test]
    fn test_h3_clone_failure_aborts() {
        let dir = tempdir().unwrap();
        let runner = RecordingRunner::new().fail_program("git");
        let ctx = context(dir.path(), &runner);
        let err = install_orange_pi_h3(&ctx).unwrap_err();
        assert!(format!("{:#}", err).contains("sunxi-mali"));
        assert!(!ctx.system_path(ASOUND_CONF_PATH).exists());
    }

    #[test]
    fn test_h5_copies_lirc_config_when_present() {
        let dir = tempdir().unwrap();
        let runner = RecordingRunner::new();
        let ctx = context(dir.path(), &runner);

        fs::create_dir_all(ctx.system_path(LIRC_FOLDER)).unwrap();
        let conf = ctx.resource(LIRC_HARDWARE_CONF);
        fs::create_dir_all(conf.parent().unwrap()).unwrap();
        fs::write(&conf, "DRIVER=\"default\"\n").unwrap();

        install_orange_pi_h5(&ctx).unwrap();

        let installed = ctx.system_path("/etc/lirc/hardware.conf");
        assert_eq!(fs::read_to_string(installed).unwrap(), "DRIVER=\"default\"\n");
        assert!(runner.commands().is_empty());
    }

    #[test]
    fn test_h5_skips_lirc_without_lirc_folder() {
        let dir = tempdir().unwrap();
        let runner = RecordingRunner::new();
        let ctx = context(dir.path(), &runner);

        install_orange_pi_h5(&ctx).unwrap();
        assert!(ctx.system_path(ASOUND_CONF_PATH).exists());
        assert!(!ctx.system_path("/etc/lirc").exists());
    }
}
