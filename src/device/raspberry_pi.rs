//! Raspberry Pi post-install: point the GLES/EGL sonames at the VideoCore
//! userland libraries in `/opt/vc`.

use anyhow::Result;
use std::fs;

use super::InstallContext;
use crate::process::Cmd;

const VC_EGL: &str = "/opt/vc/lib/libEGL.so";
const VC_GLESV2: &str = "/opt/vc/lib/libGLESv2.so";

/// (target, link) pairs; link paths are resolved below the system root.
const GLES_SYMLINKS: &[(&str, &str)] = &[
    (VC_EGL, "/usr/lib/arm-linux-gnueabihf/libEGL.so"),
    (VC_EGL, "/usr/lib/arm-linux-gnueabihf/libEGL.so.1"),
    (VC_GLESV2, "/usr/lib/arm-linux-gnueabihf/libGLESv2.so"),
    (VC_GLESV2, "/usr/lib/arm-linux-gnueabihf/libGLESv2.so.2"),
];

pub fn install_raspberry_pi(ctx: &InstallContext) -> Result<()> {
    for (target, link) in GLES_SYMLINKS {
        let link_path = ctx.system_path(link);
        if let Some(parent) = link_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Cmd::new("ln")
            .arg("-sf")
            .arg(*target)
            .arg_path(&link_path)
            .error_msg(format!("Failed to symlink {} -> {}", link_path.display(), target))
            .run_with(ctx.runner)?;
        println!("  Linked {} -> {}", link_path.display(), target);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::RecordingRunner;
    use tempfile::tempdir;

    #[test]
    fn test_links_every_soname() {
        let dir = tempdir().unwrap();
        let runner = RecordingRunner::new();
        let ctx = InstallContext::new(dir.path(), dir.path(), dir.path(), &runner);

        install_raspberry_pi(&ctx).unwrap();

        let links = runner.invocations_of("ln");
        assert_eq!(links.len(), GLES_SYMLINKS.len());
        for (cmd, (target, link)) in links.iter().zip(GLES_SYMLINKS) {
            let link_path = ctx.system_path(link);
            assert_eq!(
                cmd.get_args(),
                ["-sf".to_string(), target.to_string(), link_path.to_string_lossy().into_owned()]
            );
            assert!(link_path.parent().unwrap().is_dir());
        }
    }

    #[test]
    fn test_link_failure_is_error() {
        let dir = tempdir().unwrap();
        let runner = RecordingRunner::new().fail_program("ln");
        let ctx = InstallContext::new(dir.path(), dir.path(), dir.path(), &runner);

        let err = install_raspberry_pi(&ctx).unwrap_err();
        assert!(err.to_string().contains("Failed to symlink"));
        assert_eq!(runner.invocations_of("ln").len(), 1);
    }
}
