//! Source retrieval: git clones, tarball downloads, extraction.
//!
//! These are thin wrappers over `git`, `curl` and `tar`. Retries, mirrors
//! and archive formats are the tools' business.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::process::{Cmd, CommandRunner};

/// Archive suffixes recognised when deriving the extracted directory name.
const ARCHIVE_EXTENSIONS: &[&str] = &[".tar.gz", ".tar.bz2", ".tar.xz", ".tgz", ".zip"];

/// Clone `url` (with submodules) into `parent`, returning the checkout path.
pub fn git_clone(runner: &dyn CommandRunner, url: &str, parent: &Path) -> Result<PathBuf> {
    let dir = parent.join(repo_name(url)?);
    println!("  Cloning {}...", url);

    Cmd::new("git")
        .args(["clone", url])
        .arg_path(&dir)
        .current_dir(parent)
        .error_msg(format!("Failed to clone {}", url))
        .interactive()
        .run_with(runner)?;

    Cmd::new("git")
        .args(["submodule", "update", "--init", "--recursive"])
        .current_dir(&dir)
        .error_msg(format!("Failed to init submodules of {}", url))
        .interactive()
        .run_with(runner)?;

    Ok(dir)
}

/// Download `url` into `dest_dir`, returning the archive path.
pub fn download(runner: &dyn CommandRunner, url: &str, dest_dir: &Path) -> Result<PathBuf> {
    let dest = dest_dir.join(url_file_name(url)?);
    println!("  Downloading {}...", url);

    Cmd::new("curl")
        .args(["-L", "--fail", "-o"])
        .arg_path(&dest)
        .args(["--progress-bar", url])
        .current_dir(dest_dir)
        .error_msg(format!("Failed to download {}", url))
        .interactive()
        .run_with(runner)?;

    Ok(dest)
}

/// Extract `archive` into `dest_dir`, returning the top-level source dir.
///
/// The source dir is assumed to be the archive name without its extension,
/// which is how every upstream tarball used here is laid out.
pub fn extract(runner: &dyn CommandRunner, archive: &Path, dest_dir: &Path) -> Result<PathBuf> {
    let file_name = archive
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid archive path: {}", archive.display()))?;

    println!("  Extracting {}...", file_name);
    Cmd::new("tar")
        .arg("xf")
        .arg_path(archive)
        .arg("-C")
        .arg_path(dest_dir)
        .current_dir(dest_dir)
        .error_msg(format!("Failed to extract {}", file_name))
        .run_with(runner)?;

    Ok(dest_dir.join(archive_stem(file_name)))
}

/// Strip a known archive extension (`SDL2-2.0.9.tar.gz` -> `SDL2-2.0.9`).
pub fn archive_stem(file_name: &str) -> &str {
    for ext in ARCHIVE_EXTENSIONS {
        if let Some(stem) = file_name.strip_suffix(ext) {
            return stem;
        }
    }
    match file_name.rfind('.') {
        Some(idx) if idx > 0 => &file_name[..idx],
        _ => file_name,
    }
}

/// Last path segment of a URL.
pub fn url_file_name(url: &str) -> Result<&str> {
    let trimmed = url.trim_end_matches('/');
    match trimmed.rsplit('/').next() {
        Some(name) if !name.is_empty() && name != trimmed => Ok(name),
        _ => bail!("Cannot derive a file name from URL: {}", url),
    }
}

/// Repository directory name of a git URL (`.../common.git` -> `common`).
pub fn repo_name(url: &str) -> Result<&str> {
    let name = url_file_name(url)?;
    Ok(name.strip_suffix(".git").unwrap_or(name))
}

/// Remove a file or directory tree if it exists.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    if path.is_symlink() || path.is_file() {
        fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
    } else if path.is_dir() {
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::RecordingRunner;

    #[test]
    fn test_archive_stem() {
        assert_eq!(archive_stem("SDL2-2.0.9.tar.gz"), "SDL2-2.0.9");
        assert_eq!(archive_stem("ffmpeg-3.3.tar.bz2"), "ffmpeg-3.3");
        assert_eq!(archive_stem("libpng-1.6.29.tar.xz"), "libpng-1.6.29");
        assert_eq!(archive_stem("sources.zip"), "sources");
        assert_eq!(archive_stem("README"), "README");
    }

    #[test]
    fn test_url_names() {
        assert_eq!(
            url_file_name("https://www.libsdl.org/release/SDL2-2.0.9.tar.gz").unwrap(),
            "SDL2-2.0.9.tar.gz"
        );
        assert_eq!(repo_name("https://github.com/fastogt/common.git").unwrap(), "common");
        assert_eq!(repo_name("https://github.com/fastogt/json-c").unwrap(), "json-c");
        assert!(url_file_name("common").is_err());
    }

    #[test]
    fn test_git_clone_commands() {
        let runner = RecordingRunner::new();
        let parent = Path::new("/tmp/build_linux_env");
        let dir = git_clone(&runner, "https://github.com/fastogt/common.git", parent).unwrap();

        assert_eq!(dir, parent.join("common"));
        let cmds = runner.commands();
        assert_eq!(cmds.len(), 2);
        assert_eq!(
            cmds[0].to_string(),
            "git clone https://github.com/fastogt/common.git /tmp/build_linux_env/common"
        );
        assert_eq!(cmds[1].dir(), Some(dir.as_path()));
    }

    #[test]
    fn test_download_and_extract_paths() {
        let runner = RecordingRunner::new();
        let dir = Path::new("/tmp/work");
        let archive = download(&runner, "http://ffmpeg.org/releases/ffmpeg-3.3.tar.bz2", dir).unwrap();
        assert_eq!(archive, dir.join("ffmpeg-3.3.tar.bz2"));

        let src = extract(&runner, &archive, dir).unwrap();
        assert_eq!(src, dir.join("ffmpeg-3.3"));
        assert_eq!(runner.invocations_of("tar").len(), 1);
    }

    #[test]
    fn test_remove_if_exists() {
        let dir = tempfile::tempdir().unwrap();
        let tree = dir.path().join("tree");
        fs::create_dir_all(tree.join("nested")).unwrap();
        fs::write(tree.join("nested/file"), "x").unwrap();

        remove_if_exists(&tree).unwrap();
        assert!(!tree.exists());
        remove_if_exists(&tree).unwrap();
    }
}
