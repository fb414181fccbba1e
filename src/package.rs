//! Build and package the player project with cmake and cpack.
//!
//! Progress is reported as a percentage split into fixed ranges:
//!
//! | Range  | Stage                                   |
//! |--------|-----------------------------------------|
//! | 0-9    | start                                   |
//! | 10-19  | cmake generate                          |
//! | 20-79  | build + install                         |
//! | 80-84  | read `CPACK_PACKAGE_FILE_NAME`          |
//! | 85-99  | `cpack -G <generator>` per package type |
//! | 100    | done                                    |

use anyhow::{bail, Context, Result};
use regex::Regex;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use crate::build_system::{default_build_system, BuildSystem};
use crate::platform::{resolve_platform, BuildTarget, PackageType};
use crate::process::{Cmd, CommandRunner};
use crate::workspace::prepare_workspace;

/// Static options every package build gets.
const PROJECT_CMAKE_FLAGS: &[&str] = &[
    "-DCMAKE_BUILD_TYPE=RELEASE",
    "-DOPENSSL_USE_STATIC_LIBS=ON",
    "-DJSONC_USE_STATIC=ON",
    "-DLOG_TO_FILE=ON",
    "-DLIBEV_USE_STATIC=ON",
];

const CPACK_CONFIG: &str = "CPackConfig.cmake";

static CPACK_FILE_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(set|SET)\(CPACK_PACKAGE_FILE_NAME "(.+)"\)"#).expect("valid regex")
});

/// `[ 45%] Building C object ...` (make) or `[12/80] Building CXX ...` (ninja).
static BUILD_PROGRESS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[\s*(?:(\d+)%|(\d+)/(\d+))\]\s*(.*)$").expect("valid regex")
});

/// Default progress callback.
pub fn print_message(progress: f64, message: &str) {
    println!("{:.1}% {}", progress, message);
}

/// Maps progress of the current stage into its overall range.
pub struct ProgressSaver<'a> {
    min: f64,
    max: f64,
    current: f64,
    callback: Box<dyn FnMut(f64, &str) + 'a>,
}

impl<'a> ProgressSaver<'a> {
    pub fn new(callback: impl FnMut(f64, &str) + 'a) -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            current: 0.0,
            callback: Box::new(callback),
        }
    }

    /// Enter a new stage; reports `min` with `message`.
    pub fn update_range(&mut self, min: f64, max: f64, message: &str) {
        self.min = min;
        self.max = max;
        self.current = min;
        (self.callback)(min, message);
    }

    /// Report `progress` (0..=100) within the current stage.
    pub fn on_progress(&mut self, progress: f64, message: &str) {
        self.current = self.min + (self.max - self.min) * (progress / 100.0);
        (self.callback)(self.current, message);
    }

    /// Report `message` at the last reported percentage.
    pub fn on_message(&mut self, message: &str) {
        (self.callback)(self.current, message);
    }
}

impl ProgressSaver<'static> {
    /// Saver that prints with [`print_message`].
    pub fn printing() -> Self {
        ProgressSaver::new(print_message)
    }
}

/// Parse a build tool progress line into (percent, message).
pub fn parse_build_progress(line: &str) -> Option<(f64, String)> {
    let caps = BUILD_PROGRESS_RE.captures(line.trim())?;
    let message = caps.get(4).map_or("", |m| m.as_str()).to_string();

    if let Some(percent) = caps.get(1) {
        return Some((percent.as_str().parse().ok()?, message));
    }
    let done: f64 = caps.get(2)?.as_str().parse().ok()?;
    let total: f64 = caps.get(3)?.as_str().parse().ok()?;
    if total == 0.0 {
        return None;
    }
    Some((done * 100.0 / total, message))
}

/// Extract the package base name from `CPackConfig.cmake` content.
pub fn parse_cpack_file_name(content: &str) -> Option<String> {
    content
        .lines()
        .find_map(|line| CPACK_FILE_NAME_RE.captures(line))
        .and_then(|caps| caps.get(2))
        .map(|m| m.as_str().to_string())
}

/// Parse `"DEB RPM"` style package lists.
pub fn parse_package_types(list: &str) -> Result<Vec<PackageType>> {
    list.split_whitespace()
        .map(|name| {
            PackageType::from_generator(name)
                .with_context(|| format!("Unsupported package type: {}", name))
        })
        .collect()
}

/// Inputs of a package build.
#[derive(Debug, Clone)]
pub struct PackageOptions<'a> {
    pub cmake_root: &'a Path,
    pub branding_options: &'a [String],
    /// Recreated before the build.
    pub build_dir: &'a Path,
    pub build_system: Option<&'static BuildSystem>,
    /// The platform's formats when empty.
    pub package_types: &'a [PackageType],
}

/// A project packaging request for one platform/architecture.
#[derive(Debug)]
pub struct PackageRequest {
    target: BuildTarget,
}

impl PackageRequest {
    pub fn new(platform: &str, arch: &str) -> Result<Self> {
        let platform = resolve_platform(platform)?;
        let arch = *platform.architecture(arch)?;
        let target = platform.make_target(arch, platform.package_types().to_vec());
        println!(
            "Build request for platform: {}, arch: {} created",
            target.name(),
            target.arch().name()
        );
        Ok(Self { target })
    }

    pub fn target(&self) -> &BuildTarget {
        &self.target
    }

    /// Configure, build, install and package the project.
    ///
    /// Returns the paths of the produced packages, one per package type.
    pub fn build(
        &self,
        runner: &dyn CommandRunner,
        options: &PackageOptions<'_>,
        saver: &mut ProgressSaver<'_>,
    ) -> Result<Vec<PathBuf>> {
        let cmake_root = absolute(options.cmake_root)?;
        if !cmake_root.exists() {
            bail!("Invalid cmake project root: {}", options.cmake_root.display());
        }

        let build_system = options.build_system.unwrap_or_else(default_build_system);
        let package_types = if options.package_types.is_empty() {
            self.target.package_types()
        } else {
            options.package_types
        };

        saver.update_range(
            0.0,
            9.0,
            &format!(
                "Start building project branding_options:\n{}",
                options.branding_options.join("\n")
            ),
        );
        let build_dir = prepare_workspace(options.build_dir)?;

        saver.update_range(10.0, 19.0, "Generate project build");
        let cmake = Cmd::new("cmake")
            .arg_path(&cmake_root)
            .arg(build_system.cmake_generator_arg())
            .args(PROJECT_CMAKE_FLAGS.iter().copied())
            .args(options.branding_options)
            .current_dir(&build_dir)
            .error_msg("cmake generate failed");
        run_reporting(runner, &cmake, saver)?;

        saver.update_range(20.0, 79.0, "Build project");
        let (program, args) = build_system
            .cmd_line()
            .split_first()
            .context("build system has an empty command line")?;
        let install = Cmd::new(*program)
            .args(args.iter().copied())
            .arg("install")
            .current_dir(&build_dir)
            .error_msg("Project build failed");
        run_reporting(runner, &install, saver)?;

        saver.update_range(80.0, 84.0, "Trying to get package file name");
        let cpack_config = build_dir.join(CPACK_CONFIG);
        let content = fs::read_to_string(&cpack_config)
            .with_context(|| format!("Failed to read {}", cpack_config.display()))?;
        let Some(file_name) = parse_cpack_file_name(&content) else {
            bail!("CPACK_PACKAGE_FILE_NAME not set in {}", cpack_config.display());
        };

        saver.update_range(85.0, 99.0, "Start build package");
        let mut file_names = Vec::new();
        for package_type in package_types {
            let cpack = Cmd::new("cpack")
                .args(["-G", package_type.generator()])
                .current_dir(&build_dir)
                .error_msg(format!("cpack -G {} failed", package_type));
            run_reporting(runner, &cpack, saver)?;
            file_names.push(build_dir.join(format!("{}.{}", file_name, package_type.extension())));
        }

        saver.update_range(
            100.0,
            100.0,
            &format!(
                "Building finished successfully file_names: {:?}",
                file_names
            ),
        );
        Ok(file_names)
    }
}

/// Run `cmd`, forwarding its output to `saver` line by line as it is
/// printed. Lines without a progress marker keep the current percentage.
fn run_reporting(
    runner: &dyn CommandRunner,
    cmd: &Cmd,
    saver: &mut ProgressSaver<'_>,
) -> Result<()> {
    cmd.stream_with(runner, &mut |line| {
        if let Some((progress, message)) = parse_build_progress(line) {
            saver.on_progress(progress, &message);
        } else if !line.trim().is_empty() {
            saver.on_message(line);
        }
    })?;
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()
        .context("Failed to read current directory")?
        .join(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_system::resolve_build_system;
    use crate::process::{CommandResult, RecordingRunner};
    use std::cell::RefCell;
    use tempfile::tempdir;

    /// Writes a CPack config when cmake runs, like a real generate step.
    struct CmakeStub {
        inner: RecordingRunner,
        cpack_line: Option<&'static str>,
        build_output: &'static str,
    }

    impl CommandRunner for CmakeStub {
        fn execute(&self, cmd: &Cmd) -> Result<CommandResult> {
            self.inner.execute(cmd)?;
            if cmd.program() == "cmake" {
                if let (Some(line), Some(dir)) = (self.cpack_line, cmd.dir()) {
                    fs::write(dir.join(CPACK_CONFIG), format!("# generated\n{}\n", line))?;
                }
            }
            let mut result = CommandResult::ok();
            if cmd.program() == "ninja" || cmd.program() == "make" {
                result.stdout = self.build_output.to_string();
            }
            Ok(result)
        }
    }

    fn stub(cpack_line: Option<&'static str>) -> CmakeStub {
        CmakeStub {
            inner: RecordingRunner::new(),
            cpack_line,
            build_output: "",
        }
    }

    #[test]
    fn test_parse_cpack_file_name() {
        let content = "set(CPACK_GENERATOR \"DEB\")\n\
                       SET(CPACK_PACKAGE_FILE_NAME \"fastotv-1.0.0-x86_64\")\n";
        assert_eq!(
            parse_cpack_file_name(content).as_deref(),
            Some("fastotv-1.0.0-x86_64")
        );
        assert_eq!(parse_cpack_file_name("set(CPACK_GENERATOR \"DEB\")"), None);
    }

    #[test]
    fn test_parse_build_progress() {
        assert_eq!(
            parse_build_progress("[ 45%] Building C object foo.c.o"),
            Some((45.0, "Building C object foo.c.o".to_string()))
        );
        assert_eq!(
            parse_build_progress("[10/40] Linking CXX executable fastotv"),
            Some((25.0, "Linking CXX executable fastotv".to_string()))
        );
        assert_eq!(parse_build_progress("-- Configuring done"), None);
        assert_eq!(parse_build_progress("[0/0] nothing"), None);
    }

    #[test]
    fn test_progress_saver_maps_range() {
        let reported = RefCell::new(Vec::new());
        let mut saver =
            ProgressSaver::new(|p, m: &str| reported.borrow_mut().push((p, m.to_string())));

        saver.update_range(20.0, 80.0, "Build project");
        saver.on_progress(50.0, "half");
        saver.on_progress(100.0, "done");
        drop(saver);

        let reported = reported.into_inner();
        assert_eq!(reported[0], (20.0, "Build project".to_string()));
        assert_eq!(reported[1], (50.0, "half".to_string()));
        assert_eq!(reported[2], (80.0, "done".to_string()));
    }

    #[test]
    fn test_plain_lines_keep_current_percentage() {
        let dir = tempdir().unwrap();
        let runner = CmakeStub {
            build_output: "ninja: Entering directory\n\
                           [1/2] Building CXX object a.o\n\
                           \n\
                           warning: unused\n",
            ..stub(None)
        };
        let reported = RefCell::new(Vec::new());
        let mut saver =
            ProgressSaver::new(|p, m: &str| reported.borrow_mut().push((p, m.to_string())));
        saver.update_range(20.0, 80.0, "Build project");

        let cmd = Cmd::new("ninja").arg("install").current_dir(dir.path());
        run_reporting(&runner, &cmd, &mut saver).unwrap();
        drop(saver);

        assert_eq!(
            reported.into_inner(),
            vec![
                (20.0, "Build project".to_string()),
                (20.0, "ninja: Entering directory".to_string()),
                (50.0, "Building CXX object a.o".to_string()),
                (50.0, "warning: unused".to_string()),
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_build_streams_progress_while_running() {
        use std::time::{Duration, Instant};

        let dir = tempdir().unwrap();
        let bin = dir.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        let ninja = bin.join("ninja");
        fs::write(
            &ninja,
            "#!/bin/sh\n\
             echo '[1/2] Building CXX object a.o'\n\
             sleep 1\n\
             echo '[2/2] Linking fastotv'\n",
        )
        .unwrap();
        let mut perms = fs::metadata(&ninja).unwrap().permissions();
        std::os::unix::fs::PermissionsExt::set_mode(&mut perms, 0o755);
        fs::set_permissions(&ninja, perms).unwrap();

        let start = Instant::now();
        let reported = RefCell::new(Vec::new());
        let mut saver =
            ProgressSaver::new(|p, _: &str| reported.borrow_mut().push((p, start.elapsed())));
        saver.update_range(20.0, 79.0, "Build project");

        let cmd = Cmd::new(ninja.to_string_lossy()).current_dir(dir.path());
        run_reporting(&crate::process::SystemRunner, &cmd, &mut saver).unwrap();
        drop(saver);

        let reported = reported.into_inner();
        assert_eq!(reported.len(), 3);
        assert_eq!(reported[1].0, 49.5);
        assert!(reported[1].1 < Duration::from_millis(800));
        assert_eq!(reported[2].0, 79.0);
        assert!(reported[2].1 >= Duration::from_secs(1));
    }

    #[test]
    fn test_parse_package_types() {
        assert_eq!(
            parse_package_types("DEB RPM").unwrap(),
            vec![PackageType::Deb, PackageType::Rpm]
        );
        assert!(parse_package_types("DEB MSI").is_err());
        assert!(parse_package_types("").unwrap().is_empty());
    }

    #[test]
    fn test_build_produces_package_paths() {
        let dir = tempdir().unwrap();
        let runner = CmakeStub {
            build_output: "[1/2] Building CXX object main.cpp.o\n[2/2] Linking fastotv\n",
            ..stub(Some("set(CPACK_PACKAGE_FILE_NAME \"fastotv-1.0.0\")"))
        };
        let build_dir = dir.path().join("build_linux");
        let branding = vec!["-DBRANDING_PROJECT_NAME=fastotv".to_string()];
        let options = PackageOptions {
            cmake_root: dir.path(),
            branding_options: &branding,
            build_dir: &build_dir,
            build_system: None,
            package_types: &[PackageType::Deb, PackageType::Tgz],
        };
        let progress = RefCell::new(Vec::new());
        let mut saver = ProgressSaver::new(|p, _: &str| progress.borrow_mut().push(p));

        let request = PackageRequest::new("linux", "x86_64").unwrap();
        let files = request.build(&runner, &options, &mut saver).unwrap();
        drop(saver);

        assert_eq!(
            files,
            vec![
                build_dir.join("fastotv-1.0.0.deb"),
                build_dir.join("fastotv-1.0.0.tar.gz"),
            ]
        );
        let cmake = &runner.inner.invocations_of("cmake")[0];
        assert!(cmake.get_args().contains(&"-GNinja".to_string()));
        assert!(cmake.get_args().contains(&"-DLIBEV_USE_STATIC=ON".to_string()));
        assert_eq!(cmake.get_args().last().unwrap(), "-DBRANDING_PROJECT_NAME=fastotv");
        assert_eq!(runner.inner.invocations_of("cpack").len(), 2);

        let progress = progress.into_inner();
        assert!(progress.contains(&49.5));
        assert!(progress.contains(&79.0));
        assert_eq!(progress.last(), Some(&100.0));
        assert!(progress.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_build_defaults_to_platform_package_types() {
        let dir = tempdir().unwrap();
        let runner = stub(Some("SET(CPACK_PACKAGE_FILE_NAME \"fastotv\")"));
        let build_dir = dir.path().join("build_linux");
        let options = PackageOptions {
            cmake_root: dir.path(),
            branding_options: &[],
            build_dir: &build_dir,
            build_system: Some(resolve_build_system("make").unwrap()),
            package_types: &[],
        };

        let request = PackageRequest::new("linux", "64").unwrap();
        let files = request
            .build(&runner, &options, &mut ProgressSaver::new(|_, _: &str| {}))
            .unwrap();

        assert_eq!(files.len(), 3);
        let install = &runner.inner.invocations_of("make")[0];
        assert_eq!(install.get_args(), ["-j2", "install"]);
    }

    #[test]
    fn test_missing_cpack_entry_is_error() {
        let dir = tempdir().unwrap();
        let runner = stub(Some("set(CPACK_GENERATOR \"DEB\")"));
        let build_dir = dir.path().join("build_linux");
        let options = PackageOptions {
            cmake_root: dir.path(),
            branding_options: &[],
            build_dir: &build_dir,
            build_system: None,
            package_types: &[PackageType::Deb],
        };

        let request = PackageRequest::new("linux", "x86_64").unwrap();
        let err = request
            .build(&runner, &options, &mut ProgressSaver::new(|_, _: &str| {}))
            .unwrap_err();
        assert!(err.to_string().contains("CPACK_PACKAGE_FILE_NAME"));
        assert!(runner.inner.invocations_of("cpack").is_empty());
    }

    #[test]
    fn test_missing_cpack_config_is_error() {
        let dir = tempdir().unwrap();
        let runner = stub(None);
        let build_dir = dir.path().join("build_linux");
        let options = PackageOptions {
            cmake_root: dir.path(),
            branding_options: &[],
            build_dir: &build_dir,
            build_system: None,
            package_types: &[],
        };

        let request = PackageRequest::new("linux", "x86_64").unwrap();
        let err = request
            .build(&runner, &options, &mut ProgressSaver::new(|_, _: &str| {}))
            .unwrap_err();
        assert!(err.to_string().contains(CPACK_CONFIG));
    }

    #[test]
    fn test_missing_cmake_root_is_error() {
        let dir = tempdir().unwrap();
        let runner = stub(None);
        let build_dir = dir.path().join("build_linux");
        let options = PackageOptions {
            cmake_root: &dir.path().join("missing"),
            branding_options: &[],
            build_dir: &build_dir,
            build_system: None,
            package_types: &[],
        };

        let request = PackageRequest::new("linux", "x86_64").unwrap();
        let err = request
            .build(&runner, &options, &mut ProgressSaver::new(|_, _: &str| {}))
            .unwrap_err();
        assert!(err.to_string().contains("Invalid cmake project root"));
        assert!(!build_dir.exists());
    }
}
