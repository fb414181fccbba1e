//! External command execution.
//!
//! Every tool this crate drives (package managers, git, curl, tar, make,
//! cmake, cpack) goes through [`Cmd`]. Commands are executed by a
//! [`CommandRunner`]; [`SystemRunner`] spawns real processes and
//! [`RecordingRunner`] only records what would have run.
//!
//! ```rust,ignore
//! use fastotv_env::process::{Cmd, SystemRunner};
//!
//! Cmd::new("tar")
//!     .args(["xf"])
//!     .arg_path(&archive)
//!     .current_dir(&build_dir)
//!     .error_msg("Failed to extract sources")
//!     .run_with(&SystemRunner)?;
//! ```

use anyhow::{bail, Context, Result};
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

/// A command line plus the options it should run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    program: String,
    args: Vec<String>,
    dir: Option<PathBuf>,
    allow_fail: bool,
    interactive: bool,
    error_msg: Option<String>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            dir: None,
            allow_fail: false,
            interactive: false,
            error_msg: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn arg_path(mut self, path: &Path) -> Self {
        self.args.push(path.to_string_lossy().into_owned());
        self
    }

    /// Directory the command runs in. The caller's cwd is never changed.
    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    /// Don't treat a non-zero exit status as an error.
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    /// Stream output to the terminal instead of capturing it.
    pub fn interactive(mut self) -> Self {
        self.interactive = true;
        self
    }

    pub fn error_msg(mut self, msg: impl Into<String>) -> Self {
        self.error_msg = Some(msg.into());
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn get_args(&self) -> &[String] {
        &self.args
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    /// Run with the given runner, failing on a non-zero exit unless
    /// [`Cmd::allow_fail`] was set.
    pub fn run_with(&self, runner: &dyn CommandRunner) -> Result<CommandResult> {
        log::debug!("running: {}", self);
        let result = runner
            .execute(self)
            .with_context(|| format!("Failed to spawn '{}'", self.program))?;
        self.check(result)
    }

    /// Like [`Cmd::run_with`], but hands each stdout line to `on_line` as
    /// soon as the command prints it.
    pub fn stream_with(
        &self,
        runner: &dyn CommandRunner,
        on_line: &mut dyn FnMut(&str),
    ) -> Result<CommandResult> {
        log::debug!("streaming: {}", self);
        let result = runner
            .execute_streaming(self, on_line)
            .with_context(|| format!("Failed to spawn '{}'", self.program))?;
        self.check(result)
    }

    fn check(&self, result: CommandResult) -> Result<CommandResult> {
        if !result.success() && !self.allow_fail {
            let msg = self
                .error_msg
                .clone()
                .unwrap_or_else(|| format!("Command failed: {}", self));
            let stderr = result.stderr.trim();
            if stderr.is_empty() {
                bail!("{} (exit status: {})", msg, result.status_display());
            }
            bail!("{} (exit status: {})\n{}", msg, result.status_display(), stderr);
        }

        Ok(result)
    }

    /// Run on the host.
    pub fn run(&self) -> Result<CommandResult> {
        self.run_with(&SystemRunner)
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            if arg.contains(' ') {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Exit status and captured output of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandResult {
    /// Exit code, `None` if the process was killed by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandResult {
    pub fn ok() -> Self {
        Self {
            status: Some(0),
            ..Default::default()
        }
    }

    pub fn failed(code: i32) -> Self {
        Self {
            status: Some(code),
            ..Default::default()
        }
    }

    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    fn status_display(&self) -> String {
        match self.status {
            Some(code) => code.to_string(),
            None => "killed by signal".to_string(),
        }
    }
}

/// Something that can execute a [`Cmd`].
///
/// Implementations return `Err` only when the command could not be started;
/// a non-zero exit is reported through [`CommandResult::status`].
pub trait CommandRunner {
    fn execute(&self, cmd: &Cmd) -> Result<CommandResult>;

    /// Execute, passing stdout lines to `on_line` while the command runs.
    ///
    /// The default runs to completion first and replays the captured lines.
    fn execute_streaming(&self, cmd: &Cmd, on_line: &mut dyn FnMut(&str)) -> Result<CommandResult> {
        let result = self.execute(cmd)?;
        for line in result.stdout.lines() {
            on_line(line);
        }
        Ok(result)
    }
}

/// Spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    fn command(cmd: &Cmd) -> Command {
        let mut command = Command::new(cmd.program());
        command.args(cmd.get_args());
        if let Some(dir) = cmd.dir() {
            command.current_dir(dir);
        }
        command
    }
}

impl CommandRunner for SystemRunner {
    fn execute(&self, cmd: &Cmd) -> Result<CommandResult> {
        let mut command = Self::command(cmd);

        if cmd.is_interactive() {
            let status = command
                .stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit())
                .status()?;
            return Ok(CommandResult {
                status: status.code(),
                ..Default::default()
            });
        }

        let output = command.stdin(Stdio::null()).output()?;
        Ok(CommandResult {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    fn execute_streaming(&self, cmd: &Cmd, on_line: &mut dyn FnMut(&str)) -> Result<CommandResult> {
        let mut child = Self::command(cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // stderr must be drained concurrently or a full pipe stalls stdout.
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let mut stdout = String::new();
        if let Some(pipe) = child.stdout.take() {
            for line in BufReader::new(pipe).split(b'\n') {
                let line = line?;
                let line = String::from_utf8_lossy(&line);
                let line = line.trim_end_matches('\r');
                on_line(line);
                stdout.push_str(line);
                stdout.push('\n');
            }
        }

        let status = child.wait()?;
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        Ok(CommandResult {
            status: status.code(),
            stdout,
            stderr,
        })
    }
}

/// Records commands instead of running them.
///
/// Every command succeeds unless its program was registered with
/// [`RecordingRunner::fail_program`].
#[derive(Debug, Default)]
pub struct RecordingRunner {
    commands: RefCell<Vec<Cmd>>,
    failing: HashSet<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every invocation of `program` exit with status 1.
    pub fn fail_program(mut self, program: impl Into<String>) -> Self {
        self.failing.insert(program.into());
        self
    }

    pub fn commands(&self) -> Vec<Cmd> {
        self.commands.borrow().clone()
    }

    /// Recorded command lines, rendered with [`Cmd`]'s `Display`.
    pub fn command_lines(&self) -> Vec<String> {
        self.commands.borrow().iter().map(ToString::to_string).collect()
    }

    /// Recorded commands whose program is `program`.
    pub fn invocations_of(&self, program: &str) -> Vec<Cmd> {
        self.commands
            .borrow()
            .iter()
            .filter(|c| c.program() == program)
            .cloned()
            .collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn execute(&self, cmd: &Cmd) -> Result<CommandResult> {
        self.commands.borrow_mut().push(cmd.clone());
        if self.failing.contains(cmd.program()) {
            return Ok(CommandResult::failed(1));
        }
        Ok(CommandResult::ok())
    }
}

/// Full path of a tool on `PATH`.
pub fn which(tool: &str) -> Option<String> {
    which::which(tool)
        .ok()
        .map(|p| p.to_string_lossy().into_owned())
}

/// Whether a tool is on `PATH`.
pub fn exists(tool: &str) -> bool {
    which::which(tool).is_ok()
}
