// src/run.rs

//! External command execution
//!
//! All native packaging tools (dpkg-buildpackage, rpmbuild, makepkg,
//! pbuilder, mock, nix, package managers) are invoked through [`Cmd`].
//!
//! A missing binary maps to [`Error::CommandNotFound`] and a nonzero exit
//! to [`Error::CommandFailed`] unless the command is marked non-fatal, in
//! which case the caller inspects [`CommandOutput::code`] itself.

use crate::error::{Error, Result};
use std::ffi::{OsStr, OsString};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, error, info};

/// Captured result of an external command
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    /// Command line as logged
    pub cmd: String,
    /// stdout with trailing whitespace trimmed (empty for direct commands)
    pub stdout: String,
    /// stderr with trailing whitespace trimmed (empty for direct commands)
    pub stderr: String,
    /// Exit code, None when killed by a signal
    pub code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Last non-empty line of stdout
    pub fn last_line(&self) -> Option<&str> {
        self.stdout.lines().rev().map(str::trim).find(|l| !l.is_empty())
    }

    /// Non-empty stdout lines
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines().map(str::trim).filter(|l| !l.is_empty())
    }
}

/// Builder for an external command
#[derive(Debug, Clone)]
pub struct Cmd {
    program: OsString,
    args: Vec<OsString>,
    cwd: Option<PathBuf>,
    env: Vec<(OsString, OsString)>,
    stdin: Option<Vec<u8>>,
    direct: bool,
    fatal: bool,
    log_cmd: bool,
}

impl Cmd {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            cwd: None,
            env: Vec::new(),
            stdin: None,
            direct: false,
            fatal: true,
            log_cmd: true,
        }
    }

    /// Command run with root privileges, through `sudo` unless already root
    pub fn sudo(program: impl AsRef<OsStr>) -> Self {
        if nix::unistd::Uid::effective().is_root() {
            Self::new(program)
        } else {
            Self::new("sudo").arg(program)
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args.extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    /// Working directory for the command
    pub fn cwd(mut self, dir: impl AsRef<Path>) -> Self {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn env(mut self, key: impl AsRef<OsStr>, value: impl AsRef<OsStr>) -> Self {
        self.env.push((key.as_ref().to_owned(), value.as_ref().to_owned()));
        self
    }

    /// Inherit stdio instead of capturing output
    pub fn direct(mut self, direct: bool) -> Self {
        self.direct = direct;
        self
    }

    /// Whether a nonzero exit is an error (default: true)
    pub fn fatal(mut self, fatal: bool) -> Self {
        self.fatal = fatal;
        self
    }

    /// Whether to log the command line before running it (default: true)
    pub fn log_cmd(mut self, log_cmd: bool) -> Self {
        self.log_cmd = log_cmd;
        self
    }

    /// Data fed to the command's stdin
    pub fn stdin(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.stdin = Some(data.into());
        self
    }

    /// Command line as a single string, for logging
    pub fn cmd_line(&self) -> String {
        std::iter::once(&self.program)
            .chain(self.args.iter())
            .map(|a| a.to_string_lossy())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run the command to completion
    pub fn output(self) -> Result<CommandOutput> {
        let cmd_line = self.cmd_line();
        if self.log_cmd {
            info!("$ {}", cmd_line);
        }

        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        for (key, value) in &self.env {
            command.env(key, value);
        }
        if self.stdin.is_some() {
            command.stdin(Stdio::piped());
        }
        if !self.direct {
            command.stdout(Stdio::piped()).stderr(Stdio::piped());
        }

        let mut child = command.spawn().map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                Error::CommandNotFound(self.program.to_string_lossy().into_owned())
            }
            _ => Error::Io(e),
        })?;

        if let Some(data) = &self.stdin
            && let Some(mut pipe) = child.stdin.take()
        {
            pipe.write_all(data)?;
        }

        let output = child.wait_with_output()?;
        let out = CommandOutput {
            cmd: cmd_line,
            stdout: String::from_utf8_lossy(&output.stdout).trim_end().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            code: output.status.code(),
        };

        if !out.success() {
            if !self.fatal {
                debug!("command exited with {:?}: {}", out.code, out.cmd);
                return Ok(out);
            }
            log_failure(&out);
            return Err(Error::CommandFailed {
                cmd: out.cmd,
                code: out.code,
                stdout: out.stdout,
                stderr: out.stderr,
            });
        }
        Ok(out)
    }
}

fn log_failure(out: &CommandOutput) {
    error!("command failed: {}", out.cmd);
    if !out.stdout.is_empty() {
        error!("stdout:\n{}", out.stdout);
    }
    if !out.stderr.is_empty() {
        error!("stderr:\n{}", out.stderr);
    }
}
