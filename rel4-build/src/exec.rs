//! Running external commands.
//!
//! Commands are described as a [`Step`]: program, argument list, working
//! directory and an optional file fed to stdin. Nothing here goes through a
//! shell; the `Display` rendering is only for logs and dry runs.

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Step {
    pub program: String,
    pub args: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stdin: Option<PathBuf>,
}

impl Step {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
            stdin: None,
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

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn stdin_from(mut self, file: impl Into<PathBuf>) -> Self {
        self.stdin = Some(file.into());
        self
    }

    /// True if `flag` is immediately followed by `value` somewhere in the argument list.
    #[cfg(test)]
    pub fn has_pair(&self, flag: &str, value: &str) -> bool {
        self.args.windows(2).any(|w| w[0] == flag && w[1] == value)
    }

    fn to_command(&self) -> Result<Command> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }
        if let Some(path) = &self.stdin {
            let file = File::open(path)
                .with_context(|| format!("Opening {} for stdin", path.display()))?;
            cmd.stdin(Stdio::from(file));
        }
        Ok(cmd)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(dir) = &self.cwd {
            write!(f, "(cd {} && ", quote(&dir.to_string_lossy()))?;
        }
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }
        if let Some(path) = &self.stdin {
            write!(f, " < {}", quote(&path.to_string_lossy()))?;
        }
        if self.cwd.is_some() {
            write!(f, ")")?;
        }
        Ok(())
    }
}

fn quote(s: &str) -> String {
    let plain = !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=@:+,".contains(c));
    if plain {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}

/// Runs a step to completion. `Ok` means the child exited with status 0.
pub trait Executor {
    fn run(&self, step: &Step) -> Result<()>;
}

/// Spawns real processes, inheriting stdout/stderr.
pub struct System;

impl Executor for System {
    fn run(&self, step: &Step) -> Result<()> {
        log::info!(target: "run", "{step}");

        let status = step
            .to_command()?
            .status()
            .with_context(|| format!("Spawning {}", step.program))?;
        if !status.success() {
            bail!("`{step}` failed with {status}");
        }
        Ok(())
    }
}

/// Ensure `dir` exists; an existing directory is left alone.
pub fn ensure_dir(dir: &Path) -> Result<bool> {
    if dir.is_dir() {
        return Ok(false);
    }
    std::fs::create_dir_all(dir).with_context(|| format!("Creating {}", dir.display()))?;
    Ok(true)
}
