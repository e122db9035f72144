//! Kernel tree staging.
//!
//! Two pieces of shared state live outside this repo: the settings symlink
//! read by the CMake build, and the branch checked out in the kernel tree.
//! Both are reset to baseline (`master` + sel4test settings) when a run
//! starts and whenever a [`Staged`] guard goes away.
//!
//! Nothing here locks the tree; two concurrent runs against the same
//! checkout will race.

use crate::config::Layout;
use crate::exec::{Executor, Step};
use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};

pub const MASTER_BRANCH: &str = "master";
pub const BASELINE_BRANCH: &str = "baseline";

pub struct Environment {
    kernel_dir: PathBuf,
    settings_link: PathBuf,
    baseline_settings: PathBuf,
}

impl Environment {
    pub fn new(layout: &Layout) -> Self {
        Self {
            kernel_dir: layout.kernel_dir.clone(),
            settings_link: layout.settings_link.clone(),
            baseline_settings: layout.baseline_settings.clone(),
        }
    }

    /// Check out `master` and point the settings link back at the baseline file.
    ///
    /// Both halves are attempted; the first error is returned.
    pub fn reset_baseline(&self, exec: &dyn Executor) -> Result<()> {
        let branch = self.checkout_branch(exec, MASTER_BRANCH);
        let link = self.select_settings(&self.baseline_settings);
        branch.and(link)
    }

    pub fn checkout_branch(&self, exec: &dyn Executor, name: &str) -> Result<()> {
        let step = Step::new("git")
            .args(["checkout", name])
            .current_dir(&self.kernel_dir);
        exec.run(&step)
            .with_context(|| format!("Checking out {name} in {}", self.kernel_dir.display()))
    }

    /// Re-point the settings link at `target`, stored as an absolute path
    /// with `.` and `..` collapsed. The target must be an existing file.
    pub fn select_settings(&self, target: &Path) -> Result<()> {
        let target = std::path::absolute(target)
            .map(|p| normalize(&p))
            .with_context(|| format!("Resolving {}", target.display()))?;
        if !target.is_file() {
            bail!("Settings file {} does not exist", target.display());
        }
        replace_symlink(&target, &self.settings_link).with_context(|| {
            format!(
                "Pointing {} at {}",
                self.settings_link.display(),
                target.display()
            )
        })?;
        log::debug!("{} -> {}", self.settings_link.display(), target.display());
        Ok(())
    }

    /// Reset to baseline and hand back a guard that resets again when released or dropped.
    pub fn acquire<'a>(&'a self, exec: &'a dyn Executor) -> Result<Staged<'a>> {
        self.reset_baseline(exec).context("Resetting kernel tree to baseline")?;
        Ok(Staged {
            env: self,
            exec,
            armed: true,
        })
    }
}

/// Scoped ownership of the staged kernel tree.
pub struct Staged<'a> {
    env: &'a Environment,
    exec: &'a dyn Executor,
    armed: bool,
}

impl Staged<'_> {
    pub fn env(&self) -> &Environment {
        self.env
    }

    pub fn exec(&self) -> &dyn Executor {
        self.exec
    }

    /// Reset to baseline now; the guard stays armed for the final release.
    pub fn restore(&self) -> Result<()> {
        self.env.reset_baseline(self.exec)
    }

    /// Final reset, reporting its error instead of logging it.
    pub fn release(mut self) -> Result<()> {
        self.armed = false;
        self.env.reset_baseline(self.exec)
    }
}

impl Drop for Staged<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        log::debug!("restoring baseline kernel tree");
        if let Err(e) = self.env.reset_baseline(self.exec) {
            log::warn!("Could not restore baseline: {e:#}");
        }
    }
}

/// Drop `.` and fold `..` into its parent without touching the filesystem.
pub(crate) fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out
}

/// `ln -snf` without the shell: build the new link next to the old one, then rename over it.
fn replace_symlink(target: &Path, link: &Path) -> Result<()> {
    let name = link
        .file_name()
        .with_context(|| format!("{} has no file name", link.display()))?;
    let mut tmp_name = name.to_os_string();
    tmp_name.push(format!(".tmp.{}", std::process::id()));
    let tmp = link.with_file_name(tmp_name);

    if tmp.symlink_metadata().is_ok() {
        fs::remove_file(&tmp)?;
    }
    std::os::unix::fs::symlink(target, &tmp)
        .with_context(|| format!("Creating symlink {}", tmp.display()))?;
    if let Err(e) = fs::rename(&tmp, link) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("Replacing {}", link.display()));
    }
    Ok(())
}
