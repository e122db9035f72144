//! The task list for one run.
//!
//! Everything here is a pure function of [`BuildConfig`] and [`Layout`]: no
//! filesystem access, no processes. `sequence` executes the result and
//! `--dry-run` prints it.

use crate::config::{BuildConfig, Layout};
use crate::env::BASELINE_BRANCH;
use crate::exec::Step;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Init,
    Staging,
    PrimaryBuild,
    SecondaryBuild,
    RemotePush,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Init => "init",
            Phase::Staging => "staging",
            Phase::PrimaryBuild => "primary build",
            Phase::SecondaryBuild => "secondary build",
            Phase::RemotePush => "remote push",
        })
    }
}

/// What to do when a task fails.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OnFailure {
    /// Stop, restore baseline, exit non-zero.
    Abort,
    /// Log, keep going, exit non-zero at the end.
    Defer,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum Action {
    EnsureDir { path: PathBuf },
    SelectSettings { path: PathBuf },
    CheckoutBranch { branch: String },
    /// Run the steps in order, stopping at the first failure.
    Run { steps: Vec<Step> },
    RestoreBaseline,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::EnsureDir { path } => write!(f, "mkdir -p {}", path.display()),
            Action::SelectSettings { path } => write!(f, "link settings -> {}", path.display()),
            Action::CheckoutBranch { branch } => write!(f, "git checkout {branch}"),
            Action::Run { steps } => {
                for (i, step) in steps.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" && ")?;
                    }
                    write!(f, "{step}")?;
                }
                Ok(())
            }
            Action::RestoreBaseline => f.write_str("restore baseline"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Task {
    pub phase: Phase,
    pub description: &'static str,
    pub on_failure: OnFailure,
    #[serde(flatten)]
    pub action: Action,
}

#[derive(Clone, Debug, Serialize)]
pub struct Plan {
    pub config: BuildConfig,
    pub tasks: Vec<Task>,
}

impl Plan {
    pub fn new(cfg: &BuildConfig, layout: &Layout) -> Self {
        let mut tasks = vec![Task {
            phase: Phase::Init,
            description: "create build directory",
            on_failure: OnFailure::Abort,
            action: Action::EnsureDir {
                path: layout.build_dir.clone(),
            },
        }];

        if cfg.rust_test {
            tasks.push(Task {
                phase: Phase::Staging,
                description: "select root-task demo settings",
                on_failure: OnFailure::Abort,
                action: Action::SelectSettings {
                    path: layout.root_task_settings.clone(),
                },
            });
        }

        if cfg.baseline {
            tasks.push(Task {
                phase: Phase::Staging,
                description: "check out baseline kernel",
                on_failure: OnFailure::Abort,
                action: Action::CheckoutBranch {
                    branch: BASELINE_BRANCH.to_string(),
                },
            });
        } else {
            tasks.push(Task {
                phase: Phase::PrimaryBuild,
                description: "cross-compile kernel",
                on_failure: OnFailure::Abort,
                action: Action::Run {
                    steps: vec![primary_build(cfg, layout)],
                },
            });
        }

        if cfg.install {
            tasks.push(Task {
                phase: Phase::SecondaryBuild,
                description: "install kernel",
                on_failure: OnFailure::Defer,
                action: Action::Run {
                    steps: install(layout),
                },
            });
        } else {
            tasks.push(Task {
                phase: Phase::SecondaryBuild,
                description: "simulator build",
                on_failure: OnFailure::Abort,
                action: Action::Run {
                    steps: simulator_build(cfg, layout),
                },
            });
            tasks.push(Task {
                phase: Phase::SecondaryBuild,
                description: "reset kernel tree",
                on_failure: OnFailure::Abort,
                action: Action::RestoreBaseline,
            });
        }

        if let Some(step) = push_remote(cfg, layout) {
            tasks.push(Task {
                phase: Phase::RemotePush,
                description: "push to remote host",
                on_failure: OnFailure::Defer,
                action: Action::Run { steps: vec![step] },
            });
        }

        Self {
            config: cfg.clone(),
            tasks,
        }
    }
}

/// Cargo features for the primary build, in a fixed order.
pub fn features(cfg: &BuildConfig) -> Vec<&'static str> {
    let mut out = Vec::new();
    if cfg.smp() {
        out.push("ENABLE_SMP");
    }
    if cfg.uintr_enable {
        out.push("ENABLE_UINTC");
    }
    out.push(cfg.board().feature());
    out
}

pub fn primary_build(cfg: &BuildConfig, layout: &Layout) -> Step {
    let mut step = Step::new("cargo").args(["build", "--release", "--target", layout.target.as_str()]);
    for feature in features(cfg) {
        step = step.args(["--features", feature]);
    }
    step
}

pub fn simulator_build(cfg: &BuildConfig, layout: &Layout) -> Vec<Step> {
    let mut configure = Step::new(layout.init_build_script.to_string_lossy())
        .arg(format!("-DPLATFORM={}", layout.platform))
        .arg("-DSIMULATION=TRUE")
        .current_dir(&layout.build_dir);
    if cfg.smp() {
        configure = configure.arg("-DSMP=TRUE");
    }
    if cfg.uintr_enable {
        configure = configure.arg("-DUINTR=TRUE");
    }
    let build = Step::new("ninja").arg("-v").current_dir(&layout.build_dir);
    vec![configure, build]
}

pub fn install(layout: &Layout) -> Vec<Step> {
    let configure = Step::new("cmake")
        .arg(format!("-DCROSS_COMPILER_PREFIX={}", layout.cross_compiler_prefix))
        .args([
            "-DCMAKE_TOOLCHAIN_FILE=gcc.cmake",
            "-DCMAKE_INSTALL_PREFIX=install",
            "-C",
            "./kernel-settings.cmake",
            "-G",
            "Ninja",
            "-S",
            ".",
            "-B",
            "build",
        ])
        .current_dir(&layout.kernel_dir);
    let build = Step::new("ninja")
        .args(["-C", "build", "all"])
        .current_dir(&layout.kernel_dir);
    let install = Step::new("ninja")
        .args(["-C", "build", "install"])
        .current_dir(&layout.kernel_dir);
    vec![configure, build, install]
}

/// `None` unless a non-empty address was given.
pub fn push_remote(cfg: &BuildConfig, layout: &Layout) -> Option<Step> {
    let addr = cfg.push_remote.as_deref().filter(|a| !a.is_empty())?;
    Some(
        Step::new("ssh")
            .arg(format!("{}@{addr}", layout.remote_user))
            .arg("bash -s")
            .stdin_from(&layout.push_script),
    )
}
