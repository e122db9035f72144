//! Executes a [`Plan`] against the kernel tree.

use super::plan::{Action, OnFailure, Phase, Plan, Task};
use crate::env::{Environment, Staged};
use crate::exec::Executor;
use anyhow::{bail, Context, Result};

pub fn run(plan: &Plan, env: &Environment, exec: &dyn Executor) -> Result<()> {
    let staged = env.acquire(exec)?;
    let mut phase: Option<Phase> = None;
    let mut deferred: Vec<&'static str> = Vec::new();

    for task in &plan.tasks {
        crate::util::signal::check()?;
        if phase != Some(task.phase) {
            log::info!(target: "step", "{}", task.phase);
            phase = Some(task.phase);
        }
        log::debug!("{}: {}", task.description, task.action);

        if let Err(e) = perform(&staged, task) {
            // Children share our process group, so a terminal ^C kills them
            // too; report that as the interrupt rather than a step failure.
            // Early returns drop `staged`, which restores baseline.
            crate::util::signal::check()?;
            match task.on_failure {
                OnFailure::Abort => return Err(e.context(format!("{} failed", task.description))),
                OnFailure::Defer => {
                    log::error!("{} failed: {e:#}", task.description);
                    deferred.push(task.description);
                }
            }
        }
    }

    // A signal caught while the last step ran still fails the run.
    crate::util::signal::check()?;
    staged.release().context("Restoring baseline")?;
    if !deferred.is_empty() {
        bail!("Finished with failures: {}", deferred.join(", "));
    }
    log::info!(target: "ok", "build finished");
    Ok(())
}

fn perform(staged: &Staged<'_>, task: &Task) -> Result<()> {
    match &task.action {
        Action::EnsureDir { path } => {
            if crate::exec::ensure_dir(path)? {
                log::info!("created {}", path.display());
            }
            Ok(())
        }
        Action::SelectSettings { path } => staged.env().select_settings(path),
        Action::CheckoutBranch { branch } => staged.env().checkout_branch(staged.exec(), branch),
        Action::Run { steps } => {
            for step in steps {
                crate::util::signal::check()?;
                staged.exec().run(step)?;
            }
            Ok(())
        }
        Action::RestoreBaseline => staged.restore(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BuildConfig, Layout};
    use crate::exec::testing::Recorder;
    use crate::util::signal;
    use std::fs;
    use std::path::PathBuf;

    struct Fixture {
        _dir: tempfile::TempDir,
        layout: Layout,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path().join("rel4");
            fs::create_dir_all(&root).unwrap();
            let layout = Layout::default().rooted(&root);
            fs::create_dir_all(&layout.kernel_dir).unwrap();
            for settings in [&layout.baseline_settings, &layout.root_task_settings] {
                fs::create_dir_all(settings.parent().unwrap()).unwrap();
                fs::write(settings, "").unwrap();
            }
            Self { _dir: dir, layout }
        }

        fn run(&self, cfg: &BuildConfig, exec: &Recorder) -> Result<()> {
            let plan = Plan::new(cfg, &self.layout);
            run(&plan, &Environment::new(&self.layout), exec)
        }

        fn assert_baseline(&self, exec: &Recorder) {
            assert_eq!(exec.last_git().unwrap().args, vec!["checkout", "master"]);
            assert_eq!(
                fs::read_link(&self.layout.settings_link).unwrap(),
                crate::env::normalize(&self.layout.baseline_settings)
            );
        }
    }

    fn short(exec: &Recorder) -> Vec<String> {
        exec.programs()
            .into_iter()
            .map(|p| {
                PathBuf::from(&p)
                    .file_name()
                    .map_or(p.clone(), |n| n.to_string_lossy().into_owned())
            })
            .collect()
    }

    #[test]
    fn test_default_run_succeeds() {
        let fx = Fixture::new();
        let exec = Recorder::ok();
        fx.run(&BuildConfig::default(), &exec).unwrap();

        assert_eq!(
            short(&exec),
            vec!["git", "cargo", "init-build.sh", "ninja", "git", "git"]
        );
        assert!(fx.layout.build_dir.is_dir());
        fx.assert_baseline(&exec);
    }

    #[test]
    fn test_primary_failure_aborts_and_restores() {
        let fx = Fixture::new();
        let exec = Recorder::failing(|s| s.program == "cargo");
        let cfg = BuildConfig {
            rust_test: true,
            ..BuildConfig::default()
        };
        assert!(fx.run(&cfg, &exec).is_err());
        assert!(!short(&exec).contains(&"ninja".to_string()));
        fx.assert_baseline(&exec);
    }

    #[test]
    fn test_baseline_checkout_failure_aborts() {
        let fx = Fixture::new();
        let exec = Recorder::failing(|s| s.has_pair("checkout", "baseline"));
        let cfg = BuildConfig {
            baseline: true,
            ..BuildConfig::default()
        };
        let err = fx.run(&cfg, &exec).unwrap_err();
        assert!(format!("{err:#}").contains("check out baseline kernel failed"));
        assert!(!short(&exec).contains(&"cargo".to_string()));
        fx.assert_baseline(&exec);
    }

    #[test]
    fn test_simulator_failure_aborts_before_push() {
        let fx = Fixture::new();
        let exec = Recorder::failing(|s| s.program == "ninja");
        let cfg = BuildConfig {
            push_remote: Some("10.0.0.5".to_string()),
            ..BuildConfig::default()
        };
        assert!(fx.run(&cfg, &exec).is_err());
        assert!(!short(&exec).contains(&"ssh".to_string()));
        fx.assert_baseline(&exec);
    }

    #[test]
    fn test_failed_install_still_pushes() {
        let fx = Fixture::new();
        let exec = Recorder::failing(|s| s.program == "cmake");
        let cfg = BuildConfig {
            cpu_nums: 4,
            uintr_enable: true,
            install: true,
            push_remote: Some("10.0.0.5".to_string()),
            ..BuildConfig::default()
        };
        let err = fx.run(&cfg, &exec).unwrap_err();
        assert!(err.to_string().contains("install kernel"));

        let programs = short(&exec);
        // The install chain stops at cmake; ninja never runs.
        assert!(!programs.contains(&"ninja".to_string()));
        assert!(programs.contains(&"ssh".to_string()));
        let ssh = exec
            .steps
            .borrow()
            .iter()
            .find(|s| s.program == "ssh")
            .cloned()
            .unwrap();
        assert_eq!(ssh.args[0], "ctrlz@10.0.0.5");
        fx.assert_baseline(&exec);
    }

    #[test]
    fn test_failed_push_reports_error() {
        let fx = Fixture::new();
        let exec = Recorder::failing(|s| s.program == "ssh");
        let cfg = BuildConfig {
            push_remote: Some("board".to_string()),
            ..BuildConfig::default()
        };
        let err = fx.run(&cfg, &exec).unwrap_err();
        assert!(err.to_string().contains("push to remote host"));
        fx.assert_baseline(&exec);
    }

    #[test]
    fn test_existing_build_dir_is_kept() {
        let fx = Fixture::new();
        fs::create_dir_all(&fx.layout.build_dir).unwrap();
        let marker = fx.layout.build_dir.join("CMakeCache.txt");
        fs::write(&marker, "cached").unwrap();

        fx.run(&BuildConfig::default(), &Recorder::ok()).unwrap();
        fx.run(&BuildConfig::default(), &Recorder::ok()).unwrap();
        assert_eq!(fs::read_to_string(&marker).unwrap(), "cached");
    }

    #[test]
    fn test_failing_initial_reset_runs_nothing_else() {
        let fx = Fixture::new();
        let exec = Recorder::failing(|s| s.program == "git");
        assert!(fx.run(&BuildConfig::default(), &exec).is_err());
        assert_eq!(short(&exec), vec!["git"]);
        assert!(!fx.layout.build_dir.exists());
    }

    #[test]
    fn test_interrupted_primary_build_stops_and_restores() {
        let fx = Fixture::new();
        // ^C kills cargo as well as setting our flag.
        let exec = Recorder::failing(|s| {
            if s.program == "cargo" {
                signal::raise(libc::SIGINT);
                return true;
            }
            false
        });
        let err = fx.run(&BuildConfig::default(), &exec).unwrap_err();
        assert!(err.to_string().contains("Interrupted"));
        assert_eq!(short(&exec), vec!["git", "cargo", "git"]);
        fx.assert_baseline(&exec);
    }

    #[test]
    fn test_interrupt_between_install_steps_skips_the_rest() {
        let fx = Fixture::new();
        let exec = Recorder::failing(|s| {
            if s.program == "cmake" {
                signal::raise(libc::SIGHUP);
            }
            false
        });
        let cfg = BuildConfig {
            install: true,
            push_remote: Some("board".to_string()),
            ..BuildConfig::default()
        };
        assert!(fx.run(&cfg, &exec).is_err());
        let programs = short(&exec);
        assert!(!programs.contains(&"ninja".to_string()));
        assert!(!programs.contains(&"ssh".to_string()));
        fx.assert_baseline(&exec);
    }

    #[test]
    fn test_interrupt_during_last_step_fails_run() {
        let fx = Fixture::new();
        // The push itself succeeds, but SIGTERM arrived while it ran.
        let exec = Recorder::failing(|s| {
            if s.program == "ssh" {
                signal::raise(libc::SIGTERM);
            }
            false
        });
        let cfg = BuildConfig {
            push_remote: Some("board".to_string()),
            ..BuildConfig::default()
        };
        let err = fx.run(&cfg, &exec).unwrap_err();
        assert!(err.to_string().contains("Interrupted by signal"));
        assert_eq!(short(&exec).last().map(String::as_str), Some("git"));
        fx.assert_baseline(&exec);
    }

    #[test]
    fn test_missing_root_task_settings_aborts_before_build() {
        let fx = Fixture::new();
        fs::remove_file(&fx.layout.root_task_settings).unwrap();
        let exec = Recorder::ok();
        let cfg = BuildConfig {
            rust_test: true,
            ..BuildConfig::default()
        };
        let err = fx.run(&cfg, &exec).unwrap_err();
        assert!(format!("{err:#}").contains("does not exist"));
        assert_eq!(short(&exec), vec!["git", "git"]);
        fx.assert_baseline(&exec);
    }
}
