use crate::config::{BuildConfig, Layout};
use crate::tasks::plan::Plan;
use anyhow::{Context, Result};

pub fn run(cli: &crate::cli::Cli) -> Result<()> {
    let cfg = BuildConfig::from_cli(cli);
    let root = std::env::current_dir().context("Reading working directory")?;
    let layout = match &cli.config {
        Some(path) => Layout::load(path)?,
        None => Layout::default(),
    }
    .rooted(&root);

    if cli.doctor {
        return crate::tasks::doctor::run(&layout);
    }

    let plan = Plan::new(&cfg, &layout);
    if cli.dry_run {
        return print_plan(&plan, cli.json);
    }

    crate::util::signal::install()?;
    log::info!(
        "cpus: {}, board: {}, uintr: {}, {}",
        cfg.cpu_nums,
        cfg.board().feature(),
        cfg.uintr_enable,
        if cfg.install { "install" } else { "simulator" }
    );
    crate::tasks::sequence::run(
        &plan,
        &crate::env::Environment::new(&layout),
        &crate::exec::System,
    )
}

fn print_plan(plan: &Plan, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(plan)?);
    } else {
        print!("{}", render_plan(plan));
    }
    Ok(())
}

/// Human listing for `--dry-run`, one line per task between the implicit resets.
fn render_plan(plan: &Plan) -> String {
    let mut out = String::from("[init] restore baseline\n");
    for task in &plan.tasks {
        out.push_str(&format!("[{}] {}: {}\n", task.phase, task.description, task.action));
    }
    out.push_str("[done] restore baseline\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_default_plan() {
        let plan = Plan::new(&BuildConfig::default(), &Layout::default());
        assert_eq!(
            render_plan(&plan),
            "[init] restore baseline\n\
             [init] create build directory: mkdir -p ./build\n\
             [primary build] cross-compile kernel: cargo build --release \
             --target riscv64imac-unknown-none-elf --features board_qemu\n\
             [secondary build] simulator build: \
             (cd ./build && ../../init-build.sh -DPLATFORM=spike -DSIMULATION=TRUE) \
             && (cd ./build && ninja -v)\n\
             [secondary build] reset kernel tree: restore baseline\n\
             [done] restore baseline\n"
        );
    }

    #[test]
    fn test_render_baseline_rt_push_plan() {
        let cfg = BuildConfig {
            baseline: true,
            rust_test: true,
            install: true,
            push_remote: Some("10.0.0.5".to_string()),
            ..BuildConfig::default()
        };
        let text = render_plan(&Plan::new(&cfg, &Layout::default()));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 7);
        assert_eq!(
            lines[2],
            "[staging] select root-task demo settings: \
             link settings -> ../projects/rust-root-task-demo/easy-settings.cmake"
        );
        assert_eq!(lines[3], "[staging] check out baseline kernel: git checkout baseline");
        assert!(lines[4].starts_with("[secondary build] install kernel: (cd ../kernel && cmake "));
        assert!(lines[4].ends_with("(cd ../kernel && ninja -C build install)"));
        assert_eq!(
            lines[5],
            "[remote push] push to remote host: ssh ctrlz@10.0.0.5 'bash -s' < ./push_remote.sh"
        );
        assert!(!text.contains("cargo"));
    }
}
