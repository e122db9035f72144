use crate::config::Layout;
use anyhow::{bail, Result};
use std::path::Path;

const TOOLS: &[&str] = &["cargo", "git", "cmake", "ninja", "ssh"];

pub fn run(layout: &Layout) -> Result<()> {
    let mut ok = true;

    for tool in TOOLS {
        if which::which(tool).is_err() {
            eprintln!("[FAIL] missing `{tool}` in PATH");
            ok = false;
        } else {
            eprintln!("[OK] {tool}");
        }
    }

    let kernel = &layout.kernel_dir;
    if kernel.join(".git").exists() {
        eprintln!("[OK] {}", kernel.display());
    } else {
        eprintln!("[FAIL] not a git checkout: {}", kernel.display());
        ok = false;
    }

    let want_files = [
        &layout.baseline_settings,
        &layout.root_task_settings,
        &layout.init_build_script,
        &layout.push_script,
    ];
    for f in want_files {
        ok &= check_file(f);
    }

    if !ok {
        bail!("doctor checks failed");
    }
    Ok(())
}

fn check_file(path: &Path) -> bool {
    if path.is_file() {
        eprintln!("[OK] {}", path.display());
        true
    } else {
        eprintln!("[FAIL] missing file: {}", path.display());
        false
    }
}
