//! Build configuration and directory layout.
//!
//! `BuildConfig` is resolved once from the command line and never mutated.
//! `Layout` names every external path the tool touches; its defaults match
//! the standard checkout (this tool one level below the kernel tree).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Board the primary build targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Board {
    Qemu,
    Lrv,
}

impl Board {
    /// Cargo feature selecting this board.
    pub fn feature(self) -> &'static str {
        match self {
            Board::Qemu => "board_qemu",
            Board::Lrv => "board_lrv",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BuildConfig {
    pub baseline: bool,
    pub uintr_enable: bool,
    pub cpu_nums: u32,
    pub install: bool,
    pub rust_test: bool,
    pub fpga_net_test: bool,
    pub push_remote: Option<String>,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            baseline: false,
            uintr_enable: false,
            cpu_nums: 1,
            install: false,
            rust_test: false,
            fpga_net_test: false,
            push_remote: None,
        }
    }
}

impl BuildConfig {
    pub fn from_cli(cli: &crate::cli::Cli) -> Self {
        Self {
            baseline: cli.baseline,
            uintr_enable: cli.uintr,
            cpu_nums: cli.cpu,
            install: cli.install,
            rust_test: cli.rt,
            fpga_net_test: cli.fpga_board,
            // An empty address means "no push", same as omitting the flag.
            push_remote: cli.push_remote.clone().filter(|addr| !addr.is_empty()),
        }
    }

    pub fn smp(&self) -> bool {
        self.cpu_nums > 1
    }

    pub fn board(&self) -> Board {
        if self.fpga_net_test {
            Board::Lrv
        } else {
            Board::Qemu
        }
    }
}

/// External paths and fixed names. Relative paths are resolved by [`Layout::rooted`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Layout {
    pub kernel_dir: PathBuf,
    pub settings_link: PathBuf,
    pub baseline_settings: PathBuf,
    pub root_task_settings: PathBuf,
    pub build_dir: PathBuf,
    /// Relative to `build_dir`.
    pub init_build_script: PathBuf,
    pub push_script: PathBuf,
    pub remote_user: String,
    pub target: String,
    pub cross_compiler_prefix: String,
    pub platform: String,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            kernel_dir: PathBuf::from("../kernel"),
            settings_link: PathBuf::from("../easy-settings.cmake"),
            baseline_settings: PathBuf::from("../projects/sel4test/easy-settings.cmake"),
            root_task_settings: PathBuf::from("../projects/rust-root-task-demo/easy-settings.cmake"),
            build_dir: PathBuf::from("./build"),
            init_build_script: PathBuf::from("../../init-build.sh"),
            push_script: PathBuf::from("./push_remote.sh"),
            remote_user: "ctrlz".to_string(),
            target: "riscv64imac-unknown-none-elf".to_string(),
            cross_compiler_prefix: "riscv64-unknown-linux-gnu-".to_string(),
            platform: "spike".to_string(),
        }
    }
}

impl Layout {
    /// Load overrides from a JSON file; missing fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Reading layout file {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Parsing layout file {}", path.display()))
    }

    /// Resolve every relative path against `root`.
    ///
    /// The configure script is joined onto the resolved build directory, so
    /// the child never has to interpret a relative program path itself.
    pub fn rooted(mut self, root: &Path) -> Self {
        self.kernel_dir = root.join(&self.kernel_dir);
        self.settings_link = root.join(&self.settings_link);
        self.baseline_settings = root.join(&self.baseline_settings);
        self.root_task_settings = root.join(&self.root_task_settings);
        self.build_dir = root.join(&self.build_dir);
        self.init_build_script = self.build_dir.join(&self.init_build_script);
        self.push_script = root.join(&self.push_script);
        self
    }
}
