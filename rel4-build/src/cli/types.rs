use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "rel4-build")]
#[command(about = "Build the RISC-V kernel image, stage the kernel tree, and optionally push to a board host")]
pub struct Cli {
    /// Check out the `baseline` kernel branch instead of building from source.
    #[arg(short = 'b', long = "baseline")]
    pub baseline: bool,

    /// Enable user-interrupt (UINTC) support.
    #[arg(short = 'u', long = "uintr")]
    pub uintr: bool,

    /// Kernel and simulator CPU count; more than one enables SMP.
    #[arg(
        short = 'c',
        long = "cpu",
        value_name = "N",
        default_value_t = 1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub cpu: u32,

    /// Install the kernel with CMake/Ninja instead of running the simulator build.
    #[arg(short = 'i', long = "install")]
    pub install: bool,

    /// Use the rust root-task demo settings file.
    #[arg(short = 'r', long = "rt")]
    pub rt: bool,

    /// Target the FPGA board (`board_lrv`) instead of QEMU.
    #[arg(short = 'f', long = "fpga_board")]
    pub fpga_board: bool,

    /// Push the build to ADDR over ssh once the build finishes.
    #[arg(short = 'p', long = "push_remote", value_name = "ADDR")]
    pub push_remote: Option<String>,

    /// JSON file overriding the default directory layout.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print the command plan without touching the kernel tree or running anything.
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// With --dry-run, print the plan as JSON.
    #[arg(long, requires = "dry_run")]
    pub json: bool,

    /// Check that the required tools and paths are present, then exit.
    #[arg(long, conflicts_with = "dry_run")]
    pub doctor: bool,

    /// Debug-level logging.
    #[arg(short = 'v', long, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only print warnings and errors.
    #[arg(short = 'q', long)]
    pub quiet: bool,
}
