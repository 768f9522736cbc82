// src/cli/input.rs
//! Arguments shared by pipeline commands

use clap::Args;
use std::path::PathBuf;

/// Where stage input comes from
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Use upstream archive (default: dev archive)
    #[arg(short, long)]
    pub upstream: bool,

    /// Input files are archives
    #[arg(short, long)]
    pub archive: bool,

    /// Input files (archives, source packages or packages)
    #[arg(value_name = "INPUT")]
    pub input_files: Vec<PathBuf>,

    /// File listing input files, one per line, "-" for stdin
    #[arg(short = 'l', long = "file-list", value_name = "LIST")]
    pub input_file_lists: Vec<PathBuf>,
}

/// Options of stages that produce source packages or packages
#[derive(Args, Debug)]
pub struct BuildInputArgs {
    /// Package version
    #[arg(short, long)]
    pub version: Option<String>,

    /// Package release
    #[arg(short, long)]
    pub release: Option<String>,

    /// Target distro (default: current distro)
    #[arg(short, long)]
    pub distro: Option<String>,

    /// Put results into specified directory
    #[arg(short = 'O', long)]
    pub result_dir: Option<PathBuf>,

    #[command(flatten)]
    pub cache: CacheArgs,
}

#[derive(Args, Debug)]
pub struct CacheArgs {
    /// Use cache (default)
    #[arg(long, overrides_with = "no_cache")]
    pub cache: bool,

    /// Don't use cache
    #[arg(long, overrides_with = "cache")]
    pub no_cache: bool,
}

impl CacheArgs {
    pub fn use_cache(&self) -> bool {
        !self.no_cache
    }
}
