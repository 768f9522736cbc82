// src/pipeline/mod.rs

//! Packaging pipeline
//!
//! Stages run in this order, each one invoking the previous stage when its
//! input isn't supplied:
//!
//! 1. archive: [`make_archive`] (dev) or [`get_archive`] (upstream)
//! 2. source package: [`make_srcpkg`]
//! 3. build deps: [`build_dep`]
//! 4. packages: [`build_package`]
//! 5. install: [`install`]
//!
//! Stages consult the project cache when enabled and always start from a
//! freshly created build directory.

mod archive;
mod build;
mod common;
mod deps;
mod install;
mod setup;
mod srcpkg;

pub use archive::{ArchiveOptions, find_archive, get_archive, get_archive_version, make_archive};
pub use build::{BuildOptions, build_package};
pub use common::{
    STDIN_LIST, ensure_input_files, get_cached_paths, parse_input_files, read_file_lists,
};
pub use deps::{BuildDepOptions, build_dep};
pub use install::{InstallOptions, InstallSource, install};
pub use setup::{ProjectStatus, status, system_setup};
pub use srcpkg::{DEFAULT_RELEASE, SrcpkgOptions, make_srcpkg};
