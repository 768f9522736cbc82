// src/lib.rs

//! apkg - upstream packaging automation
//!
//! Produces source archives, renders distro-specific package templates into
//! source packages and drives the native packaging tools of each distro
//! family to build and install packages.
//!
//! # Architecture
//!
//! - Pipeline: archive -> source package -> packages -> install, each stage
//!   invocable on its own and able to produce its missing inputs
//! - Package styles: one backend per distro family behind a single trait,
//!   assembled into a static registry
//! - Cache: content-hash validated results per project, keyed by VCS state,
//!   archive checksum or URL
//! - Native tools do the real work; apkg orchestrates and validates

pub mod archive;
pub mod cache;
pub mod distro;
mod error;
pub mod fsutil;
pub mod hash;
pub mod parse;
pub mod pipeline;
pub mod pkgstyle;
pub mod project;
pub mod run;
pub mod template;
pub mod upstream;
pub mod version;

pub use cache::ProjectCache;
pub use distro::Distro;
pub use error::{Error, Result};
pub use pkgstyle::{PackageStyle, StyleRegistry};
pub use project::{Project, Vcs};
pub use template::{PackageTemplate, TemplateEnv};
pub use version::{Dependency, Version, VersionConstraint};
