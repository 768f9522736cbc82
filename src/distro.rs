// src/distro.rs

//! Host distro identity
//!
//! The host distro is read once from os-release into an immutable
//! [`Distro`] value which is then passed to whatever needs it.
//!
//! apkg references distros by an "idver" string: the lowercased distro id
//! followed by its version, e.g. `debian-12`, `fedora-40`, or just `arch`
//! for rolling distros without a version.

use std::fmt;
use std::fs;
use tracing::debug;

/// os-release locations in lookup order
const OS_RELEASE_PATHS: &[&str] = &["/etc/os-release", "/usr/lib/os-release"];

/// Identity of a Linux distribution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Distro {
    /// Machine-readable id (`ID=`), e.g. `debian`
    pub id: String,
    /// Version (`VERSION_ID=`), empty for rolling releases
    pub version: String,
    /// Release codename (`VERSION_CODENAME=`)
    pub codename: String,
    /// Human readable name (`NAME=`)
    pub name: String,
}

impl Distro {
    /// Detect the host distro from os-release
    ///
    /// An unreadable os-release yields an empty identity whose id is
    /// `linux`, which no package style matches.
    pub fn detect() -> Self {
        for path in OS_RELEASE_PATHS {
            if let Ok(content) = fs::read_to_string(path) {
                debug!("reading distro identity from {}", path);
                return Self::from_os_release(&content);
            }
        }
        debug!("os-release not found, distro unknown");
        Self {
            id: "linux".to_string(),
            ..Default::default()
        }
    }

    /// Parse os-release `KEY=value` content
    pub fn from_os_release(content: &str) -> Self {
        let mut distro = Self::default();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"').trim_matches('\'').to_string();
            match key {
                "ID" => distro.id = value,
                "VERSION_ID" => distro.version = value,
                "VERSION_CODENAME" => distro.codename = value,
                "NAME" => distro.name = value,
                _ => {}
            }
        }
        if distro.id.is_empty() {
            distro.id = "linux".to_string();
        }
        distro
    }

    /// Distro in idver format: `debian-12`, `arch`
    pub fn idver(&self) -> String {
        let idver = if self.version.is_empty() {
            self.id.clone()
        } else {
            format!("{}-{}", self.id, self.version)
        };
        normalize(&idver)
    }

    /// Human readable description, e.g. `Debian GNU/Linux 12 (bookworm)`
    pub fn fullname(&self) -> String {
        let mut parts = vec![];
        if !self.name.is_empty() {
            parts.push(self.name.clone());
        }
        if !self.version.is_empty() {
            parts.push(self.version.clone());
        }
        if !self.codename.is_empty() {
            parts.push(format!("({})", self.codename));
        }
        parts.join(" ")
    }
}

impl fmt::Display for Distro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.idver())
    }
}

/// Convert a free-form distro string into idver format
pub fn normalize(distro: &str) -> String {
    distro
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Resolve a user supplied distro argument, defaulting to the host distro
pub fn distro_arg(distro: Option<&str>, host: &Distro) -> String {
    match distro {
        Some(d) => normalize(d),
        None => host.idver(),
    }
}
