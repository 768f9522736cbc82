// src/commands/system.rs
//! Host and project commands: system-setup, status

use super::open_project;
use anyhow::{Context, Result};
use apkg::StyleRegistry;
use apkg::distro::{Distro, distro_arg};
use apkg::pipeline;

/// Install distro packages required for packaging
pub fn cmd_system_setup(
    isolated: bool,
    distro: Option<&str>,
    interactive: bool,
    host: &Distro,
) -> Result<()> {
    let distro = distro_arg(distro, host);
    let registry = StyleRegistry::builtin();
    pipeline::system_setup(&registry, &distro, isolated, interactive)
        .context("System setup failed")?;
    Ok(())
}

/// Show status of current project
pub fn cmd_status(host: &Distro) -> Result<()> {
    let proj = open_project()?;
    let status = pipeline::status(&proj, host);

    println!("project name:            {}", status.name);
    println!("project base path:       {}", status.path.display());
    let config_note = if status.config_exists { "" } else { " (doesn't exist)" };
    println!("project config:          {}{}", status.config_path.display(), config_note);
    println!(
        "current distro:          {} / {}",
        status.distro_idver, status.distro
    );
    match status.style {
        Some(style) => println!("    package style:       {}", style),
        None => println!("    package style:       none (distro not supported)"),
    }
    match &status.template {
        Some(template) => println!("    package template:    {}", template.display()),
        None => println!("    package template:    none"),
    }
    println!(
        "cache:                   {}",
        if status.cache_enabled { "enabled" } else { "disabled (no VCS)" }
    );

    if status.templates.is_empty() {
        println!("\nNo package templates found.");
    } else {
        println!("\npackage templates ({}):", status.templates.len());
        for (path, style) in &status.templates {
            println!("    {} ({})", path.display(), style);
        }
    }
    Ok(())
}
