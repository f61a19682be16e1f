//! Configuration command handlers
//!
//! Handles the `configure` subcommand for setting ncsc CLI defaults.

use crate::config::Config;
use anyhow::Result;
use ncsc::Platform;

/// Handle the configure command
///
/// # Arguments
/// * `platform` - Optional default platform
/// * `name_order` - Optional default for keeping the element name order
/// * `show` - If true, show current configuration
pub fn handle(platform: Option<Platform>, name_order: Option<bool>, show: bool) -> Result<()> {
    let mut config = Config::load()?;

    if show {
        show_config(&config);
        return Ok(());
    }

    if apply(&mut config, platform, name_order) {
        config.save()?;
        show_config(&config);
        if let Ok(path) = Config::config_path() {
            println!("Config saved to: {}", path.display());
        }
    } else {
        show_usage();
    }

    Ok(())
}

/// Apply the given settings; `false` if there was nothing to change
fn apply(config: &mut Config, platform: Option<Platform>, name_order: Option<bool>) -> bool {
    if let Some(platform) = platform {
        config.platform = platform;
    }
    if let Some(preserve) = name_order {
        config.preserve_name_order = preserve;
    }
    platform.is_some() || name_order.is_some()
}

/// Display current configuration
fn show_config(config: &Config) {
    println!("Platform: {}", config.platform.name());
    println!("Preserve name order: {}", config.preserve_name_order);

    if let Ok(path) = Config::config_path() {
        println!("Config file: {}", path.display());
    }
}

/// Show usage help for the configure command
fn show_usage() {
    println!("Usage: ncsc configure --platform <standard|ds|3ds|mobile>");
    println!("   or: ncsc configure --name-order <true|false>");
    println!("   or: ncsc configure --show");
    println!();
    println!("Note: the platform cannot be detected from the file itself.");
    println!("      Flags such as --ds or --mobile override the default.");
}
