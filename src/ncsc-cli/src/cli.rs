//! CLI argument definitions for ncsc

use clap::{Args, Parser, Subcommand};
use ncsc::Platform;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ncsc")]
#[command(about = "Convert nCSC sprite animations to JSON and back", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true, alias = "debug")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert a file; .json inputs are encoded, anything else is decoded
    #[command(visible_alias = "c")]
    Convert {
        /// Input animation or JSON document
        input: PathBuf,

        /// Output path (default: derived from the input name)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        platform: PlatformArgs,

        /// Keep the original element name order
        #[arg(long)]
        name_order: bool,
    },

    /// Show header information without converting
    #[command(visible_alias = "i")]
    Inspect {
        /// Path to an animation file
        input: PathBuf,

        #[command(flatten)]
        platform: PlatformArgs,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Configure default settings
    Configure {
        /// Default platform (standard, ds, 3ds, mobile)
        #[arg(long)]
        platform: Option<Platform>,

        /// Keep the original element name order by default
        #[arg(long)]
        name_order: Option<bool>,

        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
}

/// Platform selection; at most one flag, the configured default otherwise
#[derive(Args, Debug, Default, Clone, Copy)]
#[group(required = false, multiple = false)]
pub struct PlatformArgs {
    /// Nintendo DS file (fixed-point floats)
    #[arg(long)]
    pub ds: bool,

    /// Nintendo 3DS file (fixed-point floats)
    #[arg(long = "3ds")]
    pub three_ds: bool,

    /// Mobile file (8-byte pointers)
    #[arg(short, long)]
    pub mobile: bool,
}

impl PlatformArgs {
    pub fn selected(&self) -> Option<Platform> {
        if self.ds {
            Some(Platform::Ds)
        } else if self.three_ds {
            Some(Platform::ThreeDs)
        } else if self.mobile {
            Some(Platform::Mobile)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_convert() {
        let cli = Cli::try_parse_from(["ncsc", "convert", "anim.bin", "--3ds", "--name-order"])
            .unwrap();
        match cli.command {
            Commands::Convert {
                input,
                output,
                platform,
                name_order,
            } => {
                assert_eq!(input, PathBuf::from("anim.bin"));
                assert!(output.is_none());
                assert_eq!(platform.selected(), Some(Platform::ThreeDs));
                assert!(name_order);
            }
            _ => panic!("expected convert"),
        }
        assert!(!cli.verbose);
    }

    #[test]
    fn test_platform_flags_conflict() {
        assert!(Cli::try_parse_from(["ncsc", "c", "a.bin", "--ds", "-m"]).is_err());
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::try_parse_from(["ncsc", "inspect", "a.bin", "--debug"]).unwrap();
        assert!(cli.verbose);
    }

    #[test]
    fn test_no_platform_flag() {
        assert_eq!(PlatformArgs::default().selected(), None);
    }

    #[test]
    fn test_configure_platform_value() {
        let cli = Cli::try_parse_from(["ncsc", "configure", "--platform", "mobile"]).unwrap();
        match cli.command {
            Commands::Configure { platform, .. } => assert_eq!(platform, Some(Platform::Mobile)),
            _ => panic!("expected configure"),
        }
    }
}
