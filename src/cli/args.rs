use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::model::platform::{BuildConfiguration, Platform};

/// Resolves package manifests into per-platform, per-configuration build plans.
#[derive(Debug, Parser)]
#[clap(version)]
pub struct CliArgs {
    #[clap(subcommand)]
    pub cmd: Command,
    /// Name of the project manifest
    #[clap(short, long, default_value = "buildplan.toml")]
    pub module_location: String,
    /// Name of the pins file; ignored when it does not exist
    #[clap(short, long, default_value = "buildplan.pins")]
    pub pins_location: String,
    /// Additional manifests merged into the project, in order
    #[clap(short, long)]
    pub include: Vec<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Creates an initial manifest in the provided directory
    Init {
        #[clap(default_value = ".")]
        directory: String,
        #[clap(short, long)]
        name: Option<String>,
    },
    /// Resolves the manifest for a single platform and configuration
    Plan {
        #[clap(short = 't', long)]
        platform: Option<Platform>,
        #[clap(short, long)]
        configuration: Option<BuildConfiguration>,
        /// File to write the plan to; printed to stdout when omitted
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// Resolves every declared platform with every configuration
    Matrix {
        /// Directory receiving one plan per platform and configuration
        #[clap(short, long)]
        output_directory: Option<PathBuf>,
    },
    /// Verifies that every platform and configuration resolves
    Check,
}
