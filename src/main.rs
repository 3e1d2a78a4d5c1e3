use std::error::Error;

use anyhow::anyhow;
use buildplan::{
    cli::args::{CliArgs, Command},
    config::BuildPlanConfig,
    model::platform::BuildConfiguration,
    BuildPlanner,
};
use clap::Parser;
use env_logger::Env;
use log::{error, warn};

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let cli_args: CliArgs = CliArgs::parse();
    let config = BuildPlanConfig::load()?;

    let mut builder = BuildPlanner::builder()
        .module_file_name(&cli_args.module_location)
        .pins_file_name(&cli_args.pins_location);
    for include in cli_args.include {
        builder = builder.include(include);
    }

    match cli_args.cmd {
        Command::Init { directory, name } => {
            let planner = builder.root(directory).try_build()?;
            planner.init(name)?;
        }
        Command::Plan {
            platform,
            configuration,
            output,
        } => {
            let platform = platform
                .or(config.platform)
                .ok_or_else(|| anyhow!("No platform given and none configured"))?;
            let configuration = configuration.or(config.configuration).unwrap_or_else(|| {
                warn!("No build configuration given, using debug");
                BuildConfiguration::Debug
            });
            let planner = builder.try_build()?;
            planner.plan(platform, configuration, output.as_deref())?;
        }
        Command::Matrix { output_directory } => {
            if let Some(output_directory) = output_directory.or(config.output_dir) {
                builder = builder.output_directory_name(output_directory);
            }
            let planner = builder.try_build()?;
            planner.matrix()?;
        }
        Command::Check => {
            let planner = builder.try_build()?;
            planner.check()?;
        }
    }

    Ok(())
}
