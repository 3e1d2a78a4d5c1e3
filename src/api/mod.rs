use std::path::{Path, PathBuf};

use crate::{
    cli::command_handlers::{do_check, do_init, do_matrix, do_plan, ProjectFiles},
    model::{
        manifest::plan::BuildPlan,
        platform::{BuildConfiguration, Platform},
    },
};

mod builder;

pub use builder::BuildPlannerBuilder;

pub struct BuildPlanner {
    root: PathBuf,
    module_file_name: PathBuf,
    pins_file_name: PathBuf,
    includes: Vec<PathBuf>,
    output_directory_name: Option<PathBuf>,
}

impl BuildPlanner {
    pub fn builder() -> BuildPlannerBuilder {
        BuildPlannerBuilder::default()
    }

    fn files(&self) -> ProjectFiles<'_> {
        ProjectFiles {
            root: &self.root,
            module_file_name: &self.module_file_name,
            pins_file_name: &self.pins_file_name,
            includes: &self.includes,
        }
    }

    /// Creates an initial manifest
    pub fn init(&self, name: Option<String>) -> anyhow::Result<()> {
        do_init(&self.root, name, &self.module_file_name)
    }

    /// Resolves one platform and configuration.
    /// The plan is written to `output` when given, to stdout otherwise.
    pub fn plan(
        &self,
        platform: Platform,
        configuration: BuildConfiguration,
        output: Option<&Path>,
    ) -> anyhow::Result<BuildPlan> {
        do_plan(&self.files(), platform, configuration, output)
    }

    /// Resolves every platform and configuration, writing one plan file per pair
    pub fn matrix(&self) -> anyhow::Result<Vec<PathBuf>> {
        do_matrix(&self.files(), self.output_directory_name.as_deref())
    }

    /// Fails unless every platform and configuration resolves
    pub fn check(&self) -> anyhow::Result<()> {
        do_check(&self.files())
    }
}
