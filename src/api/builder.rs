use std::{env, path::PathBuf};

use crate::BuildPlanner;

#[derive(Default)]
pub struct BuildPlannerBuilder {
    // All other paths are relative to `root`
    root: Option<PathBuf>,
    module_file_name: Option<PathBuf>,
    pins_file_name: Option<PathBuf>,
    includes: Vec<PathBuf>,
    output_directory_name: Option<PathBuf>,
}

impl BuildPlannerBuilder {
    /// Project root directory.
    ///
    /// Defaults to the current directory.
    pub fn root(mut self, path: impl Into<PathBuf>) -> Self {
        self.root = Some(path.into());
        self
    }

    /// Name of the project manifest.
    ///
    /// Defaults to `buildplan.toml`.
    pub fn module_file_name(mut self, path: impl Into<PathBuf>) -> Self {
        self.module_file_name = Some(path.into());
        self
    }

    /// Name of the pins file.
    ///
    /// Defaults to `buildplan.pins`. A missing file means nothing is pinned.
    pub fn pins_file_name(mut self, path: impl Into<PathBuf>) -> Self {
        self.pins_file_name = Some(path.into());
        self
    }

    /// Another manifest to merge into the project. May be called repeatedly.
    pub fn include(mut self, path: impl Into<PathBuf>) -> Self {
        self.includes.push(path.into());
        self
    }

    /// Directory receiving the plans written by a matrix resolution.
    ///
    /// Defaults to `build_plans`.
    pub fn output_directory_name(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_directory_name = Some(path.into());
        self
    }

    pub fn try_build(self) -> anyhow::Result<BuildPlanner> {
        let Self {
            root,
            module_file_name,
            pins_file_name,
            includes,
            output_directory_name,
        } = self;
        let root = match root {
            Some(root) => root,
            None => env::current_dir()?,
        };

        let module_file_name = module_file_name.unwrap_or_else(|| PathBuf::from("buildplan.toml"));

        let pins_file_name = pins_file_name.unwrap_or_else(|| PathBuf::from("buildplan.pins"));

        Ok(BuildPlanner {
            root,
            module_file_name,
            pins_file_name,
            includes,
            output_directory_name,
        })
    }
}
