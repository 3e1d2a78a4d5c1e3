use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use log::{debug, error, info};

use crate::{
    model::{
        manifest::{
            pins::PinFile, plan::BuildPlan, Product, ProductKind, Project, Target,
        },
        platform::{BuildConfiguration, Platform},
    },
    resolver::{
        matrix::{all_pairs, resolve_matrix},
        Resolver,
    },
};

const DEFAULT_OUTPUT_DIRECTORY_NAME: &str = "build_plans";

/// Where the project description lives. Every path is relative to `root`.
pub struct ProjectFiles<'a> {
    pub root: &'a Path,
    pub module_file_name: &'a Path,
    pub pins_file_name: &'a Path,
    pub includes: &'a [PathBuf],
}

/// Handler to init command
pub fn do_init(root: &Path, name: Option<String>, module_file_name: &Path) -> anyhow::Result<()> {
    let name = build_module_name(name, root)?;
    let project = Project {
        products: vec![Product {
            name: name.clone(),
            kind: ProductKind::Library,
            targets: vec![name.clone()],
        }],
        targets: vec![Target::new(name.clone())],
        ..Project::new(name)
    };
    let module_file_path = root.join(module_file_name);
    create_module_file(project, &module_file_path)
}

/// Handler to plan command
/// Resolves the project for one pair and writes the plan to `output`, or stdout
pub fn do_plan(
    files: &ProjectFiles<'_>,
    platform: Platform,
    configuration: BuildConfiguration,
    output: Option<&Path>,
) -> anyhow::Result<BuildPlan> {
    let project = load_project(files)?;
    let pins = load_pins(files)?;

    let resolver = Resolver::new(&project);
    let resolver = match &pins {
        Some(pins) => resolver.with_pins(pins),
        None => resolver,
    };
    let plan = resolver.resolve(platform, configuration)?;
    debug!("Generated build plan: {:?}", plan);

    let text = plan.to_string()?;
    match output {
        Some(output) => {
            let output = files.root.join(output);
            if let Some(parent) = output.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&output, text)?;
            info!("Wrote build plan to {}", output.display());
        }
        None => print!("{}", text),
    }
    Ok(plan)
}

/// Handler to matrix command
/// Resolves every platform and configuration concurrently, one file per pair
pub fn do_matrix(
    files: &ProjectFiles<'_>,
    output_directory_name: Option<&Path>,
) -> anyhow::Result<Vec<PathBuf>> {
    let project = Arc::new(load_project(files)?);
    let pins = load_pins(files)?.map(Arc::new);
    let pairs = all_pairs(&project);

    let output_directory = files.root.join(
        output_directory_name.unwrap_or(Path::new(DEFAULT_OUTPUT_DIRECTORY_NAME)),
    );
    std::fs::create_dir_all(&output_directory)?;

    let runtime = tokio::runtime::Builder::new_multi_thread().build()?;
    let entries = runtime.block_on(resolve_matrix(project, pins, pairs))?;

    let mut written = Vec::new();
    let mut failures = 0;
    for entry in entries {
        match entry.result {
            Ok(plan) => {
                let path = output_directory
                    .join(format!("{}-{}.toml", entry.platform, entry.configuration));
                std::fs::write(&path, plan.to_string()?)?;
                info!("Wrote build plan to {}", path.display());
                written.push(path);
            }
            Err(err) => {
                error!(
                    "Could not resolve {} ({}): {}",
                    entry.platform, entry.configuration, err
                );
                failures += 1;
            }
        }
    }
    if failures > 0 {
        bail!("{} of {} resolutions failed", failures, failures + written.len());
    }
    Ok(written)
}

/// Handler to check command
pub fn do_check(files: &ProjectFiles<'_>) -> anyhow::Result<()> {
    let project = load_project(files)?;
    let pins = load_pins(files)?;

    let resolver = Resolver::new(&project);
    let resolver = match &pins {
        Some(pins) => resolver.with_pins(pins),
        None => resolver,
    };

    let mut failures = 0;
    for (platform, configuration) in all_pairs(&project) {
        match resolver.resolve(platform, configuration) {
            Ok(_) => info!("{} ({}) resolves", platform, configuration),
            Err(err) => {
                error!("{} ({}): {}", platform, configuration, err);
                failures += 1;
            }
        }
    }
    if failures > 0 {
        bail!("{} resolutions failed", failures);
    }
    Ok(())
}

fn load_project(files: &ProjectFiles<'_>) -> anyhow::Result<Project> {
    let module_file_path = files.root.join(files.module_file_name);
    let mut project = Project::from_file(&module_file_path)
        .with_context(|| format!("Could not load manifest {}", module_file_path.display()))?;
    for include in files.includes {
        let include_path = files.root.join(include);
        let included = Project::from_file(&include_path)
            .with_context(|| format!("Could not load manifest {}", include_path.display()))?;
        project = project.merge(included)?;
    }
    Ok(project)
}

fn load_pins(files: &ProjectFiles<'_>) -> anyhow::Result<Option<PinFile>> {
    let pins_file_path = files.root.join(files.pins_file_name);
    if !pins_file_path.exists() {
        debug!("No pins file at {}", pins_file_path.display());
        return Ok(None);
    }
    let pins = PinFile::from_file(&pins_file_path)
        .with_context(|| format!("Could not load pins {}", pins_file_path.display()))?;
    Ok(Some(pins))
}

/// Name if present otherwise attempt to extract from directory
fn build_module_name(name: Option<String>, path: &Path) -> anyhow::Result<String> {
    match name {
        Some(name) => Ok(name),
        None => match path.canonicalize()?.file_name() {
            Some(dir) => Ok(dir.to_string_lossy().to_string()),
            None => bail!("Module name not given and could not convert location to directory name"),
        },
    }
}

fn create_module_file(project: Project, module_file_path: &Path) -> anyhow::Result<()> {
    if module_file_path.exists() {
        bail!("File already exists: {}", module_file_path.display());
    }
    std::fs::write(module_file_path, toml::to_string_pretty(&project.into_toml())?)?;
    info!("Wrote manifest to {}", module_file_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"
        name = "AppCenterDummy"
        [platforms]
            ios = "9"
            tvos = "11"
        [[dependencies]]
            name = "AppCenter"
            url = "https://github.com/microsoft/appcenter-sdk-apple.git"
            up_to_next_major = "4.4.1"
        [[targets]]
            name = "AppCenterDummy"
            dependencies = [
                { product = "AppCenterCrashes", package = "AppCenter" },
                { product = "AppCenterDistribute", package = "AppCenter", platforms = ["ios"] },
            ]
    "#;

    fn files(root: &Path) -> ProjectFiles<'_> {
        ProjectFiles {
            root,
            module_file_name: Path::new("buildplan.toml"),
            pins_file_name: Path::new("buildplan.pins"),
            includes: &[],
        }
    }

    #[test]
    fn init_then_plan() {
        let dir = tempfile::tempdir().unwrap();
        do_init(dir.path(), Some("Player".to_string()), Path::new("buildplan.toml")).unwrap();
        assert!(
            do_init(dir.path(), Some("Player".to_string()), Path::new("buildplan.toml")).is_err()
        );

        let plan = do_plan(
            &files(dir.path()),
            Platform::Linux,
            BuildConfiguration::Debug,
            Some(Path::new("out/plan.toml")),
        )
        .unwrap();
        assert_eq!(plan.project, "Player");
        assert_eq!(
            BuildPlan::from_file(&dir.path().join("out/plan.toml")).unwrap(),
            plan
        );
    }

    #[test]
    fn matrix_writes_one_file_per_pair() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("buildplan.toml"), MANIFEST).unwrap();

        let mut written = do_matrix(&files(dir.path()), None).unwrap();
        written.sort();
        let names = written
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect::<Vec<_>>();
        assert_eq!(
            names,
            vec![
                "ios-debug.toml",
                "ios-release.toml",
                "tvos-debug.toml",
                "tvos-release.toml"
            ]
        );
        let tvos = BuildPlan::from_file(&dir.path().join("build_plans/tvos-release.toml")).unwrap();
        assert!(!tvos.targets[0].links_product("AppCenterDistribute"));
    }

    #[test]
    fn matrix_writes_resolvable_pairs_and_fails() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = MANIFEST.replace(
            "up_to_next_major = \"4.4.1\"",
            "up_to_next_major = \"4.4.1\"\n            platforms = { ios = \"11\" }",
        );
        std::fs::write(dir.path().join("buildplan.toml"), manifest).unwrap();

        let err = do_matrix(&files(dir.path()), None).unwrap_err();
        assert_eq!(err.to_string(), "2 of 4 resolutions failed");

        let output = dir.path().join("build_plans");
        assert!(output.join("tvos-debug.toml").exists());
        assert!(output.join("tvos-release.toml").exists());
        assert!(!output.join("ios-debug.toml").exists());
        assert!(!output.join("ios-release.toml").exists());
    }

    #[test]
    fn check_reports_pin_conflict() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("buildplan.toml"), MANIFEST).unwrap();
        do_check(&files(dir.path())).unwrap();

        std::fs::write(
            dir.path().join("buildplan.pins"),
            "version = 1\n\n[[pins]]\nname = \"AppCenter\"\nversion = \"5.0.3\"\n",
        )
        .unwrap();
        assert!(do_check(&files(dir.path())).is_err());
    }

    #[test]
    fn includes_are_merged() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("buildplan.toml"), MANIFEST).unwrap();
        std::fs::write(
            dir.path().join("optional.toml"),
            r#"
                name = "AppCenterDistributeOptional"
                [[dependencies]]
                    name = "AppCenter"
                    url = "https://github.com/microsoft/appcenter-sdk-apple.git"
                    up_to_next_major = "5.0.3"
            "#,
        )
        .unwrap();
        let includes = [PathBuf::from("optional.toml")];
        let files = ProjectFiles {
            includes: &includes,
            ..files(dir.path())
        };
        let err = do_plan(&files, Platform::Ios, BuildConfiguration::Debug, None).unwrap_err();
        assert!(err.to_string().contains("AppCenter"));
    }
}
