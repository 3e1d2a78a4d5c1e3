use std::sync::Arc;

use log::debug;

use crate::model::{
    manifest::{pins::PinFile, plan::BuildPlan, Project},
    platform::{BuildConfiguration, Platform},
};

use super::{ResolutionError, Resolver};

#[derive(Debug)]
pub struct MatrixEntry {
    pub platform: Platform,
    pub configuration: BuildConfiguration,
    pub result: Result<BuildPlan, ResolutionError>,
}

/// Every declared platform paired with every build configuration.
/// Falls back to all known platforms when the project declares none.
pub fn all_pairs(project: &Project) -> Vec<(Platform, BuildConfiguration)> {
    let platforms = if project.platforms.is_empty() {
        Platform::ALL.to_vec()
    } else {
        project.platforms.platforms().collect()
    };
    platforms
        .into_iter()
        .flat_map(|p| BuildConfiguration::ALL.into_iter().map(move |c| (p, c)))
        .collect()
}

/// Resolves each pair on the blocking pool. Results keep the order of `pairs`,
/// and a failing pair does not affect the others.
pub async fn resolve_matrix(
    project: Arc<Project>,
    pins: Option<Arc<PinFile>>,
    pairs: Vec<(Platform, BuildConfiguration)>,
) -> anyhow::Result<Vec<MatrixEntry>> {
    let handles = pairs
        .into_iter()
        .map(|(platform, configuration)| {
            let project = Arc::clone(&project);
            let pins = pins.clone();
            tokio::task::spawn_blocking(move || {
                debug!("Resolving matrix entry {} ({})", platform, configuration);
                let resolver = Resolver::new(&project);
                let resolver = match pins.as_deref() {
                    Some(pins) => resolver.with_pins(pins),
                    None => resolver,
                };
                MatrixEntry {
                    platform,
                    configuration,
                    result: resolver.resolve(platform, configuration),
                }
            })
        })
        .collect::<Vec<_>>();

    let mut entries = Vec::with_capacity(handles.len());
    for handle in handles {
        entries.push(handle.await?);
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use semver::Version;

    use super::*;
    use crate::model::{
        manifest::{Dependency, DependencyName, DependencyReference, Target},
        platform::{PlatformCondition, PlatformFloors},
        version::Requirement,
    };

    use pretty_assertions::assert_eq;

    fn project() -> Project {
        Project {
            platforms: PlatformFloors::new([
                (Platform::Ios, Version::new(9, 0, 0)),
                (Platform::Tvos, Version::new(12, 0, 0)),
            ]),
            dependencies: vec![Dependency {
                name: DependencyName::from("AppCenter"),
                locator: "https://github.com/microsoft/appcenter-sdk-apple.git".to_string(),
                requirement: Requirement::UpToNextMajor(Version::new(4, 4, 1)),
                products: None,
                platforms: PlatformFloors::default(),
            }],
            targets: vec![Target {
                dependencies: vec![DependencyReference::product("Distribute", "AppCenter")
                    .when(PlatformCondition::new([Platform::Ios]))],
                ..Target::new("Dummy")
            }],
            ..Project::new("Dummy")
        }
    }

    #[test]
    fn pairs_cover_declared_platforms() {
        assert_eq!(
            all_pairs(&project()),
            vec![
                (Platform::Ios, BuildConfiguration::Debug),
                (Platform::Ios, BuildConfiguration::Release),
                (Platform::Tvos, BuildConfiguration::Debug),
                (Platform::Tvos, BuildConfiguration::Release),
            ]
        );
        assert_eq!(all_pairs(&Project::new("Bare")).len(), Platform::ALL.len() * 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn matrix_matches_sequential_resolution() {
        let project = Arc::new(project());
        let pairs = all_pairs(&project);
        let entries = resolve_matrix(Arc::clone(&project), None, pairs.clone())
            .await
            .unwrap();

        assert_eq!(entries.len(), pairs.len());
        for (entry, (platform, configuration)) in entries.into_iter().zip(pairs) {
            assert_eq!((entry.platform, entry.configuration), (platform, configuration));
            let expected = Resolver::new(&project).resolve(platform, configuration);
            assert_eq!(entry.result, expected);
            let links = entry.result.unwrap().targets[0].links_product("Distribute");
            assert_eq!(links, platform == Platform::Ios);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn failing_platform_leaves_others_resolved() {
        let mut project = project();
        project.dependencies[0].platforms =
            PlatformFloors::new([(Platform::Ios, Version::new(11, 0, 0))]);
        let project = Arc::new(project);
        let entries = resolve_matrix(Arc::clone(&project), None, all_pairs(&project))
            .await
            .unwrap();

        assert_eq!(entries.len(), 4);
        for entry in entries {
            match entry.platform {
                Platform::Ios => assert!(matches!(
                    entry.result,
                    Err(ResolutionError::InvalidPlatformFloor { .. })
                )),
                _ => assert!(entry.result.is_ok()),
            }
        }
    }
}
