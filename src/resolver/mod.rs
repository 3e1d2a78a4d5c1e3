mod constraints;
pub mod matrix;

use std::collections::{BTreeMap, HashMap, HashSet};

use log::{debug, info, trace};
use semver::Version;
use thiserror::Error;

use crate::model::{
    manifest::{
        pins::PinFile,
        plan::{ActiveDefine, BuildPlan, PlanMetadata, ResolvedDependency, ResolvedEdge, TargetPlan},
        DependencyName, DependencyReference, Project, Target,
    },
    platform::{is_active_on, BuildConfiguration, Platform},
    version::VersionRange,
};

use constraints::{merge_declarations, MergedDependency};

pub use matrix::{resolve_matrix, MatrixEntry};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("Target `{target}` references unknown dependency `{dependency}`")]
    UnknownDependency { dependency: String, target: String },
    #[error("Dependency `{dependency}` does not expose product `{product}`")]
    UnknownProduct {
        dependency: DependencyName,
        product: String,
    },
    #[error("Conflicting requirements for `{dependency}`: {first} and {second} do not intersect")]
    VersionConflict {
        dependency: DependencyName,
        first: VersionRange,
        second: VersionRange,
    },
    #[error(
        "Dependency `{dependency}` requires {platform} {required} but the project supports {platform} {floor}"
    )]
    InvalidPlatformFloor {
        dependency: DependencyName,
        platform: Platform,
        required: Version,
        floor: Version,
    },
    #[error("Product `{product}` references unknown target `{target}`")]
    UnknownTarget { product: String, target: String },
    #[error("Target dependency cycle: {}", .0.join(" -> "))]
    TargetCycle(Vec<String>),
    #[error("Pin {pinned} for `{dependency}` is outside {range}")]
    PinOutOfRange {
        dependency: DependencyName,
        pinned: Version,
        range: VersionRange,
    },
}

/// Turns a project into build plans. Holds no state between calls.
pub struct Resolver<'a> {
    project: &'a Project,
    pins: Option<&'a PinFile>,
}

/// Resolves `project` for one platform and configuration, ignoring pins.
pub fn resolve(
    project: &Project,
    platform: Platform,
    configuration: BuildConfiguration,
) -> Result<BuildPlan, ResolutionError> {
    Resolver::new(project).resolve(platform, configuration)
}

impl<'a> Resolver<'a> {
    pub fn new(project: &'a Project) -> Self {
        Self {
            project,
            pins: None,
        }
    }

    pub fn with_pins(self, pins: &'a PinFile) -> Self {
        Self {
            pins: Some(pins),
            ..self
        }
    }

    pub fn resolve(
        &self,
        platform: Platform,
        configuration: BuildConfiguration,
    ) -> Result<BuildPlan, ResolutionError> {
        info!(
            "Resolving {} for {} ({})",
            self.project.name, platform, configuration
        );

        self.validate_products()?;
        self.validate_references()?;
        self.check_target_cycles()?;

        let merged = merge_declarations(self.project, self.pins)?;

        let targets = self
            .project
            .targets
            .iter()
            .map(|target| self.plan_target(target, platform, configuration, &merged))
            .collect::<Vec<_>>();

        let used = targets
            .iter()
            .flat_map(|t| t.dependencies.iter())
            .filter_map(|edge| match edge {
                ResolvedEdge::Product { package, .. } => Some(package),
                ResolvedEdge::Target { .. } => None,
            })
            .collect::<HashSet<_>>();

        let floor = self.project.platforms.get(platform);
        let mut dependencies = Vec::new();
        let mut non_reproducible = Vec::new();
        for (name, dependency) in &merged {
            if !used.contains(name) {
                trace!("{} has no active edge on {}", name, platform);
                continue;
            }
            check_floor(dependency, platform, floor)?;
            if !dependency.reproducible {
                non_reproducible.push((*name).clone());
            }
            dependencies.push(ResolvedDependency {
                name: (*name).clone(),
                locator: dependency.primary.locator.clone(),
                requirements: dependency
                    .requirements
                    .iter()
                    .map(|r| r.to_string())
                    .collect(),
                range: dependency.range.clone(),
                pinned: dependency.pinned.clone(),
            });
        }

        Ok(BuildPlan {
            project: self.project.name.clone(),
            default_localization: self.project.default_localization.clone(),
            platform,
            configuration,
            platform_floor: floor.cloned(),
            metadata: PlanMetadata { non_reproducible },
            dependencies,
            products: self.project.products.clone(),
            targets,
        })
    }

    fn validate_products(&self) -> Result<(), ResolutionError> {
        for product in &self.project.products {
            if let Some(missing) = product
                .targets
                .iter()
                .find(|name| self.project.target(name).is_none())
            {
                return Err(ResolutionError::UnknownTarget {
                    product: product.name.clone(),
                    target: missing.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_references(&self) -> Result<(), ResolutionError> {
        for target in &self.project.targets {
            for reference in &target.dependencies {
                let (package, product) = match reference {
                    DependencyReference::ByName { name, .. } => {
                        if self.project.target(name).is_some() {
                            continue;
                        }
                        (DependencyName::from(name.as_str()), name)
                    }
                    DependencyReference::Product {
                        product, package, ..
                    } => (package.clone(), product),
                };
                let Some(dependency) = self.project.declarations(&package).next() else {
                    return Err(ResolutionError::UnknownDependency {
                        dependency: package.to_string(),
                        target: target.name.clone(),
                    });
                };
                let exposed = self
                    .project
                    .declarations(&package)
                    .filter_map(|d| d.products.as_ref())
                    .collect::<Vec<_>>();
                if !exposed.is_empty() && !exposed.iter().any(|p| p.contains(product)) {
                    return Err(ResolutionError::UnknownProduct {
                        dependency: dependency.name.clone(),
                        product: product.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    fn check_target_cycles(&self) -> Result<(), ResolutionError> {
        fn visit<'p>(
            project: &'p Project,
            target: &'p Target,
            path: &mut Vec<&'p str>,
            done: &mut HashSet<&'p str>,
        ) -> Result<(), ResolutionError> {
            if done.contains(target.name.as_str()) {
                return Ok(());
            }
            if let Some(start) = path.iter().position(|name| *name == target.name) {
                let mut cycle = path[start..]
                    .iter()
                    .map(|name| name.to_string())
                    .collect::<Vec<_>>();
                cycle.push(target.name.clone());
                return Err(ResolutionError::TargetCycle(cycle));
            }
            path.push(&target.name);
            for reference in &target.dependencies {
                if let DependencyReference::ByName { name, .. } = reference {
                    if let Some(local) = project.target(name) {
                        visit(project, local, path, done)?;
                    }
                }
            }
            path.pop();
            done.insert(&target.name);
            Ok(())
        }

        let mut done = HashSet::new();
        for target in &self.project.targets {
            visit(self.project, target, &mut Vec::new(), &mut done)?;
        }
        Ok(())
    }

    fn plan_target(
        &self,
        target: &Target,
        platform: Platform,
        configuration: BuildConfiguration,
        merged: &BTreeMap<&DependencyName, MergedDependency<'_>>,
    ) -> TargetPlan {
        let dependencies = target
            .dependencies
            .iter()
            .filter(|reference| {
                let active = is_active_on(reference.condition(), platform);
                if !active {
                    debug!(
                        "Dropping {:?} from {}: not enabled on {}",
                        reference, target.name, platform
                    );
                }
                active
            })
            .filter_map(|reference| match reference {
                DependencyReference::ByName { name, .. } if self.project.target(name).is_some() => {
                    Some(ResolvedEdge::Target { name: name.clone() })
                }
                DependencyReference::ByName { name, .. } => {
                    let package = DependencyName::from(name.as_str());
                    merged.get(&package).map(|d| ResolvedEdge::Product {
                        product: name.clone(),
                        package,
                        range: d.range.clone(),
                    })
                }
                DependencyReference::Product {
                    product, package, ..
                } => merged.get(package).map(|d| ResolvedEdge::Product {
                    product: product.clone(),
                    package: package.clone(),
                    range: d.range.clone(),
                }),
            })
            .collect();

        TargetPlan {
            name: target.name.clone(),
            kind: target.kind,
            exclude: target.exclude.clone(),
            header_search_paths: target.header_search_paths.clone(),
            dependencies,
            defines: active_defines(target, platform, configuration),
            resources: target.resources.clone(),
        }
    }
}

fn check_floor(
    dependency: &MergedDependency<'_>,
    platform: Platform,
    floor: Option<&Version>,
) -> Result<(), ResolutionError> {
    let (Some(required), Some(floor)) = (dependency.floors.get(platform), floor) else {
        return Ok(());
    };
    if required > floor {
        return Err(ResolutionError::InvalidPlatformFloor {
            dependency: dependency.primary.name.clone(),
            platform,
            required: required.clone(),
            floor: floor.clone(),
        });
    }
    Ok(())
}

/// Applies directives in declaration order so the last matching one wins.
fn active_defines(
    target: &Target,
    platform: Platform,
    configuration: BuildConfiguration,
) -> Vec<ActiveDefine> {
    let mut defines: HashMap<&str, Option<&String>> = HashMap::new();
    for define in &target.defines {
        let configured = define.configuration.map_or(true, |c| c == configuration);
        if configured && is_active_on(define.condition.as_ref(), platform) {
            defines.insert(&define.name, define.value.as_ref());
        }
    }
    let mut defines = defines
        .into_iter()
        .map(|(name, value)| ActiveDefine {
            name: name.to_string(),
            value: value.cloned(),
        })
        .collect::<Vec<_>>();
    defines.sort_by(|a, b| a.name.cmp(&b.name));
    defines
}
