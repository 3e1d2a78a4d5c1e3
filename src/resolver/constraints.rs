use std::collections::BTreeMap;

use log::{debug, warn};

use crate::model::{
    manifest::{pins::PinFile, Dependency, DependencyName, Project},
    platform::PlatformFloors,
    version::{Requirement, VersionRange},
};

use super::ResolutionError;

/// All declarations of one dependency name folded into a single range.
#[derive(Debug, Clone)]
pub(super) struct MergedDependency<'a> {
    /// First declaration; supplies the locator.
    pub primary: &'a Dependency,
    /// Every declared requirement, in declaration order.
    pub requirements: Vec<&'a Requirement>,
    pub range: VersionRange,
    /// Highest floor any declaration states, per platform.
    pub floors: PlatformFloors,
    pub reproducible: bool,
    pub pinned: Option<String>,
}

/// Normalizes every declared requirement and intersects declarations sharing a name.
pub(super) fn merge_declarations<'a>(
    project: &'a Project,
    pins: Option<&PinFile>,
) -> Result<BTreeMap<&'a DependencyName, MergedDependency<'a>>, ResolutionError> {
    let mut merged: BTreeMap<&'a DependencyName, MergedDependency<'a>> = BTreeMap::new();
    let mut seen: BTreeMap<&'a DependencyName, Vec<VersionRange>> = BTreeMap::new();

    for dependency in &project.dependencies {
        let range = dependency.requirement.range();
        debug!(
            "Normalized {} {} to {}",
            dependency.name, dependency.requirement, range
        );
        let earlier = seen.entry(&dependency.name).or_default();

        match merged.get_mut(&dependency.name) {
            None => {
                merged.insert(
                    &dependency.name,
                    MergedDependency {
                        primary: dependency,
                        requirements: vec![&dependency.requirement],
                        range: range.clone(),
                        floors: dependency.platforms.clone(),
                        reproducible: dependency.requirement.is_reproducible(),
                        pinned: None,
                    },
                );
            }
            Some(existing) => {
                if existing.primary.locator != dependency.locator {
                    warn!(
                        "Dependency {} is declared with locators {} and {}, keeping the first",
                        dependency.name, existing.primary.locator, dependency.locator
                    );
                }
                match existing.range.intersect(&range) {
                    Some(intersection) => {
                        debug!(
                            "Merged requirements for {} into {}",
                            dependency.name, intersection
                        );
                        existing.range = intersection;
                        existing.requirements.push(&dependency.requirement);
                        existing.floors.raise(&dependency.platforms);
                        existing.reproducible &= dependency.requirement.is_reproducible();
                    }
                    None => {
                        let first = earlier
                            .iter()
                            .find(|r| r.intersect(&range).is_none())
                            .cloned()
                            .unwrap_or_else(|| existing.range.clone());
                        return Err(ResolutionError::VersionConflict {
                            dependency: dependency.name.clone(),
                            first,
                            second: range,
                        });
                    }
                }
            }
        }
        earlier.push(range);
    }

    if let Some(pins) = pins {
        for (name, dependency) in merged.iter_mut() {
            let Some(pin) = pins.get(name) else {
                continue;
            };
            if let Some(version) = &pin.version {
                if !dependency.range.contains(version) {
                    return Err(ResolutionError::PinOutOfRange {
                        dependency: (*name).clone(),
                        pinned: version.clone(),
                        range: dependency.range.clone(),
                    });
                }
            }
            dependency.pinned = Some(pin.to_string());
        }
    }

    Ok(merged)
}
