use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};

use crate::model::{
    platform::{BuildConfiguration, Platform},
    version::VersionRange,
    ParseError,
};

use super::{DependencyName, Product, Resource, TargetKind};

/// Fully resolved output for one (platform, configuration) pair.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BuildPlan {
    pub project: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub default_localization: Option<String>,
    pub platform: Platform,
    pub configuration: BuildConfiguration,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub platform_floor: Option<Version>,
    #[serde(default)]
    pub metadata: PlanMetadata,
    #[serde(default)]
    pub dependencies: Vec<ResolvedDependency>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub targets: Vec<TargetPlan>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlanMetadata {
    /// Dependencies tracked by branch or revision rather than by version.
    #[serde(default)]
    pub non_reproducible: Vec<DependencyName>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolvedDependency {
    pub name: DependencyName,
    pub locator: String,
    /// One entry per declaration, in declaration order.
    pub requirements: Vec<String>,
    pub range: VersionRange,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub pinned: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetPlan {
    pub name: String,
    pub kind: TargetKind,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub header_search_paths: Vec<String>,
    #[serde(default)]
    pub dependencies: Vec<ResolvedEdge>,
    #[serde(default)]
    pub defines: Vec<ActiveDefine>,
    #[serde(default)]
    pub resources: Vec<Resource>,
}

impl TargetPlan {
    pub fn define(&self, name: &str) -> Option<&ActiveDefine> {
        self.defines.iter().find(|d| d.name == name)
    }

    pub fn links_product(&self, product: &str) -> bool {
        self.dependencies.iter().any(|edge| {
            matches!(edge, ResolvedEdge::Product { product: p, .. } if p == product)
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ResolvedEdge {
    Target {
        name: String,
    },
    Product {
        product: String,
        package: DependencyName,
        range: VersionRange,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveDefine {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub value: Option<String>,
}

const VERSION: i64 = 1;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
struct VersionedBuildPlan<'a> {
    pub version: i64,
    #[serde(flatten)]
    pub content: &'a BuildPlan,
}

impl BuildPlan {
    pub fn target(&self, name: &str) -> Option<&TargetPlan> {
        self.targets.iter().find(|t| t.name == name)
    }

    pub fn from_file(file: &Path) -> Result<BuildPlan, ParseError> {
        BuildPlan::from_str(&std::fs::read_to_string(file)?)
    }

    pub fn from_str(s: &str) -> Result<BuildPlan, ParseError> {
        let mut table = toml::from_str::<toml::Table>(s)?;
        match table.remove("version") {
            Some(toml::Value::Integer(VERSION)) => {
                table.try_into::<BuildPlan>().map_err(Into::into)
            }
            Some(other) => Err(ParseError::UnsupportedVersion(other)),
            None => Err(ParseError::MissingVersion),
        }
    }

    pub fn to_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(&VersionedBuildPlan {
            version: VERSION,
            content: self,
        })
    }
}
