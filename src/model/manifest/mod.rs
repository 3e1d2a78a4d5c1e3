pub mod pins;
pub mod plan;

use std::{
    collections::{BTreeSet, HashSet},
    fmt::Display,
    path::Path,
    str::FromStr,
};

use log::{debug, error, warn};
use semver::Version;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use toml::{map::Map, Value};

use crate::model::{
    platform::{BuildConfiguration, Platform, PlatformCondition, PlatformFloors},
    version::{parse_version, Requirement},
    ParseError,
};

#[derive(Clone, Hash, Deserialize, Serialize, Debug, PartialEq, Eq, Ord, PartialOrd)]
pub struct DependencyName(String);

impl DependencyName {
    pub fn new(s: String) -> Self {
        DependencyName(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for DependencyName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for DependencyName {
    fn from(s: String) -> Self {
        DependencyName(s)
    }
}

impl From<&str> for DependencyName {
    fn from(s: &str) -> Self {
        DependencyName(s.to_string())
    }
}

/// An external package. `locator` is passed through untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub name: DependencyName,
    pub locator: String,
    pub requirement: Requirement,
    /// Products the package is known to expose. `None` accepts any product.
    pub products: Option<BTreeSet<String>>,
    /// The package's own minimum platform versions.
    pub platforms: PlatformFloors,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DependencyReference {
    /// A local target, or the product named like its package.
    ByName {
        name: String,
        condition: Option<PlatformCondition>,
    },
    Product {
        product: String,
        package: DependencyName,
        condition: Option<PlatformCondition>,
    },
}

impl DependencyReference {
    pub fn by_name(name: impl Into<String>) -> Self {
        DependencyReference::ByName {
            name: name.into(),
            condition: None,
        }
    }

    pub fn product(product: impl Into<String>, package: impl Into<DependencyName>) -> Self {
        DependencyReference::Product {
            product: product.into(),
            package: package.into(),
            condition: None,
        }
    }

    pub fn when(self, condition: PlatformCondition) -> Self {
        match self {
            DependencyReference::ByName { name, .. } => DependencyReference::ByName {
                name,
                condition: Some(condition),
            },
            DependencyReference::Product {
                product, package, ..
            } => DependencyReference::Product {
                product,
                package,
                condition: Some(condition),
            },
        }
    }

    pub fn condition(&self) -> Option<&PlatformCondition> {
        match self {
            DependencyReference::ByName { condition, .. } => condition.as_ref(),
            DependencyReference::Product { condition, .. } => condition.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceRule {
    Process,
    Copy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub path: String,
    pub rule: ResourceRule,
}

impl Resource {
    pub fn process(path: impl Into<String>) -> Self {
        Resource {
            path: path.into(),
            rule: ResourceRule::Process,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Define {
    pub name: String,
    pub value: Option<String>,
    pub configuration: Option<BuildConfiguration>,
    pub condition: Option<PlatformCondition>,
}

impl Define {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Define {
            name: name.into(),
            value: Some(value.into()),
            configuration: None,
            condition: None,
        }
    }

    pub fn only_in(self, configuration: BuildConfiguration) -> Self {
        Define {
            configuration: Some(configuration),
            ..self
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetKind {
    #[default]
    Regular,
    Test,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    pub kind: TargetKind,
    pub dependencies: Vec<DependencyReference>,
    pub exclude: Vec<String>,
    pub resources: Vec<Resource>,
    pub header_search_paths: Vec<String>,
    pub defines: Vec<Define>,
}

impl Target {
    pub fn new(name: impl Into<String>) -> Self {
        Target {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductKind {
    #[default]
    Library,
    Executable,
}

impl FromStr for ProductKind {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "library" => Ok(ProductKind::Library),
            "executable" => Ok(ProductKind::Executable),
            _ => Err(ParseError::UnknownProductKind(value.to_string())),
        }
    }
}

/// Something the project itself exports, built from its own targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub name: String,
    pub kind: ProductKind,
    pub targets: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Project {
    pub name: String,
    pub default_localization: Option<String>,
    pub platforms: PlatformFloors,
    pub products: Vec<Product>,
    pub dependencies: Vec<Dependency>,
    pub targets: Vec<Target>,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        Project {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn target(&self, name: &str) -> Option<&Target> {
        self.targets.iter().find(|t| t.name == name)
    }

    /// All declarations of a dependency, in declaration order.
    pub fn declarations<'a>(
        &'a self,
        name: &'a DependencyName,
    ) -> impl Iterator<Item = &'a Dependency> + 'a {
        self.dependencies.iter().filter(move |d| &d.name == name)
    }

    pub fn from_file(path: &Path) -> Result<Project, ParseError> {
        debug!("Attempting to read project from manifest {}", path.display());
        let contents = std::fs::read_to_string(path)?;

        let project = Project::from_toml_str(&contents);
        if let Err(err) = &project {
            error!("Could not build a valid project from manifest {} due to err {err}", path.display())
        }
        project
    }

    pub fn from_toml_str(data: &str) -> Result<Project, ParseError> {
        let mut toml_value = toml::from_str::<Map<String, Value>>(data)?;

        let name = toml_value
            .remove("name")
            .ok_or_else(|| ParseError::MissingKey("name".to_string()))
            .and_then(|v| v.try_into::<String>().map_err(|e| e.into()))?;

        let default_localization = toml_value
            .remove("default_localization")
            .map(|v| v.try_into::<String>())
            .map_or(Ok(None), |v| v.map(Some))?;

        let platforms = match toml_value.remove("platforms") {
            Some(value) => parse_floors(&value)?,
            None => PlatformFloors::default(),
        };

        let products = table_array(toml_value.remove("products"))
            .iter()
            .map(parse_product)
            .collect::<Result<Vec<_>, _>>()?;

        let dependencies = table_array(toml_value.remove("dependencies"))
            .iter()
            .map(parse_dependency)
            .collect::<Result<Vec<_>, _>>()?;

        let mut targets = table_array(toml_value.remove("targets"))
            .iter()
            .map(|v| parse_target(v, TargetKind::Regular))
            .collect::<Result<Vec<_>, _>>()?;
        let test_targets = table_array(toml_value.remove("test_targets"))
            .iter()
            .map(|v| parse_target(v, TargetKind::Test))
            .collect::<Result<Vec<_>, _>>()?;
        targets.extend(test_targets);

        for key in toml_value.keys() {
            warn!("Ignoring unknown manifest key `{}`", key);
        }

        let mut seen = HashSet::new();
        if let Some(duplicate) = targets.iter().find(|t| !seen.insert(t.name.as_str())) {
            return Err(ParseError::DuplicateTarget(duplicate.name.clone()));
        }

        Ok(Project {
            name,
            default_localization,
            platforms,
            products,
            dependencies,
            targets,
        })
    }

    /// Folds another manifest into this one. Dependency declarations are appended as is,
    /// so a later resolution sees both and checks them against each other.
    pub fn merge(mut self, other: Project) -> Result<Project, ParseError> {
        debug!("Merging manifest {} into {}", other.name, self.name);
        self.platforms.extend_missing(other.platforms);
        if self.default_localization.is_none() {
            self.default_localization = other.default_localization;
        }
        for product in other.products {
            if !self.products.iter().any(|p| p.name == product.name) {
                self.products.push(product);
            }
        }
        self.dependencies.extend(other.dependencies);
        for target in other.targets {
            if self.target(&target.name).is_some() {
                return Err(ParseError::DuplicateTarget(target.name));
            }
            self.targets.push(target);
        }
        Ok(self)
    }

    pub fn into_toml(self) -> Value {
        let mut manifest = Map::new();
        manifest.insert("name".to_string(), Value::String(self.name));
        if let Some(localization) = self.default_localization {
            manifest.insert(
                "default_localization".to_string(),
                Value::String(localization),
            );
        }
        if !self.platforms.is_empty() {
            manifest.insert("platforms".to_string(), floors_to_toml(&self.platforms));
        }

        let products = self
            .products
            .into_iter()
            .map(|p| {
                let mut product = Map::new();
                product.insert("name".to_string(), Value::String(p.name));
                if p.kind != ProductKind::Library {
                    product.insert("kind".to_string(), Value::String("executable".to_string()));
                }
                product.insert("targets".to_string(), strings_to_toml(p.targets));
                Value::Table(product)
            })
            .collect::<Vec<_>>();
        if !products.is_empty() {
            manifest.insert("products".to_string(), Value::Array(products));
        }

        let dependencies = self
            .dependencies
            .into_iter()
            .map(dependency_to_toml)
            .collect::<Vec<_>>();
        if !dependencies.is_empty() {
            manifest.insert("dependencies".to_string(), Value::Array(dependencies));
        }

        let (targets, test_targets): (Vec<_>, Vec<_>) = self
            .targets
            .into_iter()
            .partition(|t| t.kind == TargetKind::Regular);
        for (key, targets) in [("targets", targets), ("test_targets", test_targets)] {
            if !targets.is_empty() {
                manifest.insert(
                    key.to_string(),
                    Value::Array(targets.into_iter().map(target_to_toml).collect()),
                );
            }
        }

        Value::Table(manifest)
    }
}

fn table_array(value: Option<Value>) -> Vec<Value> {
    match value {
        Some(Value::Array(values)) => values,
        Some(other) => vec![other],
        None => vec![],
    }
}

fn get_optional<T: DeserializeOwned>(value: &Value, key: &str) -> Result<Option<T>, ParseError> {
    value
        .get(key)
        .map(|v| v.clone().try_into::<T>())
        .map_or(Ok(None), |v| v.map(Some))
        .map_err(|e| e.into())
}

fn get_required<T: DeserializeOwned>(value: &Value, key: &str) -> Result<T, ParseError> {
    get_optional(value, key)?.ok_or_else(|| ParseError::MissingKey(key.to_string()))
}

fn parse_floors(value: &Value) -> Result<PlatformFloors, ParseError> {
    let table = value.clone().try_into::<Map<String, Value>>()?;
    let floors = table
        .into_iter()
        .map(|(platform, version)| -> Result<(Platform, Version), ParseError> {
            let platform = Platform::from_str(&platform)?;
            let version = parse_version(&version.try_into::<String>()?)?;
            Ok((platform, version))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(PlatformFloors::new(floors))
}

fn unknown_keys<'v>(value: &'v Value, known: &[&str]) -> Vec<&'v str> {
    value
        .as_table()
        .map(|table| {
            table
                .keys()
                .map(String::as_str)
                .filter(|key| !known.contains(key))
                .collect()
        })
        .unwrap_or_default()
}

fn warn_unknown_keys(value: &Value, context: &str, known: &[&str]) {
    for key in unknown_keys(value, known) {
        warn!("Ignoring unknown key `{}` in {}", key, context);
    }
}

fn parse_condition(value: &Value) -> Result<Option<PlatformCondition>, ParseError> {
    get_optional::<Vec<String>>(value, "platforms")?
        .map(|platforms| {
            platforms
                .iter()
                .map(|p| Platform::from_str(p))
                .collect::<Result<Vec<_>, _>>()
                .map(PlatformCondition::new)
        })
        .transpose()
}

fn parse_product(value: &Value) -> Result<Product, ParseError> {
    let kind = get_optional::<String>(value, "kind")?
        .map(|k| ProductKind::from_str(&k))
        .transpose()?
        .unwrap_or_default();
    Ok(Product {
        name: get_required(value, "name")?,
        kind,
        targets: get_optional(value, "targets")?.unwrap_or_default(),
    })
}

fn parse_dependency(value: &Value) -> Result<Dependency, ParseError> {
    let name: String = get_required(value, "name")?;
    let locator = get_required(value, "url")?;

    let version = |key: &str| -> Result<Option<Version>, ParseError> {
        get_optional::<String>(value, key)?
            .map(|v| parse_version(&v))
            .transpose()
    };

    let mut requirements = Vec::new();
    if let Some(v) = version("exact")? {
        requirements.push(Requirement::Exact(v));
    }
    if let Some(v) = version("up_to_next_major")? {
        requirements.push(Requirement::UpToNextMajor(v));
    }
    if let Some(v) = version("up_to_next_minor")? {
        requirements.push(Requirement::UpToNextMinor(v));
    }
    if let Some(range) = value.get("range") {
        let from = parse_version(&get_required::<String>(range, "from")?)?;
        let to = parse_version(&get_required::<String>(range, "to")?)?;
        if to <= from {
            return Err(ParseError::InvalidRange(format!("{}..<{}", from, to)));
        }
        requirements.push(Requirement::Range { from, to });
    }
    if let Some(branch) = get_optional::<String>(value, "branch")? {
        requirements.push(Requirement::Branch(branch));
    }
    if let Some(revision) = get_optional::<String>(value, "revision")? {
        requirements.push(Requirement::Revision(revision));
    }
    if requirements.len() != 1 {
        return Err(ParseError::AmbiguousRequirement(name, requirements.len()));
    }
    let requirement = requirements.remove(0);

    let products = get_optional::<BTreeSet<String>>(value, "products")?;
    let platforms = match value.get("platforms") {
        Some(floors) => parse_floors(floors)?,
        None => PlatformFloors::default(),
    };

    Ok(Dependency {
        name: DependencyName::new(name),
        locator,
        requirement,
        products,
        platforms,
    })
}

fn parse_target(value: &Value, kind: TargetKind) -> Result<Target, ParseError> {
    let name: String = get_required(value, "name")?;
    warn_unknown_keys(
        value,
        &format!("target `{}`", name),
        &[
            "name",
            "dependencies",
            "exclude",
            "resources",
            "header_search_paths",
            "defines",
        ],
    );

    let dependencies = get_optional::<Vec<Value>>(value, "dependencies")?
        .unwrap_or_default()
        .iter()
        .map(|v| parse_reference(&name, v))
        .collect::<Result<Vec<_>, _>>()?;

    let resources = get_optional::<Vec<Value>>(value, "resources")?
        .unwrap_or_default()
        .iter()
        .map(parse_resource)
        .collect::<Result<Vec<_>, _>>()?;

    let defines = get_optional::<Vec<Value>>(value, "defines")?
        .unwrap_or_default()
        .iter()
        .map(parse_define)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Target {
        kind,
        dependencies,
        exclude: get_optional(value, "exclude")?.unwrap_or_default(),
        resources,
        header_search_paths: get_optional(value, "header_search_paths")?.unwrap_or_default(),
        defines,
        name,
    })
}

fn parse_reference(target: &str, value: &Value) -> Result<DependencyReference, ParseError> {
    match value {
        Value::String(name) => Ok(DependencyReference::by_name(name.as_str())),
        Value::Table(_) => {
            warn_unknown_keys(
                value,
                &format!("a dependency of target `{}`", target),
                &["product", "package", "name", "platforms"],
            );
            let condition = parse_condition(value)?;
            let product = get_optional::<String>(value, "product")?;
            let package = get_optional::<String>(value, "package")?;
            let name = get_optional::<String>(value, "name")?;
            match (product, package, name) {
                (Some(product), Some(package), None) => Ok(DependencyReference::Product {
                    product,
                    package: DependencyName::new(package),
                    condition,
                }),
                (None, None, Some(name)) => Ok(DependencyReference::ByName { name, condition }),
                _ => Err(ParseError::InvalidReference(target.to_string())),
            }
        }
        _ => Err(ParseError::InvalidReference(target.to_string())),
    }
}

fn parse_resource(value: &Value) -> Result<Resource, ParseError> {
    match value {
        Value::String(path) => Ok(Resource::process(path.as_str())),
        Value::Table(table) if table.len() == 1 => {
            let (rule, path) = table.iter().next().ok_or_else(|| {
                ParseError::InvalidResourceRule(value.to_string())
            })?;
            let rule = match rule.as_str() {
                "process" => ResourceRule::Process,
                "copy" => ResourceRule::Copy,
                _ => return Err(ParseError::InvalidResourceRule(rule.clone())),
            };
            Ok(Resource {
                path: path.clone().try_into::<String>()?,
                rule,
            })
        }
        _ => Err(ParseError::InvalidResourceRule(value.to_string())),
    }
}

fn parse_define(value: &Value) -> Result<Define, ParseError> {
    if let Value::String(name) = value {
        return Ok(Define {
            name: name.clone(),
            value: None,
            configuration: None,
            condition: None,
        });
    }
    warn_unknown_keys(
        value,
        "a define",
        &["name", "value", "configuration", "platforms"],
    );
    Ok(Define {
        name: get_required(value, "name")?,
        value: get_optional(value, "value")?,
        configuration: get_optional::<String>(value, "configuration")?
            .map(|c| BuildConfiguration::from_str(&c))
            .transpose()?,
        condition: parse_condition(value)?,
    })
}

fn strings_to_toml(values: impl IntoIterator<Item = String>) -> Value {
    Value::Array(values.into_iter().map(Value::String).collect())
}

fn floors_to_toml(floors: &PlatformFloors) -> Value {
    let mut table = Map::new();
    for (platform, version) in floors.iter() {
        table.insert(platform.to_string(), Value::String(version.to_string()));
    }
    Value::Table(table)
}

fn condition_to_toml(table: &mut Map<String, Value>, condition: Option<PlatformCondition>) {
    if let Some(condition) = condition {
        table.insert(
            "platforms".to_string(),
            strings_to_toml(condition.platforms().map(|p| p.to_string())),
        );
    }
}

fn dependency_to_toml(d: Dependency) -> Value {
    let mut dependency = Map::new();
    dependency.insert("name".to_string(), Value::String(d.name.to_string()));
    dependency.insert("url".to_string(), Value::String(d.locator));
    match d.requirement {
        Requirement::Exact(v) => {
            dependency.insert("exact".to_string(), Value::String(v.to_string()));
        }
        Requirement::UpToNextMajor(v) => {
            dependency.insert("up_to_next_major".to_string(), Value::String(v.to_string()));
        }
        Requirement::UpToNextMinor(v) => {
            dependency.insert("up_to_next_minor".to_string(), Value::String(v.to_string()));
        }
        Requirement::Range { from, to } => {
            let mut range = Map::new();
            range.insert("from".to_string(), Value::String(from.to_string()));
            range.insert("to".to_string(), Value::String(to.to_string()));
            dependency.insert("range".to_string(), Value::Table(range));
        }
        Requirement::Branch(branch) => {
            dependency.insert("branch".to_string(), Value::String(branch));
        }
        Requirement::Revision(revision) => {
            dependency.insert("revision".to_string(), Value::String(revision));
        }
    }
    if let Some(products) = d.products {
        dependency.insert("products".to_string(), strings_to_toml(products));
    }
    if !d.platforms.is_empty() {
        dependency.insert("platforms".to_string(), floors_to_toml(&d.platforms));
    }
    Value::Table(dependency)
}

fn target_to_toml(t: Target) -> Value {
    let mut target = Map::new();
    target.insert("name".to_string(), Value::String(t.name));

    let dependencies = t
        .dependencies
        .into_iter()
        .map(|reference| match reference {
            DependencyReference::ByName {
                name,
                condition: None,
            } => Value::String(name),
            DependencyReference::ByName { name, condition } => {
                let mut table = Map::new();
                table.insert("name".to_string(), Value::String(name));
                condition_to_toml(&mut table, condition);
                Value::Table(table)
            }
            DependencyReference::Product {
                product,
                package,
                condition,
            } => {
                let mut table = Map::new();
                table.insert("product".to_string(), Value::String(product));
                table.insert("package".to_string(), Value::String(package.to_string()));
                condition_to_toml(&mut table, condition);
                Value::Table(table)
            }
        })
        .collect::<Vec<_>>();
    if !dependencies.is_empty() {
        target.insert("dependencies".to_string(), Value::Array(dependencies));
    }
    if !t.exclude.is_empty() {
        target.insert("exclude".to_string(), strings_to_toml(t.exclude));
    }
    if !t.resources.is_empty() {
        let resources = t
            .resources
            .into_iter()
            .map(|r| {
                let mut table = Map::new();
                let rule = match r.rule {
                    ResourceRule::Process => "process",
                    ResourceRule::Copy => "copy",
                };
                table.insert(rule.to_string(), Value::String(r.path));
                Value::Table(table)
            })
            .collect();
        target.insert("resources".to_string(), Value::Array(resources));
    }
    if !t.header_search_paths.is_empty() {
        target.insert(
            "header_search_paths".to_string(),
            strings_to_toml(t.header_search_paths),
        );
    }
    if !t.defines.is_empty() {
        let defines = t
            .defines
            .into_iter()
            .map(|d| {
                let mut table = Map::new();
                table.insert("name".to_string(), Value::String(d.name));
                if let Some(value) = d.value {
                    table.insert("value".to_string(), Value::String(value));
                }
                if let Some(configuration) = d.configuration {
                    table.insert(
                        "configuration".to_string(),
                        Value::String(configuration.to_string()),
                    );
                }
                condition_to_toml(&mut table, d.condition);
                Value::Table(table)
            })
            .collect();
        target.insert("defines".to_string(), Value::Array(defines));
    }
    Value::Table(target)
}
