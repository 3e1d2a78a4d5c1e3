use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use config::{Config, ConfigError, Environment, File};
use log::debug;
use serde::Deserialize;

use crate::model::platform::{BuildConfiguration, Platform};

const USER_CONFIG_FILE: &str = ".buildplan/config.toml";

pub struct BuildPlanConfig {
    pub platform: Option<Platform>,
    pub configuration: Option<BuildConfiguration>,
    pub output_dir: Option<PathBuf>,
}

impl BuildPlanConfig {
    pub fn load() -> anyhow::Result<Self> {
        let user_file = home::home_dir().map(|home| home.join(USER_CONFIG_FILE));
        let raw_config = RawConfig::load(user_file.as_deref(), None)?;

        Ok(Self {
            platform: raw_config.plan.platform,
            configuration: raw_config.plan.configuration,
            output_dir: raw_config.output.dir,
        })
    }
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct RawConfig {
    #[serde(default)]
    plan: PlanConfig,
    #[serde(default)]
    output: OutputConfig,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct PlanConfig {
    platform: Option<Platform>,
    configuration: Option<BuildConfiguration>,
}

#[derive(Default, Debug, Deserialize, PartialEq, Eq)]
struct OutputConfig {
    dir: Option<PathBuf>,
}

impl RawConfig {
    /// Environment variables take precedence over the user file.
    fn load(file: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            debug!("Looking for user configuration in {}", file.display());
            builder = builder.add_source(File::from(file).required(false));
        }
        builder
            .add_source(
                Environment::with_prefix("BUILDPLAN")
                    .separator("_")
                    .source(env),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;

    #[test]
    fn load_empty() {
        let env = HashMap::from([]);
        let config = RawConfig::load(None, Some(env)).unwrap();
        assert_eq!(config, RawConfig::default())
    }

    #[test]
    fn load_environment() {
        let env = HashMap::from([
            ("BUILDPLAN_PLAN_PLATFORM".to_owned(), "tvos".to_owned()),
            ("BUILDPLAN_PLAN_CONFIGURATION".to_owned(), "release".to_owned()),
            ("BUILDPLAN_OUTPUT_DIR".to_owned(), "/plans".to_owned()),
        ]);
        let config = RawConfig::load(None, Some(env)).unwrap();
        assert_eq!(
            config,
            RawConfig {
                plan: PlanConfig {
                    platform: Some(Platform::Tvos),
                    configuration: Some(BuildConfiguration::Release),
                },
                output: OutputConfig {
                    dir: Some("/plans".into())
                },
            }
        )
    }

    #[test]
    fn environment_overrides_user_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("config.toml");
        std::fs::write(
            &file,
            "[plan]\nplatform = \"ios\"\nconfiguration = \"debug\"\n",
        )
        .unwrap();
        let env = HashMap::from([("BUILDPLAN_PLAN_PLATFORM".to_owned(), "macos".to_owned())]);
        let config = RawConfig::load(Some(&file), Some(env)).unwrap();
        assert_eq!(
            config.plan,
            PlanConfig {
                platform: Some(Platform::Macos),
                configuration: Some(BuildConfiguration::Debug),
            }
        )
    }

    #[test]
    fn missing_user_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let config =
            RawConfig::load(Some(&dir.path().join("absent.toml")), Some(HashMap::new())).unwrap();
        assert_eq!(config, RawConfig::default())
    }
}
