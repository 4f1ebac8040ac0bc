use leaf_prediction::config::{
    deserialize_log_level, Environment, LogLevel, ModelConfig, ServerConfig, UploadConfig,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    #[serde(deserialize_with = "deserialize_log_level")]
    pub log_level: LogLevel,
    pub model: ModelConfig,
    #[serde(default)]
    pub upload: UploadConfig,
    #[serde(default)]
    pub treatments: TreatmentsConfig,
    #[serde(default)]
    pub page: PageConfig,
}

/// Without a file the catalog bundled in the binary is used.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct TreatmentsConfig {
    pub file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct PageConfig {
    pub background_image: Option<PathBuf>,
}

pub fn get_configuration() -> Result<Config, config::ConfigError> {
    let base_path = std::env::current_dir()
        .map_err(|e| config::ConfigError::Message(format!("no current directory: {}", e)))?;
    let environment = Environment::from_env().map_err(config::ConfigError::Message)?;

    load_configuration(&base_path.join("configuration"), &environment)
}

pub fn load_configuration(
    configuration_directory: &Path,
    environment: &Environment,
) -> Result<Config, config::ConfigError> {
    let config = config::Config::builder()
        .add_source(config::File::from(
            configuration_directory.join("base.yaml"),
        ))
        .add_source(
            config::File::from(
                configuration_directory.join(format!("{}.yaml", environment.as_str())),
            )
            .required(false),
        )
        .add_source(
            config::Environment::with_prefix("SCANNER")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()?;

    let config: Config = config.try_deserialize::<Config>()?;
    config
        .model
        .validate()
        .map_err(config::ConfigError::Message)?;

    Ok(config)
}
