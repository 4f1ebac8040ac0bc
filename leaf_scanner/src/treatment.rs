use leaf_prediction::LeafCategory;
use serde::Deserialize;
use std::{collections::HashMap, path::Path};
use thiserror::Error;

const EMBEDDED_TREATMENTS: &str = include_str!("../assets/treatments.yaml");

#[derive(Error, Debug)]
pub enum TreatmentError {
    #[error("failed to read treatments: {0}")]
    Config(#[from] config::ConfigError),
    #[error("unknown category in treatments: {0:?}")]
    UnknownCategory(String),
    #[error("duplicate treatment for {0}")]
    Duplicate(LeafCategory),
    #[error("{0} uses the healthy message, not a treatment entry")]
    HealthyTreatment(LeafCategory),
}

#[derive(Debug, Clone, Deserialize)]
pub struct VideoLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Treatment {
    category: String,
    pub title: String,
    pub heading: String,
    #[serde(default)]
    pub chemical: Vec<String>,
    #[serde(default)]
    pub organic: Vec<String>,
    #[serde(default)]
    pub video: Option<VideoLink>,
}

#[derive(Debug, Deserialize)]
struct TreatmentFile {
    healthy_message: String,
    #[serde(default)]
    treatments: Vec<Treatment>,
}

#[derive(Debug, Clone, Copy)]
pub enum Recommendation<'a> {
    Treatment(&'a Treatment),
    Healthy(&'a str),
}

/// Static recommendation text per category.
#[derive(Debug)]
pub struct TreatmentCatalog {
    healthy_message: String,
    treatments: HashMap<LeafCategory, Treatment>,
}

impl TreatmentCatalog {
    pub fn embedded() -> Result<Self, TreatmentError> {
        Self::from_yaml(EMBEDDED_TREATMENTS)
    }

    pub fn from_yaml(text: &str) -> Result<Self, TreatmentError> {
        let source = config::Config::builder()
            .add_source(config::File::from_str(text, config::FileFormat::Yaml))
            .build()?;
        Self::from_file(source.try_deserialize()?)
    }

    pub fn load(path: &Path) -> Result<Self, TreatmentError> {
        let source = config::Config::builder()
            .add_source(config::File::from(path).format(config::FileFormat::Yaml))
            .build()?;
        Self::from_file(source.try_deserialize()?)
    }

    fn from_file(file: TreatmentFile) -> Result<Self, TreatmentError> {
        let mut treatments = HashMap::new();
        for treatment in file.treatments {
            let category = LeafCategory::from_label(&treatment.category)
                .ok_or_else(|| TreatmentError::UnknownCategory(treatment.category.clone()))?;
            if category.is_healthy() {
                return Err(TreatmentError::HealthyTreatment(category));
            }
            if treatments.insert(category, treatment).is_some() {
                return Err(TreatmentError::Duplicate(category));
            }
        }

        Ok(Self {
            healthy_message: file.healthy_message,
            treatments,
        })
    }

    pub fn lookup(&self, category: LeafCategory) -> Option<Recommendation<'_>> {
        if category.is_healthy() {
            return Some(Recommendation::Healthy(&self.healthy_message));
        }
        self.treatments.get(&category).map(Recommendation::Treatment)
    }

    pub fn lookup_label(&self, label: &str) -> Option<Recommendation<'_>> {
        LeafCategory::from_label(label).and_then(|category| self.lookup(category))
    }
}
