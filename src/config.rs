// Run configuration.
//
// Everything has a default, so an absent config file and an empty one are
// equivalent. Example:
//
//     [classifier]
//     alpha = 0.01
//     stressors = ["varroa_mites", "pesticides"]
//
//     [report]
//     preview_rows = 8
use crate::error::{Error, Result};
use crate::types::Stressor;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// Settings for the group significance classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Significance level. A p-value strictly below it classifies as "reject".
    pub alpha: f64,

    /// Stressors to test, in output order.
    pub stressors: Vec<Stressor>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            alpha: 0.05,
            stressors: Stressor::ALL.to_vec(),
        }
    }
}

impl ClassifierConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.alpha > 0.0 && self.alpha < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "alpha must be in (0, 1), got {}",
                self.alpha
            )));
        }
        if self.stressors.is_empty() {
            return Err(Error::InvalidConfig("at least one stressor is required".into()));
        }
        let mut seen = HashSet::new();
        if let Some(dup) = self.stressors.iter().find(|s| !seen.insert(**s)) {
            return Err(Error::InvalidConfig(format!("stressor '{dup}' listed twice")));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Rows shown in each console preview table.
    pub preview_rows: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self { preview_rows: 4 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub classifier: ClassifierConfig,
    pub report: ReportConfig,
}

impl AppConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(s)?;
        config.classifier.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.classifier.alpha, 0.05);
        assert_eq!(config.classifier.stressors.len(), 6);
    }

    #[test]
    fn partial_file_overrides_only_named_fields() {
        let config = AppConfig::from_toml_str(
            "[classifier]\nstressors = [\"pesticides\", \"varroa_mites\"]\n",
        )
        .unwrap();
        assert_eq!(config.classifier.alpha, 0.05);
        assert_eq!(
            config.classifier.stressors,
            vec![Stressor::Pesticides, Stressor::VarroaMites]
        );
        assert_eq!(config.report.preview_rows, 4);
    }

    #[test]
    fn out_of_range_alpha_is_rejected() {
        for alpha in [0.0, 1.0, -0.5, 2.0] {
            let config = ClassifierConfig {
                alpha,
                ..Default::default()
            };
            assert!(config.validate().is_err(), "alpha {alpha}");
        }
    }

    #[test]
    fn duplicate_or_unknown_stressors_are_rejected() {
        let dup = ClassifierConfig {
            stressors: vec![Stressor::Other, Stressor::Other],
            ..Default::default()
        };
        assert!(dup.validate().is_err());
        assert!(AppConfig::from_toml_str("[classifier]\nstressors = [\"weather\"]\n").is_err());
    }
}
