//! # Classifier Hyperparameters
//!
//! [`ClassifierHyperparameters`] is the bundle shared by every registered
//! topology; each topology reads the fields it needs and ignores the rest.
//!
//! [`ClassifierTask`] carries the dataset-derived facts a classifier
//! is built against.

use crate::error::{ArchError, Result};
use crate::layers::normalize::DatasetStatistics;
use burn::config::Config;

/// Shared hyperparameter bundle.
#[derive(Config, Debug)]
pub struct ClassifierHyperparameters {
    /// Number of downsampling stages.
    #[config(default = 3)]
    pub scales: usize,

    /// Base channel width.
    #[config(default = 32)]
    pub filters: usize,

    /// Residual blocks per stage.
    #[config(default = 4)]
    pub repeat: usize,

    /// Dropout probability before the classification head.
    #[config(default = "0.0")]
    pub dropout: f64,

    /// Enables the stochastic layers (dropout, shake-shake mixing).
    #[config(default = "false")]
    pub training: bool,
}

impl Default for ClassifierHyperparameters {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassifierHyperparameters {
    /// Check the topology-independent ranges.
    pub fn validate(&self) -> Result<()> {
        if self.scales == 0 {
            return Err(ArchError::invalid_hyperparameter(
                "scales",
                self.scales,
                "scales >= 1",
            ));
        }
        if self.filters == 0 {
            return Err(ArchError::invalid_hyperparameter(
                "filters",
                self.filters,
                "filters >= 1",
            ));
        }
        if self.repeat == 0 {
            return Err(ArchError::invalid_hyperparameter(
                "repeat",
                self.repeat,
                "repeat >= 1",
            ));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(ArchError::invalid_hyperparameter(
                "dropout",
                self.dropout,
                "0.0 <= dropout < 1.0",
            ));
        }
        Ok(())
    }
}

/// Dataset-derived classifier facts.
#[derive(Config, Debug)]
pub struct ClassifierTask {
    /// Number of output classes.
    pub num_classes: usize,

    /// Per-channel input statistics.
    pub stats: DatasetStatistics,
}

impl ClassifierTask {
    /// Number of input channels, as fixed by the statistics.
    pub fn in_channels(&self) -> usize {
        self.stats.channels()
    }

    /// Check the task for consistency.
    pub fn validate(&self) -> Result<()> {
        if self.num_classes == 0 {
            return Err(ArchError::invalid_hyperparameter(
                "num_classes",
                self.num_classes,
                "num_classes >= 1",
            ));
        }
        self.stats.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let hparams = ClassifierHyperparameters::default();
        assert_eq!(hparams.scales, 3);
        assert_eq!(hparams.filters, 32);
        assert_eq!(hparams.repeat, 4);
        assert_eq!(hparams.dropout, 0.0);
        assert!(!hparams.training);
        assert!(hparams.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let err = ClassifierHyperparameters::new()
            .with_dropout(1.0)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ArchError::InvalidHyperparameter {
                name: "dropout",
                ..
            }
        ));

        let err = ClassifierHyperparameters::new()
            .with_scales(0)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ArchError::InvalidHyperparameter { name: "scales", .. }
        ));

        let err = ClassifierHyperparameters::new()
            .with_repeat(0)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ArchError::InvalidHyperparameter { name: "repeat", .. }
        ));
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hparams.json");

        let hparams = ClassifierHyperparameters::new()
            .with_filters(64)
            .with_dropout(0.25);
        hparams.save(&path).unwrap();

        let loaded = ClassifierHyperparameters::load(&path).unwrap();
        assert_eq!(loaded.filters, 64);
        assert_eq!(loaded.dropout, 0.25);
        assert_eq!(loaded.scales, 3);
    }

    #[test]
    fn test_task_validate() {
        let task = ClassifierTask::new(10, DatasetStatistics::identity(3));
        assert_eq!(task.in_channels(), 3);
        assert!(task.validate().is_ok());

        let err = ClassifierTask::new(0, DatasetStatistics::identity(3))
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            ArchError::InvalidHyperparameter {
                name: "num_classes",
                ..
            }
        ));
    }
}
