//! # Architecture Registry
//!
//! A closed, static table of named topologies. Each
//! [`ArchitectureDescriptor`] maps the shared
//! [`ClassifierHyperparameters`] (and the dataset-derived
//! [`ClassifierTask`]) to a [`ClassifierConfig`].
//!
//! Names are the stable, user-facing identifiers; they are what a command
//! line selector offers and what [`lookup_architecture`] accepts.

use crate::error::{ArchError, Result};
use crate::hparams::{ClassifierHyperparameters, ClassifierTask};
use crate::models::classifier::ClassifierConfig;
use crate::models::cnn13::Cnn13Config;
use crate::models::resnet::resnet_model::ResNetConfig;
use crate::models::shakenet::shakenet_model::ShakeNetConfig;
use crate::models::squeezenet::squeezenet_model::{SqueezeNetConfig, SqueezeNetVariant};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Registered topologies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Architecture {
    /// `CNN13`.
    Cnn13,

    /// Wide pre-activation `ResNet`.
    ResNet,

    /// Shake-Shake `ResNet`.
    Shake,

    /// `SqueezeNet`.
    SqueezeNet,

    /// `SqueezeNet` with stride 1 body pools.
    SqueezeNetCifar,

    /// Four-fire `SqueezeNet`.
    SqueezeNetMini,

    /// Four-fire `SqueezeNet` with a stride 1 stem.
    SqueezeNetMini1,
}

/// The architecture selected when none is given.
pub const DEFAULT_ARCHITECTURE: Architecture = Architecture::ResNet;

impl Architecture {
    /// All registered architectures, in registry order.
    pub const ALL: [Architecture; 7] = [
        Self::Cnn13,
        Self::ResNet,
        Self::Shake,
        Self::SqueezeNet,
        Self::SqueezeNetCifar,
        Self::SqueezeNetMini,
        Self::SqueezeNetMini1,
    ];

    /// The registry entry.
    pub fn descriptor(self) -> &'static ArchitectureDescriptor {
        &ARCHITECTURES[self as usize]
    }

    /// The registered name.
    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// Build the topology config.
    pub fn config(
        self,
        task: &ClassifierTask,
        hparams: &ClassifierHyperparameters,
    ) -> Result<ClassifierConfig> {
        self.descriptor().build_config(task, hparams)
    }
}

impl Display for Architecture {
    fn fmt(
        &self,
        f: &mut Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Architecture {
    type Err = ArchError;

    fn from_str(name: &str) -> Result<Self> {
        lookup_architecture(name).map(|descriptor| descriptor.architecture)
    }
}

/// Builds a topology config from the task and the shared hyperparameters.
pub type ConfigBuilder = fn(&ClassifierTask, &ClassifierHyperparameters) -> Result<ClassifierConfig>;

/// A registry entry.
#[derive(Debug)]
pub struct ArchitectureDescriptor {
    /// The architecture tag.
    pub architecture: Architecture,

    /// Unique registered name.
    pub name: &'static str,

    /// Short description.
    pub description: &'static str,

    /// Config builder.
    pub builder: ConfigBuilder,
}

impl ArchitectureDescriptor {
    /// Build the topology config.
    pub fn build_config(
        &self,
        task: &ClassifierTask,
        hparams: &ClassifierHyperparameters,
    ) -> Result<ClassifierConfig> {
        task.validate()?;
        (self.builder)(task, hparams)
    }
}

fn build_cnn13(
    task: &ClassifierTask,
    hparams: &ClassifierHyperparameters,
) -> Result<ClassifierConfig> {
    Ok(Cnn13Config::from_hparams(task, hparams)?.into())
}

fn build_resnet(
    task: &ClassifierTask,
    hparams: &ClassifierHyperparameters,
) -> Result<ClassifierConfig> {
    Ok(ResNetConfig::from_hparams(task, hparams)?.into())
}

fn build_shake(
    task: &ClassifierTask,
    hparams: &ClassifierHyperparameters,
) -> Result<ClassifierConfig> {
    Ok(ShakeNetConfig::from_hparams(task, hparams)?.into())
}

fn build_squeezenet(
    task: &ClassifierTask,
    hparams: &ClassifierHyperparameters,
) -> Result<ClassifierConfig> {
    Ok(SqueezeNetConfig::from_hparams(SqueezeNetVariant::Full, task, hparams)?.into())
}

fn build_squeezenet_cifar(
    task: &ClassifierTask,
    hparams: &ClassifierHyperparameters,
) -> Result<ClassifierConfig> {
    Ok(SqueezeNetConfig::from_hparams(SqueezeNetVariant::Cifar, task, hparams)?.into())
}

fn build_squeezenet_mini(
    task: &ClassifierTask,
    hparams: &ClassifierHyperparameters,
) -> Result<ClassifierConfig> {
    Ok(SqueezeNetConfig::from_hparams(SqueezeNetVariant::Mini, task, hparams)?.into())
}

fn build_squeezenet_mini1(
    task: &ClassifierTask,
    hparams: &ClassifierHyperparameters,
) -> Result<ClassifierConfig> {
    Ok(SqueezeNetConfig::from_hparams(SqueezeNetVariant::Mini1, task, hparams)?.into())
}

/// The registry, indexed by [`Architecture`] discriminant.
pub static ARCHITECTURES: [ArchitectureDescriptor; 7] = [
    ArchitectureDescriptor {
        architecture: Architecture::Cnn13,
        name: "cnn13",
        description: "13-layer convnet; 3 scales (32x32 inputs) only",
        builder: build_cnn13,
    },
    ArchitectureDescriptor {
        architecture: Architecture::ResNet,
        name: "resnet",
        description: "wide pre-activation ResNet",
        builder: build_resnet,
    },
    ArchitectureDescriptor {
        architecture: Architecture::Shake,
        name: "shake",
        description: "Shake-Shake regularized ResNet",
        builder: build_shake,
    },
    ArchitectureDescriptor {
        architecture: Architecture::SqueezeNet,
        name: "squeezenet",
        description: "SqueezeNet, eight fire modules, strided pools",
        builder: build_squeezenet,
    },
    ArchitectureDescriptor {
        architecture: Architecture::SqueezeNetCifar,
        name: "squeezenetcifar",
        description: "SqueezeNet, eight fire modules, stride 1 body pools",
        builder: build_squeezenet_cifar,
    },
    ArchitectureDescriptor {
        architecture: Architecture::SqueezeNetMini,
        name: "squeezenetmini",
        description: "SqueezeNet, four fire modules",
        builder: build_squeezenet_mini,
    },
    ArchitectureDescriptor {
        architecture: Architecture::SqueezeNetMini1,
        name: "squeezenetmini1",
        description: "SqueezeNet, four fire modules, stride 1 stem",
        builder: build_squeezenet_mini1,
    },
];

/// Every registered name, in registry order.
pub fn architecture_names() -> Vec<&'static str> {
    ARCHITECTURES.iter().map(|d| d.name).collect()
}

/// Find a registry entry by name.
///
/// # Returns
///
/// [`ArchError::UnknownArchitecture`] listing every name if there is no match.
pub fn lookup_architecture(name: &str) -> Result<&'static ArchitectureDescriptor> {
    ARCHITECTURES
        .iter()
        .find(|d| d.name == name)
        .ok_or_else(|| ArchError::UnknownArchitecture {
            name: name.to_string(),
            valid: architecture_names(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::normalize::DatasetStatistics;
    use crate::models::ClassifierMeta;
    use hamcrest::prelude::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_is_consistent() {
        assert_eq!(ARCHITECTURES.len(), Architecture::ALL.len());
        for (idx, arch) in Architecture::ALL.iter().enumerate() {
            assert_eq!(ARCHITECTURES[idx].architecture, *arch);
            assert_eq!(arch.descriptor().name, arch.name());
        }

        let names: HashSet<&str> = architecture_names().into_iter().collect();
        assert_eq!(names.len(), ARCHITECTURES.len());
        assert_that!(
            architecture_names(),
            is(equal_to(vec![
                "cnn13",
                "resnet",
                "shake",
                "squeezenet",
                "squeezenetcifar",
                "squeezenetmini",
                "squeezenetmini1",
            ]))
        );
    }

    #[test]
    fn test_name_round_trip() {
        for arch in Architecture::ALL {
            assert_eq!(arch.to_string().parse::<Architecture>().unwrap(), arch);
            let json = serde_json::to_string(&arch).unwrap();
            assert_eq!(json, format!("\"{}\"", arch.name()));
        }
        assert_eq!(DEFAULT_ARCHITECTURE.name(), "resnet");
    }

    #[test]
    fn test_unknown_architecture() {
        let err = "not-a-real-arch".parse::<Architecture>().unwrap_err();
        match &err {
            ArchError::UnknownArchitecture { name, valid } => {
                assert_eq!(name, "not-a-real-arch");
                assert_eq!(valid, &architecture_names());
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let message = err.to_string();
        for name in architecture_names() {
            assert_that!(message.contains(name), is(equal_to(true)));
        }

        assert!(lookup_architecture("ResNet").is_err());
    }

    #[test]
    fn test_every_builder_produces_a_config() {
        let task = ClassifierTask::new(10, DatasetStatistics::cifar10());
        let hparams = ClassifierHyperparameters::new().with_filters(8);

        for arch in Architecture::ALL {
            let config = arch.config(&task, &hparams).unwrap();
            assert_eq!(config.num_classes(), 10);
            assert_eq!(config.in_channels(), 3);
            let matches = matches!(
                (arch, &config),
                (Architecture::Cnn13, ClassifierConfig::Cnn13(_))
                    | (Architecture::ResNet, ClassifierConfig::ResNet(_))
                    | (Architecture::Shake, ClassifierConfig::Shake(_))
                    | (Architecture::SqueezeNet, ClassifierConfig::SqueezeNet(_))
                    | (Architecture::SqueezeNetCifar, ClassifierConfig::SqueezeNet(_))
                    | (Architecture::SqueezeNetMini, ClassifierConfig::SqueezeNet(_))
                    | (Architecture::SqueezeNetMini1, ClassifierConfig::SqueezeNet(_))
            );
            assert!(matches, "{arch}: {config:?}");
        }
    }

    #[test]
    fn test_builders_validate() {
        let bad_task = ClassifierTask::new(10, DatasetStatistics::new(vec![0.0], vec![0.0]));
        let hparams = ClassifierHyperparameters::new();
        for arch in Architecture::ALL {
            assert!(matches!(
                arch.config(&bad_task, &hparams),
                Err(ArchError::InvalidStatistics(_))
            ));
        }

        let task = ClassifierTask::new(10, DatasetStatistics::cifar10());
        let hparams = ClassifierHyperparameters::new().with_scales(2);
        assert!(Architecture::Cnn13.config(&task, &hparams).is_err());
        assert!(Architecture::ResNet.config(&task, &hparams).is_ok());
    }
}
