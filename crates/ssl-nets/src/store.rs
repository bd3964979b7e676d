//! # Parameter Store
//!
//! Classifier parameters are owned by a [`ParameterStore`], keyed by scope.
//! Building the same topology twice under one scope yields the same
//! parameters (e.g. a train-mode and an eval-mode pass, or the two
//! passes of a consistency loss), rather than two independent sets.
//!
//! [`Reuse`] makes the reuse decision explicit, and a [`ParameterGetter`]
//! selects which parameter set of a scope a forward pass reads:
//! the live weights, or a tagged shadow copy (for example exponential
//! moving average weights maintained by the training loop).

use crate::error::{ArchError, Result};
use crate::models::ClassifierMeta;
use crate::models::classifier::{Classifier, ClassifierConfig};
use burn::module::Module;
use burn::prelude::Backend;
use std::collections::BTreeMap;

/// Scope reuse policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Reuse {
    /// Reuse the scope if it exists, create it otherwise.
    #[default]
    Auto,

    /// The scope must already exist.
    Existing,

    /// The scope must not exist yet.
    Fresh,
}

struct ScopeEntry<B: Backend> {
    config: ClassifierConfig,
    live: Classifier<B>,
    shadows: BTreeMap<String, Classifier<B>>,
}

/// Owner of classifier parameters, keyed by scope.
pub struct ParameterStore<B: Backend> {
    device: B::Device,
    scopes: BTreeMap<String, ScopeEntry<B>>,
}

impl<B: Backend> std::fmt::Debug for ParameterStore<B> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ParameterStore")
            .field("device", &self.device)
            .field("scopes", &self.scopes.keys().collect::<Vec<_>>())
            .finish()
    }
}

fn same_config(
    a: &ClassifierConfig,
    b: &ClassifierConfig,
) -> bool {
    match (serde_json::to_value(a), serde_json::to_value(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

impl<B: Backend> ParameterStore<B> {
    /// Create an empty store; parameters are initialized on `device`.
    pub fn new(device: &B::Device) -> Self {
        Self {
            device: device.clone(),
            scopes: BTreeMap::new(),
        }
    }

    /// The parameter device.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// Number of scopes.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Whether the store has no scopes.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Whether a scope exists.
    pub fn contains(
        &self,
        scope: &str,
    ) -> bool {
        self.scopes.contains_key(scope)
    }

    /// The scope keys, in order.
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes.keys().map(String::as_str).collect()
    }

    fn entry(
        &self,
        scope: &str,
    ) -> Result<&ScopeEntry<B>> {
        self.scopes.get(scope).ok_or_else(|| ArchError::MissingScope {
            scope: scope.to_string(),
        })
    }

    fn entry_mut(
        &mut self,
        scope: &str,
    ) -> Result<&mut ScopeEntry<B>> {
        self.scopes
            .get_mut(scope)
            .ok_or_else(|| ArchError::MissingScope {
                scope: scope.to_string(),
            })
    }

    /// The config a scope was created with.
    pub fn config(
        &self,
        scope: &str,
    ) -> Result<&ClassifierConfig> {
        Ok(&self.entry(scope)?.config)
    }

    /// The live classifier of a scope.
    pub fn classifier(
        &self,
        scope: &str,
    ) -> Result<&Classifier<B>> {
        Ok(&self.entry(scope)?.live)
    }

    /// Resolve a scope under `reuse`, creating it from `config` if allowed.
    ///
    /// # Returns
    ///
    /// * [`ArchError::MissingScope`] for [`Reuse::Existing`] on an absent scope;
    /// * [`ArchError::ScopeConflict`] for [`Reuse::Fresh`] on an existing scope,
    ///   or when an existing scope was created from a different config.
    pub fn get_or_create(
        &mut self,
        scope: &str,
        config: &ClassifierConfig,
        reuse: Reuse,
    ) -> Result<&Classifier<B>> {
        match (self.scopes.contains_key(scope), reuse) {
            (true, Reuse::Fresh) => {
                return Err(ArchError::ScopeConflict {
                    scope: scope.to_string(),
                    reason: "scope already exists and fresh parameters were required".to_string(),
                });
            }
            (true, _) => {
                let entry = self.entry(scope)?;
                if !same_config(&entry.config, config) {
                    return Err(ArchError::ScopeConflict {
                        scope: scope.to_string(),
                        reason: "scope was created with a different classifier config".to_string(),
                    });
                }
            }
            (false, Reuse::Existing) => {
                return Err(ArchError::MissingScope {
                    scope: scope.to_string(),
                });
            }
            (false, _) => {
                let live = config.try_init(&self.device)?;
                tracing::info!(
                    scope,
                    num_params = live.num_params(),
                    "created parameter scope"
                );
                self.scopes.insert(
                    scope.to_string(),
                    ScopeEntry {
                        config: config.clone(),
                        live,
                        shadows: BTreeMap::new(),
                    },
                );
            }
        }
        self.classifier(scope)
    }

    /// Replace the live parameters of a scope, returning the previous ones.
    ///
    /// Used by the training loop to write back optimizer updates.
    pub fn replace(
        &mut self,
        scope: &str,
        classifier: Classifier<B>,
    ) -> Result<Classifier<B>> {
        let entry = self.entry_mut(scope)?;
        check_compatible(scope, &entry.live, &classifier)?;
        Ok(std::mem::replace(&mut entry.live, classifier))
    }

    /// Install (or overwrite) a tagged shadow parameter set for a scope.
    pub fn install_shadow(
        &mut self,
        scope: &str,
        tag: &str,
        classifier: Classifier<B>,
    ) -> Result<()> {
        let entry = self.entry_mut(scope)?;
        check_compatible(scope, &entry.live, &classifier)?;
        entry.shadows.insert(tag.to_string(), classifier);
        Ok(())
    }

    /// Seed a tagged shadow parameter set with a copy of the live parameters.
    pub fn fork_shadow(
        &mut self,
        scope: &str,
        tag: &str,
    ) -> Result<()> {
        let entry = self.entry_mut(scope)?;
        let copy = entry.live.clone();
        entry.shadows.insert(tag.to_string(), copy);
        Ok(())
    }

    /// A tagged shadow parameter set, if installed.
    pub fn shadow(
        &self,
        scope: &str,
        tag: &str,
    ) -> Result<Option<&Classifier<B>>> {
        Ok(self.entry(scope)?.shadows.get(tag))
    }

    /// The shadow tags of a scope.
    pub fn shadow_tags(
        &self,
        scope: &str,
    ) -> Result<Vec<&str>> {
        Ok(self
            .entry(scope)?
            .shadows
            .keys()
            .map(String::as_str)
            .collect())
    }

    /// Drop a scope and all of its parameter sets.
    pub fn remove(
        &mut self,
        scope: &str,
    ) -> Result<Classifier<B>> {
        self.scopes
            .remove(scope)
            .map(|entry| entry.live)
            .ok_or_else(|| ArchError::MissingScope {
                scope: scope.to_string(),
            })
    }
}

fn check_compatible<B: Backend>(
    scope: &str,
    live: &Classifier<B>,
    other: &Classifier<B>,
) -> Result<()> {
    let compatible = std::mem::discriminant(live) == std::mem::discriminant(other)
        && live.num_classes() == other.num_classes()
        && live.embedding_dim() == other.embedding_dim()
        && live.input_requirement() == other.input_requirement()
        && live.num_params() == other.num_params();
    if compatible {
        Ok(())
    } else {
        Err(ArchError::ScopeConflict {
            scope: scope.to_string(),
            reason: "parameters do not match the scope's classifier structure".to_string(),
        })
    }
}

/// Selects which parameter set of a scope a forward pass reads.
///
/// Topology code is unaffected by the choice.
pub trait ParameterGetter<B: Backend> {
    /// Resolve the classifier for a scope.
    fn resolve<'a>(
        &self,
        store: &'a ParameterStore<B>,
        scope: &str,
    ) -> Result<&'a Classifier<B>>;
}

/// Reads the live (trained) parameters.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveParameters;

impl<B: Backend> ParameterGetter<B> for LiveParameters {
    fn resolve<'a>(
        &self,
        store: &'a ParameterStore<B>,
        scope: &str,
    ) -> Result<&'a Classifier<B>> {
        store.classifier(scope)
    }
}

/// Reads a tagged shadow parameter set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShadowParameters {
    /// The shadow tag, e.g. ``"ema"``.
    pub tag: String,
}

impl ShadowParameters {
    /// Create a getter for `tag`.
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }
}

impl<B: Backend> ParameterGetter<B> for ShadowParameters {
    fn resolve<'a>(
        &self,
        store: &'a ParameterStore<B>,
        scope: &str,
    ) -> Result<&'a Classifier<B>> {
        store
            .shadow(scope, &self.tag)?
            .ok_or_else(|| ArchError::ScopeConflict {
                scope: scope.to_string(),
                reason: format!("no shadow parameters tagged {:?}", self.tag),
            })
    }
}
