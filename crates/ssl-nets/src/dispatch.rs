//! # Classifier Dispatch
//!
//! [`ClassifierDispatcher`] is the single entry point a training harness
//! uses: given an architecture name, an input batch, and the shared
//! hyperparameters, it selects the topology, binds it to a parameter scope,
//! and runs the forward pass.
//!
//! ```text
//! name -> registry -> config -> input check -> store scope -> forward
//! ```
//!
//! A rejected input never creates a parameter scope.

use crate::error::Result;
use crate::hparams::{ClassifierHyperparameters, ClassifierTask};
use crate::models::classifier::{Classifier, ClassifierConfig};
use crate::models::{ClassifierMeta, ClassifierOutput};
use crate::registry::lookup_architecture;
use crate::store::{LiveParameters, ParameterGetter, ParameterStore, Reuse};
use burn::prelude::{Backend, Tensor};

/// The scope used by [`ClassifierDispatcher::build`].
pub const DEFAULT_SCOPE: &str = "classify";

/// Convert a ``[batch, height, width, channels]`` batch to
/// ``[batch, channels, height, width]``.
pub fn nhwc_to_nchw<B: Backend>(input: Tensor<B, 4>) -> Tensor<B, 4> {
    input.permute([0, 3, 1, 2])
}

/// Selects, binds, and runs registered classifiers.
#[derive(Debug)]
pub struct ClassifierDispatcher<B: Backend> {
    task: ClassifierTask,
    store: ParameterStore<B>,
}

impl<B: Backend> ClassifierDispatcher<B> {
    /// Create a dispatcher with an empty parameter store.
    pub fn new(
        task: ClassifierTask,
        device: &B::Device,
    ) -> Self {
        Self {
            task,
            store: ParameterStore::new(device),
        }
    }

    /// The task classifiers are built against.
    pub fn task(&self) -> &ClassifierTask {
        &self.task
    }

    /// The parameter store.
    pub fn store(&self) -> &ParameterStore<B> {
        &self.store
    }

    /// The parameter store, for write-back and shadow installation.
    pub fn store_mut(&mut self) -> &mut ParameterStore<B> {
        &mut self.store
    }

    /// Build (or reuse) the named classifier under [`DEFAULT_SCOPE`] and run it.
    ///
    /// # Arguments
    ///
    /// - `name`: a registered architecture name.
    /// - `input`: ``[batch, channels, height, width]``.
    /// - `hparams`: the shared hyperparameters; `hparams.training` drives
    ///   the stochastic layers.
    ///
    /// # Returns
    ///
    /// ``logits: [batch, num_classes]``, ``embedding: [batch, embedding_dim]``.
    pub fn build(
        &mut self,
        name: &str,
        input: Tensor<B, 4>,
        hparams: &ClassifierHyperparameters,
    ) -> Result<ClassifierOutput<B>> {
        self.build_scoped(
            name,
            DEFAULT_SCOPE,
            Reuse::Auto,
            &LiveParameters,
            input,
            hparams,
        )
    }

    /// Select the named topology and configure it for the task.
    fn configure(
        &self,
        name: &str,
        hparams: &ClassifierHyperparameters,
    ) -> Result<ClassifierConfig> {
        hparams.validate()?;
        lookup_architecture(name)?.build_config(&self.task, hparams)
    }

    /// Resolve the named classifier in `scope` under `reuse`, without running it.
    #[tracing::instrument(skip(self, hparams))]
    pub fn bind(
        &mut self,
        name: &str,
        scope: &str,
        reuse: Reuse,
        hparams: &ClassifierHyperparameters,
    ) -> Result<&Classifier<B>> {
        let config = self.configure(name, hparams)?;
        self.store.get_or_create(scope, &config, reuse)
    }

    /// Build (or reuse) the named classifier in `scope`, and run the
    /// parameter set selected by `getter`.
    ///
    /// The input is checked against the topology's requirement before the
    /// scope is touched, and before any layer runs.
    #[tracing::instrument(skip(self, getter, input, hparams), fields(input = ?input.dims()))]
    pub fn build_scoped<G: ParameterGetter<B> + ?Sized>(
        &mut self,
        name: &str,
        scope: &str,
        reuse: Reuse,
        getter: &G,
        input: Tensor<B, 4>,
        hparams: &ClassifierHyperparameters,
    ) -> Result<ClassifierOutput<B>> {
        let config = self.configure(name, hparams)?;
        config.input_requirement().check(name, input.dims())?;
        self.store.get_or_create(scope, &config, reuse)?;

        let classifier = getter.resolve(&self.store, scope)?;
        classifier.check_input(name, &input)?;

        let output = classifier.forward(input, hparams.training);
        tracing::debug!(
            architecture = name,
            logits = ?output.logits.dims(),
            embedding = ?output.embedding.dims(),
            "classifier forward"
        );
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ArchError;
    use crate::layers::normalize::DatasetStatistics;
    use crate::store::ShadowParameters;
    use crate::testing::{TestBackend, tensor_values};
    use burn::tensor::{Distribution, TensorData};

    fn dispatcher() -> ClassifierDispatcher<TestBackend> {
        ClassifierDispatcher::new(
            ClassifierTask::new(5, DatasetStatistics::identity(2)),
            &Default::default(),
        )
    }

    #[test]
    fn test_nhwc_to_nchw() {
        let device = Default::default();
        let data: Vec<f32> = (0..12).map(|v| v as f32).collect();
        let nhwc: Tensor<TestBackend, 4> =
            Tensor::from_data(TensorData::new(data, [1, 2, 2, 3]), &device);

        let nchw = nhwc_to_nchw(nhwc);
        assert_eq!(nchw.dims(), [1, 3, 2, 2]);
        assert_eq!(
            tensor_values(nchw),
            vec![0.0, 3.0, 6.0, 9.0, 1.0, 4.0, 7.0, 10.0, 2.0, 5.0, 8.0, 11.0]
        );
    }

    #[test]
    fn test_repeated_build_shares_parameters() {
        let device = Default::default();
        let mut dispatcher = dispatcher();
        let hparams = ClassifierHyperparameters::new();
        let input: Tensor<TestBackend, 4> =
            Tensor::random([2, 2, 9, 9], Distribution::Default, &device);

        let first = dispatcher
            .build("squeezenetmini", input.clone(), &hparams)
            .unwrap();
        let second = dispatcher
            .build("squeezenetmini", input, &hparams)
            .unwrap();

        assert_eq!(first.logits.dims(), [2, 5]);
        assert_eq!(dispatcher.store().scopes(), vec![DEFAULT_SCOPE]);
        assert_eq!(tensor_values(first.logits), tensor_values(second.logits));
    }

    #[test]
    fn test_errors() {
        let device = Default::default();
        let mut dispatcher = dispatcher();
        let hparams = ClassifierHyperparameters::new();
        let input: Tensor<TestBackend, 4> =
            Tensor::random([1, 2, 9, 9], Distribution::Default, &device);

        assert!(matches!(
            dispatcher.build("vgg", input.clone(), &hparams),
            Err(ArchError::UnknownArchitecture { .. })
        ));
        assert!(dispatcher.store().is_empty());

        assert!(matches!(
            dispatcher.build("squeezenetmini", input.clone().slice([0..1, 0..1]), &hparams),
            Err(ArchError::ShapeMismatch { .. })
        ));
        assert!(dispatcher.store().is_empty());

        dispatcher
            .build("squeezenetmini", input.clone(), &hparams)
            .unwrap();
        assert_eq!(dispatcher.store().scopes(), vec![DEFAULT_SCOPE]);

        // A different topology under an existing scope.
        assert!(matches!(
            dispatcher.build("squeezenetmini1", input.clone(), &hparams),
            Err(ArchError::ScopeConflict { .. })
        ));

        assert!(matches!(
            dispatcher.build_scoped(
                "squeezenetmini",
                "other",
                Reuse::Existing,
                &LiveParameters,
                input.clone(),
                &hparams
            ),
            Err(ArchError::MissingScope { .. })
        ));

        assert!(matches!(
            dispatcher.build(
                "squeezenetmini",
                input,
                &ClassifierHyperparameters::new().with_dropout(1.0)
            ),
            Err(ArchError::InvalidHyperparameter {
                name: "dropout",
                ..
            })
        ));
    }

    #[test]
    fn test_shadow_getter() {
        let device = Default::default();
        let mut dispatcher = dispatcher();
        let hparams = ClassifierHyperparameters::new();
        let input: Tensor<TestBackend, 4> =
            Tensor::random([1, 2, 9, 9], Distribution::Default, &device);

        dispatcher
            .bind("squeezenetmini", DEFAULT_SCOPE, Reuse::Auto, &hparams)
            .unwrap();
        let config = dispatcher.store().config(DEFAULT_SCOPE).unwrap().clone();
        let ema: Classifier<TestBackend> = config.init(&device);
        dispatcher
            .store_mut()
            .install_shadow(DEFAULT_SCOPE, "ema", ema)
            .unwrap();

        let live = dispatcher
            .build("squeezenetmini", input.clone(), &hparams)
            .unwrap();
        let shadow = dispatcher
            .build_scoped(
                "squeezenetmini",
                DEFAULT_SCOPE,
                Reuse::Existing,
                &ShadowParameters::new("ema"),
                input,
                &hparams,
            )
            .unwrap();
        assert_ne!(
            tensor_values(live.embedding),
            tensor_values(shadow.embedding)
        );
    }
}
