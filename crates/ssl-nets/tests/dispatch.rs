#[macro_use]
extern crate hamcrest;

use burn::backend::{Autodiff, NdArray};
use burn::prelude::Tensor;
use burn::tensor::Distribution;
use hamcrest::prelude::*;
use ssl_nets::dispatch::DEFAULT_SCOPE;
use ssl_nets::{
    ArchError, ClassifierDispatcher, ClassifierHyperparameters, ClassifierMeta, ClassifierTask,
    DatasetStatistics, LiveParameters, Reuse, ShadowParameters, architecture_names,
    lookup_architecture, nhwc_to_nchw,
};

type B = NdArray<f32>;

const NUM_CLASSES: usize = 7;

fn task() -> ClassifierTask {
    ClassifierTask::new(NUM_CLASSES, DatasetStatistics::cifar10())
}

fn small_hparams() -> ClassifierHyperparameters {
    ClassifierHyperparameters::new()
        .with_filters(4)
        .with_repeat(1)
}

fn expected_embedding(name: &str) -> usize {
    match name {
        "cnn13" => 4,
        "resnet" | "shake" => 4 << 2,
        "squeezenet" | "squeezenetcifar" => 512,
        "squeezenetmini" | "squeezenetmini1" => 256,
        other => panic!("unexpected architecture {other}"),
    }
}

#[test]
fn every_registered_name_builds() {
    let device = Default::default();
    let hparams = small_hparams();

    for name in architecture_names() {
        let mut dispatcher: ClassifierDispatcher<B> = ClassifierDispatcher::new(task(), &device);
        for batch in [1, 3] {
            let input: Tensor<B, 4> =
                Tensor::random([batch, 3, 32, 32], Distribution::Default, &device);
            let output = dispatcher.build(name, input, &hparams).unwrap();

            assert_that!(output.logits.dims(), is(equal_to([batch, NUM_CLASSES])));
            assert_that!(
                output.embedding.dims(),
                is(equal_to([batch, expected_embedding(name)]))
            );
        }

        let classifier = dispatcher.store().classifier(DEFAULT_SCOPE).unwrap();
        assert_that!(classifier.embedding_dim(), is(equal_to(expected_embedding(name))));
        assert_that!(classifier.num_classes(), is(equal_to(NUM_CLASSES)));
    }
}

#[test]
fn training_passes_keep_shapes() {
    let device = Default::default();
    let hparams = small_hparams().with_dropout(0.3).with_training(true);

    for name in architecture_names() {
        let mut dispatcher: ClassifierDispatcher<B> = ClassifierDispatcher::new(task(), &device);
        let input: Tensor<B, 4> = Tensor::random([2, 3, 32, 32], Distribution::Default, &device);
        let output = dispatcher.build(name, input, &hparams).unwrap();
        assert_that!(output.logits.dims(), is(equal_to([2, NUM_CLASSES])));
    }
}

#[test]
fn eval_logits_do_not_depend_on_batch_partners() {
    type AB = Autodiff<B>;
    let device = Default::default();
    let hparams = small_hparams();

    for name in ["cnn13", "resnet", "shake"] {
        let mut dispatcher: ClassifierDispatcher<AB> = ClassifierDispatcher::new(task(), &device);

        // Training passes move the running statistics.
        for _ in 0..2 {
            let batch: Tensor<AB, 4> =
                Tensor::random([4, 3, 32, 32], Distribution::Normal(0.5, 0.25), &device);
            dispatcher
                .build(name, batch, &hparams.clone().with_training(true))
                .unwrap();
        }

        let sample: Tensor<AB, 4> = Tensor::random([1, 3, 32, 32], Distribution::Default, &device);
        let mut eval_logits = |partners: Tensor<AB, 4>| {
            let batch = Tensor::cat(vec![sample.clone(), partners], 0);
            dispatcher
                .build(name, batch, &hparams)
                .unwrap()
                .logits
                .slice([0..1])
                .into_data()
                .to_vec::<f32>()
                .unwrap()
        };

        let a = eval_logits(Tensor::random([1, 3, 32, 32], Distribution::Default, &device));
        let b = eval_logits(Tensor::random(
            [3, 3, 32, 32],
            Distribution::Normal(-2.0, 3.0),
            &device,
        ));
        for (x, y) in a.iter().zip(b.iter()) {
            assert!((x - y).abs() < 1e-4, "{name}: {a:?} != {b:?}");
        }
    }
}

#[test]
fn nhwc_batches_are_accepted_after_conversion() {
    let device = Default::default();
    let mut dispatcher: ClassifierDispatcher<B> = ClassifierDispatcher::new(task(), &device);

    let nhwc: Tensor<B, 4> = Tensor::random([2, 32, 32, 3], Distribution::Default, &device);
    assert!(matches!(
        dispatcher.build("resnet", nhwc.clone(), &small_hparams()),
        Err(ArchError::ShapeMismatch { .. })
    ));
    assert!(dispatcher.store().is_empty());

    let output = dispatcher
        .build("resnet", nhwc_to_nchw(nhwc), &small_hparams())
        .unwrap();
    assert_that!(output.logits.dims(), is(equal_to([2, NUM_CLASSES])));
}

#[test]
fn unknown_names_list_the_registry() {
    let err = lookup_architecture("wideresnet").unwrap_err();
    let message = err.to_string();
    for name in architecture_names() {
        assert!(message.contains(name), "{message}");
    }
}

#[test]
fn cnn13_rejects_other_scales() {
    let device = Default::default();
    let mut dispatcher: ClassifierDispatcher<B> = ClassifierDispatcher::new(task(), &device);
    let input: Tensor<B, 4> = Tensor::random([1, 3, 32, 32], Distribution::Default, &device);

    let err = dispatcher
        .build("cnn13", input, &small_hparams().with_scales(4))
        .unwrap_err();
    assert!(matches!(
        err,
        ArchError::InvalidHyperparameter { name: "scales", .. }
    ));
}

#[test]
fn scopes_isolate_and_share_parameters() {
    let device = Default::default();
    let mut dispatcher: ClassifierDispatcher<B> = ClassifierDispatcher::new(task(), &device);
    let hparams = small_hparams();
    let input: Tensor<B, 4> = Tensor::random([2, 3, 32, 32], Distribution::Default, &device);

    let run = |dispatcher: &mut ClassifierDispatcher<B>, scope: &str, reuse: Reuse| {
        dispatcher
            .build_scoped(
                "shake",
                scope,
                reuse,
                &LiveParameters,
                input.clone(),
                &hparams,
            )
            .map(|output| output.embedding.into_data().to_vec::<f32>().unwrap())
    };

    let a = run(&mut dispatcher, "online", Reuse::Fresh).unwrap();
    let a_again = run(&mut dispatcher, "online", Reuse::Existing).unwrap();
    let b = run(&mut dispatcher, "target", Reuse::Auto).unwrap();

    assert_eq!(a, a_again);
    assert_ne!(a, b);
    assert_that!(
        dispatcher.store().scopes(),
        is(equal_to(vec!["online", "target"]))
    );

    assert!(matches!(
        run(&mut dispatcher, "online", Reuse::Fresh),
        Err(ArchError::ScopeConflict { .. })
    ));

    dispatcher.store_mut().fork_shadow("online", "ema").unwrap();
    let ema = dispatcher
        .build_scoped(
            "shake",
            "online",
            Reuse::Existing,
            &ShadowParameters::new("ema"),
            input.clone(),
            &hparams,
        )
        .unwrap()
        .embedding
        .into_data()
        .to_vec::<f32>()
        .unwrap();
    assert_eq!(ema, a);
}
