use anyhow::Context;
use burn::backend::NdArray;
use burn::config::Config;
use burn::module::Module;
use burn::prelude::{Backend, Tensor};
use burn::tensor::{Distribution, TensorData};
use clap::Parser;
use clap::builder::PossibleValuesParser;
use serde_json::json;
use ssl_nets::smoothing::augment;
use ssl_nets::utility::record::{record_shape_summary, summary_param_count};
use ssl_nets::{
    ClassifierDispatcher, ClassifierHyperparameters, ClassifierMeta, ClassifierTask,
    DatasetStatistics, architecture_names, lookup_architecture,
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

type B = NdArray<f32>;

#[derive(Parser, Debug)]
#[command(author, version, about = "Build a registered classifier and run one batch through it", long_about = None)]
pub struct Args {
    /// Architecture name.
    #[arg(long, default_value = "resnet", value_parser = PossibleValuesParser::new(architecture_names()))]
    arch: String,

    /// Hyperparameter JSON file; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of downsampling stages.
    #[arg(long)]
    scales: Option<usize>,

    /// Base channel width.
    #[arg(long)]
    filters: Option<usize>,

    /// Residual blocks per stage.
    #[arg(long)]
    repeat: Option<usize>,

    /// Dropout probability before the classification head.
    #[arg(long)]
    dropout: Option<f64>,

    /// Run the stochastic layers.
    #[arg(long, default_value = "false")]
    training: bool,

    /// Number of classes.
    #[arg(long, default_value_t = 10)]
    num_classes: usize,

    /// Batch size.
    #[arg(short, long, default_value_t = 2)]
    batch_size: usize,

    /// Input height and width.
    #[arg(long, default_value_t = 32)]
    resolution: usize,

    /// Label smoothing factor.
    #[arg(long, default_value_t = 0.0)]
    smoothing: f64,

    /// Include the parameter record layout in the summary.
    #[arg(long, default_value = "false")]
    show_record: bool,

    /// Enable debug logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

impl Args {
    fn hparams(&self) -> anyhow::Result<ClassifierHyperparameters> {
        let mut hparams = match &self.config {
            Some(path) => ClassifierHyperparameters::load(path)
                .with_context(|| format!("loading hyperparameters from {}", path.display()))?,
            None => ClassifierHyperparameters::new(),
        };
        if let Some(scales) = self.scales {
            hparams.scales = scales;
        }
        if let Some(filters) = self.filters {
            hparams.filters = filters;
        }
        if let Some(repeat) = self.repeat {
            hparams.repeat = repeat;
        }
        if let Some(dropout) = self.dropout {
            hparams.dropout = dropout;
        }
        hparams.training |= self.training;
        Ok(hparams)
    }
}

fn one_hot_labels<B: Backend>(
    batch_size: usize,
    num_classes: usize,
    device: &B::Device,
) -> Tensor<B, 2> {
    let mut data = vec![0.0f32; batch_size * num_classes];
    for row in 0..batch_size {
        data[row * num_classes + row % num_classes] = 1.0;
    }
    Tensor::from_data(TensorData::new(data, [batch_size, num_classes]), device)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let hparams = args.hparams()?;
    let descriptor = lookup_architecture(&args.arch)?;
    let task = ClassifierTask::new(args.num_classes, DatasetStatistics::cifar10());
    tracing::info!(arch = descriptor.name, ?hparams, "building classifier");

    let device = Default::default();
    let mut dispatcher: ClassifierDispatcher<B> = ClassifierDispatcher::new(task, &device);

    let input: Tensor<B, 4> = Tensor::random(
        [args.batch_size, 3, args.resolution, args.resolution],
        Distribution::Normal(0.5, 0.25),
        &device,
    );
    let labels = one_hot_labels::<B>(args.batch_size, args.num_classes, &device);
    let (input, labels) = augment(input, labels, args.smoothing)?;

    let output = dispatcher.build(descriptor.name, input, &hparams)?;

    let classifier = dispatcher.store().classifier(ssl_nets::dispatch::DEFAULT_SCOPE)?;
    let record = record_shape_summary::<B, _>(classifier.clone().into_record())?;

    let mut summary = json!({
        "arch": descriptor.name,
        "description": descriptor.description,
        "hparams": hparams,
        "input_requirement": classifier.input_requirement().describe(),
        "num_classes": classifier.num_classes(),
        "embedding_dim": classifier.embedding_dim(),
        "num_params": classifier.num_params(),
        "record_params": summary_param_count(&record),
        "logits": output.logits.dims(),
        "embedding": output.embedding.dims(),
        "first_label": labels
            .slice([0..1])
            .into_data()
            .to_vec::<f32>()
            .map_err(|err| anyhow::anyhow!("{err:?}"))?,
    });
    if args.show_record {
        summary["record"] = record;
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
