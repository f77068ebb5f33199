//! ICLabel Application
//!
//! Command-line entry point for classifying ICA components of EEG
//! recordings.
//!
//! # Usage
//!
//! ```bash
//! # Classify the components described in a JSON file
//! iclabel classify --weights iclabel.safetensors --input decomposition.json
//!
//! # Write the report to a file instead of stdout
//! iclabel classify --weights iclabel.safetensors --input decomposition.json --output labels.json
//!
//! # List the tensors of a parameter file
//! iclabel inspect --weights iclabel.safetensors
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use ndarray::{Array2, Array3};
use serde::Deserialize;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use iclabel_core::SensorPosition;
use iclabel_native::{
    Activations, Classifier, FeatureConfig, FeatureExtractor, IcLabelNet, IcaDecomposition,
    NetworkParameters,
};

/// ICLabel Application
#[derive(Parser, Debug)]
#[command(name = "iclabel")]
#[command(author, version, about = "Classify ICA components of EEG recordings", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Classify every component of a decomposition
    Classify {
        /// Network parameters (safetensors)
        #[arg(short, long)]
        weights: PathBuf,

        /// Decomposition description (JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show the tensors of a parameter file
    Inspect {
        /// Network parameters (safetensors)
        #[arg(short, long)]
        weights: PathBuf,
    },
}

/// Activations or sensor data, epoched or continuous.
#[derive(Deserialize, Debug)]
#[serde(untagged)]
enum Signal {
    /// rows × epochs × samples
    Epoched(Vec<Vec<Vec<f64>>>),
    /// rows × samples
    Continuous(Vec<Vec<f64>>),
}

/// Input file for `classify`.
#[derive(Deserialize, Debug)]
struct DecompositionFile {
    #[serde(flatten)]
    config: FeatureConfig,
    /// One `[x, y, z]` per channel
    positions: Vec<[f64; 3]>,
    /// components × channels
    #[serde(default)]
    unmixing: Option<Vec<Vec<f64>>>,
    /// channels × components
    #[serde(default)]
    mixing: Option<Vec<Vec<f64>>>,
    /// Component activations
    #[serde(default)]
    activations: Option<Signal>,
    /// Sensor data, projected through the unmixing matrix
    #[serde(default)]
    data: Option<Signal>,
}

impl DecompositionFile {
    fn decomposition(&self) -> anyhow::Result<IcaDecomposition> {
        let ica = match (&self.unmixing, &self.mixing) {
            (Some(unmixing), Some(mixing)) => {
                IcaDecomposition::new(to_array2(unmixing, "unmixing")?, to_array2(mixing, "mixing")?)?
            }
            (Some(unmixing), None) => IcaDecomposition::from_unmixing(to_array2(unmixing, "unmixing")?)?,
            (None, Some(mixing)) => IcaDecomposition::from_mixing(to_array2(mixing, "mixing")?)?,
            (None, None) => bail!("input needs an unmixing or a mixing matrix"),
        };
        Ok(ica)
    }

    fn activations(&self, ica: &IcaDecomposition) -> anyhow::Result<Activations> {
        let activations = match (&self.activations, &self.data) {
            (Some(Signal::Epoched(rows)), _) => Activations::epoched(to_array3(rows, "activations")?)?,
            (Some(Signal::Continuous(rows)), _) => Activations::continuous(to_array2(rows, "activations")?)?,
            (None, Some(Signal::Epoched(rows))) => ica.epoched_sources(&to_array3(rows, "data")?)?,
            (None, Some(Signal::Continuous(rows))) => ica.sources(&to_array2(rows, "data")?)?,
            (None, None) => bail!("input needs activations or sensor data"),
        };
        Ok(activations)
    }
}

fn to_array2(rows: &[Vec<f64>], name: &str) -> anyhow::Result<Array2<f64>> {
    let cols = rows.first().map_or(0, Vec::len);
    if rows.iter().any(|row| row.len() != cols) {
        bail!("{name}: rows have different lengths");
    }
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), cols), flat).with_context(|| format!("{name}: invalid shape"))
}

fn to_array3(rows: &[Vec<Vec<f64>>], name: &str) -> anyhow::Result<Array3<f64>> {
    let epochs = rows.first().map_or(0, Vec::len);
    let samples = rows.first().and_then(|r| r.first()).map_or(0, Vec::len);
    if rows
        .iter()
        .any(|row| row.len() != epochs || row.iter().any(|epoch| epoch.len() != samples))
    {
        bail!("{name}: epochs have different lengths");
    }
    let flat: Vec<f64> = rows.iter().flatten().flatten().copied().collect();
    Array3::from_shape_vec((rows.len(), epochs, samples), flat).with_context(|| format!("{name}: invalid shape"))
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("ICLabel v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Classify { weights, input, output } => classify(&weights, &input, output.as_deref()),
        Commands::Inspect { weights } => inspect(&weights),
    }
}

/// Classify the components described by `input`
fn classify(weights: &Path, input: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let classifier =
        Classifier::from_file(weights).with_context(|| format!("loading weights from {}", weights.display()))?;

    let text = fs::read_to_string(input).with_context(|| format!("reading {}", input.display()))?;
    let file: DecompositionFile =
        serde_json::from_str(&text).with_context(|| format!("parsing {}", input.display()))?;

    let ica = file.decomposition()?;
    let activations = file.activations(&ica)?;
    let positions = file
        .positions
        .iter()
        .map(|&[x, y, z]| SensorPosition::new(x, y, z))
        .collect();
    let mut extractor = FeatureExtractor::from_positions(file.config.clone(), positions)?;

    info!(
        components = ica.n_components(),
        channels = ica.n_channels(),
        sample_rate_hz = file.config.sample_rate_hz,
        "Classifying components"
    );
    let report = classifier.label_components(&mut extractor, &ica, &activations)?;

    for (component, (label, probs)) in report.labels.iter().zip(&report.y_pred_proba).enumerate() {
        let best = probs.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        info!("IC{:03}: {} ({:.1}%)", component, label, best * 100.0);
    }

    let json = serde_json::to_string_pretty(&report)?;
    match output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
            info!("Report written to {}", path.display());
        }
        None => println!("{json}"),
    }

    Ok(())
}

/// Print the tensors of a parameter file and check them against the network
fn inspect(weights: &Path) -> anyhow::Result<()> {
    let params = NetworkParameters::load(weights)?;

    for (name, tensor) in params.iter() {
        println!("{name:32} {:?}", tensor.shape());
    }

    match IcLabelNet::from_parameters(&params) {
        Ok(net) => println!("OK: {} parameters", net.parameter_count()),
        Err(e) => bail!("parameter file does not match the network: {e}"),
    }

    Ok(())
}
