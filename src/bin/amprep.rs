//! amprep - amplicon preprocessing CLI
//!
//! Command-line interface for filtering, decontaminating and rarefying
//! amplicon count tables.

use amplicon_prep::data::{CountMatrix, Dataset, DatasetPaths};
use amplicon_prep::decontam::detect_contaminants;
use amplicon_prep::error::{PrepError, Result};
use amplicon_prep::filter::SampleSelector;
use amplicon_prep::pipeline::{
    write_outputs, Pipeline, PipelineConfig, PipelineStep, DEFAULT_CONTAMINANT_THRESHOLD,
    DEFAULT_SEED,
};
use amplicon_prep::profile::{profile_library_size, profile_sparsity};
use amplicon_prep::rarefy::rarefaction_curve;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;
use std::path::PathBuf;

/// Output format for profiles.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum ProfileFormat {
    Text,
    Json,
}

/// Amplicon preprocessing: filtering, decontamination and rarefaction
#[derive(Parser)]
#[command(name = "amprep")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// The input tables of a dataset.
#[derive(Args)]
struct InputArgs {
    /// Count matrix (taxa x samples; .csv is comma-delimited, anything else tab)
    #[arg(short = 'c', long)]
    counts: PathBuf,

    /// Taxonomy table (taxon ID then Domain..Species)
    #[arg(short = 't', long)]
    taxonomy: PathBuf,

    /// Sample metadata
    #[arg(short, long)]
    metadata: PathBuf,

    /// Newick tree whose tips are taxon IDs
    #[arg(long)]
    tree: Option<PathBuf>,
}

impl InputArgs {
    fn load(&self) -> Result<Dataset> {
        Dataset::load(&DatasetPaths {
            counts: self.counts.clone(),
            taxonomy: self.taxonomy.clone(),
            metadata: self.metadata.clone(),
            tree: self.tree.clone(),
        })
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Run a pipeline from a YAML configuration file
    Run {
        /// Path to pipeline configuration YAML
        #[arg(long)]
        config: PathBuf,

        #[command(flatten)]
        input: InputArgs,

        /// Directory for result tables and summary.json
        #[arg(short, long)]
        outdir: PathBuf,
    },

    /// Flag contaminants using negative-control samples
    Decontam {
        #[command(flatten)]
        input: InputArgs,

        /// Metadata column identifying controls
        #[arg(long)]
        control_column: String,

        /// Value of `control_column` marking a control sample
        #[arg(long)]
        control_value: String,

        /// Disproportion threshold (0 to 1)
        #[arg(long, default_value_t = DEFAULT_CONTAMINANT_THRESHOLD)]
        threshold: f64,

        /// Output path for the contaminant table (CSV)
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Rarefy every sample to the same depth
    Rarefy {
        #[command(flatten)]
        input: InputArgs,

        /// Target depth (default: the smallest non-empty library size)
        #[arg(long)]
        depth: Option<u64>,

        /// Random seed
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Directory for result tables and summary.json
        #[arg(short, long)]
        outdir: PathBuf,
    },

    /// Profile a count matrix
    Profile {
        /// Path to count matrix
        #[arg(short = 'c', long)]
        counts: PathBuf,

        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: ProfileFormat,
    },

    /// Compute rarefaction curves (observed taxa per depth)
    Curve {
        #[command(flatten)]
        input: InputArgs,

        /// Comma-separated depths
        #[arg(long, value_delimiter = ',', required = true)]
        depths: Vec<u64>,

        /// Random seed
        #[arg(long, default_value_t = DEFAULT_SEED)]
        seed: u64,

        /// Output path for the curve table (CSV)
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            config,
            input,
            outdir,
        } => cmd_run(&config, &input, &outdir),

        Commands::Decontam {
            input,
            control_column,
            control_value,
            threshold,
            output,
        } => cmd_decontam(&input, &control_column, &control_value, threshold, &output),

        Commands::Rarefy {
            input,
            depth,
            seed,
            outdir,
        } => cmd_rarefy(&input, depth, seed, &outdir),

        Commands::Profile { counts, format } => cmd_profile(&counts, format),

        Commands::Curve {
            input,
            depths,
            seed,
            output,
        } => cmd_curve(&input, &depths, seed, &output),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Run a pipeline from configuration
fn cmd_run(config_path: &PathBuf, input: &InputArgs, outdir: &PathBuf) -> Result<()> {
    info!("Loading pipeline configuration from {:?}", config_path);
    let config = PipelineConfig::from_file(config_path)?;
    let dataset = input.load()?;

    let output = Pipeline::from_config(&config).run(&dataset)?;
    let summary = write_outputs(&output, outdir)?;

    println!(
        "Pipeline '{}': {} taxa x {} samples, {} reads",
        summary.pipeline, summary.n_taxa, summary.n_samples, summary.total_reads
    );
    for report in &output.reports {
        println!("  {}", report);
    }
    for warning in &output.warnings {
        println!("  warning: {}", warning);
    }
    Ok(())
}

/// Detect contaminants and write the comparison table
fn cmd_decontam(
    input: &InputArgs,
    control_column: &str,
    control_value: &str,
    threshold: f64,
    output_path: &PathBuf,
) -> Result<()> {
    let dataset = input.load()?;
    let selector = SampleSelector::column_equals(control_column, control_value);
    let report = detect_contaminants(&dataset, &selector, threshold)?;
    report.to_csv(output_path)?;
    print!("{}", report);
    Ok(())
}

/// Rarefy and write the rarefied tables
fn cmd_rarefy(input: &InputArgs, depth: Option<u64>, seed: u64, outdir: &PathBuf) -> Result<()> {
    let dataset = input.load()?;
    let output = Pipeline::new()
        .name("rarefy")
        .step(PipelineStep::Rarefy { depth, seed })
        .run(&dataset)?;
    let summary = write_outputs(&output, outdir)?;

    println!(
        "Rarefied to {} reads: {} taxa x {} samples",
        summary.rarefaction_depth.unwrap_or_default(),
        summary.n_taxa,
        summary.n_samples
    );
    for warning in &output.warnings {
        println!("  warning: {}", warning);
    }
    Ok(())
}

/// Profile a count matrix
fn cmd_profile(counts_path: &PathBuf, format: ProfileFormat) -> Result<()> {
    info!("Loading count matrix from {:?}", counts_path);
    let counts = CountMatrix::from_path(counts_path)?;

    let sparsity = profile_sparsity(&counts);
    let lib_size = profile_library_size(&counts);

    match format {
        ProfileFormat::Json => {
            let profile = serde_json::json!({
                "dimensions": {
                    "n_taxa": counts.n_taxa(),
                    "n_samples": counts.n_samples(),
                    "total_reads": counts.total()
                },
                "sparsity": sparsity,
                "library_size": lib_size
            });
            println!(
                "{}",
                serde_json::to_string_pretty(&profile).map_err(PrepError::from)?
            );
        }
        ProfileFormat::Text => {
            println!(
                "Dimensions: {} taxa x {} samples, {} reads\n",
                counts.n_taxa(),
                counts.n_samples(),
                counts.total()
            );
            println!("{}", sparsity);
            println!("{}", lib_size);
        }
    }
    Ok(())
}

/// Compute rarefaction curves
fn cmd_curve(input: &InputArgs, depths: &[u64], seed: u64, output_path: &PathBuf) -> Result<()> {
    let dataset = input.load()?;
    let curve = rarefaction_curve(&dataset, depths, seed)?;
    curve.to_csv(output_path)?;
    info!(
        "Wrote rarefaction curves for {} samples at {} depths to {:?}",
        curve.sample_ids.len(),
        curve.depths.len(),
        output_path
    );
    Ok(())
}
