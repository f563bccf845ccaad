//! Agriplast CLI - agricultural plastics classification

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use agriplast_archive::LocalArchive;
use agriplast_core::io::{read_geotiff, write_geotiff, GeoTiffOptions};
use agriplast_core::Raster;
use agriplast_pipeline::input::read_point_csv_file;
use agriplast_pipeline::{
    BoundaryCatalog, ClassLabelMap, ClassifiedRaster, ClassifierTrainer, CompositeImage,
    CustomWorkflow, DateWindow, InferenceRequest, LabeledSource, PipelineCache, PipelineConfig,
    PretrainedWorkflow, RandomForestTrainer, TemporalCompositor, TrainedModel, TrainingSet,
    TrainingSetBuilder,
};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "agriplast")]
#[command(author, version, about = "Agricultural plastics classification", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pipeline configuration (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster file
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// List the scenes of an on-disk archive
    Scenes {
        /// Archive root directory
        archive: PathBuf,
    },
    /// List the boundaries available as inference regions
    Counties {
        #[command(flatten)]
        boundaries: BoundaryArgs,
    },
    /// Build a training set from point CSVs and train a model
    Train {
        /// Archive root directory
        #[arg(short, long)]
        archive: PathBuf,
        /// Labeled point CSV files (Type, Date, Longitude, Latitude)
        #[arg(long = "csv", required = true)]
        csv: Vec<PathBuf>,
        /// Number of trees
        #[arg(short = 'n', long)]
        forest_size: Option<usize>,
        /// Output model file (JSON)
        #[arg(short, long)]
        model: PathBuf,
        /// Also write the feature table as CSV
        #[arg(long)]
        table: Option<PathBuf>,
    },
    /// Train on point CSVs and classify a region
    Classify {
        /// Archive root directory
        #[arg(short, long)]
        archive: PathBuf,
        #[command(flatten)]
        boundaries: BoundaryArgs,
        /// Labeled point CSV files (Type, Date, Longitude, Latitude)
        #[arg(long = "csv", required = true)]
        csv: Vec<PathBuf>,
        /// Number of trees
        #[arg(short = 'n', long)]
        forest_size: Option<usize>,
        /// Save the trained model (JSON)
        #[arg(long)]
        model: Option<PathBuf>,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Classify a region with a previously saved model
    Predict {
        /// Model file written by `train` or `classify --model`
        #[arg(short, long)]
        model: PathBuf,
        /// Archive root directory
        #[arg(short, long)]
        archive: PathBuf,
        #[command(flatten)]
        boundaries: BoundaryArgs,
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Train on the bundled ground truth and classify a region
    Pretrained {
        /// Archive root directory
        #[arg(short, long)]
        archive: PathBuf,
        #[command(flatten)]
        boundaries: BoundaryArgs,
        /// Ground-truth directory (overrides the configured one)
        #[arg(long)]
        data_dir: Option<PathBuf>,
        /// Save the trained model (JSON)
        #[arg(long)]
        model: Option<PathBuf>,
        #[command(flatten)]
        target: TargetArgs,
    },
}

#[derive(Args)]
struct BoundaryArgs {
    /// Boundary FeatureCollection with a NAME property (GeoJSON)
    #[arg(short, long)]
    boundaries: PathBuf,
    /// Keep only features with this STATEFP
    #[arg(long)]
    state_fp: Option<String>,
}

#[derive(Args)]
struct TargetArgs {
    /// Region name (defaults to the configured county)
    #[arg(long)]
    county: Option<String>,
    /// First day of the inference window (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,
    /// Exclusive end of the window; defaults to the configured window length
    #[arg(long)]
    end: Option<NaiveDate>,
    /// Output classified raster
    #[arg(short, long)]
    output: PathBuf,
    /// Directory for the B4/B3/B2 composite bands
    #[arg(long)]
    rgb: Option<PathBuf>,
}

impl TargetArgs {
    fn request(&self) -> InferenceRequest {
        let mut dates = vec![self.start];
        dates.extend(self.end);
        InferenceRequest::new(self.county.clone(), dates)
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(p) => PipelineConfig::from_file(p)
            .with_context(|| format!("Failed to load config {}", p.display()))?,
        None => PipelineConfig::default(),
    };
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

fn open_archive(path: &Path) -> Result<LocalArchive> {
    let pb = spinner("Opening archive...");
    let archive = LocalArchive::open(path)
        .with_context(|| format!("Failed to open archive {}", path.display()))?;
    pb.finish_and_clear();
    info!("Archive: {} scenes", archive.catalog().len());
    Ok(archive)
}

fn load_boundaries(args: &BoundaryArgs) -> Result<BoundaryCatalog> {
    let catalog = BoundaryCatalog::from_geojson_file(&args.boundaries, args.state_fp.as_deref())
        .context("Failed to read boundaries")?;
    if catalog.is_empty() {
        anyhow::bail!("No named boundaries in {}", args.boundaries.display());
    }
    Ok(catalog)
}

fn read_sources(paths: &[PathBuf]) -> Result<Vec<LabeledSource>> {
    paths
        .iter()
        .map(|p| {
            read_point_csv_file(p)
                .map(LabeledSource::from)
                .with_context(|| format!("Failed to read {}", p.display()))
        })
        .collect()
}

fn write_raster(raster: &Raster<f64>, path: &Path) -> Result<()> {
    let options = GeoTiffOptions {
        nodata: Some(f64::NAN),
    };
    write_geotiff(raster, path, Some(options))
        .with_context(|| format!("Failed to write {}", path.display()))
}

fn write_outputs(
    classified: &ClassifiedRaster,
    composite: &CompositeImage,
    target: &TargetArgs,
) -> Result<()> {
    let pb = spinner("Writing output...");
    write_raster(&classified.raster, &target.output)?;
    if let Some(dir) = &target.rgb {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
        for band in ["B4", "B3", "B2"] {
            let raster = composite
                .image
                .band(band)
                .with_context(|| format!("Composite has no {band} band"))?;
            write_raster(raster, &dir.join(format!("{band}.tif")))?;
        }
    }
    pb.finish_and_clear();
    Ok(())
}

fn print_training(training: &TrainingSet) {
    println!("Training set: {} rows", training.table.len());
    for report in &training.reports {
        println!(
            "  {} [{} .. {}): {} rows",
            report.source_name,
            report.window.start(),
            report.window.end(),
            report.rows
        );
    }
    for failure in &training.failures {
        println!("  {} skipped: {}", failure.source_name, failure.error);
    }
}

fn print_model(model: &TrainedModel, labels: &ClassLabelMap) {
    let confusion = model.confusion();
    println!("Model: {} trees", model.forest_size());
    println!(
        "  Resubstitution accuracy: {:.3} (kappa {:.3})",
        model.accuracy(),
        confusion.kappa()
    );
    println!("  Confusion matrix (rows actual, columns predicted):");
    for (code, row) in confusion.rows().iter().enumerate() {
        let name = labels.label(code as u32).unwrap_or("?");
        let cells: Vec<String> = row.iter().map(|n| format!("{n:>6}")).collect();
        println!("  {:>12} {}", name, cells.join(""));
    }
}

fn print_legend(classified: &ClassifiedRaster, labels: &ClassLabelMap) {
    let counts = classified.class_counts();
    let total: usize = counts.values().sum();
    println!("Classes:");
    for (code, n) in &counts {
        let style = labels.style(*code);
        let name = labels.label(*code).unwrap_or("unknown");
        let pct = if total > 0 {
            *n as f64 / total as f64 * 100.0
        } else {
            0.0
        };
        println!("  {code} {name:<12} {:<7} {n:>9} px ({pct:.1}%)", style.fill);
    }
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { input } => {
            let pb = spinner("Reading raster...");
            let raster: Raster<f64> = read_geotiff(&input).context("Failed to read raster")?;
            pb.finish_and_clear();
            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let stats = raster.statistics();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
            println!("Cell size: {}", raster.cell_size());
            println!(
                "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }
            println!("\nStatistics:");
            if let Some(min) = stats.min {
                println!("  Min: {:.4}", min);
            }
            if let Some(max) = stats.max {
                println!("  Max: {:.4}", max);
            }
            if let Some(mean) = stats.mean {
                println!("  Mean: {:.4}", mean);
            }
            println!(
                "  Valid cells: {} ({:.1}%)",
                stats.valid_count,
                stats.valid_count as f64 / raster.len() as f64 * 100.0
            );
        }

        Commands::Scenes { archive } => {
            let archive = open_archive(&archive)?;
            let catalog = archive.catalog();
            println!("Archive: {}", archive.root().display());
            println!("Scenes: {}", catalog.len());
            for collection in catalog.collections() {
                println!("  {}", collection);
            }
        }

        Commands::Counties { boundaries } => {
            let catalog = load_boundaries(&boundaries)?;
            for name in catalog.names() {
                let (x, y) = catalog.centroid(name)?;
                println!("{:<24} ({:.4}, {:.4})", name, x, y);
            }
        }

        Commands::Train {
            archive,
            csv,
            forest_size,
            model,
            table,
        } => {
            if let Some(n) = forest_size {
                config.forest_size = n;
            }
            config.validate().context("Invalid forest size")?;
            let archive = open_archive(&archive)?;
            let sources = read_sources(&csv)?;

            let start = Instant::now();
            let pb = spinner("Building training set...");
            let training = TrainingSetBuilder::new(&archive, &config)
                .build(&sources)
                .context("Failed to build training set")?;
            pb.finish_and_clear();
            print_training(&training);

            let pb = spinner("Training...");
            let trained = RandomForestTrainer::seeded(config.split_seed)
                .train(&training.table, config.forest_size)
                .context("Training failed")?;
            pb.finish_and_clear();
            print_model(&trained, &config.labels);

            trained.save(&model).context("Failed to write model")?;
            if let Some(path) = table {
                let file = File::create(&path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                training
                    .table
                    .write_csv(BufWriter::new(file))
                    .context("Failed to write feature table")?;
                info!("Feature table: {}", path.display());
            }
            done("Model", &model, start.elapsed());
        }

        Commands::Classify {
            archive,
            boundaries,
            csv,
            forest_size,
            model,
            target,
        } => {
            let forest_size = forest_size.unwrap_or(config.forest_size);
            let archive = open_archive(&archive)?;
            let catalog = load_boundaries(&boundaries)?;
            let sources = read_sources(&csv)?;

            let start = Instant::now();
            let pb = spinner("Training and classifying...");
            let mut cache = PipelineCache::new();
            let out = CustomWorkflow::new(&archive, &config, &catalog)
                .run(&mut cache, &sources, forest_size, &target.request())
                .context("Classification failed")?;
            pb.finish_and_clear();

            print_training(&out.training);
            print_model(&out.model, &config.labels);
            print_legend(&out.classified, &config.labels);
            if let Some(path) = model {
                out.model.save(&path).context("Failed to write model")?;
                info!("Model: {}", path.display());
            }
            write_outputs(&out.classified, &out.composite, &target)?;
            done("Classification", &target.output, start.elapsed());
        }

        Commands::Predict {
            model,
            archive,
            boundaries,
            target,
        } => {
            let trained = TrainedModel::load(&model)
                .with_context(|| format!("Failed to load model {}", model.display()))?;
            let archive = open_archive(&archive)?;
            let catalog = load_boundaries(&boundaries)?;
            let request = target.request();
            let window = DateWindow::from_inputs(&request.dates, config.inference_window_days)?;
            let region = request.region.as_deref().unwrap_or(&config.default_county);
            let roi = catalog.lookup(region)?;

            let start = Instant::now();
            let pb = spinner("Compositing...");
            let composite = TemporalCompositor::inference(&config)
                .composite(&archive, &roi, window)
                .context("Compositing failed")?;
            pb.finish_and_clear();

            let classified = trained.predict(&composite).context("Prediction failed")?;
            print_model(&trained, &config.labels);
            print_legend(&classified, &config.labels);
            write_outputs(&classified, &composite, &target)?;
            done("Classification", &target.output, start.elapsed());
        }

        Commands::Pretrained {
            archive,
            boundaries,
            data_dir,
            model,
            target,
        } => {
            if let Some(dir) = data_dir {
                config.pretrained.data_dir = dir;
            }
            let archive = open_archive(&archive)?;
            let catalog = load_boundaries(&boundaries)?;

            let start = Instant::now();
            let pb = spinner("Training and classifying...");
            let mut cache = PipelineCache::new();
            let out = PretrainedWorkflow::new(&archive, &config, &catalog)
                .run(&mut cache, &target.request())
                .context("Classification failed")?;
            pb.finish_and_clear();

            print_training(&out.training);
            print_model(&out.model, &config.labels);
            print_legend(&out.classified, &config.labels);
            if let Some(path) = model {
                out.model.save(&path).context("Failed to write model")?;
                info!("Model: {}", path.display());
            }
            write_outputs(&out.classified, &out.composite, &target)?;
            done("Classification", &target.output, start.elapsed());
        }
    }

    Ok(())
}
