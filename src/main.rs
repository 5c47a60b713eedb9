use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use premium_pipeline::config::{Config, ConfigOverrides, SourceKind};
use premium_pipeline::data::source::{CsvSource, DataSource, SqliteSource};
use premium_pipeline::output::csv::{registry_to_csv, report_to_csv};
use premium_pipeline::output::json::render_json;
use premium_pipeline::output::table::{
    render_prediction_table, render_registry_table, render_report_table,
    render_run_summary_table,
};
use premium_pipeline::pipeline::{PipelineStage, TrainingPipeline};
use premium_pipeline::prediction::start_batch_prediction;
use premium_pipeline::registry::{ModelResolver, RegistryEntry};
use premium_pipeline::validation::ValidationReport;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Debug, Parser)]
#[command(
    name = "premium-pipeline",
    about = "Train, validate and serve insurance premium regression models"
)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,
    #[arg(long, value_parser = parse_source_kind)]
    source: Option<SourceKind>,
    #[arg(long = "source-path")]
    source_path: Option<String>,
    #[arg(long)]
    registry: Option<String>,
    #[arg(long = "expected-score")]
    expected_score: Option<f64>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run ingestion through promotion.
    Train,
    /// Ingest and validate only, printing the drift report.
    Validate,
    Predict {
        file: PathBuf,
    },
    Registry {
        #[arg(long)]
        latest: bool,
    },
    Config {
        #[arg(long)]
        init: bool,
        #[arg(long)]
        show: bool,
    },
}

fn parse_source_kind(raw: &str) -> Result<SourceKind, String> {
    raw.parse::<SourceKind>().map_err(|e| e.to_string())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(Some(&config_path))?;
    config.apply_overrides(ConfigOverrides {
        source_kind: cli.source,
        source_path: cli.source_path.clone(),
        registry_dir: cli.registry.clone(),
        expected_score: cli.expected_score,
    });

    match &cli.command {
        Commands::Config { init, show } => {
            handle_config_command(*init, *show, &config, &config_path)?;
        }
        Commands::Train => {
            let pipeline = TrainingPipeline::new(&config)?;
            let mut source = open_source(&config)?;
            match pipeline.run(source.as_mut()) {
                Ok(summary) => match cli.output {
                    OutputFormat::Table => println!("{}", render_run_summary_table(&summary)),
                    OutputFormat::Json | OutputFormat::Csv => {
                        println!("{}", render_json(&summary)?)
                    }
                },
                Err(err) => {
                    if err.stage() == Some(PipelineStage::Rejected) {
                        warn!("model rejected, registry left unchanged");
                    }
                    return Err(err.into());
                }
            }
        }
        Commands::Validate => {
            let pipeline = TrainingPipeline::new(&config)?;
            let mut source = open_source(&config)?;
            let (_, validation) = pipeline.validate(source.as_mut())?;
            info!("report written to {}", validation.report_file_path.display());
            print_report(&validation.report, cli.output)?;
        }
        Commands::Predict { file } => {
            let resolver = ModelResolver::new(config.resolved_registry_dir());
            let artifact =
                start_batch_prediction(&resolver, file, &config.resolved_prediction_dir())
                    .with_context(|| format!("batch prediction failed for {}", file.display()))?;
            match cli.output {
                OutputFormat::Table => println!("{}", render_prediction_table(&artifact)),
                OutputFormat::Json | OutputFormat::Csv => println!("{}", render_json(&artifact)?),
            }
        }
        Commands::Registry { latest } => {
            let resolver = ModelResolver::new(config.resolved_registry_dir());
            let mut entries = resolver.entries()?;
            if *latest {
                entries = entries.pop().into_iter().collect();
            }
            if entries.is_empty() {
                warn!("no model versions under {}", resolver.registry().display());
            }
            print_registry(&entries, cli.output)?;
        }
    }

    Ok(())
}

fn open_source(config: &Config) -> Result<Box<dyn DataSource>> {
    let source: Box<dyn DataSource> = match config.source.kind {
        SourceKind::Sqlite => {
            let path = config.resolved_sqlite_path();
            Box::new(
                SqliteSource::open(&path, config.source.table.clone())
                    .with_context(|| format!("failed opening sqlite source {}", path.display()))?,
            )
        }
        SourceKind::Csv => {
            let path = config.resolved_csv_path();
            Box::new(
                CsvSource::open(&path)
                    .with_context(|| format!("failed opening csv source {}", path.display()))?,
            )
        }
    };
    info!("reading records from {}", source.describe());
    Ok(source)
}

fn handle_config_command(init: bool, show: bool, config: &Config, config_path: &Path) -> Result<()> {
    if init {
        Config::write_template(config_path)?;
        println!("Wrote config template to {}", config_path.display());
    }
    if show || !init {
        println!("{}", render_json(config)?);
    }
    Ok(())
}

fn print_report(report: &ValidationReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_report_table(report)),
        OutputFormat::Json => println!("{}", render_json(report)?),
        OutputFormat::Csv => print!("{}", report_to_csv(report)?),
    }
    Ok(())
}

fn print_registry(entries: &[RegistryEntry], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", render_registry_table(entries)),
        OutputFormat::Json => println!("{}", render_json(entries)?),
        OutputFormat::Csv => print!("{}", registry_to_csv(entries)?),
    }
    Ok(())
}
