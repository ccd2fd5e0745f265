//! CLI entry point for the shopper segmentation tool.
//!
//! Provides subcommands for classifying a customer into a segment (and
//! recording it), building report sections over the recorded customers, and
//! listing the active segment catalog.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use shopper_segments::config::AppConfig;
use shopper_segments::output::{Format, emit};
use shopper_segments::{
    CatalogVersion, DatasetStore, RawCustomerInput, ReportOrchestrator, ReportSection,
    SegmentCatalog, SegmentClassifier, SegmentationService,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "shopper_segments")]
#[command(about = "Classify shoppers into segments and report on recorded customers", long_about = None)]
struct Cli {
    /// Customer dataset CSV (overrides SEGMENTS_DATASET_PATH)
    #[arg(long, global = true)]
    dataset: Option<PathBuf>,

    /// Classifier artifact JSON (overrides SEGMENTS_MODEL_PATH)
    #[arg(long, global = true)]
    model: Option<PathBuf>,

    /// Segment catalog version, `five` or `six` (overrides SEGMENTS_CATALOG_VERSION)
    #[arg(long, global = true)]
    catalog: Option<CatalogVersion>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify one customer and append it to the dataset
    Classify {
        #[command(flatten)]
        customer: CustomerArgs,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Build report sections over the recorded customers
    Report {
        #[arg(short, long, value_enum, default_value_t = SectionArg::All)]
        section: SectionArg,

        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Print the active segment catalog
    DescribeSegments {
        #[arg(long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[derive(Args)]
struct CustomerArgs {
    #[arg(long, allow_negative_numbers = true)]
    age: i64,
    #[arg(long)]
    purchase_amount: f64,
    #[arg(long)]
    review_rating: f64,
    #[arg(long, allow_negative_numbers = true)]
    previous_purchases: i64,
    #[arg(long)]
    category: String,
    #[arg(long)]
    color: String,
    #[arg(long)]
    season: String,
    #[arg(long)]
    frequency: String,
    #[arg(long)]
    gender: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    item: Option<String>,
    #[arg(long)]
    payment_method: Option<String>,
}

impl From<CustomerArgs> for RawCustomerInput {
    fn from(args: CustomerArgs) -> Self {
        Self {
            age: args.age,
            purchase_amount: args.purchase_amount,
            review_rating: args.review_rating,
            previous_purchases: args.previous_purchases,
            category: args.category,
            color: args.color,
            season: args.season,
            frequency: args.frequency,
            gender: args.gender,
            location: args.location,
            item_purchased: args.item,
            preferred_payment_method: args.payment_method,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SectionArg {
    CustomerProfile,
    Sales,
    Segment,
    All,
}

impl SectionArg {
    fn sections(self) -> Vec<ReportSection> {
        match self {
            SectionArg::CustomerProfile => vec![ReportSection::CustomerProfile],
            SectionArg::Sales => vec![ReportSection::Sales],
            SectionArg::Segment => vec![ReportSection::Segment],
            SectionArg::All => ReportSection::ALL.to_vec(),
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    let cli = Cli::parse();
    let mut config = AppConfig::from_env()?;
    if let Some(dataset) = cli.dataset {
        config.dataset_path = dataset;
    }
    if let Some(model) = cli.model {
        config.model_path = model;
    }
    if let Some(catalog) = cli.catalog {
        config.catalog_version = catalog;
    }

    // Logging setup: colored stderr + JSON rolling log file
    let log_dir = config
        .log_file_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = config
        .log_file_path
        .file_name()
        .unwrap_or(OsStr::new("shopper_segments.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    info!(
        dataset = %config.dataset_path.display(),
        model = %config.model_path.display(),
        catalog = %config.catalog_version,
        "Configuration loaded"
    );

    let catalog = SegmentCatalog::new(config.catalog_version);
    let mut stdout = std::io::stdout().lock();

    match cli.command {
        Commands::Classify { customer, format } => {
            let classifier = SegmentClassifier::load(&config.model_path, catalog)
                .context("segment classifier is unavailable")?;
            let service =
                SegmentationService::new(classifier, DatasetStore::new(&config.dataset_path));

            let outcome = service.classify(&RawCustomerInput::from(customer))?;
            emit(&mut stdout, format, &outcome)?;
        }
        Commands::Report { section, format } => {
            let store = DatasetStore::new(&config.dataset_path);
            let orchestrator = ReportOrchestrator::new(catalog);

            let reports = section
                .sections()
                .into_iter()
                .map(|s| orchestrator.load_and_build(&store, s))
                .collect::<Result<Vec<_>, _>>()?;
            emit(&mut stdout, format, &reports)?;
        }
        Commands::DescribeSegments { format } => {
            emit(&mut stdout, format, &catalog.definitions())?;
        }
    }

    Ok(())
}
