// Entry point and high-level CLI flow.
//
// Every command re-reads and re-normalizes the backing CSV; nothing is
// cached between runs.
// - `data` / `meta` / `query` print the statistics the dashboard consumes.
// - `add` / `delete` edit the log through the record store.
// - `report` composes the four-page report and writes it as one HTML file.
use clap::{Parser, Subcommand};
use incident_report::config::{ReportConfig, DEFAULT_CONFIG_PATH};
use incident_report::query::{self, QueryParams, Statistic};
use incident_report::report::render::{DocumentRenderer, SvgHtmlRenderer};
use incident_report::store::{CsvFileStore, RecordStore};
use incident_report::types::{Aggregation, FilterSpec, NewEntry};
use incident_report::{output, report, util, Result};
use std::path::PathBuf;
use std::process;
use tracing::info;

/// IT support incident log: statistics, edits and the printable report.
#[derive(Debug, Parser)]
#[command(name = "incident-report", version, about)]
struct Args {
    /// Backing CSV file (overrides the config file)
    #[arg(short = 'd', long = "data", value_name = "PATH", global = true)]
    data: Option<PathBuf>,

    /// JSON config file
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Debug logging
    #[arg(short = 'v', long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short = 'q', long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, clap::Args)]
struct FilterArgs {
    /// Week numbers to keep (comma-separated)
    #[arg(long = "weeks", alias = "week", value_delimiter = ',')]
    weeks: Vec<u32>,

    /// Years to keep (comma-separated)
    #[arg(long = "years", alias = "year", value_delimiter = ',')]
    years: Vec<i32>,

    /// Months to keep as YYYY-MM (comma-separated)
    #[arg(long = "months", alias = "month", value_delimiter = ',')]
    months: Vec<String>,
}

impl FilterArgs {
    fn to_filter(&self) -> FilterSpec {
        FilterSpec {
            weeks: self.weeks.iter().copied().collect(),
            years: self.years.iter().copied().collect(),
            months: self
                .months
                .iter()
                .map(|m| m.trim().to_string())
                .filter(|m| !m.is_empty())
                .collect(),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the normalized rows as JSON
    Data {
        /// Only the first N rows
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Print distinct weeks, areas, classes, months and years
    Meta,
    /// Run one dashboard statistic
    Query {
        #[arg(value_enum)]
        statistic: Statistic,
        #[command(flatten)]
        filter: FilterArgs,
        /// Number of ranked entries (default 3)
        #[arg(short = 'n', long = "top", allow_negative_numbers = true)]
        top: Option<i64>,
        /// Aggregation for ranked statistics
        #[arg(long, value_enum, default_value_t = Aggregation::Sum)]
        agg: Aggregation,
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
        /// Also write the JSON result to this file
        #[arg(short = 'o', long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Append one entry to the log
    Add(AddArgs),
    /// Delete rows by zero-based position
    Delete {
        #[arg(required = true, allow_negative_numbers = true, value_delimiter = ',')]
        positions: Vec<i64>,
    },
    /// Generate the four-page report
    Report {
        #[command(flatten)]
        filter: FilterArgs,
        /// Output HTML file
        #[arg(short = 'o', long, value_name = "PATH", default_value = "it_support_report.html")]
        output: PathBuf,
    },
    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Write the default config file
    Init,
}

#[derive(Debug, Clone, clap::Args)]
struct AddArgs {
    /// Read the entry from a JSON payload instead of flags
    #[arg(long, value_name = "PATH", conflicts_with_all = ["date", "class", "area"])]
    payload: Option<PathBuf>,
    /// YYYY-MM-DD, DD/MM/YYYY or MM/DD/YYYY
    #[arg(long)]
    date: Option<String>,
    #[arg(long)]
    class: Option<String>,
    #[arg(long)]
    area: Option<String>,
    /// Wait time in minutes
    #[arg(long)]
    wait: Option<String>,
    /// Resolution time in minutes
    #[arg(long)]
    resolution: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    shift: Option<String>,
    #[arg(long)]
    operator: Option<String>,
    /// Downtime attributable to IT, in minutes
    #[arg(long = "it-downtime")]
    it_downtime: Option<String>,
    #[arg(long)]
    originator: Option<String>,
}

impl AddArgs {
    fn to_entry(&self) -> Result<NewEntry> {
        if let Some(path) = &self.payload {
            let text = std::fs::read_to_string(path)?;
            return Ok(serde_json::from_str(&text)?);
        }
        let field = |v: &Option<String>| v.clone().unwrap_or_default();
        Ok(NewEntry {
            fecha: field(&self.date),
            class: field(&self.class),
            area: field(&self.area),
            t_espera: field(&self.wait),
            t_solucion: field(&self.resolution),
            descripcion: field(&self.description),
            shift: field(&self.shift),
            operador: field(&self.operator),
            t_muerto_ti: self.it_downtime.clone(),
            originador: field(&self.originator),
        })
    }
}

fn init_logging(args: &Args) {
    use tracing_subscriber::{fmt, EnvFilter};

    let level = if args.verbose {
        "debug"
    } else if args.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("incident_report={}", level)));
    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

/// Handle `query`: print a table preview, or JSON when asked.
fn handle_query(
    store: &CsvFileStore,
    statistic: Statistic,
    params: &QueryParams,
    json: bool,
    output_path: Option<&PathBuf>,
) -> Result<()> {
    let data = store.load_all()?;
    let result = query::run(&data, statistic, params);
    if let Some(path) = output_path {
        output::write_json(path, &result)?;
        info!("Query result written to {}", path.display());
    }
    if json {
        return output::print_json(&result);
    }
    let title = format!("{:?}", statistic);
    match &result {
        query::QueryOutput::Ranked(_) => {
            output::preview_table_rows(&title, &result.ranked_rows(), usize::MAX)
        }
        query::QueryOutput::Buckets(_) => {
            output::preview_table_rows(&title, &result.bucket_rows(), usize::MAX)
        }
    }
    Ok(())
}

/// Handle `report`: compose the pages, render, write one file.
fn handle_report(
    store: &CsvFileStore,
    config: &ReportConfig,
    filter: &FilterSpec,
    output_path: &PathBuf,
) -> Result<()> {
    let data = store.load_all()?;
    let doc = report::compose(&data, filter, config)?;
    let bytes = SvgHtmlRenderer::new(config).render(&doc)?;
    output::write_document(output_path, &bytes)?;
    println!(
        "Report for {} written to {} ({} pages)",
        doc.period_label,
        output_path.display(),
        doc.pages.len()
    );
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let config = ReportConfig::load(&config_path);
    let data_path = args.data.clone().unwrap_or_else(|| config.data.path.clone());
    let store = CsvFileStore::new(data_path);

    match args.command {
        Command::Data { limit } => {
            let data = store.load_all()?;
            output::print_json(&query::listing(&data, limit))
        }
        Command::Meta => {
            let data = store.load_all()?;
            output::print_json(&query::meta(&data))
        }
        Command::Query { statistic, filter, top, agg, json, output } => {
            let params = QueryParams { filter: filter.to_filter(), top, agg };
            handle_query(&store, statistic, &params, json, output.as_ref())
        }
        Command::Add(add) => {
            store.append_one(&add.to_entry()?)?;
            println!("Entry saved to {}", store.path().display());
            Ok(())
        }
        Command::Delete { positions } => {
            let removed = store.delete_by_positions(&positions)?;
            println!("{} record(s) deleted", util::format_int(removed as u64));
            Ok(())
        }
        Command::Report { filter, output } => {
            handle_report(&store, &config, &filter.to_filter(), &output)
        }
        Command::Config { action: ConfigAction::Init } => {
            ReportConfig::save_default(&config_path)?;
            println!("Default config written to {}", config_path.display());
            Ok(())
        }
    }
}

fn main() {
    let args = Args::parse();
    init_logging(&args);

    if let Err(error) = run(args) {
        eprintln!("Error: {}", error);
        process::exit(1);
    }
}
