//! Command surface of the sales dashboard.
//!
//! Hosts embed the dashboard through:
//! - [`run_cli`] for full parsed CLI execution (loads the store first).
//! - [`run_command`] for execution against an already loaded [`RecordStore`].
//! - [`run_session`] for the line-oriented interactive protocol.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sales_dashboard_core::{
    apply_filters, compute_views, format_count, format_currency, parse_filter_date,
    render_summary, DashboardError, DashboardViews, Dimension, FilterOptions, FilterRequest,
    RecordStore, ViewCache,
};
use sales_dashboard_export::{export_bundle, write_records_csv};
use serde::Serialize;
use serde_json::json;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_DATA_PATH: &str = "Sample - Superstore.csv";
pub const NO_DATA_MESSAGE: &str =
    "No data available for the selected filters. Please adjust your filters.";

#[derive(Debug, Parser)]
#[command(name = "sd")]
#[command(about = "Superstore sales dashboard CLI")]
pub struct Cli {
    #[arg(long, default_value = DEFAULT_DATA_PATH)]
    data: PathBuf,

    /// Log at debug level unless `RUST_LOG` says otherwise.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

impl Cli {
    #[must_use]
    pub fn verbose(&self) -> bool {
        self.verbose
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Compute every aggregate view for the selection.
    Dashboard(DashboardArgs),
    /// List the filter options offered at each stage.
    Options(FilterArgs),
    /// Print the text summary.
    Summary(FilterArgs),
    /// Print the filtered rows as CSV.
    Rows(RowsArgs),
    /// Write CSV, summary and views files for the selection.
    Export(ExportArgs),
    /// Read one JSON filter request per stdin line; answer one JSON line each.
    Session,
}

#[derive(Debug, Clone, Default, Args)]
pub struct FilterArgs {
    /// First order date to include (MM/DD/YYYY or YYYY-MM-DD).
    #[arg(long)]
    from: Option<String>,
    /// Last order date to include.
    #[arg(long)]
    to: Option<String>,
    #[arg(long = "region")]
    regions: Vec<String>,
    #[arg(long = "category")]
    categories: Vec<String>,
    #[arg(long = "sub-category")]
    sub_categories: Vec<String>,
    #[arg(long = "segment")]
    segments: Vec<String>,
    /// Deselect every value of a dimension.
    #[arg(long = "none", value_enum)]
    none: Vec<DimensionArg>,
    /// JSON filter request file; flags override its fields.
    #[arg(long)]
    selection: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DashboardArgs {
    #[command(flatten)]
    filters: FilterArgs,
    #[arg(long)]
    json: bool,
}

#[derive(Debug, Args)]
pub struct RowsArgs {
    #[command(flatten)]
    filters: FilterArgs,
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Debug, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    filters: FilterArgs,
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum DimensionArg {
    Region,
    Category,
    SubCategory,
    Segment,
}

fn map_dimension(value: DimensionArg) -> Dimension {
    match value {
        DimensionArg::Region => Dimension::Region,
        DimensionArg::Category => Dimension::Category,
        DimensionArg::SubCategory => Dimension::SubCategory,
        DimensionArg::Segment => Dimension::Segment,
    }
}

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum DashboardPayload<'a> {
    Ok {
        record_count: usize,
        views: &'a DashboardViews,
    },
    NoData {
        message: &'static str,
    },
}

/// Installs the stderr log subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Loads the record store and executes the parsed command.
///
/// # Errors
/// Returns an error when the data file is missing or malformed, when the
/// filter input is invalid, or when writing output fails.
pub fn run_cli(cli: Cli) -> Result<()> {
    let store = load_store(&cli.data)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Command::Session => {
            let stdin = std::io::stdin();
            run_session(&store, stdin.lock(), &mut out)
        }
        command => run_command(command, &store, &mut out),
    }
}

/// Loads the store, turning a missing file into a user-facing message.
///
/// # Errors
/// Returns an error naming the file when it is missing, or the underlying
/// load error otherwise.
pub fn load_store(path: &Path) -> Result<RecordStore> {
    match RecordStore::load(path) {
        Ok(store) => Ok(store),
        Err(DashboardError::NotFound(name)) => Err(anyhow!(
            "The file '{name}' was not found. Please ensure it is in the same directory."
        )),
        Err(err) => Err(err.into()),
    }
}

/// Executes a command against an already loaded store.
///
/// # Errors
/// Returns an error when filter input is invalid or output cannot be written.
pub fn run_command<W: Write>(command: Command, store: &RecordStore, out: &mut W) -> Result<()> {
    match command {
        Command::Dashboard(args) => {
            let request = filter_request(&args.filters)?;
            let resolved = request.resolve(store)?;
            let view = apply_filters(store, &resolved.selection);
            let views = compute_views(&view);
            if args.json {
                let payload = match &views {
                    Some(views) => DashboardPayload::Ok {
                        record_count: view.len(),
                        views,
                    },
                    None => DashboardPayload::NoData {
                        message: NO_DATA_MESSAGE,
                    },
                };
                writeln!(out, "{}", serde_json::to_string_pretty(&payload)?)?;
            } else {
                match &views {
                    Some(views) => write_dashboard_report(out, views)?,
                    None => writeln!(out, "{NO_DATA_MESSAGE}")?,
                }
            }
            Ok(())
        }
        Command::Options(args) => {
            let resolved = filter_request(&args)?.resolve(store)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&resolved.options)?)?;
            Ok(())
        }
        Command::Summary(args) => {
            let resolved = filter_request(&args)?.resolve(store)?;
            let view = apply_filters(store, &resolved.selection);
            match compute_views(&view) {
                Some(views) => write!(out, "{}", render_summary(&views.kpis))?,
                None => writeln!(out, "{NO_DATA_MESSAGE}")?,
            }
            Ok(())
        }
        Command::Rows(args) => {
            let resolved = filter_request(&args.filters)?.resolve(store)?;
            let view = apply_filters(store, &resolved.selection);
            let records = view.records();
            let shown = args.limit.map_or(records.len(), |limit| limit.min(records.len()));
            write_records_csv(&records[..shown], &mut *out)
        }
        Command::Export(args) => {
            let resolved = filter_request(&args.filters)?.resolve(store)?;
            let view = apply_filters(store, &resolved.selection);
            match export_bundle(&args.out_dir, &view)? {
                Some(report) => writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?,
                None => writeln!(out, "{NO_DATA_MESSAGE}")?,
            }
            Ok(())
        }
        Command::Session => Err(anyhow!(
            "internal dispatch error: session needs an input stream; use run_session"
        )),
    }
}

/// Answers one JSON filter request per input line until end of input.
///
/// Invalid requests are reported on their own output line and do not end
/// the session. Blank lines are skipped.
///
/// # Errors
/// Returns an error only when reading input or writing output fails.
pub fn run_session<R: BufRead, W: Write>(store: &RecordStore, input: R, out: &mut W) -> Result<()> {
    let mut cache = ViewCache::new();
    for line in input.lines() {
        let line = line.context("failed to read session input")?;
        if line.trim().is_empty() {
            continue;
        }

        let response = match FilterRequest::from_json(&line).and_then(|request| request.resolve(store))
        {
            Ok(resolved) => {
                let cached = cache.contains(&resolved.selection);
                let views = cache.get_or_compute(store, &resolved.selection);
                session_response(&resolved.options, views, cached)
            }
            Err(err) => json!({ "status": "error", "message": err.to_string() }),
        };
        writeln!(out, "{}", serde_json::to_string(&response)?)?;
        out.flush().context("failed to flush session output")?;
    }

    let stats = cache.stats();
    tracing::debug!(
        hits = stats.hits,
        misses = stats.misses,
        entries = stats.entries,
        "session finished"
    );
    Ok(())
}

fn session_response(
    options: &FilterOptions,
    views: Option<&DashboardViews>,
    cached: bool,
) -> serde_json::Value {
    match views {
        Some(views) => json!({
            "status": "ok",
            "cached": cached,
            "options": options,
            "views": views,
        }),
        None => json!({
            "status": "no_data",
            "cached": cached,
            "options": options,
            "message": NO_DATA_MESSAGE,
        }),
    }
}

fn filter_request(args: &FilterArgs) -> Result<FilterRequest> {
    let mut request = match &args.selection {
        Some(path) => {
            let body = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read selection file {}", path.display()))?;
            FilterRequest::from_json(&body)?
        }
        None => FilterRequest::default(),
    };

    if let Some(raw) = &args.from {
        request.from = Some(parse_filter_date(raw)?);
    }
    if let Some(raw) = &args.to {
        request.to = Some(parse_filter_date(raw)?);
    }

    for (dimension, values) in [
        (Dimension::Region, &args.regions),
        (Dimension::Category, &args.categories),
        (Dimension::SubCategory, &args.sub_categories),
        (Dimension::Segment, &args.segments),
    ] {
        if !values.is_empty() {
            request.set_values(dimension, Some(values.clone()));
        }
    }
    for dimension in &args.none {
        request.set_values(map_dimension(*dimension), Some(Vec::new()));
    }

    Ok(request)
}

fn write_dashboard_report<W: Write>(out: &mut W, views: &DashboardViews) -> Result<()> {
    let kpis = &views.kpis;
    writeln!(out, "Superstore Sales Dashboard")?;
    writeln!(out)?;
    writeln!(out, "Total Sales:  {}", format_currency(kpis.total_sales))?;
    writeln!(out, "Total Profit: {}", format_currency(kpis.total_profit))?;
    writeln!(out, "Total Orders: {}", format_count(kpis.distinct_orders))?;
    writeln!(
        out,
        "Top Product:  {} ({} units)",
        kpis.top_product.product_name, kpis.top_product.quantity
    )?;

    if let (Some(first), Some(last)) = (views.time_series.first(), views.time_series.last()) {
        writeln!(out)?;
        writeln!(
            out,
            "Monthly trend: {} months from {} to {}",
            views.time_series.len(),
            first.month,
            last.month
        )?;
    }

    writeln!(out)?;
    writeln!(out, "Sales & Profit by Region")?;
    for row in &views.regions {
        writeln!(
            out,
            "  {:<12} {:>16} {:>16}",
            row.region,
            format_currency(row.sales),
            format_currency(row.profit)
        )?;
    }

    writeln!(out)?;
    writeln!(out, "Sales by Category")?;
    for row in &views.categories {
        writeln!(
            out,
            "  {:<16} {:>16} {:>6.1}%",
            row.category,
            format_currency(row.sales),
            row.share * 100.0
        )?;
    }

    writeln!(out)?;
    writeln!(out, "Sales by State")?;
    for row in &views.geo.rows {
        writeln!(out, "  {} {:>16}", row.code, format_currency(row.sales))?;
    }
    if !views.geo.unmapped_states.is_empty() {
        writeln!(
            out,
            "  (unmapped: {})",
            views.geo.unmapped_states.join(", ")
        )?;
    }
    Ok(())
}
