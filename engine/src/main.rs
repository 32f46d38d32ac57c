// Engine command-line entry point
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use engine::config::AnalyzerSettings;
use engine::gateway::{CachedRateGateway, CsvDirectoryGateway, FetchGateway};
use engine::indicators::IndicatorSpec;
use engine::{currency, watchlist, Analysis, AnalysisError, AnalysisRequest, AnalysisService};
use shared::models::Period;
use shared::utils::display_format::{format_delta, format_idr, format_usd, format_volume};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "market-engine", version, about = "Dual-currency quote analysis")]
struct Cli {
    /// JSON settings file; built-in defaults when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory with `<SYMBOL>_<period>.csv` quote files.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Indicators and USD/IDR summary for one symbol.
    Analyze(AnalyzeArgs),
    /// Intraday snapshot of the configured watchlist.
    Watchlist {
        /// Overrides the configured symbols. Repeatable.
        #[arg(long = "symbol")]
        symbols: Vec<String>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct AnalyzeArgs {
    #[arg(short, long)]
    symbol: String,
    #[arg(short, long, default_value = "1mo")]
    period: Period,
    #[arg(short, long)]
    interval: Option<String>,
    /// e.g. SMA_20, ema:50, RSI. Repeatable; configured defaults when omitted.
    #[arg(long = "indicator")]
    indicators: Vec<IndicatorSpec>,
    #[arg(long)]
    json: bool,
    /// Number of trailing bars to print.
    #[arg(long, default_value_t = 10)]
    tail: usize,
}

fn load_settings(cli: &Cli) -> anyhow::Result<AnalyzerSettings> {
    let mut settings = match &cli.config {
        Some(path) => AnalyzerSettings::load_from_file(path)?,
        None => AnalyzerSettings::load_default()?,
    };
    if let Some(dir) = &cli.data_dir {
        settings.data_dir = dir.clone();
    }
    Ok(settings)
}

fn print_analysis(analysis: &Analysis, tail: usize) {
    let bars = &analysis.bars;
    println!(
        "{} | period {} | interval {} | {} bars",
        bars.symbol(),
        bars.period(),
        bars.interval(),
        bars.len()
    );

    let names: Vec<&str> = analysis.indicators.names().collect();
    let mut header = format!("{:<26} {:>12} {:>14}", "Timestamp", "Close", "Volume");
    for name in &names {
        header.push_str(&format!(" {:>10}", name));
    }
    println!("{}", header);

    let start = bars.len().saturating_sub(tail);
    for (i, bar) in bars.bars().iter().enumerate().skip(start) {
        let mut line = format!(
            "{:<26} {:>12} {:>14}",
            bar.timestamp.format("%Y-%m-%d %H:%M %Z").to_string(),
            format_usd(bar.close),
            format_volume(bar.volume)
        );
        for (_, value) in analysis.indicators.row(i).unwrap_or_default() {
            match value {
                Some(v) => line.push_str(&format!(" {:>10.2}", v)),
                None => line.push_str(&format!(" {:>10}", "-")),
            }
        }
        println!("{}", line);
    }

    let usd = &analysis.metrics_usd;
    let idr = &analysis.metrics_idr;
    println!();
    println!("{:<10} {:>16} {:>22}", "", "USD", "IDR");
    println!("{:<10} {:>16} {:>22}", "Last", format_usd(usd.last), format_idr(idr.last));
    println!("{:<10} {:>16} {:>22}", "High", format_usd(usd.high), format_idr(idr.high));
    println!("{:<10} {:>16} {:>22}", "Low", format_usd(usd.low), format_idr(idr.low));
    println!(
        "{:<10} {:>16} {:>22}",
        "Change",
        format_delta(usd.change, usd.change_percent, 2),
        format_delta(idr.change, idr.change_percent, 0)
    );
    println!("{:<10} {:>16}", "Volume", format_volume(usd.total_volume));
    println!(
        "USD/IDR {} ({:?}, as of {})",
        format_idr(analysis.rate.rate),
        analysis.rate.source,
        analysis.rate.as_of.format("%Y-%m-%d %H:%M UTC")
    );
}

fn print_watchlist(entries: &[watchlist::WatchEntry]) {
    println!("{:<8} {:>12} {:>20} {:>18}", "Symbol", "Price", "Change", "Price (IDR)");
    for entry in entries {
        match entry {
            watchlist::WatchEntry::Quote(q) => println!(
                "{:<8} {:>12} {:>20} {:>18}",
                q.symbol,
                format_usd(q.price),
                format_delta(q.change, q.change_percent, 2),
                format_idr(q.price_idr)
            ),
            watchlist::WatchEntry::Unavailable { symbol, reason } => {
                println!("{:<8} {}", symbol, reason)
            }
        }
    }
}

async fn run(cli: Cli, settings: AnalyzerSettings) -> anyhow::Result<()> {
    let csv_gateway = CsvDirectoryGateway::new(&settings.data_dir);
    info!(data_dir = %csv_gateway.root().display(), "Reading quotes from CSV directory");
    let gateway: Arc<dyn FetchGateway> = Arc::new(CachedRateGateway::new(csv_gateway, settings.rate_cache_ttl()));
    let service = AnalysisService::from_settings(gateway, &settings)?;

    match cli.command {
        Command::Analyze(args) => {
            let request = AnalysisRequest::new(args.symbol, args.period)
                .with_indicators(args.indicators);
            let request = match args.interval {
                Some(interval) => request.with_interval(interval),
                None => request,
            };
            let analysis = service.build_analysis(request).await?;
            if args.json {
                println!("{}", serde_json::to_string_pretty(&analysis)?);
            } else {
                print_analysis(&analysis, args.tail);
            }
        }
        Command::Watchlist { symbols, json } => {
            let symbols = if symbols.is_empty() { settings.watchlist.clone() } else { symbols };
            let rate = currency::resolve_rate(
                service.gateway().fetch_usd_idr_rate().await,
                service.fallback_rate(),
                chrono::Utc::now(),
            );
            let entries = watchlist::snapshot(Arc::clone(service.gateway()), &symbols, rate.rate).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&entries)?);
            } else {
                print_watchlist(&entries);
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = load_settings(&cli)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    info!("Starting market engine");

    if let Err(err) = run(cli, settings).await {
        // Analysis failures get the short user-facing text; anything else the full chain.
        match err.downcast_ref::<AnalysisError>() {
            Some(analysis_err) => {
                tracing::debug!(error = ?analysis_err, "Analysis failed");
                eprintln!("{}", analysis_err.user_message());
            }
            None => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }
    Ok(())
}
