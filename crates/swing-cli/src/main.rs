//! Command-line interface for swing-rs
//!
//! ```bash
//! # One ticker against live data
//! swing analyze TATAMOTORS.NS --sector AUTO
//!
//! # Rank a sector with 8 workers and a 2 minute budget
//! swing scan AUTO --workers 8 --deadline-secs 120
//!
//! # Offline run on synthetic data, JSON output
//! swing --offline --format json scan BANK
//! ```

mod output;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use swing_core::config::NarrativeConfig;
use swing_core::gateway::RateGate;
use swing_core::retry::RetryPolicy;
use swing_core::{
    AlphaVantageRatios, AnalysisBackend, CacheTiers, DataProvider, FixtureGateway, GoogleNewsRss,
    LlmNarrator, MarketDataGateway, NarratorKind, NewsSource, NoRatios, Narrator, Pipeline,
    RatioSource, SectorLoader, SectorScanner, SectorSourceMode, TemplateNarrator, TraderConfig,
    TraderConfigBuilder, YahooGateway, rate_gate,
};
use swing_llm::providers::{OpenAIConfig, OpenAIProvider};
use swing_utils::LogFormat;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "swing")]
#[command(version, about = "Swing-trade recommendations for NSE/BSE equities", long_about = None)]
struct Cli {
    /// JSON configuration file layered over the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table, global = true)]
    format: OutputFormat,

    /// Use deterministic synthetic data and the built-in sector table
    #[arg(long, global = true)]
    offline: bool,

    /// Thesis writer: template or llm
    #[arg(long, global = true)]
    narrator: Option<String>,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the full pipeline for one ticker
    Analyze {
        /// Ticker with exchange suffix, e.g. TATAMOTORS.NS
        ticker: String,

        /// Sector the ticker belongs to
        #[arg(long)]
        sector: Option<String>,
    },
    /// Scan and rank every ticker of a sector
    Scan {
        /// Sector id, e.g. AUTO
        sector: String,

        /// Concurrent pipeline runs
        #[arg(long)]
        workers: Option<usize>,

        /// Abandon runs still in flight after this many seconds
        #[arg(long)]
        deadline_secs: Option<u64>,

        /// Score needed for the Strong tier
        #[arg(long)]
        strong: Option<f64>,

        /// Score needed for the Watch tier
        #[arg(long)]
        watch: Option<f64>,
    },
    /// List the sectors that can be scanned
    Sectors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Defaults, then the config file, then the environment, then flags
fn load_config(cli: &Cli) -> anyhow::Result<TraderConfig> {
    let base = match &cli.config {
        Some(path) => TraderConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => TraderConfig::default(),
    };

    let mut builder = TraderConfigBuilder::from_config(base.with_env());

    if cli.offline {
        builder = builder
            .provider(DataProvider::Fixture)
            .sector_source(SectorSourceMode::Static);
    }
    if let Some(narrator) = &cli.narrator {
        builder = builder.narrator(narrator.parse::<NarratorKind>()?);
    }
    if let Command::Scan {
        workers,
        deadline_secs,
        strong,
        watch,
        ..
    } = &cli.command
    {
        if let Some(workers) = workers {
            builder = builder.workers(*workers);
        }
        if let Some(secs) = deadline_secs {
            builder = builder.deadline(Duration::from_secs(*secs));
        }
        if let Some(strong) = strong {
            builder = builder.strong_threshold(*strong);
        }
        if let Some(watch) = watch {
            builder = builder.watch_threshold(*watch);
        }
    }

    Ok(builder.build()?)
}

fn build_gateway(
    config: &TraderConfig,
    caches: &CacheTiers,
    gate: &RateGate,
) -> anyhow::Result<Arc<dyn MarketDataGateway>> {
    match config.data.provider {
        DataProvider::Fixture => Ok(Arc::new(FixtureGateway::synthetic(config.data.min_history_bars))),
        DataProvider::Yahoo => {
            let news: Arc<dyn NewsSource> =
                Arc::new(GoogleNewsRss::new(&config.data, caches.news.clone(), gate.clone())?);
            let ratios: Arc<dyn RatioSource> = match &config.data.alpha_vantage_api_key {
                Some(key) => Arc::new(AlphaVantageRatios::new(
                    key.clone(),
                    &config.data,
                    caches.news.clone(),
                )?),
                None => {
                    info!("ALPHA_VANTAGE_API_KEY not set, running without financial ratios");
                    Arc::new(NoRatios)
                },
            };
            Ok(Arc::new(YahooGateway::new(
                &config.data,
                news,
                ratios,
                gate.clone(),
                caches.quotes.clone(),
            )))
        },
    }
}

fn build_narrator(config: &NarrativeConfig) -> anyhow::Result<Arc<dyn Narrator>> {
    match config.narrator {
        NarratorKind::Template => Ok(Arc::new(TemplateNarrator)),
        NarratorKind::Llm => {
            // Local OpenAI-compatible servers accept any key
            let api_key =
                swing_utils::env_string("OPENAI_API_KEY").unwrap_or_else(|| "not-needed".to_string());
            let mut openai = OpenAIConfig::new(api_key).with_timeout(60);
            if let Some(api_base) = &config.api_base {
                openai = openai.with_api_base(api_base.clone());
            }

            let provider = OpenAIProvider::with_config(openai)?;
            info!(model = %config.model, "Using LLM narrator");
            Ok(Arc::new(
                LlmNarrator::new(Arc::new(provider), config).with_retry(RetryPolicy::default()),
            ))
        },
    }
}

fn build_loader(config: &TraderConfig, caches: &CacheTiers, gate: &RateGate) -> anyhow::Result<SectorLoader> {
    if config.data.provider == DataProvider::Fixture {
        return Ok(SectorLoader::offline(config));
    }
    Ok(SectorLoader::from_config(config, caches.constituents.clone(), gate.clone())?)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    swing_utils::load_dotenv();
    let cli = Cli::parse();

    let log_format = if cli.log_json { LogFormat::Json } else { LogFormat::Pretty };
    swing_utils::init_tracing_with("warn,swing_core=info,swing=info", log_format);

    let config = load_config(&cli)?;
    let caches = CacheTiers::from_config(&config.data);
    let gate = rate_gate(config.data.requests_per_minute);

    match &cli.command {
        Command::Sectors => {
            let loader = build_loader(&config, &caches, &gate)?;
            output::print_sectors(&loader.known_sectors(), cli.format)?;
        },
        Command::Analyze { ticker, sector } => {
            let backend = AnalysisBackend::rule_based(&config, build_narrator(&config.narrative)?)?;
            let pipeline = Pipeline::new(build_gateway(&config, &caches, &gate)?, backend);

            let report = pipeline.analyze(ticker, sector.as_deref()).await?;
            output::print_report(&report, cli.format)?;
        },
        Command::Scan { sector, .. } => {
            let backend = AnalysisBackend::rule_based(&config, build_narrator(&config.narrative)?)?;
            let pipeline = Arc::new(Pipeline::new(build_gateway(&config, &caches, &gate)?, backend));
            let scanner = SectorScanner::new(
                build_loader(&config, &caches, &gate)?,
                pipeline,
                config.ranking.clone(),
            );

            let result = scanner.scan(sector, &config.scan).await?;
            output::print_scan(&result, cli.format)?;
        },
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("swing").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_parse_scan_flags() {
        let cli = parse(&["--offline", "scan", "auto", "--workers", "8", "--strong", "8"]);
        assert!(cli.offline);
        match cli.command {
            Command::Scan { sector, workers, strong, .. } => {
                assert_eq!(sector, "auto");
                assert_eq!(workers, Some(8));
                assert_eq!(strong, Some(8.0));
            },
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = parse(&["analyze", "ITC.NS", "--format", "json", "--narrator", "template"]);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.narrator.as_deref(), Some("template"));
    }

    #[test]
    fn test_flags_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"scan": {{"workers": 2}}, "ranking": {{"strong_threshold": 9.0}}}}"#).unwrap();

        let path = file.path().to_string_lossy().to_string();
        let cli = parse(&["--config", &path, "--offline", "scan", "BANK", "--workers", "6"]);
        let config = load_config(&cli).unwrap();

        assert_eq!(config.scan.workers, 6);
        assert!((config.ranking.strong_threshold - 9.0).abs() < f64::EPSILON);
        assert_eq!(config.data.provider, DataProvider::Fixture);
        assert_eq!(config.sectors.source, SectorSourceMode::Static);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let cli = parse(&["--offline", "scan", "BANK", "--strong", "4", "--watch", "6"]);
        assert!(load_config(&cli).is_err());
    }

    #[test]
    fn test_unknown_narrator_rejected() {
        let cli = parse(&["--narrator", "poet", "sectors"]);
        assert!(load_config(&cli).is_err());
    }

    #[tokio::test]
    async fn test_offline_scan_end_to_end() {
        let cli = parse(&["--offline", "scan", "PHARMA"]);
        let config = load_config(&cli).unwrap();
        let caches = CacheTiers::from_config(&config.data);
        let gate = rate_gate(config.data.requests_per_minute);

        let backend = AnalysisBackend::rule_based(&config, build_narrator(&config.narrative).unwrap()).unwrap();
        let pipeline = Arc::new(Pipeline::new(build_gateway(&config, &caches, &gate).unwrap(), backend));
        let scanner = SectorScanner::new(build_loader(&config, &caches, &gate).unwrap(), pipeline, config.ranking.clone());

        let result = scanner.scan("pharma", &config.scan).await.unwrap();
        assert_eq!(result.scanned(), 5);
        assert_eq!(result.ranked().len() + result.failures().len(), 5);
    }
}
