use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, Utc};
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use apiary_monitor::analysis;
use apiary_monitor::config::Settings;
use apiary_monitor::generator::SeriesGenerator;
use apiary_monitor::metrics::display_value;
use apiary_monitor::period::{self, Period};
use apiary_monitor::roster::RosterProvider;
use apiary_monitor::snapshot::LiveSnapshot;
use apiary_monitor::web::{self, AppState};

#[derive(Parser)]
#[command(name = "apiary-monitor")]
#[command(about = "Beehive monitoring dashboard with live readings, history charts and alerts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the live feed and the web dashboard
    Serve {
        /// Port for the web dashboard
        #[arg(short, long, default_value = "8080")]
        port: u16,

        /// Path to store log files
        #[arg(short, long, default_value = "logs")]
        log_dir: PathBuf,

        /// Configuration file (built-in demo roster when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Seed for reproducible synthetic readings
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print the chart series of one node as JSON
    History {
        /// Node id
        #[arg(short, long)]
        node: String,

        /// day, week, month or year
        #[arg(short, long, default_value = "day")]
        period: String,

        /// Selection value: YYYY-MM-DD, YYYY-Www, YYYY-MM or YYYY (today when omitted)
        #[arg(short, long)]
        date: Option<String>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Take one live snapshot and print it
    Snapshot {
        #[arg(long)]
        seed: Option<u64>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Take one live snapshot and generate a text report
    Report {
        /// Output report file
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long)]
        seed: Option<u64>,

        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn env_filter(settings: &Settings) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.logger.level))
}

fn load_settings(config: Option<&Path>) -> anyhow::Result<Settings> {
    Settings::load(config).context("failed to load configuration")
}

fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}

fn one_tick(settings: &Settings, seed: Option<u64>) -> anyhow::Result<(Arc<dyn RosterProvider>, LiveSnapshot)> {
    let roster: Arc<dyn RosterProvider> = Arc::new(settings.roster()?);
    let mut snapshot = LiveSnapshot::new(settings.online_window());
    snapshot.tick(&mut rng(seed), &settings.ranges, &roster.nodes(), Utc::now());
    Ok((roster, snapshot))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            port,
            log_dir,
            config,
            seed,
        } => {
            let settings = load_settings(config.as_deref())?;

            // Set up logging
            std::fs::create_dir_all(&log_dir)?;
            let file_appender = RollingFileAppender::new(Rotation::HOURLY, &log_dir, "apiary-monitor.log");
            let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

            tracing_subscriber::registry()
                .with(env_filter(&settings))
                .with(fmt::layer().with_writer(std::io::stdout))
                .with(fmt::layer().json().with_writer(non_blocking))
                .init();

            info!("Starting Apiary Monitor");
            info!("Nodes: {}, users: {}", settings.nodes.len(), settings.users.len());
            info!("Refresh interval: {}s", settings.feed.refresh_interval_seconds);
            info!("Web dashboard: http://localhost:{}", port);

            let state = Arc::new(AppState::from_settings(&settings, seed)?);
            let feed = web::start_live_feed(&state, settings.refresh_interval(), seed);

            let server = tokio::spawn(web::start_web_server(state, port));

            tokio::select! {
                result = server => {
                    match result {
                        Ok(Err(e)) => tracing::error!("Web server error: {}", e),
                        Err(e) => tracing::error!("Web server task failed: {}", e),
                        Ok(Ok(())) => {}
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Shutting down...");
                }
            }

            feed.stop();
            Ok(())
        }
        Commands::History {
            node,
            period,
            date,
            seed,
            config,
        } => {
            let settings = load_settings(config.as_deref())?;
            tracing_subscriber::registry()
                .with(env_filter(&settings))
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();

            let roster = settings.roster()?;
            let node = roster.find_node(&node)?;
            let period: Period = period.parse()?;
            let generator = SeriesGenerator::new(settings.ranges.clone())?;

            let selection = date.unwrap_or_else(|| period::selection_value(period, Local::now().date_naive()));
            let readings = generator.generate_for_selection(&mut rng(seed), &node, period, &selection, &Local)?;

            let output = serde_json::json!({
                "node": node,
                "period": period,
                "selection": selection,
                "readings": readings,
                "summary": analysis::summarize(&readings),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Commands::Snapshot { seed, config } => {
            let settings = load_settings(config.as_deref())?;
            tracing_subscriber::registry()
                .with(env_filter(&settings))
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();

            let (roster, snapshot) = one_tick(&settings, seed)?;
            let now = Utc::now();

            println!("{:<12} {:<24} {:<8} {:>8} {:>8} {:>8}", "NODE", "NAME", "STATUS", "TEMP", "HUM", "KG");
            for node in roster.nodes() {
                let reading = snapshot.current(&node.id);
                println!(
                    "{:<12} {:<24} {:<8} {:>8} {:>8} {:>8}",
                    node.id,
                    node.name,
                    if snapshot.is_online(&node.id, now) { "online" } else { "offline" },
                    display_value(reading.map(|r| r.temperature), 1),
                    display_value(reading.map(|r| r.humidity), 1),
                    display_value(reading.and_then(|r| r.weight), 2),
                );
            }
            Ok(())
        }
        Commands::Report { output, seed, config } => {
            let settings = load_settings(config.as_deref())?;
            tracing_subscriber::registry()
                .with(env_filter(&settings))
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();

            let (roster, snapshot) = one_tick(&settings, seed)?;
            let now = Utc::now();
            let report = analysis::generate_report(roster.as_ref(), &settings.alert_log(now), &snapshot, now);

            println!("{}", report);
            if let Some(output) = output {
                std::fs::write(&output, &report)?;
                println!("\nReport saved to {:?}", output);
            }
            Ok(())
        }
    }
}
