use axum::{Router, extract::State, routing::get};
use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use pvz_load::config::Config;
use pvz_load::scenario::{LoadedScenario, ScenarioFile};
use pvz_load::{ConfigError, ReqwestTransport, RunReport, ScenarioRunner};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for configuration errors; no request is sent
const EXIT_CONFIG_ERROR: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "pvz-load", version, about = "Load harness for GET /pvz")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a scenario and evaluate its thresholds
    Run {
        /// Scenario file; defaults to SCENARIO_FILE or the built-in scenario
        scenario: Option<PathBuf>,

        /// Base URL of the service under test
        #[arg(long)]
        base_url: Option<String>,

        /// Write the JSON report to this path
        #[arg(long)]
        summary_export: Option<PathBuf>,

        /// Print the JSON report instead of the text summary
        #[arg(long)]
        json: bool,
    },
    /// Validate a scenario without sending any requests
    Validate {
        scenario: Option<PathBuf>,
    },
}

fn load_scenario(
    config: &Config,
    path: Option<PathBuf>,
    base_url: Option<String>,
) -> Result<LoadedScenario, ConfigError> {
    let mut file = match path.or_else(|| config.scenario_file.clone()) {
        Some(path) => ScenarioFile::load(&path)?,
        None => ScenarioFile::builtin()?,
    };
    config.apply(&mut file);
    if let Some(url) = base_url {
        file.set_base_url(url);
    }
    file.into_scenario()
}

async fn prometheus_metrics(State(handle): State<PrometheusHandle>) -> String {
    handle.render()
}

/// Serve Prometheus metrics on `addr`. The recorder is only installed once
/// the listener is bound.
async fn serve_prometheus(addr: SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    let handle = PrometheusBuilder::new().install_recorder()?;
    let app = Router::new()
        .route("/metrics", get(prometheus_metrics))
        .with_state(handle);

    info!("Prometheus metrics on http://{}/metrics", addr);
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!("Metrics endpoint stopped: {}", e);
        }
    });
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration from environment
    let config = Config::from_env();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_new(&config.log_filter)
                .unwrap_or_else(|_| pvz_load::config::DEFAULT_LOG_FILTER.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Command::Validate { scenario } => match load_scenario(&config, scenario, None) {
            Ok(loaded) => {
                println!(
                    "Scenario '{}' is valid: {} against {}, {} threshold(s)",
                    loaded.config.name,
                    loaded.executor.name(),
                    loaded.config.target.base_url,
                    loaded.config.thresholds.len()
                );
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                error!("Invalid scenario: {}", e);
                Ok(ExitCode::from(EXIT_CONFIG_ERROR))
            }
        },
        Command::Run {
            scenario,
            base_url,
            summary_export,
            json,
        } => {
            let loaded = match load_scenario(&config, scenario, base_url) {
                Ok(loaded) => loaded,
                Err(e) => {
                    error!("Invalid scenario: {}", e);
                    return Ok(ExitCode::from(EXIT_CONFIG_ERROR));
                }
            };

            if let Some(addr) = config.metrics_addr
                && let Err(e) = serve_prometheus(addr).await
            {
                error!("Failed to start metrics endpoint on {}: {}", addr, e);
                return Ok(ExitCode::from(EXIT_CONFIG_ERROR));
            }

            let transport = match ReqwestTransport::new(
                loaded.config.target.timeout,
                loaded.config.profile.max_workers(),
            ) {
                Ok(transport) => transport,
                Err(e) => {
                    error!("Failed to build HTTP client: {}", e);
                    return Ok(ExitCode::from(EXIT_CONFIG_ERROR));
                }
            };
            let runner = match ScenarioRunner::configure(loaded.config, Arc::new(transport)) {
                Ok(runner) => runner,
                Err(e) => {
                    error!("Invalid scenario: {}", e);
                    return Ok(ExitCode::from(EXIT_CONFIG_ERROR));
                }
            };

            let scheduler = loaded.executor.scheduler();
            let report = runner.run(scheduler.as_ref()).await;

            let export = summary_export.or(config.summary_export);
            Ok(ExitCode::from(finish(&report, json, export.as_deref())))
        }
    }
}

/// Print and export the report. Output failures are logged; the exit code
/// only reflects the thresholds.
fn finish(report: &RunReport, json: bool, export: Option<&Path>) -> u8 {
    if json {
        match report.to_json() {
            Ok(out) => println!("{}", out),
            Err(e) => error!("Failed to render report: {}", e),
        }
    } else {
        report.print_summary();
    }
    for violation in report.violations() {
        warn!(
            "Threshold crossed: {} {} (observed {:.4})",
            violation.metric, violation.predicate, violation.observed
        );
    }

    if let Some(path) = export {
        match report.save(path) {
            Ok(()) => info!("Report written to {:?}", path),
            Err(e) => error!("Failed to write report to {:?}: {}", path, e),
        }
    }

    report.exit_code()
}
