use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use speedwatch::config::{Settings, DEFAULT_CONFIG_FILE};
use speedwatch::{
    AlertLog, AnomalyEvaluator, BaselineLearner, LearnError, MeasurementExecutor, Scheduler,
    Shutdown, StatePublisher, StatusServer,
};
use speedwatch_adapters::{Notifier, SpeedProbe};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// How long exit waits for a probe still running on the blocking pool.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "speedwatch", version)]
#[command(about = "Learn normal network speeds, then alert when a speed test falls outside them")]
struct Args {
    /// Path to a TOML config file (defaults to ./speedwatch.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Successful samples to collect while learning
    #[arg(long)]
    learning_runs: Option<usize>,

    /// Multiplier applied to the standard deviation of learned samples
    #[arg(long)]
    tolerance: Option<f64>,

    /// Do not start the HTTP status interface
    #[arg(long)]
    no_server: bool,

    /// Log filter, e.g. "debug" or "speedwatch=trace" (overrides RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    print_config: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.log_level.as_deref())?;

    let settings = load_settings(&args)?;
    if args.print_config {
        println!("{}", serde_json::to_string_pretty(&settings.redacted())?);
        return Ok(());
    }

    // Built outside the runtime: blocking HTTP clients must also be dropped
    // outside it, so main keeps a reference until the runtime is gone.
    let probe = settings.probe.build()?;
    let notifiers = settings.notify.build()?;
    let alert_log = AlertLog::open(&settings.alerts.log_file).with_context(|| {
        format!(
            "failed to open alert log {}",
            settings.alerts.log_file.display()
        )
    })?;

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(run(
        settings,
        Arc::clone(&probe),
        notifiers.clone(),
        alert_log,
    ));
    runtime.shutdown_timeout(SHUTDOWN_GRACE);
    drop(notifiers);
    drop(probe);
    result
}

fn init_tracing(level: Option<&str>) -> Result<()> {
    let filter = match level {
        Some(level) => {
            EnvFilter::try_new(level).with_context(|| format!("invalid log filter '{level}'"))?
        }
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install log subscriber: {e}"))
}

fn load_settings(args: &Args) -> Result<Settings> {
    let (path, required) = match &args.config {
        Some(path) => (path.clone(), true),
        None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
    };
    let mut settings = Settings::load(&path, required)
        .with_context(|| format!("failed to load configuration from {}", path.display()))?;

    if let Some(runs) = args.learning_runs {
        settings.learning.samples = runs;
    }
    if let Some(tolerance) = args.tolerance {
        settings.learning.tolerance_factor = tolerance;
    }
    if args.no_server {
        settings.server.enabled = false;
    }

    settings.validate()?;
    Ok(settings)
}

async fn run(
    settings: Settings,
    probe: Arc<dyn SpeedProbe>,
    notifiers: Vec<Arc<dyn Notifier>>,
    alert_log: AlertLog,
) -> Result<()> {
    let (shutdown, stop) = Shutdown::new();

    info!(probe = probe.description(), "Using speed probe");
    let publisher = StatePublisher::new(settings.history.capacity);
    let mut executor =
        MeasurementExecutor::new(probe, publisher.clone()).with_retry(settings.retry_policy());
    if let Some(timeout) = settings.probe.timeout {
        executor = executor.with_timeout(timeout);
    }
    let scheduler = Scheduler::new(
        executor,
        publisher,
        settings.monitoring.interval,
        stop.clone(),
    );

    let watcher = scheduler.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                shutdown.trigger();
                if watcher.is_running() {
                    info!(grace = ?SHUTDOWN_GRACE, "Waiting for the running speed test to finish");
                }
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    let server = if settings.server.enabled {
        let addr = settings.server.socket_addr()?;
        let (_, handle) = StatusServer::new(scheduler.clone())
            .start(addr, stop.clone())
            .await
            .with_context(|| format!("failed to start status server on {addr}"))?;
        Some(handle)
    } else {
        None
    };

    let learner = BaselineLearner::new(settings.learning_config());
    let baseline = match learner.learn(|| scheduler.measure_exclusive(), &stop).await {
        Ok(baseline) => baseline,
        Err(LearnError::Cancelled) => {
            info!("Stopped during learning phase");
            return Ok(());
        }
        Err(e) => return Err(e).context("cannot establish a baseline"),
    };

    let (download, upload) = baseline.ranges();
    for line in [
        format!("Learned normal download speed range: {download}"),
        format!("Learned normal upload speed range: {upload}"),
    ] {
        info!("{}", line);
        if let Err(e) = alert_log.append(&line) {
            error!(path = %alert_log.path().display(), error = %e, "Failed to write alert log");
        }
    }

    scheduler.arm(
        AnomalyEvaluator::new(baseline)
            .with_log(alert_log)
            .with_notifiers(notifiers),
    );
    scheduler.start().join().await;

    if let Some(server) = server {
        if let Err(e) = server.await {
            if e.is_panic() {
                warn!(error = %e, "Status server panicked");
            }
        }
    }
    Ok(())
}
