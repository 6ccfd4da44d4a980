use anyhow::Context;
use clap::{Parser, Subcommand};
use slot_sentry_core::browser::webdriver::{screenshot_mode, WebDriverLauncher};
use slot_sentry_core::browser::ArtifactStore;
use slot_sentry_core::captcha::{AntiCaptchaClient, CaptchaSolver};
use slot_sentry_core::core::config::{load_config_file, Requirements};
use slot_sentry_core::core::retry::TokioSleeper;
use slot_sentry_core::notify::TelegramNotifier;
use slot_sentry_core::orchestrator::bot_test;
use slot_sentry_core::persistence::{CookieJar, JsonFileStateStore};
use slot_sentry_core::service::proxy::ProxyHost;
use slot_sentry_core::{CheckOrchestrator, Config, DriverParameters, RunSettings, Services};
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const LOG_FILE: &str = "app.log";

#[derive(Parser, Debug)]
#[command(
    name = "slot-sentry",
    version,
    about = "Watches a visa appointment site for open slots and reports changes to Telegram."
)]
struct Cli {
    /// Run the browser without a window (yes/no, true/false, 1/0).
    #[arg(long, global = true, value_parser = parse_bool)]
    headless: Option<bool>,

    /// Device scale factor for the browser window.
    #[arg(long, global = true)]
    scale: Option<f64>,

    #[arg(long, global = true, default_value = "config.json")]
    config_path: PathBuf,

    #[arg(long, global = true, default_value = "state.json")]
    state_path: PathBuf,

    /// Log filter, e.g. `debug` or `info,calendar=debug`. Overrides RUST_LOG.
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a single check.
    Check,
    /// Check repeatedly; failed runs are logged and the loop goes on.
    Monitor {
        #[arg(long, default_value_t = 900)]
        period_seconds: u64,
    },
    /// Capture a bot-detection test page for diagnostics.
    BotTest,
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_lowercase().as_str() {
        "yes" | "true" | "1" => Ok(true),
        "no" | "false" | "0" => Ok(false),
        _ => Err("Expected boolean".to_string()),
    }
}

fn init_tracing(level: Option<&str>) -> anyhow::Result<()> {
    let filter = match level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(LOG_FILE)
        .with_context(|| format!("cannot open {}", LOG_FILE))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(Mutex::new(log_file)),
        )
        .init();
    Ok(())
}

async fn run_checks(
    config: &Config,
    params: DriverParameters,
    state_path: PathBuf,
    period: Option<Duration>,
) -> anyhow::Result<()> {
    let notifier = TelegramNotifier::new(config.require_telegram()?)?;
    let store = JsonFileStateStore::new(state_path);
    let solver = config
        .anticaptcha_api_key
        .as_deref()
        .map(AntiCaptchaClient::new)
        .transpose()?;
    let sleeper = TokioSleeper;

    let services = Services {
        notifier: &notifier,
        store: &store,
        solver: solver.as_ref().map(|s| s as &dyn CaptchaSolver),
        sleeper: &sleeper,
    };
    let mut orchestrator = CheckOrchestrator::new(
        RunSettings::from_config(config, params)?,
        WebDriverLauncher::from_config(config),
        ProxyHost::new(config.proxy.clone()),
        services,
        ArtifactStore::new(config.artifacts_dir.clone()),
        CookieJar::new(config.cookies_path.clone()),
    );

    match period {
        None => {
            orchestrator.run_once().await.context("check failed")?;
        }
        Some(period) => {
            orchestrator.monitor(period, None).await;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref())?;
    tracing::info!("slot-sentry v{}", env!("CARGO_PKG_VERSION"));

    let params = DriverParameters {
        headless: cli.headless,
        scale_factor: cli.scale,
    };
    let requirements = match cli.command {
        Command::BotTest => Requirements::DriverOnly,
        Command::Check | Command::Monitor { .. } => Requirements::FullCheck,
    };

    let file = load_config_file(&cli.config_path)
        .with_context(|| format!("failed to load {}", cli.config_path.display()))?;
    let mut config = Config::from_file(file, requirements)?;
    config.loaded_config_path = Some(cli.config_path.display().to_string());
    tracing::debug!("Loaded configuration: {:?}", config);

    match cli.command {
        Command::Check => run_checks(&config, params, cli.state_path, None).await,
        Command::Monitor { period_seconds } => {
            run_checks(
                &config,
                params,
                cli.state_path,
                Some(Duration::from_secs(period_seconds)),
            )
            .await
        }
        Command::BotTest => {
            bot_test(
                &WebDriverLauncher::from_config(&config),
                params,
                screenshot_mode(config.driver_kind, params),
                &ArtifactStore::new(config.artifacts_dir.clone()),
                &TokioSleeper,
            )
            .await?;
            Ok(())
        }
    }
}
