//! Service assembly: logging, store, background tasks and the API server.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cronsentry_api::{ApiServer, AppState, ServerAddr};
use cronsentry_config::{
    Config, ConfigError, ConfigLoader, ConfigValidator, DatabaseConfig, DispatcherConfig,
    LoggingConfig,
};
use cronsentry_core::{
    spawn_periodic, Clock, DispatcherSettings, JobService, MissedRunDetector,
    NotificationDispatcher, PingHandler, RecoveryBasis, RetryPolicy, ScheduleRecompute,
    SystemClock,
};
use cronsentry_notify_email::build_sender;
use cronsentry_protocols::{JobStore, NotificationSender, StoreError, User};
use cronsentry_store_sqlite::SqliteJobStore;

use crate::signal::shutdown_signal;

/// Initialize tracing with a console layer and a daily rolling file layer.
pub(crate) fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = expand(&logging.directory);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("cronsentry")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The writer flushes only while its guard is alive.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

fn expand(path: &Path) -> PathBuf {
    PathBuf::from(ConfigLoader::expand_path(&path.to_string_lossy()))
}

/// Load the configuration file, falling back to defaults when it does not
/// exist. The flag tells whether a file was read.
pub(crate) fn load_config(path: &Path) -> Result<(Config, bool), ConfigError> {
    match ConfigLoader::load(path) {
        Ok(config) => Ok((config, true)),
        Err(ConfigError::NotFound(_)) => Ok((Config::default(), false)),
        Err(e) => Err(e),
    }
}

pub(crate) async fn open_store(database: &DatabaseConfig) -> Result<Arc<SqliteJobStore>, StoreError> {
    let store = if database.is_in_memory() {
        SqliteJobStore::in_memory().await?
    } else {
        SqliteJobStore::open(expand(&database.path)).await?
    };
    Ok(Arc::new(store))
}

pub(crate) fn dispatcher_settings(config: &DispatcherConfig) -> DispatcherSettings {
    DispatcherSettings {
        batch_size: config.batch_size,
        retry: RetryPolicy {
            max_attempts: config.max_attempts,
            base: Duration::from_secs(config.retry_base_secs),
            max: Duration::from_secs(config.retry_max_secs),
        },
        dashboard_url: config.dashboard_url.clone(),
    }
}

/// A running background task and its stop switch.
struct Background {
    name: &'static str,
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Background {
    /// Signal the task and wait for its current tick to finish.
    async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            warn!(task = self.name, "Background task ended abnormally: {}", e);
        }
    }
}

/// Run the service until SIGINT or SIGTERM.
pub(crate) async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    for warning in ConfigValidator::validate(&config)?.into_result()? {
        warn!("Config warning [{}]: {}", warning.path, warning.message);
    }

    let store = open_store(&config.database).await?;
    info!(store = store.id(), "Job store ready");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    store
        .upsert_user(&User::new(
            &config.owner.id,
            &config.owner.email,
            &config.owner.name,
            clock.now(),
        ))
        .await?;

    let basis: RecoveryBasis = config.detector.recovery_basis.parse()?;
    let sender = build_sender(&config.email)?;
    info!(transport = sender.name(), "Email transport ready");

    let detector = if config.detector.enabled {
        let (stop, stop_rx) = watch::channel(false);
        let task = Arc::new(MissedRunDetector::new(store.clone(), clock.clone()));
        let handle = spawn_periodic(
            task,
            Duration::from_secs(config.detector.interval_secs),
            stop_rx,
        );
        Some(Background {
            name: "missed-run-detector",
            stop,
            handle,
        })
    } else {
        warn!("Missed-run detector disabled");
        None
    };

    let dispatcher = if config.dispatcher.enabled {
        let (stop, stop_rx) = watch::channel(false);
        let task = Arc::new(NotificationDispatcher::new(
            store.clone(),
            sender,
            clock.clone(),
            dispatcher_settings(&config.dispatcher),
        ));
        let handle = spawn_periodic(
            task,
            Duration::from_secs(config.dispatcher.interval_secs),
            stop_rx,
        );
        Some(Background {
            name: "notification-dispatcher",
            stop,
            handle,
        })
    } else {
        warn!("Notification dispatcher disabled");
        None
    };

    let state = AppState::new(
        JobService::new(store.clone(), store.clone(), clock.clone()),
        PingHandler::new(store.clone(), clock.clone(), ScheduleRecompute::new(basis)),
        store.clone(),
    )
    .with_default_owner(&config.owner.id);

    let server = ApiServer::new(
        ServerAddr::new(&config.server.host, config.server.port),
        Arc::new(state),
    );

    // Background tasks stop in order before the server drains.
    let shutdown = async move {
        shutdown_signal().await;
        info!("Shutting down");
        for task in [detector, dispatcher].into_iter().flatten() {
            task.stop().await;
        }
    };

    info!(
        recovery_basis = %basis,
        started_at = %Utc::now(),
        "CronSentry started"
    );
    server.run(shutdown).await
}

/// Validate a configuration and print the findings.
pub(crate) fn check_config(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (config, loaded) = load_config(path)?;
    if !loaded {
        return Err(Box::new(ConfigError::NotFound(path.display().to_string())));
    }

    let result = ConfigValidator::validate(&config)?;
    for warning in &result.warnings {
        println!("warning: {}: {}", warning.path, warning.message);
    }
    for error in &result.errors {
        println!("error: {}: {}", error.path, error.message);
    }
    result.into_result()?;
    println!("Configuration OK: {}", path.display());
    Ok(())
}
