//! Boot sequence: configuration, logging, pipeline wiring, and shutdown.
//!
//! # Design
//! - `run_app` loads everything from the environment; `run_app_with` takes
//!   injected dependencies and a shutdown future so tests can drive it.
//! - One root cancellation token spans the process. Cancelling it refuses new
//!   admissions, stops in-flight transfers, and lets the dispatcher drain.

use std::future::Future;

use sluice_api::ApiServer;
use sluice_config::{LogOutput, ServerConfig};
use sluice_core::{Dispatcher, PathResolver, RequestGate, TransferEngine, admission_queue};
use sluice_telemetry::{GlobalContextGuard, LogFormat, LoggingConfig, Metrics};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{AppError, AppResult};

const COMPONENT: &str = "sluiced";

/// Dependencies required to bootstrap the server.
pub(crate) struct BootstrapDependencies {
    config: ServerConfig,
    install_logging: bool,
    telemetry: Metrics,
}

impl BootstrapDependencies {
    /// Construct production dependencies from the environment.
    pub(crate) fn from_env() -> AppResult<Self> {
        let config =
            ServerConfig::from_env().map_err(|err| AppError::config("config.from_env", err))?;
        let telemetry =
            Metrics::new().map_err(|err| AppError::telemetry("telemetry.metrics", err))?;
        Ok(Self {
            config,
            install_logging: true,
            telemetry,
        })
    }
}

/// Entry point for the server boot sequence.
///
/// Runs until the process receives Ctrl-C.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the root directory cannot be
/// created, or the HTTP listener fails.
pub async fn run_app() -> AppResult<()> {
    let dependencies = BootstrapDependencies::from_env()?;
    run_app_with(dependencies, shutdown_signal()).await
}

/// Boot sequence that relies entirely on injected dependencies.
pub(crate) async fn run_app_with<F>(dependencies: BootstrapDependencies, shutdown: F) -> AppResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let BootstrapDependencies {
        config,
        install_logging,
        telemetry,
    } = dependencies;

    if install_logging {
        let logging = LoggingConfig {
            level: &config.log_level,
            format: log_format(config.log_format),
            build_sha: option_env!("SLUICE_BUILD_SHA").unwrap_or("dev"),
        };
        sluice_telemetry::init_logging(&logging)
            .map_err(|err| AppError::telemetry("telemetry.init", err))?;
    }
    let _context = GlobalContextGuard::new(COMPONENT);

    info!(
        bind_addr = %config.bind_addr,
        http_port = config.http_port,
        root_dir = %config.root_dir.display(),
        queue_capacity = config.queue_capacity,
        worker_slots = config.worker_slots,
        request_timeout_secs = config.request_timeout.as_secs(),
        "configuration loaded"
    );

    ensure_root_dir(&config)?;

    let resolver = PathResolver::new(&config.root_dir)
        .map_err(|err| AppError::transfer("path_resolver.new", err))?;
    let (queue, receiver) = admission_queue(config.queue_capacity, telemetry.clone());
    let root = CancellationToken::new();
    let dispatcher = Dispatcher::new(
        receiver,
        TransferEngine::new(resolver),
        config.worker_slots,
        root.clone(),
    )
    .spawn();
    let gate = RequestGate::new(queue, root.clone(), config.request_timeout);
    let api = ApiServer::new(gate, telemetry, config.worker_slots);

    info!(
        download = %format!("http://localhost:{}/download?file=<name>", config.http_port),
        health = %format!("http://localhost:{}/health", config.http_port),
        "download server starting"
    );

    let stop = root.clone();
    let serve_result = api
        .serve(config.socket_addr(), async move {
            shutdown.await;
            info!("shutdown requested");
            stop.cancel();
        })
        .await;

    root.cancel();
    let drained = dispatcher.shutdown().await;

    serve_result.map_err(|err| AppError::api_server("api_server.serve", err))?;
    drained.map_err(|err| AppError::transfer("dispatcher.shutdown", err))?;
    info!("download server stopped");
    Ok(())
}

fn ensure_root_dir(config: &ServerConfig) -> AppResult<()> {
    if config.root_dir.is_dir() {
        return Ok(());
    }
    std::fs::create_dir_all(&config.root_dir).map_err(|source| {
        AppError::io("root_dir.create", Some(config.root_dir.clone()), source)
    })?;
    info!(root_dir = %config.root_dir.display(), "created files directory");
    Ok(())
}

const fn log_format(output: Option<LogOutput>) -> LogFormat {
    match output {
        Some(LogOutput::Json) => LogFormat::Json,
        Some(LogOutput::Pretty) => LogFormat::Pretty,
        None => LogFormat::infer(),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use sluice_test_support::ServedRoot;
    use std::time::Duration;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    fn dependencies(config: ServerConfig) -> Result<BootstrapDependencies> {
        Ok(BootstrapDependencies {
            config,
            install_logging: false,
            telemetry: Metrics::new()?,
        })
    }

    fn ephemeral(root_dir: std::path::PathBuf) -> ServerConfig {
        ServerConfig {
            bind_addr: [127, 0, 0, 1].into(),
            http_port: 0,
            root_dir,
            queue_capacity: 4,
            worker_slots: 2,
            request_timeout: Duration::from_secs(5),
            ..ServerConfig::default()
        }
    }

    #[tokio::test]
    async fn boots_and_stops_creating_the_root_dir() -> Result<()> {
        let served = ServedRoot::new()?;
        let root_dir = served.scratch().join("created");
        assert!(!root_dir.exists());

        let deps = dependencies(ephemeral(root_dir.clone()))?;
        timeout(Duration::from_secs(10), run_app_with(deps, async {})).await??;

        assert!(root_dir.is_dir());
        Ok(())
    }

    #[tokio::test]
    async fn root_dir_under_a_file_is_an_io_error() -> Result<()> {
        let served = ServedRoot::new()?;
        let blocker = served.write_outside("blocker", b"not a directory")?;

        let deps = dependencies(ephemeral(blocker.join("files")))?;
        let result = run_app_with(deps, async {}).await;

        assert!(matches!(
            result,
            Err(AppError::Io {
                operation: "root_dir.create",
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn occupied_port_is_reported() -> Result<()> {
        let served = ServedRoot::new()?;
        let occupied = TcpListener::bind("127.0.0.1:0").await?;
        let port = occupied.local_addr()?.port();

        let mut config = ephemeral(served.path().to_path_buf());
        config.http_port = port;
        let result = run_app_with(dependencies(config)?, async {}).await;

        assert!(matches!(result, Err(AppError::ApiServer { .. })));
        Ok(())
    }

    #[test]
    fn log_format_follows_configuration() {
        assert_eq!(log_format(Some(LogOutput::Json)), LogFormat::Json);
        assert_eq!(log_format(Some(LogOutput::Pretty)), LogFormat::Pretty);
        assert_eq!(log_format(None), LogFormat::infer());
    }
}
