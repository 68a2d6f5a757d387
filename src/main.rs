use anyhow::Result;
use sentinel::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::time::FormatTime;

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut tracing_subscriber::fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(
            w,
            "{}",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z")
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let app_config = config::AppConfig::load()?;

    let default_level = if app_config.server.debug {
        "debug"
    } else {
        "info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_timer(LocalTimer)
        .with_env_filter(filter)
        .init();
    tracing::info!(name = version::NAME, version = version::VERSION, "starting");

    let store = Arc::new(store::MetricStore::connect(&app_config.database.path).await?);
    store.init().await?;

    let host: Arc<dyn host::HostMetrics> = Arc::new(host::SysinfoHost::new());
    let runtime: Arc<dyn runtime::RuntimeClient> = Arc::new(runtime::DockerRuntime::connect(
        &app_config.runtime.socket,
        Duration::from_secs(app_config.runtime.timeout_secs),
    )?);

    let cancel = CancellationToken::new();
    let mut tasks = Vec::new();

    if app_config.collector.enabled {
        let collector = collector::Collector::new(
            host.clone(),
            runtime.clone(),
            store.clone(),
            collector::CollectorConfig::from_app(&app_config),
        );
        tasks.push(collector.spawn(cancel.clone()));
    } else {
        tracing::info!("collector disabled");
    }

    if app_config.push.enabled {
        let push = push::PushService::new(
            host.clone(),
            runtime.clone(),
            push::PushConfig::from_app(&app_config),
        )?;
        tasks.push(push.spawn(cancel.clone()));
    } else {
        tracing::info!("push disabled");
    }

    if let Some(handle) = maintenance::spawn(
        store.clone(),
        app_config.database.vacuum_schedule.clone(),
        cancel.clone(),
    ) {
        tasks.push(handle);
    }

    let grace = Duration::from_secs(app_config.server.shutdown_grace_secs);
    let addr = app_config.server.bind_addr.clone();
    let app = routes::app(store.clone(), host, app_config);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Listening on http://{}", addr);

    tokio::spawn(shutdown_signal(cancel.clone()));
    let server_cancel = cancel.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_cancel.cancelled().await })
        .await?;

    cancel.cancel();
    let drain = futures_util::future::join_all(tasks);
    if tokio::time::timeout(grace, drain).await.is_err() {
        tracing::warn!(
            grace_secs = grace.as_secs(),
            "background tasks did not stop in time"
        );
    }
    tracing::info!("shutdown complete");
    Ok(())
}

/// Cancels `cancel` on SIGINT or SIGTERM.
async fn shutdown_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        let mut sigterm = match tokio::signal::unix::signal(
            tokio::signal::unix::SignalKind::terminate(),
        ) {
            Ok(s) => s,
            Err(_) => {
                let _ = tokio::signal::ctrl_c().await;
                cancel.cancel();
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Received shutdown signal");
    cancel.cancel();
}
