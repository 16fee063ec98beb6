//! Kiosk server binary: wires config, providers, store, the orchestrator
//! event queue, and the HTTP/SSE surfaces together, then serves until a
//! shutdown signal arrives.

use clap::Parser;
use kiosk_server::cli::Cli;
use kiosk_server::executor::{Executor, StreamCorrelationTable};
use kiosk_server::orchestrator::{Event, EventQueue, OrchestratorState};
use kiosk_server::providers::{HttpLlmProvider, HttpSttProvider, HttpTtsProvider};
use kiosk_server::server::{self, AppState, FanoutKioskSink, KioskBroadcaster, StaffBroadcaster};
use kiosk_server::store::SqliteStore;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(cli))
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.load_config()?;
    info!(bind_addr = %config.server.bind_addr, "configuration loaded");

    let store = Arc::new(SqliteStore::open(&config.store.db_path)?);
    info!(db_path = %config.store.db_path.display(), "store opened");

    let http_client = reqwest::Client::new();
    let stt: Arc<dyn kiosk_server::executor::providers::SttProvider> = Arc::new(HttpSttProvider::new(
        http_client.clone(),
        config.providers.stt_base_url.clone(),
        config.providers.api_key.clone(),
    ));
    let llm = Arc::new(HttpLlmProvider::new(http_client.clone(), config.providers.llm_base_url.clone(), config.providers.api_key.clone()));
    let chat: Arc<dyn kiosk_server::executor::providers::ChatProvider> = llm.clone();
    let inner_task: Arc<dyn kiosk_server::executor::providers::InnerTaskProvider> = llm;
    let tts: Arc<dyn kiosk_server::executor::providers::TtsProvider> =
        Arc::new(HttpTtsProvider::new(http_client, config.providers.tts_base_url.clone(), config.providers.api_key.clone()));

    let kiosk_broadcaster = Arc::new(KioskBroadcaster::new(64));
    let staff_broadcaster = Arc::new(StaffBroadcaster::new(64));
    let kiosk_sink: Arc<dyn kiosk_server::executor::KioskCommandSink> =
        Arc::new(FanoutKioskSink::new(kiosk_broadcaster.clone(), staff_broadcaster.clone()));
    let correlation = Arc::new(StreamCorrelationTable::default());

    let executor = Arc::new(Executor::new(stt, chat, inner_task, tts, kiosk_sink, store.clone(), correlation, None));

    let staff_cookie_secret = config.staff.cookie_secret.clone().unwrap_or_else(|| {
        tracing::warn!("no staff cookie secret configured; generating an ephemeral one for this process");
        uuid::Uuid::new_v4().to_string()
    });

    let queue = Arc::new(EventQueue::with_shared_sink(OrchestratorState::initial(now_ms()), config.orchestrator.clone(), executor.clone()));
    executor.bind_event_sink(Arc::downgrade(&queue) as std::sync::Weak<dyn kiosk_server::executor::EventSink>);

    let state = AppState {
        queue: queue.clone(),
        executor,
        store,
        kiosk_broadcaster,
        staff_broadcaster,
        staff_cookie_secret: Arc::new(staff_cookie_secret),
        staff_session_ttl_ms: config.staff.session_ttl_ms,
        sse_keepalive_interval_ms: config.sse.keepalive_interval_ms,
    };

    let shutdown = CancellationToken::new();
    let tick_shutdown = shutdown.clone();
    let tick_interval_ms = config.server.tick_interval_ms;
    let tick_queue = queue.clone();
    let tick_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_millis(tick_interval_ms));
        loop {
            tokio::select! {
                _ = tick_shutdown.cancelled() => break,
                _ = interval.tick() => {
                    tick_queue.enqueue_event(Event::Tick, now_ms()).await;
                }
            }
        }
    });

    let router = server::build_router(state, &config);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr).await?;
    info!(bind_addr = %config.server.bind_addr, "listening");

    let serve_shutdown = shutdown.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, router).with_graceful_shutdown(async move { serve_shutdown.cancelled().await }).await {
            error!(%err, "http server exited with an error");
        }
    });

    shutdown_signal().await;
    info!("shutdown signal received — starting graceful shutdown");
    shutdown.cancel();

    tokio::spawn(async {
        shutdown_signal().await;
        error!("second shutdown signal received — forcing exit");
        std::process::exit(1);
    });

    const SHUTDOWN_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(10);
    let shutdown_fut = async {
        let _ = tick_handle.await;
        let _ = server_handle.await;
    };
    if tokio::time::timeout(SHUTDOWN_TIMEOUT, shutdown_fut).await.is_err() {
        error!(timeout_secs = SHUTDOWN_TIMEOUT.as_secs(), "graceful shutdown timed out — exiting");
    }

    info!("kiosk server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}
