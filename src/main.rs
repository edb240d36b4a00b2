use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use tokio::{signal, sync::mpsc};
use tracing::{error, info, warn};

use delivery_tracking as api;
use api::{
    notifications::{HttpPushTransport, NoopPushTransport, NotificationDispatcher, PushTransport},
    rate_limiter::{
        CounterStore, InMemoryCounterStore, RateLimitConfig, RateLimiter, RedisCounterStore,
    },
    storage::LocalDocumentStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = api::config::load_config().context("failed to load configuration")?;
    api::config::init_tracing(cfg.log_level(), cfg.log_json);

    // Init DB
    let db_pool = api::db::establish_connection_from_app_config(&cfg)
        .await
        .context("failed to connect to database")?;
    if cfg.auto_migrate {
        api::db::run_migrations(&db_pool).await.map_err(|e| {
            error!("Failed running migrations: {}", e);
            e
        })?;
    }
    let db_arc = Arc::new(db_pool);

    // Redis is optional; the client is only constructed here
    let redis_client = match &cfg.redis_url {
        Some(url) => Some(Arc::new(
            redis::Client::open(url.as_str()).context("invalid redis_url")?,
        )),
        None => None,
    };

    // slog root for background components
    let base_logger = api::logging::setup_logger(api::logging::LoggerConfig {
        environment: cfg.environment.clone(),
        use_color: !cfg.log_json,
        ..Default::default()
    });

    // Push delivery
    let notification_logger = api::logging::component_logger(&base_logger, "notifications");
    let transport: Arc<dyn PushTransport> = match &cfg.push_endpoint {
        Some(endpoint) => {
            info!("Push notifications enabled via {}", endpoint);
            Arc::new(
                HttpPushTransport::new(
                    endpoint.clone(),
                    cfg.push_api_key.clone(),
                    cfg.push_timeout(),
                )
                .context("failed to build push client")?,
            )
        }
        None => {
            warn!("push_endpoint not configured; notifications will only be logged");
            Arc::new(NoopPushTransport::new(notification_logger.clone()))
        }
    };
    let dispatcher = Arc::new(
        NotificationDispatcher::new(db_arc.clone(), transport, notification_logger)
            .with_locale(cfg.default_locale)
            .with_retry(cfg.push_max_attempts, Duration::from_millis(500)),
    );

    // Init events
    let (event_tx, event_rx) = mpsc::channel(cfg.event_channel_capacity);
    let event_sender = api::events::EventSender::new(event_tx);
    let event_worker = tokio::spawn(api::events::process_events(event_rx, dispatcher));

    // Tracking search rate limiting
    let rl_cfg = RateLimitConfig {
        requests_per_window: cfg.tracking_rate_limit_requests,
        window_duration: cfg.tracking_rate_limit_window(),
    };
    let store: Arc<dyn CounterStore> = match (&redis_client, cfg.rate_limit_use_redis) {
        (Some(client), true) => {
            info!("Tracking rate limits stored in Redis");
            Arc::new(RedisCounterStore::new(
                client.clone(),
                cfg.rate_limit_namespace.clone(),
            ))
        }
        _ => {
            let memory = Arc::new(InMemoryCounterStore::new());
            spawn_counter_cleanup(memory.clone(), rl_cfg.window_duration);
            memory as Arc<dyn CounterStore>
        }
    };
    let limiter = Arc::new(RateLimiter::new(rl_cfg, store));

    let documents = Arc::new(LocalDocumentStore::new(cfg.document_storage_root.clone()));

    // Aggregate app services used by HTTP handlers
    let services = api::handlers::AppServices::new(
        db_arc.clone(),
        event_sender.clone(),
        limiter,
        documents,
        cfg.default_locale,
    );
    spawn_lock_pruning(services.order_locks.clone());

    // Compose shared app state
    let app_state = api::AppState {
        db: db_arc,
        config: cfg.clone(),
        event_sender,
        services,
        redis: redis_client,
    };
    let app = api::app_router(app_state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", cfg.host, cfg.port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", cfg.host, cfg.port))?;
    info!("delivery-tracking listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last senders; the worker drains and stops.
    if let Err(e) = event_worker.await {
        error!("event worker failed: {}", e);
    }
    Ok(())
}

fn spawn_counter_cleanup(store: Arc<InMemoryCounterStore>, window: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(window.max(Duration::from_secs(1)));
        loop {
            interval.tick().await;
            store.cleanup_expired(window);
        }
    });
}

fn spawn_lock_pruning(locks: api::services::order_locks::OrderLocks) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(300));
        loop {
            interval.tick().await;
            locks.prune();
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
