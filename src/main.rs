use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use closet_algo::auth::JwtVerifier;
use closet_algo::config::Settings;
use closet_algo::core::{Ranker, UpdateWatcher};
use closet_algo::error::{handle_json_payload_error, handle_path_error, handle_query_payload_error};
use closet_algo::routes::{self, AppState};
use closet_algo::services::{CacheManager, PostgresClient};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn init_tracing(settings: Option<&Settings>) {
    let (default_level, default_format) = settings
        .map(|s| (s.logging.level.clone(), s.logging.format.clone()))
        .unwrap_or_else(|| ("info".to_string(), "json".to_string()));

    let log_level = std::env::var("LOG_LEVEL").unwrap_or(default_level);
    let log_format = std::env::var("LOG_FORMAT").unwrap_or(default_format);

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

fn io_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

/// Register shutdown signal handlers
///
/// The returned future resolves on SIGINT or SIGTERM. Handlers are installed
/// before this returns, so a signal arriving early is not lost.
#[cfg(unix)]
fn shutdown_requested() -> std::io::Result<impl std::future::Future<Output = ()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    let mut interrupt = signal(SignalKind::interrupt())?;

    Ok(async move {
        tokio::select! {
            _ = terminate.recv() => info!("Received SIGTERM"),
            _ = interrupt.recv() => info!("Received SIGINT"),
        }
    })
}

#[cfg(not(unix))]
fn shutdown_requested() -> std::io::Result<impl std::future::Future<Output = ()>> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    })
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // CLOSET_CONFIG points at a single config file instead of config/
    let settings = match std::env::var("CLOSET_CONFIG") {
        Ok(path) => Settings::load_from(path),
        Err(_) => Settings::load(),
    };
    init_tracing(settings.as_ref().ok());

    let settings = settings.map_err(|e| {
        error!("Failed to load configuration: {}", e);
        io_error("Configuration error", e)
    })?;

    info!("Starting Closet Algo service...");

    let cache_ttl = settings.cache.entry_ttl_secs();
    let l1_cache_size = settings.cache.l1_size();

    // Markers live in Redis, so the watcher cannot run without it
    let cache = CacheManager::new(
        &settings.cache.redis_url,
        l1_cache_size,
        cache_ttl,
        settings.watcher.marker_ttl_secs,
    )
    .await
    .map_err(|e| {
        error!("Failed to connect to Redis: {}", e);
        io_error("Redis connection required", e)
    })?;
    let cache = Arc::new(cache);

    info!("Cache manager initialized (L1: {} entries, TTL: {}s)", l1_cache_size, cache_ttl);

    let db_max_conn = settings.database.max_connections.unwrap_or(10);

    let postgres = PostgresClient::from_settings(
        &settings.database.url,
        Some(db_max_conn),
        settings.database.min_connections,
        settings.database.acquire_timeout_secs,
        settings.database.idle_timeout_secs,
    )
    .await
    .map_err(|e| {
        error!("Failed to connect to PostgreSQL: {}", e);
        io_error("PostgreSQL connection error", e)
    })?;
    let postgres = Arc::new(postgres);

    info!("PostgreSQL client initialized (max: {} connections)", db_max_conn);

    let weights = settings.scoring.to_weights();
    info!("Ranker initialized with weights: {:?}", weights);

    let watcher = UpdateWatcher::new(
        settings.watcher.ceiling(),
        settings.watcher.interval(),
        settings.watcher.marker_ttl(),
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let app_state = AppState {
        postgres,
        cache,
        ranker: Ranker::new(weights),
        watcher,
        matching: settings.matching.clone(),
        shutdown: shutdown_rx,
    };
    let jwt = web::Data::new(JwtVerifier::new(&settings.auth.jwt_secret));

    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    let server = HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(jwt.clone())
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::QueryConfig::default().error_handler(handle_query_payload_error))
            .app_data(web::PathConfig::default().error_handler(handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .disable_signals()
    .bind((host, port))?
    .run();

    // Release long polls before the graceful stop waits on them
    let handle = server.handle();
    let requested = shutdown_requested()?;
    tokio::spawn(async move {
        requested.await;
        info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
        handle.stop(true).await;
    });

    server.await
}
