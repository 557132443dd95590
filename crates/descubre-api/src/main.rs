//! Andalucia Descubre API 서버.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};

use descubre_api::{
    auth::generate_secret, create_app, setup_metrics_recorder, AppState, FileRuleSource,
    MemoryStore, PgStore, TokenService,
};
use descubre_core::{init_logging, AppConfig, LogConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 파일 로드 (있는 경우)
    let _ = dotenvy::dotenv();

    let config = AppConfig::load_default().context("failed to load configuration")?;

    init_logging(LogConfig::from_settings(&config.logging))
        .map_err(|e| anyhow::anyhow!("failed to initialize logging: {}", e))?;

    info!("Starting Andalucia Descubre API server...");

    // 서명 키: 설정에 없으면 프로세스마다 새로 생성
    let secret = match config.auth.jwt_secret.clone() {
        Some(secret) => secret,
        None => {
            warn!("auth.jwt_secret not set, generated a per-process key; tokens will not survive a restart");
            generate_secret()
        }
    };
    let tokens = TokenService::new(&secret, config.auth.token_ttl_minutes)
        .context("invalid token configuration")?;
    info!(ttl_minutes = tokens.ttl().num_minutes(), "Token service initialized");

    let rules = Arc::new(FileRuleSource::new(&config.access.rules_path));
    info!(path = %config.access.rules_path, "Access rules source configured");

    let state = match config.database.url.as_deref() {
        Some(url) => {
            let store = PgStore::connect(url, &config.database)
                .await
                .context("failed to connect to database")?;
            store.migrate().await.context("failed to run migrations")?;
            AppState::new(Arc::new(store), tokens, config.auth.password_scheme, rules)
        }
        None => {
            warn!("database.url not set, using in-memory store (data is lost on shutdown)");
            AppState::new(
                Arc::new(MemoryStore::new()),
                tokens,
                config.auth.password_scheme,
                rules,
            )
        }
    };
    let state = Arc::new(state);
    info!(version = %state.version, "Application state initialized");

    let metrics_handle = match setup_metrics_recorder() {
        Ok(handle) => {
            info!("Prometheus metrics recorder initialized");
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "Failed to install metrics recorder, /metrics disabled");
            None
        }
    };

    let rate_limit = config.rate_limit.enabled.then_some(&config.rate_limit);
    let app = create_app(state, &config.cors, rate_limit, metrics_handle);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "API server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server stopped gracefully");

    Ok(())
}

/// Graceful shutdown 시그널 대기.
///
/// Ctrl+C 또는 SIGTERM 시그널을 수신하면 반환합니다.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
