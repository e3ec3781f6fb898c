// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::net::SocketAddr;
use std::time::Duration;

use axum_server::tls_rustls::RustlsConfig;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use nitroauth::api::router;
use nitroauth::config::{Config, LogFormat};
use nitroauth::state::AppState;

/// How often the rate limiter sweeps out closed windows.
const LIMITER_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

/// Resolves on SIGINT or SIGTERM, then cancels the token so background
/// tasks wind down with the server.
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
    token.cancel();
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(&config);

    if config.uses_dev_secret() {
        tracing::warn!(
            "NITRO_TOKEN_SECRET is not set; tokens are signed with the built-in \
             development secret"
        );
    }

    // Install the ring crypto provider for rustls (must be done before any TLS operations)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let state = match AppState::new(config) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to open the broker database");
            std::process::exit(1);
        }
    };

    let shutdown = CancellationToken::new();

    // Closed rate windows accumulate per identity; sweep them periodically.
    let sweeper = {
        let limiter = state.limiter.clone();
        let token = shutdown.clone();
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(LIMITER_SWEEP_INTERVAL);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tick.tick() => {
                        let purged = limiter.purge_expired();
                        if purged > 0 {
                            tracing::debug!(purged, "swept expired rate windows");
                        }
                    }
                }
            }
        })
    };

    let addr: SocketAddr = format!("{}:{}", state.config.host, state.config.port)
        .parse()
        .expect("Failed to parse bind address");
    let tls_paths = state
        .config
        .tls_paths()
        .map(|(cert, key)| (cert.to_path_buf(), key.to_path_buf()));
    let app = router(state);

    match tls_paths {
        Some((cert, key)) => {
            let tls = RustlsConfig::from_pem_file(&cert, &key)
                .await
                .expect("Failed to load TLS certificate or key");
            tracing::info!(%addr, "NitroAuth broker listening (https, docs at /docs)");

            let handle = axum_server::Handle::new();
            {
                let handle = handle.clone();
                let token = shutdown.clone();
                tokio::spawn(async move {
                    shutdown_signal(token).await;
                    handle.graceful_shutdown(Some(Duration::from_secs(10)));
                });
            }

            axum_server::bind_rustls(addr, tls)
                .handle(handle)
                .serve(app.into_make_service())
                .await
                .expect("HTTPS server failed");
        }
        None => {
            tracing::info!(%addr, "NitroAuth broker listening (http, docs at /docs)");
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .expect("Failed to bind address");
            axum::serve(listener, app)
                .with_graceful_shutdown(shutdown_signal(shutdown.clone()))
                .await
                .expect("HTTP server failed");
        }
    }

    shutdown.cancel();
    let _ = sweeper.await;
    tracing::info!("NitroAuth broker stopped");
}
