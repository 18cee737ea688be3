use dotenvy::dotenv;
use log::{error, info};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use portalserver::api_router::configure_api_routes;
use portalserver::bootstrap;
use portalserver::config::AppConfig;
use portalserver::notify::SmtpMailer;
use portalserver::shared::state::AppState;
use portalserver::shared::utils::create_conn;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("serve");
    if !matches!(command, "serve" | "create-admin" | "seed-departments") {
        eprintln!("Unknown command: {}", command);
        eprintln!("Usage: portalserver [serve|create-admin|seed-departments]");
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("Unknown command: {}", command),
        ));
    }

    let config = AppConfig::from_env()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let pool = create_conn(&config.database_url).map_err(|e| {
        error!("Failed to create database pool: {}", e);
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, e.to_string())
    })?;

    match command {
        "create-admin" => {
            let mut conn = pool
                .get()
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            bootstrap::ensure_admin(&mut conn, config.email.admin_email.as_deref())
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            return Ok(());
        }
        "seed-departments" => {
            let mut conn = pool
                .get()
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            bootstrap::seed_departments(&mut conn)
                .map_err(|e| std::io::Error::other(e.to_string()))?;
            return Ok(());
        }
        _ => {}
    }

    let mailer = SmtpMailer::from_config(&config.email)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;
    let app_state = Arc::new(AppState {
        conn: pool,
        config: config.clone(),
        mailer: Arc::new(mailer),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));
    let app = configure_api_routes()
        .with_state(app_state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(
                "Failed to bind to {}: {} - is another instance running?",
                addr, e
            );
            return Err(e);
        }
    };
    info!("HTTP server listening on {}", addr);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("register SIGTERM");
        let mut sigint = signal(SignalKind::interrupt()).expect("register SIGINT");
        tokio::select! {
            _ = sigterm.recv() => {}
            _ = sigint.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
