//! Apollusia server entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use apollusia_api::{health_router, middleware::AppState, router as api_router};
use apollusia_common::Config;
use apollusia_core::{
    EmailService, JobService, JobWorkerContext, PollService, PushNotificationService,
};
use apollusia_db::repositories::{ParticipantRepository, PollEventRepository, PollRepository};
use axum::{Router, middleware};
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

/// Build the notification worker context from the optional config sections.
fn worker_context(config: &Config) -> Result<JobWorkerContext, Box<dyn std::error::Error>> {
    let email_service = match &config.mail {
        Some(mail) => {
            info!(host = %mail.host, port = mail.port, "Mail notifications enabled");
            Some(EmailService::new(mail)?)
        }
        None => {
            warn!("No mail section configured, mail notifications disabled");
            None
        }
    };

    let push_service = match &config.push {
        Some(push) => {
            info!("Push notifications enabled");
            Some(PushNotificationService::new(push.clone())?)
        }
        None => {
            warn!("No push section configured, push notifications disabled");
            None
        }
    };

    Ok(JobWorkerContext {
        email_service,
        push_service,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "apollusia=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting apollusia server...");

    // Load configuration
    let config = Config::load()?;

    // Connect to database
    let db = apollusia_db::init(&config).await?;
    info!("Connected to database");

    // Run migrations
    info!("Running database migrations...");
    apollusia_db::migrate(&db).await?;
    info!("Migrations completed");

    // Initialize repositories
    let db = Arc::new(db);
    let poll_repo = PollRepository::new(Arc::clone(&db));
    let event_repo = PollEventRepository::new(Arc::clone(&db));
    let participant_repo = ParticipantRepository::new(Arc::clone(&db));

    // Start notification workers
    let jobs = JobService::new();
    let job_sender = jobs.sender();
    jobs.start(worker_context(&config)?);

    let poll_service = PollService::new(
        poll_repo,
        event_repo,
        participant_repo,
        Some(job_sender),
        config.server.origin(),
    );

    let state = AppState { poll_service };

    let app = Router::new()
        .merge(health_router())
        .nest("/api", api_router())
        .layer(middleware::from_fn(apollusia_api::middleware::auth_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    // Start server with graceful shutdown
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
