mod clock;
mod config;
mod error;
mod handlers;
mod middleware;
mod redact;
mod services;
mod state;
mod stores;
#[cfg(test)]
mod test_utils;

use std::{
    any::Any,
    fs::OpenOptions,
    net::SocketAddr,
    path::PathBuf,
    sync::{Arc, Mutex},
};

use anyhow::{Context, Result};
use axum::{
    Router,
    http::{self, HeaderValue, Method, header},
};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::{
    clock::{Clock, SystemClock},
    config::Config,
    redact::Redactor,
    services::{
        ChatFailover, CredentialRotator, EmailSender, GeminiChatClient, PollinationsClient,
        SmtpSender,
    },
    state::AppState,
    stores::{InMemoryRateLimiter, InMemoryVerificationStore, Stores},
};

#[derive(Parser)]
#[command(name = "gateway-api")]
#[command(about = "Rate-limited gateway for chat, image and email verification")]
struct Args {
    /// Load environment variables from this file before reading config
    #[arg(long)]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider before any TLS operations
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls crypto provider"))?;

    let args = Args::parse();
    match &args.env_file {
        Some(path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }
    let config = Config::from_env()?;

    // Initialize Sentry for error tracking (must be done early, guard must stay alive)
    let _sentry_guard = config.sentry_dsn.as_ref().map(|dsn| {
        sentry::init((
            dsn.as_str(),
            sentry::ClientOptions {
                release: sentry::release_name!(),
                environment: Some(config.env.clone().into()),
                ..Default::default()
            },
        ))
    });

    // Plain-text copy of the logs, when a file is configured
    let file_layer = config
        .log_file()
        .map(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("failed to open log file {}", path))
        })
        .transpose()?
        .map(|file| fmt::layer().with_ansi(false).with_writer(Mutex::new(file)));

    // Set up tracing: JSON in production, human-readable otherwise
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.is_production() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(file_layer)
            .with(fmt::layer())
            .init();
    }

    // Without at least one chat credential there is nothing to serve.
    let rotator = Arc::new(
        CredentialRotator::from_list(&config.api_keys)
            .inspect_err(|e| tracing::error!("no chat credentials loaded: {}", e))
            .context("GATEWAY_API_KEYS is invalid")?,
    );

    let mut secrets: Vec<String> = rotator.secrets().map(str::to_owned).collect();
    secrets.extend(config.smtp_password.clone());
    let redactor = Arc::new(Redactor::new(secrets));

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let stores = Stores {
        verification: Arc::new(InMemoryVerificationStore::new(
            config.code_ttl(),
            config.privileged_email.clone(),
            clock.clone(),
        )),
        rate_limiter: Arc::new(InMemoryRateLimiter::new(config.rate_limits(), clock)),
    };

    let chat_upstream = GeminiChatClient::new(
        &config.chat_base_url,
        &config.chat_model,
        config.chat_timeout(),
    )?;
    let chat = ChatFailover::new(rotator.clone(), Arc::new(chat_upstream), redactor.clone());

    let image = PollinationsClient::new(
        &config.image_base_url,
        config.image_size,
        config.image_timeout(),
    )?;

    let email = match config.smtp_credentials() {
        Some((username, password)) => {
            let sender = SmtpSender::new(&config.smtp_host, config.smtp_port, username, password)?;
            Some(Arc::new(sender) as Arc<dyn EmailSender>)
        }
        None => {
            tracing::warn!(
                "SMTP credentials missing; set GATEWAY_SMTP_USERNAME and GATEWAY_SMTP_PASSWORD to send verification codes"
            );
            None
        }
    };

    let limits = config.rate_limits();
    tracing::info!(
        credentials = rotator.len(),
        chat_secs = limits.chat.as_secs(),
        image_secs = limits.image.as_secs(),
        email_secs = limits.email.as_secs(),
        origins = %config.allowed_origins().join(", "),
        smtp = email.is_some(),
        "gateway configured"
    );

    tokio::spawn(stores::run_sweeper(stores.clone(), config.sweep_interval()));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let cors = cors_layer(&config)?;

    let state = AppState {
        config,
        stores,
        chat: Arc::new(chat),
        image: Arc::new(image),
        email,
        redactor,
    };

    let app = app(state).layer(cors);
    let listener = TcpListener::bind(addr).await?;

    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

fn app(state: AppState) -> Router {
    let redactor = state.redactor.clone();

    let routes = Router::new()
        .nest("/health", handlers::health::router())
        .merge(handlers::auth::router())
        .merge(handlers::chat::router())
        .merge(handlers::image::router())
        .fallback(handlers::not_found)
        .with_state(state);

    boundary(routes, redactor)
}

/// Layers shared by every route: panic recovery, internal error reporting,
/// request ids, tracing and the body limit.
fn boundary(routes: Router, redactor: Arc<Redactor>) -> Router {
    // Request ID header name
    let x_request_id = http::HeaderName::from_static("x-request-id");
    let panic_redactor = redactor.clone();

    routes
        .layer(CatchPanicLayer::custom(move |panic: Box<dyn Any + Send>| {
            error::panic_response(&panic_redactor, panic)
        }))
        .layer(axum::middleware::from_fn_with_state(
            redactor,
            error::report_internal_errors,
        ))
        // Request ID: generate UUID, include in logs, return in response
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &http::Request<axum::body::Body>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            },
        ))
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid))
        .layer(RequestBodyLimitLayer::new(1024 * 1024)) // 1MB limit
}

fn cors_layer(config: &Config) -> Result<CorsLayer> {
    let origins = config
        .allowed_origins()
        .iter()
        .map(|origin| {
            HeaderValue::from_str(origin).with_context(|| format!("invalid CORS origin {}", origin))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received Ctrl+C, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
