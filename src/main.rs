use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method,
    },
    response::IntoResponse,
    Router,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::net::TcpListener;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use pitchlab_backend::{
    config::Config,
    db::{
        postgres_company_repository::PostgresCompanyRepository,
        postgres_payment_repository::PostgresPaymentRepository,
        postgres_stripe_event_log_repository::PostgresStripeEventLogRepository,
        postgres_user_repository::PostgresUserRepository,
    },
    responses::JsonResponse,
    routes,
    services::{
        otp::{spawn_sweeper, OtpStore},
        smtp_mailer::{LogMailer, Mailer, SmtpMailer},
        stripe::LiveStripeService,
    },
    state::AppState,
    utils::{csrf::CSRF_HEADER, jwt::SessionSigner},
};

#[cfg(feature = "tls")]
use axum_server::tls_rustls::RustlsConfig;

const RATE_LIMIT_MESSAGE: &str = "Too many requests. Please wait a moment and try again.";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = Arc::new(Config::from_env().context("invalid configuration")?);

    let pool = establish_connection(&config.database_url).await?;
    sqlx::migrate!()
        .run(&pool)
        .await
        .context("failed to run database migrations")?;

    let mailer: Arc<dyn Mailer> = match &config.smtp {
        Some(settings) => Arc::new(SmtpMailer::new(settings, &config.frontend_origin)?),
        None => {
            warn!("SMTP_HOST not set; emails will be written to the log");
            Arc::new(LogMailer::new(config.frontend_origin.clone()))
        }
    };
    if !config.webhook_signing_enabled() {
        warn!("STRIPE_WEBHOOK_SECRET not set; webhook signatures will not be verified");
    }

    let session_signer = SessionSigner::from_config(&config).context("JWT_SECRET rejected")?;
    let otp_store = Arc::new(OtpStore::new(config.otp.max_attempts));
    spawn_sweeper(otp_store.clone(), config.otp.sweep_interval);

    let state = AppState {
        db: Arc::new(PostgresUserRepository { pool: pool.clone() }),
        company_repo: Arc::new(PostgresCompanyRepository { pool: pool.clone() }),
        payment_repo: Arc::new(PostgresPaymentRepository { pool: pool.clone() }),
        stripe_event_repo: Arc::new(PostgresStripeEventLogRepository { pool }),
        mailer,
        stripe: Arc::new(LiveStripeService::from_settings(&config.stripe)),
        otp_store,
        config: config.clone(),
        session_signer: Arc::new(session_signer),
    };

    let limits = &config.rate_limits;
    let global_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_millisecond(limits.global_per_millisecond)
            .burst_size(limits.global_burst)
            .use_headers()
            .error_handler(|_err| JsonResponse::too_many_requests(RATE_LIMIT_MESSAGE).into_response())
            .finish()
            .context("invalid global rate limit settings")?,
    );
    // stricter limiter for OTP and credential routes
    let auth_governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(limits.auth_per_second)
            .burst_size(limits.auth_burst)
            .use_headers()
            .error_handler(|_err| JsonResponse::too_many_requests(RATE_LIMIT_MESSAGE).into_response())
            .finish()
            .context("invalid auth rate limit settings")?,
    );

    for limiter in [
        global_governor_conf.limiter().clone(),
        auth_governor_conf.limiter().clone(),
    ] {
        std::thread::spawn(move || loop {
            std::thread::sleep(Duration::from_secs(60));
            limiter.retain_recent();
        });
    }

    let cors = CorsLayer::new()
        .allow_origin(
            config
                .frontend_origin
                .parse::<HeaderValue>()
                .context("FRONTEND_ORIGIN is not a valid header value")?,
        )
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(CSRF_HEADER),
        ])
        .allow_credentials(true);

    let app = Router::new()
        .merge(routes::throttled_routes().layer(GovernorLayer {
            config: auth_governor_conf,
        }))
        .merge(routes::open_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(GovernorLayer {
            config: global_governor_conf,
        })
        .layer(cors);

    let make_service = app.into_make_service_with_connect_info::<SocketAddr>();
    let addr = config.bind_addr;

    #[cfg(feature = "tls")]
    {
        let tls_config = RustlsConfig::from_pem_file(
            std::env::var("DEV_CERT_LOCATION").context("DEV_CERT_LOCATION not set")?,
            std::env::var("DEV_KEY_LOCATION").context("DEV_KEY_LOCATION not set")?,
        )
        .await
        .context("failed to load TLS certs")?;

        info!(%addr, "listening with TLS");
        axum_server::bind_rustls(addr, tls_config)
            .serve(make_service)
            .await?;
        return Ok(());
    }

    #[allow(unreachable_code)]
    {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {}", addr))?;
        info!(%addr, "listening");
        axum::serve(listener, make_service).await?;
        Ok(())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Establish a connection to the database and verify it.
async fn establish_connection(database_url: &str) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
        .context("failed to connect to the database")?;

    sqlx::query("SELECT 1")
        .execute(&pool)
        .await
        .context("failed to verify database connection")?;

    info!("connected to the database");
    Ok(pool)
}
