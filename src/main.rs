use std::{process, sync::Arc};

use listings::{
    application::{auth::AuthService, error::AppError},
    cache::{CacheConfig, CacheService},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        memory::MemoryRepositories,
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::IssueToken(args) => run_issue_token(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let cache = init_cache(&settings).await?;

    let state = match connect_database(&settings).await? {
        Some(db) => ApiState::from_repositories(db.clone(), cache).with_database(db),
        None => {
            warn!(
                target = "listings::bootstrap",
                "no database url configured; using in-memory repositories, data is lost on exit"
            );
            ApiState::from_repositories(Arc::new(MemoryRepositories::new()), cache)
        }
    };

    let router = http::build_api_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    http::serve(listener, router, settings.server.graceful_shutdown)
        .await
        .map_err(AppError::from)
}

async fn run_issue_token(
    settings: config::Settings,
    args: config::IssueTokenArgs,
) -> Result<(), AppError> {
    let db = connect_database(&settings)
        .await?
        .ok_or_else(|| AppError::validation("issue-token requires a database url"))?;

    let auth = AuthService::new(db.clone(), db);
    let issued = auth
        .issue_token(&args.email, &args.name)
        .await
        .map_err(|err| AppError::unexpected(err.to_string()))?;

    info!(
        target = "listings::issue_token",
        user_id = %issued.user.id,
        email = %issued.user.email,
        "issued bearer token"
    );
    println!("{}", issued.token);
    Ok(())
}

/// Connects and migrates when a database url is configured.
async fn connect_database(
    settings: &config::Settings,
) -> Result<Option<Arc<PostgresRepositories>>, AppError> {
    let Some(database_url) = settings.database.url.as_deref() else {
        return Ok(None);
    };

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    Ok(Some(Arc::new(PostgresRepositories::new(pool))))
}

/// An unreachable Redis is not fatal: the cache fails open.
async fn init_cache(settings: &config::Settings) -> Result<CacheService, AppError> {
    let cache = CacheService::from_config(&CacheConfig::from(&settings.cache))
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    match cache.ping().await {
        Ok(()) => info!(
            target = "listings::bootstrap",
            backend = cache.backend(),
            default_ttl = cache.default_ttl(),
            "cache ready"
        ),
        Err(err) => warn!(
            target = "listings::bootstrap",
            backend = cache.backend(),
            error = %err,
            "cache store unreachable; serving uncached until it recovers"
        ),
    }

    Ok(cache)
}
