use anyhow::{bail, Context};
use serde_json::json;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tegenaria::config::{Config, Environment};
use tegenaria::db::{create_connection_pool, run_migrations, Crud, DatabasePool, FieldValue};
use tegenaria::models::{RegisterRequest, User, UserError};
use tegenaria::services::{crawl, CityWohnenSpider};
use tegenaria::create_app;

const USAGE: &str = "usage: tegenaria [serve | crawl | create-admin <username> <email> <password>]";

#[derive(Debug, PartialEq)]
enum Command {
    Serve,
    Crawl,
    CreateAdmin {
        username: String,
        email: String,
        password: String,
    },
}

fn parse_command(args: &[String]) -> anyhow::Result<Command> {
    match args {
        [] => Ok(Command::Serve),
        [cmd] if cmd == "serve" => Ok(Command::Serve),
        [cmd] if cmd == "crawl" => Ok(Command::Crawl),
        [cmd, username, email, password] if cmd == "create-admin" => Ok(Command::CreateAdmin {
            username: username.clone(),
            email: email.clone(),
            password: password.clone(),
        }),
        _ => bail!(USAGE),
    }
}

fn init_tracing(environment: Environment) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| environment.default_log_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = parse_command(&args)?;

    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.environment);

    info!("Configuration loaded for the {} environment", config.environment);

    match command {
        Command::Serve => serve(config).await,
        Command::Crawl => run_crawler(config).await,
        Command::CreateAdmin {
            username,
            email,
            password,
        } => create_admin(config, username, email, password).await,
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    info!("Starting Tegenaria server");

    let address = config.server_address();
    let app = create_app(config).await.map_err(|e| {
        error!("Failed to create application: {}", e);
        e
    })?;

    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind to address {address}"))?;

    info!("Server listening on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

async fn connect(config: &Config) -> anyhow::Result<DatabasePool> {
    let pool = create_connection_pool(config)
        .await
        .context("Failed to create database connection pool")?;

    if config.run_migrations {
        run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
    }

    Ok(pool)
}

async fn run_crawler(config: Config) -> anyhow::Result<()> {
    let pool = connect(&config).await?;
    let spider = CityWohnenSpider::new().context("Failed to create HTTP client")?;

    let summary = crawl(&pool, &spider).await.context("Crawl failed")?;
    info!(
        "Crawl stored {} new and {} updated apartments ({} failed)",
        summary.created, summary.updated, summary.failed
    );
    Ok(())
}

async fn create_admin(
    config: Config,
    username: String,
    email: String,
    password: String,
) -> anyhow::Result<()> {
    let pool = connect(&config).await?;

    let request = RegisterRequest {
        username: username.clone(),
        email,
        password: password.clone(),
        confirm: password,
    };

    let mut user = match User::register(&pool, &request).await {
        Ok(user) => user,
        Err(UserError::UsernameTaken) => {
            info!("User {} exists, granting admin rights", username);
            User::find_by(&pool, "username", FieldValue::from(username.as_str()))
                .await?
                .with_context(|| format!("User {username} disappeared"))?
        }
        Err(UserError::Validation(errors)) => {
            bail!("Invalid admin account: {:?}", errors.into_field_errors())
        }
        Err(e) => return Err(e.into()),
    };

    user.update(&pool, json!({ "is_admin": true, "active": true }))
        .await?;

    let has_role = user.roles(&pool).await?.iter().any(|role| role.name == "admin");
    if !has_role {
        user.add_role(&pool, "admin").await?;
    }

    info!("User {} is now an admin", user.username);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }

    info!("Starting graceful shutdown...");
}
