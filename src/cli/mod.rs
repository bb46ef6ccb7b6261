use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use validator::Validate;

use crate::app::{app, AppState};
use crate::config::AppConfig;
use crate::database::{DatabaseManager, Store};
use crate::mail;
use crate::models::{Identity, Profile};
use crate::validation::{field_errors, validate_phone};

#[derive(Parser)]
#[command(name = "servicehub-api")]
#[command(about = "ServiceHub API - service marketplace backend")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Run the HTTP server (default)")]
    Serve,

    #[command(about = "Apply database migrations and exit")]
    Migrate,

    #[command(about = "Create a verified superadmin account")]
    SeedAdmin(SeedAdminArgs),
}

#[derive(Args, Validate)]
pub struct SeedAdminArgs {
    #[arg(long)]
    #[validate(email)]
    pub email: String,

    #[arg(long)]
    #[validate(length(min = 2, max = 100))]
    pub name: String,

    #[arg(long)]
    #[validate(custom = "validate_phone")]
    pub phone: String,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::from_env().context("failed to load configuration")?;
    tracing::info!("Starting in {:?} mode", config.environment);

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => serve(config).await,
        Commands::Migrate => migrate(&config).await,
        Commands::SeedAdmin(args) => seed_admin(&config, &args).await,
    }
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let store = DatabaseManager::connect(&config.database)
        .await
        .context("failed to open database")?;
    let mailer = mail::from_config(&config.mail);

    let port = config.server.port;
    let state = AppState::new(config, store.clone(), mailer).context("invalid session configuration")?;

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("ServiceHub API listening on http://{}", bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    store.close().await;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn migrate(config: &AppConfig) -> anyhow::Result<()> {
    let store = DatabaseManager::connect_postgres(&config.database)
        .await
        .context("failed to open database")?;
    store.migrate().await.context("migration failed")?;
    store.close().await;
    Ok(())
}

async fn seed_admin(config: &AppConfig, args: &SeedAdminArgs) -> anyhow::Result<()> {
    if let Err(errors) = args.validate() {
        let mut fields: Vec<_> = field_errors(&errors).into_iter().collect();
        fields.sort();
        let detail: Vec<String> = fields.iter().map(|(field, message)| format!("{} {}", field, message)).collect();
        anyhow::bail!("invalid admin details: {}", detail.join(", "));
    }

    let store: Arc<dyn Store> = DatabaseManager::connect(&config.database)
        .await
        .context("failed to open database")?;

    let mut admin = Identity::new(&args.email, &args.name, &args.phone, Profile::Admin { superadmin: true }, Utc::now());
    admin.is_verified = true;

    let result = store.create_identity(admin).await;
    store.close().await;

    let admin = result.context("failed to create admin")?;
    tracing::info!("Created superadmin {} <{}>", admin.id, admin.email);
    println!("Created superadmin {} ({})", admin.email, admin.id);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
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
                tracing::error!("Failed to listen for SIGTERM: {}", e);
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

    tracing::info!("Shutdown signal received, draining connections");
}
