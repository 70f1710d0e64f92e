//! Control-plane entry point.

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use meetbot::adapters::orchestrator::{ContainerApiClient, LocalProcessOrchestrator};
use meetbot::adapters::sqlite;
use meetbot::adapters::storage::S3ArtifactStore;
use meetbot::api::{self, AppState};
use meetbot::cli::commands::{BotCommand, SlotCommand, TenantCommand};
use meetbot::cli::{display, Cli, Command};
use meetbot::domain::models::{BotStatus, Config, OrchestratorMode, SubscriptionPlan};
use meetbot::domain::ports::{
    ApiKeyRepository, BotFilter, BotRepository, ContainerOrchestrator, SlotRepository,
    TenantRepository,
};
use meetbot::infrastructure::config::ConfigLoader;
use meetbot::infrastructure::logging::init_logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path)?,
        None => ConfigLoader::load()?,
    };
    let config = Arc::new(config);

    init_logging(&config.logging).ok();

    match cli.command {
        Command::Serve => serve(config).await,
        Command::Migrate => migrate(config).await,
        Command::Bot { command } => bot_command(config, command).await,
        Command::Slot { command } => slot_command(config, command).await,
        Command::Tenant { command } => tenant_command(config, command).await,
    }
}

async fn open_db(config: &Config) -> Result<sqlx::SqlitePool> {
    let url = format!("sqlite:{}", config.database.path);
    let pool = sqlite::create_pool(&url, None)
        .await
        .context("Failed to open database")?;
    sqlite::migrate(&pool)
        .await
        .context("Failed to run migrations")?;
    Ok(pool)
}

fn build_orchestrator(config: &Config) -> Arc<dyn ContainerOrchestrator> {
    match config.orchestrator.mode {
        OrchestratorMode::LocalProcess => Arc::new(LocalProcessOrchestrator::default()),
        _ => Arc::new(ContainerApiClient::new(
            config.orchestrator.api_url.clone(),
            config.orchestrator.api_token.clone(),
        )),
    }
}

async fn serve(config: Arc<Config>) -> Result<()> {
    let db = open_db(&config).await?;

    let orchestrator = build_orchestrator(&config);
    let artifacts = Arc::new(S3ArtifactStore::from_config(&config.artifacts).await);

    let services = api::build_services(db, config.clone(), orchestrator, artifacts);

    // Background workers: slot recovery and periodic queue drain.
    let recovery_handle = services.recovery_worker.clone().spawn();
    let drain_services = services.clone();
    let drain_interval = config.queue.drain_interval_secs;
    tokio::spawn(async move {
        let mut ticker =
            tokio::time::interval(std::time::Duration::from_secs(drain_interval.max(1)));
        loop {
            ticker.tick().await;
            if let Err(err) = drain_services.coordinator.drain_queue().await {
                tracing::warn!(error = %err, "periodic queue drain failed");
            }
        }
    });

    let app = api::router(AppState {
        services: services.clone(),
    });
    let addr = format!("{}:{}", config.server.bind, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    info!(%addr, "control plane listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    recovery_handle.stop();
    Ok(())
}

async fn migrate(config: Arc<Config>) -> Result<()> {
    let db = open_db(&config).await?;
    drop(db);
    println!("migrations applied");
    Ok(())
}

async fn bot_command(config: Arc<Config>, command: BotCommand) -> Result<()> {
    let db = open_db(&config).await?;
    let bots = sqlite::SqliteBotRepository::new(db);

    match command {
        BotCommand::List { status, limit } => {
            let status = status
                .as_deref()
                .map(|raw| {
                    BotStatus::from_str(raw)
                        .with_context(|| format!("unknown status {raw:?}"))
                })
                .transpose()?;
            let list = bots
                .list(BotFilter {
                    tenant_id: None,
                    status,
                    limit: Some(limit),
                })
                .await?;
            println!("{}", display::bot_table(&list));
        }
    }
    Ok(())
}

async fn slot_command(config: Arc<Config>, command: SlotCommand) -> Result<()> {
    let db = open_db(&config).await?;
    let slots = sqlite::SqliteSlotRepository::new(db);

    match command {
        SlotCommand::List => {
            let list = slots.list().await?;
            println!("{}", display::slot_table(&list));
        }
    }
    Ok(())
}

async fn tenant_command(config: Arc<Config>, command: TenantCommand) -> Result<()> {
    let db = open_db(&config).await?;
    let tenants = sqlite::SqliteTenantRepository::new(db.clone());
    let api_keys = sqlite::SqliteApiKeyRepository::new(db);

    match command {
        TenantCommand::Create {
            name,
            plan,
            timezone,
            daily_limit,
        } => {
            let plan = SubscriptionPlan::from_str(&plan)
                .with_context(|| format!("unknown plan {plan:?}"))?;
            let tenant = tenants.insert(&name, plan, daily_limit, &timezone).await?;

            let key = format!("mb_{}", uuid::Uuid::new_v4().simple());
            api_keys
                .insert(
                    tenant.id,
                    &meetbot::api::auth::hash_api_key(&key),
                    Some("initial"),
                    None,
                )
                .await?;

            println!("tenant {} created (id {})", tenant.name, tenant.id);
            println!("api key: {key}");
        }
    }
    Ok(())
}
