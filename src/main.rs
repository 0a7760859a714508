use std::{path::PathBuf, sync::Arc};

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use waypost::{
    config::AppConfig,
    engine::{
        Router, RouterError, RouterSettings,
        policy::RhaiPolicyGate,
        route::FileRouteSource,
    },
    http_client::HttpClientPool,
    http_server::ensure_api_key,
    persistence::{SqliteDeliveryStore, traits::DeliveryStore},
    supervisor::Supervisor,
    template::TemplateService,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding app.yaml, routes.yaml, outputs.yaml and templates.yaml.
    #[arg(long, short, global = true, default_value = "configs")]
    config_dir: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Runs the router and, when enabled, the HTTP server.
    Run,
    /// Routes a single event read from a file, then flushes and exits.
    Send {
        /// Path to a JSON event.
        file: PathBuf,
        /// Deliver to this route only.
        #[arg(long)]
        route: Option<String>,
    },
    /// Prints the management API key, generating it if needed.
    ApiKey {
        /// Generate a new key, replacing the current one.
        #[arg(long)]
        rotate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber =
        FmtSubscriber::builder().with_env_filter(EnvFilter::from_default_env()).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    tracing::debug!(config_dir = %cli.config_dir, "Loading application configuration...");
    let config = AppConfig::new(Some(&cli.config_dir))?;

    let store = Arc::new(SqliteDeliveryStore::new(&config.database_url).await?);
    store.run_migrations().await?;

    match cli.command {
        Commands::Run => run_supervisor(config, store).await?,
        Commands::Send { file, route } => send_event(config, store, file, route).await?,
        Commands::ApiKey { rotate } => {
            let key = if rotate {
                store.generate_and_store_api_key(&config.tenant_name).await?
            } else {
                ensure_api_key(store.as_ref(), &config.tenant_name).await?
            };
            println!("{key}");
        }
    }

    Ok(())
}

async fn run_supervisor(
    config: AppConfig,
    store: Arc<SqliteDeliveryStore>,
) -> Result<(), Box<dyn std::error::Error>> {
    let supervisor = Supervisor::builder()
        .config(config)
        .store(Arc::clone(&store) as Arc<dyn DeliveryStore>)
        .build()
        .await?;

    tracing::info!("Supervisor initialized, waiting for events...");
    supervisor.run().await?;

    store.close().await;
    Ok(())
}

async fn send_event(
    config: AppConfig,
    store: Arc<SqliteDeliveryStore>,
    file: PathBuf,
    route: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let payload = tokio::fs::read(&file).await?;

    let source = FileRouteSource::new(
        &config,
        Arc::new(HttpClientPool::new()),
        Arc::new(TemplateService::new()),
    );
    let router = Router::new(
        Arc::new(source),
        Arc::new(RhaiPolicyGate::new(config.rhai.clone())),
        Arc::clone(&store) as Arc<dyn DeliveryStore>,
        RouterSettings::from(&config),
    );
    router.reload_config().await?;

    let result = match &route {
        Some(route) => router.handle_route(route, &payload).await,
        None => router.handle_event(&payload).await,
    };
    // Aggregating routes only deliver on flush.
    router.shutdown().await;
    store.close().await;

    match result {
        Ok(()) => Ok(()),
        Err(RouterError::RouteFailures(failures)) => {
            for failure in &failures {
                tracing::error!(route = %failure.route, error = %failure.error, "Route failed.");
            }
            Err(RouterError::RouteFailures(failures).into())
        }
        Err(e) => Err(e.into()),
    }
}
