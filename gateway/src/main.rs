use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cnsi_gateway::cli::{self, CnsiCommands};
use cnsi_gateway::config::{self, Config};
use cnsi_gateway::proxy::upstream::HttpClients;
use cnsi_gateway::store::postgres::PgStore;
use cnsi_gateway::vault::VaultCrypto;
use cnsi_gateway::{api, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "cnsi_gateway=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = cli::Cli::parse();
    let cfg = config::load()?;

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Cnsi { command }) => handle_cnsi_command(cfg, command).await,
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn build_state(cfg: &Config) -> anyhow::Result<Arc<AppState>> {
    tracing::info!("Connecting to database...");
    let db = PgStore::connect(&cfg.database_url).await?;

    tracing::info!("Running migrations...");
    db.migrate().await?;

    let crypto = VaultCrypto::new(&cfg.encryption_key)?;
    tracing::info!("Encryption key set.");

    let http = HttpClients::new(cfg.http_timeout, cfg.http_connect_timeout)?;
    tracing::info!(
        timeout_secs = cfg.http_timeout.as_secs(),
        connect_timeout_secs = cfg.http_connect_timeout.as_secs(),
        "HTTP clients initialized."
    );

    Ok(Arc::new(AppState::new(
        Arc::new(db),
        crypto,
        http,
        cfg.clients.clone(),
    )))
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    let state = build_state(&cfg).await?;
    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("CNSI gateway listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Graceful shut down complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Attempting to shut down gracefully...");
}

async fn handle_cnsi_command(cfg: Config, command: CnsiCommands) -> anyhow::Result<()> {
    let state = build_state(&cfg).await?;

    match command {
        CnsiCommands::Register {
            name,
            api_endpoint,
            cnsi_type,
            skip_ssl,
        } => {
            let record = state
                .registry
                .register(&name, &api_endpoint, skip_ssl, cnsi_type)
                .await?;
            println!("Registered {} ({})", record.name, record.guid);
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        CnsiCommands::List => {
            let cnsis = state.registry.list().await?;
            if cnsis.is_empty() {
                println!("No clusters registered.");
            }
            for c in cnsis {
                println!(
                    "{}  {:<4} {:<24} {}{}",
                    c.guid,
                    c.cnsi_type.as_str(),
                    c.name,
                    c.api_endpoint,
                    if c.skip_ssl_validation { "  (skip-ssl)" } else { "" }
                );
            }
        }
        CnsiCommands::Unregister { guid } => {
            state.registry.unregister(guid).await?;
            println!("Unregistered {}", guid);
        }
    }

    Ok(())
}
