use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use gemini_chat::{
    api::routes::{create_router, AppState},
    config::Config,
    services::gemini_client::{ChatModel, GeminiClient},
    storage::{self, repository::LoginSessionRepository, ChatRepository, SeaOrmChatRepository},
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (defaults to ./gemini-chat.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(short, long)]
    port: Option<u16>,

    /// Check the database and the AI model, then exit
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(host) = args.host {
        config.server_host = host;
    }
    if let Some(port) = args.port {
        config.server_port = port;
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("gemini_chat={},tower_http=info", config.log_level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db = storage::init_db(&config.database_url, config.max_connections)
        .await
        .context("Failed to initialize database")?;
    let repository = Arc::new(SeaOrmChatRepository::new(db));

    match repository.purge_expired(Utc::now().naive_utc()).await {
        Ok(0) => {}
        Ok(n) => tracing::info!("Purged {} expired logins", n),
        Err(e) => tracing::warn!("Could not purge expired logins: {}", e),
    }

    let gemini = GeminiClient::from_config(&config).context("Failed to build Gemini client")?;
    match &gemini {
        Some(client) => tracing::info!("🤖 Gemini model {} configured", client.model()),
        None => tracing::warn!(
            "⚠️ No Gemini API key configured; /ask will answer with an error until one is set"
        ),
    }

    if args.check {
        return run_check(repository.as_ref(), gemini.as_ref()).await;
    }

    let model = gemini.map(|client| Arc::new(client) as Arc<dyn ChatModel>);
    let addr = config.bind_address();
    let state = AppState::new(config, repository, model);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("🚀 Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn run_check(
    repository: &SeaOrmChatRepository,
    gemini: Option<&GeminiClient>,
) -> anyhow::Result<()> {
    let mut healthy = true;

    if repository.ping().await {
        println!("✅ Database connected, migrations applied");
    } else {
        println!("❌ Database not reachable");
        healthy = false;
    }

    match gemini {
        Some(client) => match client.health_check().await {
            Ok(true) => println!("✅ Gemini model {} available", client.model()),
            Ok(false) => {
                println!("❌ Gemini model {} rejected the key or does not exist", client.model());
                healthy = false;
            }
            Err(e) => {
                println!("❌ Gemini API not reachable: {}", e);
                healthy = false;
            }
        },
        None => {
            println!("❌ No Gemini API key configured");
            healthy = false;
        }
    }

    if !healthy {
        anyhow::bail!("health check failed");
    }
    println!("✅ Gemini Chat health check passed");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
