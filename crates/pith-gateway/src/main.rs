use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

mod app;
mod http;

use pith_agent::provider::EchoProvider;
use pith_agent::Runtime;
use pith_core::config::PithConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pith_gateway=info,tower_http=debug".into()),
        )
        .init();

    // Explicit path > PITH_CONFIG env > ~/.pith/pith.toml, per `PithConfig::load`.
    let config_path = std::env::var("PITH_CONFIG").ok();
    let config = PithConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        tracing::warn!("config load failed ({}), using defaults", e);
        PithConfig::default()
    });

    let workspace_root = PathBuf::from(&config.workspace.root);
    std::fs::create_dir_all(&workspace_root)?;

    // No concrete LLM client ships with this crate (§1): EchoProvider stands
    // in for the external collaborator this binary is otherwise wired for.
    let provider = Box::new(EchoProvider);
    let runtime = Arc::new(Runtime::new(
        workspace_root,
        provider,
        &config.agent,
        &config.workspace.remote_tool_prefix,
    )?);
    runtime.initialize().await?;

    let store = runtime.store.clone();
    let bind = config.gateway.bind.clone();
    let port = config.gateway.port;
    let state = Arc::new(app::AppState::new(store, runtime, config));
    let router = app::build_router(state);

    let addr: SocketAddr = format!("{}:{}", bind, port).parse()?;
    info!(git_sha = env!("PITH_GIT_SHA"), "pith gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
