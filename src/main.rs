use std::time::Duration;

use tracing_subscriber::EnvFilter;

use unspaghetti::api;
use unspaghetti::config::Config;
use unspaghetti::git;
use unspaghetti::models::Mode;
use unspaghetti::state::AppState;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env();

    // SAFETY: no runtime or clone thread exists yet.
    unsafe { git::set_transport_timeouts(Duration::from_secs(config.clone_timeout_secs))? };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(serve(config))
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!("Data directory: {}", config.data_dir.display());
    tracing::info!("LLM provider: {} ({})", config.llm.provider, config.llm.base_url);

    let bind_addr = config.bind_addr.clone();
    let state = AppState::new(config)?;
    tracing::info!("Answering mode: {}", state.mode());
    if state.mode() == Mode::Mock {
        tracing::warn!("No API key configured; /ask-question returns mock answers");
    }

    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}
