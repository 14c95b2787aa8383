use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use postforge::{
    api::{self, AppState},
    config::Settings,
    inference::{Availability, InferenceService, OllamaBackend},
    prompts::PromptLibrary,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------
    // Config + logging
    // -----------------------------
    let settings = Settings::from_env()?;

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        model = %settings.model,
        backend = %settings.ollama_base_url,
        timeout_secs = settings.generation_timeout.as_secs(),
        availability_ttl_secs = settings.availability_ttl.as_secs(),
        "starting LinkedIn post generator API"
    );

    // -----------------------------
    // Shared state / Dependencies
    // -----------------------------
    let prompts = Arc::new(PromptLibrary::load(settings.prompt_dir.as_deref())?);
    let backend = Arc::new(OllamaBackend::new(
        &settings.ollama_base_url,
        settings.model.clone(),
    )?);
    let model = backend.model().to_string();
    let infer = Arc::new(InferenceService::new(
        backend,
        settings.generation_timeout,
        settings.availability_ttl,
    ));

    match infer.availability().await {
        Availability::Available => info!(%model, "Ollama is available"),
        Availability::Unavailable(cause) => {
            warn!(%cause, "Ollama service is not responding");
            warn!("1. Make sure Ollama is running with: ollama serve");
            warn!(
                "2. Make sure the model is available with: ollama pull {model}"
            );
            warn!("3. Check your system resources (RAM, disk space)");
        }
    }

    let state = AppState {
        infer,
        prompts,
        model: Arc::from(model),
    };

    // -----------------------------
    // Serve
    // -----------------------------
    let addr = settings.listen_addr();
    let listener = TcpListener::bind(addr).await?;
    info!("API is running at http://{addr}");

    axum::serve(listener, api::app(state).into_make_service()).await?;

    Ok(())
}
