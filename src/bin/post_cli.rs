use std::env;
use std::sync::Arc;

use anyhow::{bail, Result};
use postforge::{
    config::Settings,
    inference::{InferenceService, OllamaBackend},
    prompts::{PromptKind, PromptLibrary, PromptVars},
};

const USAGE: &str = "usage: post_cli <generate|regenerate|reduce|elaborate> <text...>";

#[tokio::main]
async fn main() -> Result<()> {
    let settings = Settings::from_env()?;

    let mut args = env::args().skip(1);
    let kind = match args.next().as_deref() {
        Some("generate") => PromptKind::Generate,
        Some("regenerate") => PromptKind::Regenerate,
        Some("reduce") => PromptKind::Reduce,
        Some("elaborate") => PromptKind::Elaborate,
        _ => bail!(USAGE),
    };

    let text = args.collect::<Vec<_>>().join(" ");
    if text.trim().is_empty() {
        bail!(USAGE);
    }

    let vars = match kind {
        PromptKind::Generate | PromptKind::Regenerate => PromptVars::context(&text),
        PromptKind::Reduce | PromptKind::Elaborate => PromptVars::post(&text, ""),
    };

    let prompts = PromptLibrary::load(settings.prompt_dir.as_deref())?;
    let prompt = prompts.render(kind, &vars)?;

    let backend = Arc::new(OllamaBackend::new(
        &settings.ollama_base_url,
        settings.model.clone(),
    )?);
    // One-shot: no point caching the health check.
    let infer = InferenceService::new(backend, settings.generation_timeout, Default::default());

    println!("🧠 {} via {} ...", kind.name(), settings.model);
    let post = infer.generate(&prompt).await?;
    println!("{}", post.trim());

    Ok(())
}
