pub mod ollama;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::time::{timeout, Instant};
use tracing::{info, warn};

pub use ollama::OllamaBackend;

/// Fixed prompt used to check that the backend answers at all.
pub const HEALTH_CHECK_PROMPT: &str = "Say hello in one word.";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("failed to reach {url}: {message}")]
    Transport { url: String, message: String },

    #[error("backend returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid backend response: {0}")]
    Decode(String),

    #[error("backend did not respond within {} seconds", .0.as_secs_f32())]
    Timeout(Duration),

    #[error("{0}")]
    Backend(String),
}

impl GenerationError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, GenerationError::Timeout(_))
    }
}

/// A text-generation capability: one prompt in, one completion out.
#[async_trait]
pub trait TextBackend: Send + Sync {
    async fn invoke(&self, prompt: &str) -> Result<String, GenerationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    Available,
    Unavailable(String),
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }
}

struct CheckRecord {
    checked_at: Instant,
    availability: Availability,
}

pub struct InferenceService {
    backend: Arc<dyn TextBackend>,
    call_timeout: Duration,
    availability_ttl: Duration,
    last_check: RwLock<Option<CheckRecord>>,
}

impl InferenceService {
    pub fn new(
        backend: Arc<dyn TextBackend>,
        call_timeout: Duration,
        availability_ttl: Duration,
    ) -> Self {
        Self {
            backend,
            call_timeout,
            availability_ttl,
            last_check: RwLock::new(None),
        }
    }

    /// Runs one generation, bounded by the configured timeout.
    pub async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let started = Instant::now();
        let result = self.invoke_bounded(prompt).await;

        match &result {
            Ok(_) => {
                info!(
                    target = "inference",
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "generated text"
                );
                self.remember(Availability::Available).await;
            }
            Err(_) => self.forget().await,
        }

        result
    }

    /// Reports whether the backend answers a trivial prompt.
    ///
    /// The outcome is reused for `availability_ttl`; a zero ttl checks every time.
    pub async fn availability(&self) -> Availability {
        if self.availability_ttl.is_zero() {
            return self.check().await;
        }

        if let Some(cached) = self.fresh(&*self.last_check.read().await) {
            return cached;
        }

        // Callers arriving while a check runs wait here and reuse its answer.
        let mut slot = self.last_check.write().await;
        if let Some(cached) = self.fresh(&slot) {
            return cached;
        }

        let availability = self.check().await;
        *slot = Some(CheckRecord {
            checked_at: Instant::now(),
            availability: availability.clone(),
        });
        availability
    }

    fn fresh(&self, record: &Option<CheckRecord>) -> Option<Availability> {
        record
            .as_ref()
            .filter(|r| r.checked_at.elapsed() < self.availability_ttl)
            .map(|r| r.availability.clone())
    }

    async fn check(&self) -> Availability {
        match self.invoke_bounded(HEALTH_CHECK_PROMPT).await {
            Ok(_) => Availability::Available,
            Err(err) => {
                warn!(target = "inference", error = %err, "availability check failed");
                Availability::Unavailable(err.to_string())
            }
        }
    }

    async fn invoke_bounded(&self, prompt: &str) -> Result<String, GenerationError> {
        match timeout(self.call_timeout, self.backend.invoke(prompt)).await {
            Ok(result) => result,
            Err(_) => Err(GenerationError::Timeout(self.call_timeout)),
        }
    }

    async fn remember(&self, availability: Availability) {
        if self.availability_ttl.is_zero() {
            return;
        }
        *self.last_check.write().await = Some(CheckRecord {
            checked_at: Instant::now(),
            availability,
        });
    }

    async fn forget(&self) {
        self.last_check.write().await.take();
    }
}
