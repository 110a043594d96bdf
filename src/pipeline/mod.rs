//! Metadata generation pipeline
//!
//! One request travels: profile lookup → content fingerprint → cache probe →
//! image normalization → model call → contract validation → cache store.
//! Each stage's failure is folded into a classified, user-facing error, and
//! every request ends with exactly one terminal notification (result or
//! error) after the initial progress event.

pub mod broker;
pub mod cache;
pub mod classify;
pub mod error;
pub mod model;
pub mod notify;
pub mod preprocess;
pub mod ratelimit;
pub mod validate;

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

pub use broker::{Job, JobBroker, spawn_workers};
pub use cache::{ContentCache, Metadata, fingerprint};
pub use classify::{ClassifiedError, ErrorKind};
pub use error::PipelineError;
pub use model::{GenerateError, MetadataGenerator, OpenAiGenerator};
pub use notify::{ClientHub, ClientNotifier, Notifier, ServerEvent};
pub use preprocess::{ImagePreprocessor, PreprocessError};
pub use ratelimit::ClientRateLimiter;
pub use validate::ValidateError;

use crate::observability::Metrics;
use crate::profiles::ProfileRegistry;

/// One image/profile pair accepted for processing
#[derive(Debug, Clone)]
pub struct ProcessingRequest {
    /// Where the uploaded file lives on disk
    pub image_path: PathBuf,
    /// Path as the client knows it, echoed back in every event
    pub display_path: String,
    pub profile_id: String,
    pub api_key: String,
    pub connection_id: Uuid,
}

pub struct ProcessingPipeline {
    profiles: Arc<ProfileRegistry>,
    cache: Arc<ContentCache>,
    generator: Arc<dyn MetadataGenerator>,
    preprocessor: ImagePreprocessor,
    metrics: Arc<Metrics>,
}

impl ProcessingPipeline {
    pub fn new(
        profiles: Arc<ProfileRegistry>,
        cache: Arc<ContentCache>,
        generator: Arc<dyn MetadataGenerator>,
        preprocessor: ImagePreprocessor,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            profiles,
            cache,
            generator,
            preprocessor,
            metrics,
        }
    }

    /// Execute one request end to end and report the outcome. Infallible at
    /// this level: every failure becomes an error notification.
    pub async fn process(&self, request: ProcessingRequest, notifier: Arc<dyn Notifier>) {
        notifier.processing_started(&request.display_path).await;

        match self.run(&request).await {
            Ok((metadata, cached)) => {
                info!(
                    image = %request.display_path,
                    profile = %request.profile_id,
                    cached,
                    "Metadata generated"
                );
                notifier
                    .result(&request.display_path, cached, &metadata)
                    .await;
            }
            Err(err) => {
                self.metrics.generation_failed();
                warn!(
                    image = %request.display_path,
                    profile = %request.profile_id,
                    error = %err,
                    "Metadata generation failed"
                );
                notifier
                    .error(&request.display_path, &err.into_classified())
                    .await;
            }
        }
    }

    async fn run(&self, request: &ProcessingRequest) -> Result<(Metadata, bool), PipelineError> {
        let profile = self
            .profiles
            .get(&request.profile_id)
            .await
            .ok_or_else(|| PipelineError::UnknownProfile(request.profile_id.clone()))?;

        // A read failure here only disables caching; the authoritative read
        // with error reporting happens below.
        let bytes = tokio::fs::read(&request.image_path).await.ok();
        let cache_key = bytes.as_deref().map(fingerprint);

        if let Some(key) = &cache_key {
            if let Some(metadata) = self.cache.lookup(key, &profile.id) {
                debug!(image = %request.display_path, "Cache hit");
                self.metrics.cache_hit();
                return Ok((metadata, true));
            }
        }

        let raw = match bytes {
            Some(b) => b,
            None => tokio::fs::read(&request.image_path)
                .await
                .map_err(PreprocessError::Read)
                .map_err(PipelineError::Preprocess)?,
        };

        let preprocessor = self.preprocessor.clone();
        let jpeg = tokio::task::spawn_blocking(move || preprocessor.normalize(&raw))
            .await
            .map_err(|e| PipelineError::Internal(format!("image task failed: {e}")))??;

        let raw_output = self
            .generator
            .generate(&profile, &jpeg, &request.api_key)
            .await?;

        let metadata = validate::validate(&raw_output, &profile)?;

        if let Some(key) = cache_key {
            self.cache.store(&key, &profile.id, metadata.clone());
        }

        Ok((metadata, false))
    }
}
