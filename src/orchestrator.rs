//! Fan-out of one uploaded image into its derived artifacts.
//!
//! Every policy in the engine runs as its own transform-then-upload pipeline.
//! Pipelines share only the read-only source buffer; their outcomes are
//! collected through a `JoinSet` and reported in policy order.

use crate::models::{PipelineOutcome, RequestOutcome, SourceImage};
use crate::storage::Uploader;
use crate::transform::{transform, TransformEngine, TransformPolicy};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

/// Runs every transform policy against one source image and uploads the
/// results.
///
/// At most `max_concurrent_requests` calls make progress at once; further
/// calls wait for a slot before any decoding starts.
#[derive(Clone)]
pub struct Orchestrator {
    engine: Arc<TransformEngine>,
    uploader: Arc<Uploader>,
    permits: Arc<Semaphore>,
}

impl Orchestrator {
    pub fn new(
        engine: TransformEngine,
        uploader: Uploader,
        max_concurrent_requests: usize,
    ) -> Result<Self> {
        if max_concurrent_requests == 0 {
            return Err(Error::InvalidConfig(
                "max concurrent requests must be at least 1".to_string(),
            ));
        }

        if let Some(policy) = engine
            .policies()
            .iter()
            .find(|p| !uploader.has_route(&p.name))
        {
            return Err(Error::InvalidConfig(format!(
                "policy '{}' has no bucket configured",
                policy.name
            )));
        }

        Ok(Self {
            engine: Arc::new(engine),
            uploader: Arc::new(uploader),
            permits: Arc::new(Semaphore::new(max_concurrent_requests)),
        })
    }

    /// Process `source` with no deadline.
    pub async fn process(&self, source: SourceImage) -> Result<RequestOutcome> {
        self.process_with_cancel(source, CancellationToken::new()).await
    }

    /// Process `source`, cancelling once `timeout` has elapsed.
    pub async fn process_with_timeout(
        &self,
        source: SourceImage,
        timeout: Duration,
    ) -> Result<RequestOutcome> {
        let cancel = CancellationToken::new();
        // Dropping this call (a disconnected client) cancels the pipelines too.
        let _guard = cancel.clone().drop_guard();

        let work = self.process_with_cancel(source, cancel.clone());
        tokio::pin!(work);

        tokio::select! {
            result = &mut work => return result,
            _ = tokio::time::sleep(timeout) => {
                warn!("Request deadline of {:?} reached, cancelling", timeout);
                cancel.cancel();
            }
        }

        work.await
    }

    /// Process `source` until `cancel` fires.
    ///
    /// Cancellation before the pipelines start (including while waiting for a
    /// concurrency slot) returns [`Error::Cancelled`] and nothing is uploaded.
    /// Once started, a pipeline checks the token before transforming and
    /// before uploading; a codec or transport call already in progress is
    /// allowed to finish. Either way every pipeline is joined before this
    /// returns, pipelines stopped by cancellation report [`Error::Cancelled`]
    /// and [`RequestOutcome::cancelled`] is set.
    pub async fn process_with_cancel(
        &self,
        source: SourceImage,
        cancel: CancellationToken,
    ) -> Result<RequestOutcome> {
        validate(&source)?;

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let _permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            permit = self.permits.clone().acquire_owned() => permit
                .map_err(|_| Error::Internal("request limiter closed".to_string()))?,
        };

        let request_id = Uuid::new_v4();
        let span = info_span!("request", %request_id, name = %source.name);

        let pipelines = self
            .run_pipelines(source.clone(), cancel.clone())
            .instrument(span.clone())
            .await;

        let outcome = RequestOutcome {
            request_id,
            name: source.name,
            pipelines,
            cancelled: cancel.is_cancelled(),
        };

        span.in_scope(|| log_outcome(&outcome));
        Ok(outcome)
    }

    async fn run_pipelines(
        &self,
        source: SourceImage,
        cancel: CancellationToken,
    ) -> Vec<PipelineOutcome> {
        let policies = self.engine.policies();
        info!(
            "Starting {} pipelines for {} bytes",
            policies.len(),
            source.bytes.len()
        );

        let mut tasks = JoinSet::new();
        for (index, policy) in policies.iter().enumerate() {
            let pipeline = run_pipeline(
                policy.clone(),
                source.clone(),
                self.uploader.clone(),
                cancel.clone(),
            );
            tasks.spawn(async move { (index, pipeline.await) }.instrument(Span::current()));
        }

        let mut slots: Vec<Option<PipelineOutcome>> = policies.iter().map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, outcome)) => slots[index] = Some(outcome),
                Err(e) => error!("Pipeline task failed to complete: {}", e),
            }
        }

        slots
            .into_iter()
            .zip(policies)
            .map(|(slot, policy)| {
                slot.unwrap_or_else(|| {
                    PipelineOutcome::failed(
                        policy.name.clone(),
                        None,
                        Error::Internal("pipeline task did not complete".to_string()),
                    )
                })
            })
            .collect()
    }
}

fn validate(source: &SourceImage) -> Result<()> {
    if source.name.is_empty() {
        return Err(Error::InvalidInput("image name must not be empty".to_string()));
    }
    if source.bytes.is_empty() {
        return Err(Error::InvalidInput("image data must not be empty".to_string()));
    }
    Ok(())
}

async fn run_pipeline(
    policy: TransformPolicy,
    source: SourceImage,
    uploader: Arc<Uploader>,
    cancel: CancellationToken,
) -> PipelineOutcome {
    let target = match uploader.target(&policy.name, &source.name) {
        Ok(target) => target,
        Err(e) => return PipelineOutcome::failed(policy.name, None, e),
    };

    if cancel.is_cancelled() {
        return PipelineOutcome::failed(policy.name, Some(target), Error::Cancelled);
    }

    let content_type = policy.content_type();
    let name = policy.name.clone();

    info!("[{}] Transforming image", name);
    let encoded = match transform_blocking(policy, source).await {
        Ok(encoded) => encoded,
        Err(e) => {
            error!("[{}] Transform failed: {}", name, e);
            return PipelineOutcome::failed(name, Some(target), e);
        }
    };

    if cancel.is_cancelled() {
        warn!("[{}] Cancelled before upload, discarding {} bytes", name, encoded.len());
        return PipelineOutcome::failed(name, Some(target), Error::Cancelled);
    }

    match uploader.upload(&target, &encoded, content_type).await {
        Ok(()) => PipelineOutcome::succeeded(name, target, encoded.len()),
        Err(e) => {
            error!("[{}] Upload failed: {}", name, e);
            PipelineOutcome::failed(name, Some(target), e)
        }
    }
}

async fn transform_blocking(policy: TransformPolicy, source: SourceImage) -> Result<Vec<u8>> {
    tokio::task::spawn_blocking(move || transform(&source.bytes, &policy))
        .await
        .map_err(|e| Error::Internal(format!("Transform task join error: {}", e)))?
}

fn log_outcome(outcome: &RequestOutcome) {
    if outcome.cancelled {
        warn!("Cancelled while pipelines were running");
    }

    if outcome.is_success() {
        info!("All {} pipelines succeeded", outcome.pipelines.len());
        return;
    }

    let stored: Vec<&str> = outcome.succeeded().map(|p| p.policy.as_str()).collect();
    let failed: Vec<&str> = outcome.failures().map(|p| p.policy.as_str()).collect();
    if outcome.is_partial() {
        warn!("Partial upload: stored {:?}, failed {:?}", stored, failed);
    } else {
        error!("All pipelines failed: {:?}", failed);
    }
}
