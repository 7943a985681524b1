//! Asynchronous extraction with single-shot completion delivery.

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{extract_envelope, Envelope, ExtractionRequest};
use crate::audio::{AsyncPcmSource, ReaderStatus};
use crate::error::{Result, SamplerError};

/// A completion callback ready to run
pub type CompletionJob = Box<dyn FnOnce() + Send + 'static>;

/// Queue drained by whichever thread should observe results (e.g. a UI loop)
pub type CompletionQueue = mpsc::UnboundedSender<CompletionJob>;

/// Where completion callbacks are run.
pub trait CompletionContext: Send + Sync + 'static {
    fn dispatch(&self, job: CompletionJob);
}

/// Run callbacks on the worker that finished the extraction
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl CompletionContext for Immediate {
    fn dispatch(&self, job: CompletionJob) {
        job();
    }
}

impl CompletionContext for Handle {
    fn dispatch(&self, job: CompletionJob) {
        self.spawn(async move { job() });
    }
}

impl CompletionContext for CompletionQueue {
    fn dispatch(&self, job: CompletionJob) {
        if self.send(job).is_err() {
            warn!("Completion queue closed, dropping extraction result");
        }
    }
}

/// Wait for the source's metadata, then extract on the blocking pool.
pub async fn extract_when_ready<S>(mut source: S, request: ExtractionRequest) -> Result<Envelope>
where
    S: AsyncPcmSource + 'static,
{
    source.metadata_ready().await?;

    let ExtractionRequest {
        window,
        resolution,
        options,
        ..
    } = request;
    tokio::task::spawn_blocking(move || extract_envelope(&mut source, window, resolution, &options))
        .await
        .unwrap_or_else(|e| {
            Err(SamplerError::ReadFailure {
                status: ReaderStatus::Failed,
                message: format!("extraction task failed: {}", e),
            })
        })
}

/// Extract in the background and report through exactly one callback.
///
/// Must be called from within a tokio runtime. `on_success` or `on_failure`
/// receives the request's correlation id and is run through `context`. The
/// returned handle resolves once the callback has been dispatched.
pub fn extract_envelope_async<S, F, E, C>(
    source: S,
    request: ExtractionRequest,
    on_success: F,
    on_failure: E,
    context: C,
) -> JoinHandle<()>
where
    S: AsyncPcmSource + 'static,
    F: FnOnce(Envelope, Option<String>) + Send + 'static,
    E: FnOnce(SamplerError, Option<String>) + Send + 'static,
    C: CompletionContext,
{
    tokio::spawn(async move {
        let correlation_id = request.correlation_id.clone();
        let job: CompletionJob = match extract_when_ready(source, request).await {
            Ok(envelope) => Box::new(move || on_success(envelope, correlation_id)),
            Err(error) => {
                debug!("Async extraction {:?} failed: {}", correlation_id, error);
                Box::new(move || on_failure(error, correlation_id))
            }
        };
        context.dispatch(job);
    })
}
