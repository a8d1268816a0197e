//! Extraction orchestration.
//!
//! Drives one document through `Planning -> Dispatching -> Merging` and into a
//! terminal state. Chunks are dispatched by a bounded pool of workers; results
//! land in slots addressed by chunk index so merge order never depends on
//! completion order.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, info, warn, Instrument};

use super::error::{BackendError, OrchestrationError};
use super::merger::{self, ChunkOutcome};
use super::planner;
use super::retry::RetryPolicy;
use super::router::BackendRouter;
use crate::config::OrchestratorConfig;
use crate::models::{Chunk, Document, ExtractionRequestMode, ExtractionResult};

/// Orchestration lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestrationState {
    Planning,
    Dispatching,
    Merging,
    Completed,
    PartiallyCompleted,
    Failed,
}

impl OrchestrationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planning => "planning",
            Self::Dispatching => "dispatching",
            Self::Merging => "merging",
            Self::Completed => "completed",
            Self::PartiallyCompleted => "partially_completed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for OrchestrationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Successful terminal outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionOutcome {
    /// `Completed` or `PartiallyCompleted`.
    pub state: OrchestrationState,
    pub result: ExtractionResult,
}

/// Coordinates planning, dispatch and merging for one document at a time.
///
/// Holds no per-request state, so one instance serves concurrent requests.
pub struct Orchestrator {
    config: OrchestratorConfig,
    router: Arc<BackendRouter>,
}

/// Everything a chunk worker needs.
struct DispatchContext {
    document: Arc<Document>,
    chunks: Vec<Chunk>,
    mode: ExtractionRequestMode,
    router: Arc<BackendRouter>,
    retry: RetryPolicy,
    backend_timeout: std::time::Duration,
    next: AtomicUsize,
    halted: AtomicBool,
}

impl Orchestrator {
    pub fn new(config: OrchestratorConfig, router: Arc<BackendRouter>) -> Self {
        Self { config, router }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn router(&self) -> &Arc<BackendRouter> {
        &self.router
    }

    /// Extract `document` in `mode`.
    pub async fn run(
        &self,
        document: Arc<Document>,
        mode: ExtractionRequestMode,
    ) -> Result<ExtractionOutcome, OrchestrationError> {
        let result = self.run_inner(document, mode).await;
        if let Err(ref e) = result {
            transition(OrchestrationState::Failed);
            warn!("Extraction failed ({}): {}", e.kind(), e);
        }
        result
    }

    async fn run_inner(
        &self,
        document: Arc<Document>,
        mode: ExtractionRequestMode,
    ) -> Result<ExtractionOutcome, OrchestrationError> {
        let deadline = self.config.request_deadline;
        let total_pages = document.page_count();

        let outcomes = tokio::time::timeout(deadline, async {
            transition(OrchestrationState::Planning);
            let chunks = self.plan(&document)?;
            info!(
                "{}: {} pages in {} chunks (max {} pages each)",
                document.filename(),
                total_pages,
                chunks.len(),
                self.config.max_pages_per_chunk
            );

            transition(OrchestrationState::Dispatching);
            self.dispatch(document.clone(), chunks, mode).await
        })
        .await
        .map_err(|_| OrchestrationError::DeadlineExceeded(deadline))??;

        transition(OrchestrationState::Merging);
        let succeeded = outcomes.iter().filter(|(_, o)| o.is_success()).count();
        if succeeded == 0 {
            let last = outcomes
                .iter()
                .rev()
                .find_map(|(_, o)| match o {
                    ChunkOutcome::Failed(e) => Some(e.clone()),
                    ChunkOutcome::Succeeded(_) => None,
                })
                .unwrap_or_else(|| BackendError::unknown("no chunks were dispatched"));
            return Err(OrchestrationError::AllChunksFailed {
                chunks: outcomes.len(),
                last,
            });
        }

        let result = merger::merge(total_pages, mode, &outcomes);
        let state = if succeeded == outcomes.len() {
            OrchestrationState::Completed
        } else {
            OrchestrationState::PartiallyCompleted
        };
        transition(state);

        Ok(ExtractionOutcome { state, result })
    }

    /// Validate the document and split it into chunks.
    fn plan(&self, document: &Document) -> Result<Vec<Chunk>, OrchestrationError> {
        let pages = document.page_count();
        if pages == 0 {
            return Err(OrchestrationError::EmptyDocument);
        }
        if pages > self.config.document_page_cap {
            return Err(OrchestrationError::DocumentTooLarge {
                pages,
                cap: self.config.document_page_cap,
            });
        }
        Ok(planner::plan(pages, self.config.max_pages_per_chunk)?)
    }

    /// Fan chunks out to at most `dispatch_concurrency` workers.
    ///
    /// A fatal backend error stops every worker from taking new chunks and
    /// aborts the ones still running.
    async fn dispatch(
        &self,
        document: Arc<Document>,
        chunks: Vec<Chunk>,
        mode: ExtractionRequestMode,
    ) -> Result<Vec<(Chunk, ChunkOutcome)>, OrchestrationError> {
        let chunk_count = chunks.len();
        let workers = self.config.dispatch_concurrency.clamp(1, chunk_count.max(1));
        let ctx = Arc::new(DispatchContext {
            document,
            chunks,
            mode,
            router: self.router.clone(),
            retry: RetryPolicy::new(
                self.config.retry_max_attempts,
                self.config.retry_backoff_base,
            ),
            backend_timeout: self.config.backend_timeout,
            next: AtomicUsize::new(0),
            halted: AtomicBool::new(false),
        });

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            let ctx = ctx.clone();
            pool.spawn(worker(ctx).in_current_span());
        }

        let mut slots: Vec<Option<ChunkOutcome>> = vec![None; chunk_count];
        while let Some(joined) = pool.join_next().await {
            let finished = joined
                .map_err(|e| OrchestrationError::Internal(format!("chunk worker failed: {}", e)))?;
            match finished {
                Ok(done) => {
                    for (index, outcome) in done {
                        slots[index] = Some(outcome);
                    }
                }
                Err(fatal) => {
                    pool.abort_all();
                    return Err(OrchestrationError::Backend(fatal));
                }
            }
        }

        Ok(ctx
            .chunks
            .iter()
            .copied()
            .zip(slots)
            .map(|(chunk, slot)| {
                let outcome = slot.unwrap_or_else(|| {
                    ChunkOutcome::Failed(BackendError::unknown("chunk was never dispatched"))
                });
                (chunk, outcome)
            })
            .collect())
    }
}

fn transition(state: OrchestrationState) {
    info!(state = %state, "orchestration state");
}

/// Pull chunks until the plan is exhausted or a fatal error halts the pool.
async fn worker(ctx: Arc<DispatchContext>) -> Result<Vec<(usize, ChunkOutcome)>, BackendError> {
    let mut done = Vec::new();
    loop {
        if ctx.halted.load(Ordering::SeqCst) {
            break;
        }
        let index = ctx.next.fetch_add(1, Ordering::SeqCst);
        let Some(chunk) = ctx.chunks.get(index).copied() else {
            break;
        };

        match run_chunk(&ctx, chunk).await {
            ChunkOutcome::Failed(e) if e.kind.is_fatal() => {
                ctx.halted.store(true, Ordering::SeqCst);
                warn!("{} failed fatally: {}", chunk, e);
                return Err(e);
            }
            outcome => done.push((index, outcome)),
        }
    }
    Ok(done)
}

/// Split out one chunk and run it through the router with retries.
///
/// The chunk's sub-PDF lives only for the duration of this call.
async fn run_chunk(ctx: &DispatchContext, chunk: Chunk) -> ChunkOutcome {
    let document = ctx.document.clone();
    let split = tokio::task::spawn_blocking(move || document.chunk_bytes(&chunk)).await;
    let pdf = match split {
        Ok(Ok(bytes)) => bytes,
        Ok(Err(e)) => {
            warn!("{}: could not split pages: {}", chunk, e);
            return ChunkOutcome::Failed(BackendError::unsupported(e.to_string()));
        }
        Err(e) => {
            return ChunkOutcome::Failed(BackendError::unknown(format!(
                "split task failed: {}",
                e
            )))
        }
    };

    let mut attempt = 1;
    loop {
        debug!("{}: attempt {} ({} bytes)", chunk, attempt, pdf.len());
        let result = tokio::time::timeout(
            ctx.backend_timeout,
            ctx.router.invoke(&chunk, &pdf, ctx.mode),
        )
        .await
        .unwrap_or_else(|_| {
            Err(BackendError::timeout(format!(
                "backend did not answer within {:?}",
                ctx.backend_timeout
            )))
        });

        let err = match result {
            Ok(pages) => {
                debug!("{}: {} pages extracted", chunk, pages.len());
                return ChunkOutcome::Succeeded(pages);
            }
            Err(e) => e,
        };

        if !err.kind.is_retryable() {
            warn!("{}: {}", chunk, err);
            return ChunkOutcome::Failed(err);
        }

        match ctx.retry.next_delay(attempt) {
            Some(delay) => {
                warn!(
                    "{}: {} (attempt {}/{}), retrying in {:?}",
                    chunk, err, attempt, ctx.retry.max_attempts, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            None => {
                warn!(
                    "{}: giving up after {} attempts: {}",
                    chunk, attempt, err
                );
                return ChunkOutcome::Failed(err);
            }
        }
    }
}
