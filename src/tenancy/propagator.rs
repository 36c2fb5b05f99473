use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::error::TenancyError;
use super::marker::TenantMarker;
use super::tenant_id::TenantId;
use crate::config::WorkerConfig;

/// A unit of work paired with the tenant it must run under
pub struct TenantJob<F> {
    tenant: Option<TenantId>,
    work: F,
}

impl<F: Future> TenantJob<F> {
    /// Build a job with an explicit tenant, for callers that pass the tenant in the message
    pub fn with_tenant(tenant: Option<TenantId>, work: F) -> Self {
        Self { tenant, work }
    }

    pub fn tenant(&self) -> Option<&TenantId> {
        self.tenant.as_ref()
    }

    /// Install the tenant, run, then clear.
    ///
    /// Reuses the caller's marker scope when there is one and opens a fresh scope
    /// otherwise, so the captured tenant is never dropped on the floor. The clear
    /// happens in a drop guard so a failed, panicking or cancelled job still leaves
    /// the marker empty for whatever runs next on the same worker.
    pub async fn run(self) -> F::Output {
        if TenantMarker::is_scoped() {
            self.run_in_scope().await
        } else {
            TenantMarker::scope(self.run_in_scope()).await
        }
    }

    async fn run_in_scope(self) -> F::Output {
        let _clear = TenantMarker::clear_on_exit();
        if let Some(tenant) = self.tenant {
            debug!("Propagated tenant context to background task: {}", tenant);
            TenantMarker::set(tenant);
        }
        self.work.await
    }

    /// Run inside a fresh marker scope of its own
    pub async fn run_scoped(self) -> F::Output {
        TenantMarker::scope(self.run_in_scope()).await
    }
}

/// Carries the submitting task's tenant into deferred work
pub struct TaskContextPropagator;

impl TaskContextPropagator {
    /// Capture the current marker value now; install it when the job runs
    pub fn wrap<F: Future>(work: F) -> TenantJob<F> {
        TenantJob {
            tenant: TenantMarker::get(),
            work,
        }
    }

    /// `tokio::spawn` with the current tenant propagated into the new task
    pub fn spawn<F>(work: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        tokio::spawn(Self::wrap(work).run_scoped())
    }
}

type BackgroundJob = TenantJob<BoxFuture<'static, anyhow::Result<()>>>;

struct Envelope {
    id: Uuid,
    job: BackgroundJob,
}

/// Fixed-size worker pool whose submissions always go through the propagator.
///
/// Each worker keeps a single marker scope for its whole life, the way a pooled thread
/// keeps its thread-local, so every job is responsible for clearing what it set.
///
/// Submission never waits: a full queue rejects the job with `ExecutorSaturated`.
pub struct TenantAwareExecutor {
    sender: StdMutex<Option<mpsc::Sender<Envelope>>>,
    workers: StdMutex<Vec<JoinHandle<()>>>,
}

impl TenantAwareExecutor {
    pub fn start(config: &WorkerConfig) -> Self {
        let pool_size = config.pool_size.max(1);
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..pool_size)
            .map(|index| tokio::spawn(worker_loop(index, receiver.clone())))
            .collect();

        info!(
            "Started background executor with {} workers (queue capacity {})",
            pool_size, config.queue_capacity
        );
        Self {
            sender: StdMutex::new(Some(sender)),
            workers: StdMutex::new(workers),
        }
    }

    /// Submit work under the submitting task's current tenant
    pub fn submit<F>(&self, work: F) -> Result<Uuid, TenancyError>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.dispatch(TaskContextPropagator::wrap(work.boxed()))
    }

    /// Submit work for an explicitly named tenant
    pub fn submit_for<F>(&self, tenant: TenantId, work: F) -> Result<Uuid, TenancyError>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.dispatch(TenantJob::with_tenant(Some(tenant), work.boxed()))
    }

    fn dispatch(&self, job: BackgroundJob) -> Result<Uuid, TenancyError> {
        let id = Uuid::new_v4();
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        let sender = sender.as_ref().ok_or(TenancyError::ExecutorClosed)?;

        match sender.try_send(Envelope { id, job }) {
            Ok(()) => Ok(id),
            Err(TrySendError::Full(envelope)) => {
                warn!(
                    "Background queue full; rejected job {} (tenant {:?})",
                    envelope.id,
                    envelope.job.tenant().map(TenantId::as_str)
                );
                Err(TenancyError::ExecutorSaturated)
            }
            Err(TrySendError::Closed(_)) => Err(TenancyError::ExecutorClosed),
        }
    }

    /// Stop accepting work and wait for queued jobs to drain.
    ///
    /// Safe to call while other handles to the executor are still alive; later
    /// submissions fail with `ExecutorClosed`.
    pub async fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(sender);

        let workers = std::mem::take(
            &mut *self.workers.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for worker in workers {
            if let Err(e) = worker.await {
                error!("Background worker terminated abnormally: {}", e);
            }
        }
        info!("Background executor stopped");
    }
}

async fn worker_loop(index: usize, receiver: Arc<Mutex<mpsc::Receiver<Envelope>>>) {
    TenantMarker::scope(async move {
        loop {
            let next = receiver.lock().await.recv().await;
            let Some(Envelope { id, job }) = next else {
                break;
            };

            let tenant = job.tenant().map(ToString::to_string);
            match AssertUnwindSafe(job.run()).catch_unwind().await {
                Ok(Ok(())) => debug!("Background job {} completed on worker {}", id, index),
                Ok(Err(e)) => error!(
                    "Uncaught background job error: job {} tenant {:?}: {:#}",
                    id, tenant, e
                ),
                Err(_) => error!("Background job {} panicked (tenant {:?})", id, tenant),
            }
        }
        debug!("Background worker {} shut down", index);
    })
    .await
}
