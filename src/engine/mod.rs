//! Staged concurrent pipeline engine.
//!
//! A pipeline is a seed producer followed by a chain of stages. Every stage
//! runs a fixed pool of workers that share one upstream stream and one
//! downstream stream, so items are processed as an unordered bag. A worker
//! returns an [`Emit`] which the engine flattens: `Many(k items)` becomes k
//! downstream items, `One` becomes one, `Nothing` drops the input silently.
//!
//! Failures never travel down the data stream. Each stage owns an unbounded
//! failure stream drained by a dedicated task that logs every failure and
//! hands the records back when the pipeline is collected.

mod collect;
pub mod paginate;

pub use collect::collect;

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use async_trait::async_trait;
use futures::FutureExt;
use log::{debug, error, warn};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::error::{Result, SweepError};

/// Capacity of the data streams between stages. One slot per stream keeps a
/// stage from running more than one item per worker ahead of its consumer.
const STREAM_CAPACITY: usize = 1;

/// What a stage worker produced for one input item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Emit<T> {
    /// Drop the input without signalling a failure.
    Nothing,
    /// Forward exactly one item.
    One(T),
    /// Fan out: every element becomes an independent downstream item.
    Many(Vec<T>),
}

impl<T> Emit<T> {
    pub fn len(&self) -> usize {
        match self {
            Self::Nothing => 0,
            Self::One(_) => 1,
            Self::Many(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> From<Option<T>> for Emit<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Nothing, Self::One)
    }
}

impl<T> From<Vec<T>> for Emit<T> {
    fn from(items: Vec<T>) -> Self {
        Self::Many(items)
    }
}

impl<T> IntoIterator for Emit<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            Self::Nothing => Vec::new().into_iter(),
            Self::One(item) => vec![item].into_iter(),
            Self::Many(items) => items.into_iter(),
        }
    }
}

/// A processing step of a pipeline.
///
/// The stage value itself is the typed, per-stage configuration: it is shared
/// read-only by all workers of the stage. `client` is the session's API handle
/// and must tolerate concurrent use.
#[async_trait]
pub trait Stage<C: ?Sized>: Send + Sync + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Short name used in logs and failure records.
    fn name(&self) -> &'static str;

    /// Human readable label of an input, recorded when the item fails.
    fn describe(&self, item: &Self::Input) -> String;

    /// Whether cancellation may abandon an item mid-run. Stages with side
    /// effects the caller must hear about return `false`: their in-flight
    /// items finish and are delivered, only new items stop being taken.
    fn interruptible(&self) -> bool {
        true
    }

    async fn run(&self, item: Self::Input, client: &C, worker: usize) -> Result<Emit<Self::Output>>;
}

/// A per-item failure reported on a stage's failure stream.
#[derive(Debug)]
pub struct StageFailure {
    pub stage: &'static str,
    pub worker: usize,
    pub item: String,
    pub error: SweepError,
}

/// Serializable view of a [`StageFailure`].
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FailureRecord {
    pub stage: String,
    pub item: String,
    pub error: String,
}

impl From<&StageFailure> for FailureRecord {
    fn from(failure: &StageFailure) -> Self {
        Self {
            stage: failure.stage.to_string(),
            item: failure.item.clone(),
            error: failure.error.to_string(),
        }
    }
}

/// Terminal end of a pipeline, ready to be collected.
pub struct Drained<T> {
    pub stream: Receiver<T>,
    seed: JoinHandle<Result<()>>,
    failures: Vec<JoinHandle<Vec<StageFailure>>>,
    cancel: CancellationToken,
}

/// A pipeline whose current terminal stream carries items of type `T`.
pub struct Pipeline<C: ?Sized, T> {
    client: Arc<C>,
    workers: usize,
    cancel: CancellationToken,
    stream: Receiver<T>,
    seed: JoinHandle<Result<()>>,
    failures: Vec<JoinHandle<Vec<StageFailure>>>,
}

impl<C, T> Pipeline<C, T>
where
    C: ?Sized + Send + Sync + 'static,
    T: Send + 'static,
{
    /// Starts a pipeline. `producer` runs immediately on its own task, pushes
    /// the initial items and returns; the first stream closes when it does.
    ///
    /// An error from the producer is systemic and surfaces from [`collect`].
    pub fn seed<F, Fut>(client: Arc<C>, workers: usize, cancel: CancellationToken, producer: F) -> Self
    where
        F: FnOnce(Sender<T>, CancellationToken) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let (tx, stream) = async_channel::bounded(STREAM_CAPACITY);
        let token = cancel.clone();
        let seed = tokio::spawn(async move {
            let result = producer(tx.clone(), token).await;
            tx.close();
            if let Err(e) = &result {
                error!("Pipeline seed failed: {e}");
            }
            result
        });

        Self {
            client,
            workers: workers.max(1),
            cancel,
            stream,
            seed,
            failures: Vec::new(),
        }
    }

    /// Appends a stage and starts its workers.
    ///
    /// The stage's output stream is closed only after every worker has seen
    /// the upstream stream close (or the pipeline was cancelled).
    pub fn stage<S>(self, stage: S) -> Pipeline<C, S::Output>
    where
        S: Stage<C, Input = T>,
    {
        let Self {
            client,
            workers,
            cancel,
            stream,
            seed,
            mut failures,
        } = self;

        let stage = Arc::new(stage);
        let (out_tx, out_rx) = async_channel::bounded(STREAM_CAPACITY);
        let (fail_tx, fail_rx) = mpsc::unbounded_channel();

        let mut pool = JoinSet::new();
        for worker in 0..workers {
            pool.spawn(run_worker(
                Arc::clone(&stage),
                Arc::clone(&client),
                worker,
                stream.clone(),
                out_tx.clone(),
                fail_tx.clone(),
                cancel.clone(),
            ));
        }
        drop(fail_tx);

        let name = stage.name();
        tokio::spawn(async move {
            while let Some(joined) = pool.join_next().await {
                if let Err(e) = joined {
                    error!("[{name}] worker task ended abnormally: {e}");
                }
            }
            out_tx.close();
            debug!("[{name}] all {workers} workers finished");
        });

        failures.push(tokio::spawn(drain_failures(fail_rx)));

        Pipeline {
            client,
            workers,
            cancel,
            stream: out_rx,
            seed,
            failures,
        }
    }

    /// Hands back the final stream along with everything needed to collect it.
    pub fn drain(self) -> Drained<T> {
        Drained {
            stream: self.stream,
            seed: self.seed,
            failures: self.failures,
            cancel: self.cancel,
        }
    }
}

async fn run_worker<C, S>(
    stage: Arc<S>,
    client: Arc<C>,
    worker: usize,
    input: Receiver<S::Input>,
    output: Sender<S::Output>,
    failures: mpsc::UnboundedSender<StageFailure>,
    cancel: CancellationToken,
) where
    C: ?Sized + Send + Sync + 'static,
    S: Stage<C>,
{
    let name = stage.name();
    debug!("[{name}][worker-{worker}] start");

    loop {
        let item = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            next = input.recv() => match next {
                Ok(item) => item,
                Err(_) => break,
            },
        };

        let label = stage.describe(&item);
        let result = if stage.interruptible() {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                result = run_guarded(&*stage, item, &*client, worker) => result,
            }
        } else {
            run_guarded(&*stage, item, &*client, worker).await
        };

        match result {
            Ok(emit) => {
                debug!("[{name}][worker-{worker}] {label} -> {} item(s)", emit.len());
                // downstream workers drop their receivers on cancel, which
                // fails this send
                for out in emit {
                    if output.send(out).await.is_err() {
                        debug!("[{name}][worker-{worker}] downstream closed");
                        return;
                    }
                }
            }
            Err(error) => {
                // unbounded, so this never blocks the worker
                let _ = failures.send(StageFailure {
                    stage: name,
                    worker,
                    item: label,
                    error,
                });
            }
        }
    }

    debug!("[{name}][worker-{worker}] done");
}

/// Runs one item, turning a panic into an ordinary item failure so the
/// worker keeps serving the stream.
async fn run_guarded<C, S>(
    stage: &S,
    item: S::Input,
    client: &C,
    worker: usize,
) -> Result<Emit<S::Output>>
where
    C: ?Sized + Send + Sync + 'static,
    S: Stage<C>,
{
    match AssertUnwindSafe(stage.run(item, client, worker))
        .catch_unwind()
        .await
    {
        Ok(result) => result,
        Err(panic) => Err(SweepError::Panicked(panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn drain_failures(mut rx: mpsc::UnboundedReceiver<StageFailure>) -> Vec<StageFailure> {
    let mut failures = Vec::new();
    while let Some(failure) = rx.recv().await {
        warn!(
            "[{}][worker-{}] {} failed: {}",
            failure.stage, failure.worker, failure.item, failure.error
        );
        failures.push(failure);
    }
    failures
}
