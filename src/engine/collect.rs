use log::{debug, warn};

use super::{Drained, StageFailure};
use crate::error::{Result, SweepError};

/// Everything a pipeline produced: the items that reached the end and the
/// per-item failures recorded by each stage.
///
/// When `cancelled` is set the lists hold whatever was finished before the
/// pipeline stopped.
#[derive(Debug)]
pub struct Collected<T> {
    pub items: Vec<T>,
    pub failures: Vec<StageFailure>,
    pub cancelled: bool,
}

impl<T> Collected<T> {
    /// Turns a cancelled run into `Err(Cancelled)`, for callers that have no
    /// use for a partial result.
    pub fn complete(self) -> Result<Self> {
        if self.cancelled {
            Err(SweepError::Cancelled)
        } else {
            Ok(self)
        }
    }
}

/// Drains the terminal stream until every stage has closed, then gathers the
/// failure records.
///
/// A cancelled pipeline is not an error here: the partial result comes back
/// with `cancelled` set and the producer's outcome is ignored.
///
/// # Errors
///
/// Returns the seed's error if the producer failed. Per-item failures are
/// data, not errors.
pub async fn collect<T>(drained: Drained<T>) -> Result<Collected<T>> {
    let Drained {
        stream,
        seed,
        failures: failure_tasks,
        cancel,
    } = drained;

    let mut items = Vec::new();
    while let Ok(item) = stream.recv().await {
        items.push(item);
    }

    let cancelled = cancel.is_cancelled();
    if cancelled {
        seed.abort();
    } else {
        seed.await??;
    }

    let mut failures = Vec::new();
    for task in failure_tasks {
        failures.extend(task.await?);
    }

    if cancelled {
        warn!(
            "Pipeline cancelled after {} items and {} failures",
            items.len(),
            failures.len()
        );
    } else {
        debug!(
            "Collected {} items and {} failures",
            items.len(),
            failures.len()
        );
    }

    Ok(Collected {
        items,
        failures,
        cancelled,
    })
}
