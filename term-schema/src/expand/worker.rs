//! Concurrent decoding of document buffers.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, instrument};

use super::{Expander, FieldObservation};
use crate::error::ProfileResult;
use crate::workers::{join_all, SharedReceiver};

/// Counters reported by the expansion stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpandStats {
    pub documents: u64,
    pub observations: u64,
}

impl ExpandStats {
    fn add(mut self, other: Self) -> Self {
        self.documents += other.documents;
        self.observations += other.observations;
        self
    }
}

/// Pool of decode workers sharing one input queue.
#[derive(Debug, Clone)]
pub struct ExpandWorkers {
    expander: Arc<Expander>,
    concurrency: usize,
    channel_capacity: usize,
}

impl ExpandWorkers {
    pub fn new(expander: Expander, concurrency: usize, channel_capacity: usize) -> Self {
        Self {
            expander: Arc::new(expander),
            concurrency: concurrency.max(1),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Starts the pool on `input`.
    ///
    /// The returned receiver closes once every worker has exited. The handle
    /// resolves to the stage counters, or to the first decode error; a
    /// failed stage may have emitted observations of earlier documents, so
    /// its output must be discarded.
    pub fn spawn(
        &self,
        input: mpsc::Receiver<Vec<u8>>,
    ) -> (
        mpsc::Receiver<FieldObservation>,
        JoinHandle<ProfileResult<ExpandStats>>,
    ) {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let input = SharedReceiver::new(input);
        let expander = Arc::clone(&self.expander);
        let concurrency = self.concurrency;
        let handle = tokio::spawn(run_pool(expander, input, tx, concurrency));
        (rx, handle)
    }
}

#[instrument(skip(expander, input, tx))]
async fn run_pool(
    expander: Arc<Expander>,
    input: SharedReceiver<Vec<u8>>,
    tx: mpsc::Sender<FieldObservation>,
    concurrency: usize,
) -> ProfileResult<ExpandStats> {
    let mut set = JoinSet::new();
    for worker_id in 0..concurrency {
        set.spawn(decode_worker(
            worker_id,
            Arc::clone(&expander),
            input.clone(),
            tx.clone(),
        ));
    }
    drop(tx);

    let stats = join_all(set, "expand")
        .await?
        .into_iter()
        .fold(ExpandStats::default(), ExpandStats::add);
    info!(
        documents = stats.documents,
        observations = stats.observations,
        "Expansion finished"
    );
    Ok(stats)
}

async fn decode_worker(
    worker_id: usize,
    expander: Arc<Expander>,
    input: SharedReceiver<Vec<u8>>,
    tx: mpsc::Sender<FieldObservation>,
) -> ProfileResult<ExpandStats> {
    let mut stats = ExpandStats::default();
    let mut batch = Vec::new();

    while let Some(buf) = input.recv().await {
        expander.expand_into(&buf, &mut batch)?;
        stats.documents += 1;
        stats.observations += batch.len() as u64;
        for observation in batch.drain(..) {
            if tx.send(observation).await.is_err() {
                debug!(worker_id, "Observation receiver dropped, stopping");
                return Ok(stats);
            }
        }
    }
    debug!(
        worker_id,
        documents = stats.documents,
        "Decode worker finished"
    );
    Ok(stats)
}
