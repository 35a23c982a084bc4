//! End-to-end profiling runs.
//!
//! A [`Profiler`] wires the stages together:
//!
//! ```text
//! documents -> expand workers -> observations
//!           -> aggregate engine -> group results -> merge -> field results
//! ```
//!
//! Input may enter at any of the three queues. [`Profiler::spawn`] picks the
//! entry point from the element type of the queue it is given and rejects
//! anything else with [`ProfileError::UnsupportedInput`].
//!
//! Field results are only emitted after every upstream stage has finished
//! successfully. A run that fails anywhere yields no field results at all.
//!
//! ```rust,no_run
//! use term_schema::prelude::*;
//!
//! # async fn example() -> ProfileResult<()> {
//! let profiler = Profiler::new(ProfileConfig::default().with_top_n(5))?;
//! let docs = vec![
//!     DocumentBuilder::new().int32("f1", 5).string("f2", "šašo").build(),
//!     DocumentBuilder::new().int32("f1", 10).int32("f2", 20).build(),
//! ];
//! let (fields, stats) = profiler.profile_documents(docs).await?;
//! for field in &fields {
//!     println!("{} ({} types, seen {} times)", field.name, field.types.len(), field.count);
//! }
//! println!("{} documents in {} ms", stats.documents, stats.elapsed_ms);
//! # Ok(())
//! # }
//! ```

use std::any::Any;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::aggregate::{AggregateEngine, GroupResult};
use crate::config::ProfileConfig;
use crate::error::{ProfileError, ProfileResult};
use crate::expand::worker::ExpandWorkers;
use crate::expand::{Expander, FieldObservation};
use crate::logging::{truncate_field, LogConfig};
use crate::merge::{FieldMerger, FieldResult};
use crate::{log_stage, log_summary, perf_debug};

/// Counters of a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub documents: u64,
    pub observations: u64,
    pub groups: u64,
    pub fields: u64,
    pub elapsed_ms: u64,
}

/// The queue a run starts from.
#[derive(Debug)]
pub enum ProfileInput {
    /// Raw BSON documents.
    Documents(mpsc::Receiver<Vec<u8>>),
    /// Observations produced elsewhere.
    Observations(mpsc::Receiver<FieldObservation>),
    /// Group results produced by another backend; only merged.
    Groups(mpsc::Receiver<GroupResult>),
}

impl ProfileInput {
    /// Classifies a queue by its element type.
    pub fn from_receiver<T: Send + 'static>(rx: mpsc::Receiver<T>) -> ProfileResult<Self> {
        let boxed: Box<dyn Any + Send> = Box::new(rx);
        let boxed = match boxed.downcast::<mpsc::Receiver<Vec<u8>>>() {
            Ok(rx) => return Ok(ProfileInput::Documents(*rx)),
            Err(other) => other,
        };
        let boxed = match boxed.downcast::<mpsc::Receiver<FieldObservation>>() {
            Ok(rx) => return Ok(ProfileInput::Observations(*rx)),
            Err(other) => other,
        };
        match boxed.downcast::<mpsc::Receiver<GroupResult>>() {
            Ok(rx) => Ok(ProfileInput::Groups(*rx)),
            Err(_) => Err(ProfileError::unsupported_input::<T>()),
        }
    }

    fn shape(&self) -> &'static str {
        match self {
            ProfileInput::Documents(_) => "documents",
            ProfileInput::Observations(_) => "observations",
            ProfileInput::Groups(_) => "groups",
        }
    }
}

/// A run in progress.
#[derive(Debug)]
pub struct ProfileRun {
    /// Field results, ordered by name. Closes when the run ends.
    pub results: mpsc::Receiver<FieldResult>,
    /// Resolves to the run counters or to the error that aborted the run.
    pub handle: JoinHandle<ProfileResult<RunStats>>,
}

impl ProfileRun {
    /// Drains the results and waits for the run.
    pub async fn collect(mut self) -> ProfileResult<(Vec<FieldResult>, RunStats)> {
        let mut fields = Vec::new();
        while let Some(field) = self.results.recv().await {
            fields.push(field);
        }
        let stats = self.handle.await??;
        Ok((fields, stats))
    }
}

/// Entry point of the profiler.
#[derive(Debug, Clone)]
pub struct Profiler {
    config: ProfileConfig,
    log: LogConfig,
}

impl Profiler {
    /// Creates a profiler after validating `config`.
    pub fn new(config: ProfileConfig) -> ProfileResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            log: LogConfig::default(),
        })
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    pub fn config(&self) -> &ProfileConfig {
        &self.config
    }

    /// Starts a run on a queue of documents, observations or group results.
    pub fn spawn<T: Send + 'static>(&self, input: mpsc::Receiver<T>) -> ProfileResult<ProfileRun> {
        let input = ProfileInput::from_receiver(input).inspect_err(|e| {
            warn!(error = %e, "Rejected profiling input");
        })?;
        self.spawn_input(input)
    }

    /// Starts a run on an already classified input.
    pub fn spawn_input(&self, input: ProfileInput) -> ProfileResult<ProfileRun> {
        let engine = AggregateEngine::from_config(&self.config)?;
        let expand = ExpandWorkers::new(
            Expander::new(self.config.effective_expand_config()),
            self.config.concurrency,
            self.config.channel_capacity,
        );
        let (tx, results) = mpsc::channel(self.config.channel_capacity);
        let handle = tokio::spawn(run(input, expand, engine, tx, self.log.clone()));
        Ok(ProfileRun { results, handle })
    }

    /// Runs to completion and collects all field results.
    pub async fn profile<T: Send + 'static>(
        &self,
        input: mpsc::Receiver<T>,
    ) -> ProfileResult<(Vec<FieldResult>, RunStats)> {
        self.spawn(input)?.collect().await
    }

    /// Profiles documents from an iterator.
    pub async fn profile_documents<I>(
        &self,
        documents: I,
    ) -> ProfileResult<(Vec<FieldResult>, RunStats)>
    where
        I: IntoIterator<Item = Vec<u8>>,
        I::IntoIter: Send + 'static,
    {
        let (tx, rx) = mpsc::channel(self.config.channel_capacity);
        let documents = documents.into_iter();
        tokio::spawn(async move {
            for doc in documents {
                if tx.send(doc).await.is_err() {
                    debug!("Profiling run stopped reading documents");
                    break;
                }
            }
        });
        self.profile(rx).await
    }
}

#[instrument(skip_all, fields(input = input.shape()))]
async fn run(
    input: ProfileInput,
    expand: ExpandWorkers,
    engine: AggregateEngine,
    tx: mpsc::Sender<FieldResult>,
    log: LogConfig,
) -> ProfileResult<RunStats> {
    let started = Instant::now();
    let mut stats = RunStats::default();

    let (mut groups_rx, expand_handle, aggregate_handle) = match input {
        ProfileInput::Documents(rx) => {
            let (observations, expand_handle) = expand.spawn(rx);
            let (groups, aggregate_handle) = engine.spawn(observations);
            (groups, Some(expand_handle), Some(aggregate_handle))
        }
        ProfileInput::Observations(rx) => {
            let (groups, aggregate_handle) = engine.spawn(rx);
            (groups, None, Some(aggregate_handle))
        }
        ProfileInput::Groups(rx) => (rx, None, None),
    };

    let mut merger = FieldMerger::new();
    while let Some(group) = groups_rx.recv().await {
        perf_debug!(
            log,
            field = %truncate_field(&group.name, log.max_field_length),
            bson_type = %group.bson_type,
            count = group.count,
            "Group result received"
        );
        stats.groups += 1;
        merger.push(group);
    }
    log_stage!(log, groups = stats.groups, "Group results drained");

    if let Some(handle) = expand_handle {
        let expanded = handle.await??;
        stats.documents = expanded.documents;
        stats.observations = expanded.observations;
    }
    if let Some(handle) = aggregate_handle {
        let aggregated = handle.await??;
        stats.observations = aggregated.observations;
    }

    let fields = merger.finish();
    stats.fields = fields.len() as u64;
    log_stage!(log, fields = stats.fields, "Upstream stages finished, emitting fields");
    for field in fields {
        if log.log_field_results {
            debug!(
                field = %truncate_field(&field.name, log.max_field_length),
                types = field.types.len(),
                count = field.count,
                "Field result"
            );
        }
        if tx.send(field).await.is_err() {
            debug!("Field result receiver dropped");
            break;
        }
    }

    stats.elapsed_ms = started.elapsed().as_millis() as u64;
    log_summary!(
        log,
        documents = stats.documents,
        observations = stats.observations,
        groups = stats.groups,
        fields = stats.fields,
        elapsed_ms = stats.elapsed_ms,
        "Profiling run finished"
    );
    Ok(stats)
}
