//! Collect, Reduce and Derive.
//!
//! Collect workers share the observation queue, each keeping a private
//! accumulator map and forwarding scalars to the distribution workers.
//! Reduce merges the private maps once every worker is done. Derive turns
//! each merged group and its frequency tables into a [`GroupResult`], split
//! across tasks.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Datelike, FixedOffset, Timelike};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, instrument};

use super::accumulator::{Accumulator, AccumulatorMap, GroupKey, PartialState};
use super::frequency::{
    bottom_n, forward, rank, top_n, DistributionSenders, DistributionWorkers, FrequencyTable,
    HourSlots, WeekdaySlots,
};
use super::histogram::{build_histogram, Domain};
use super::results::{GroupResult, LengthStats, ValueFrequency, ValueStats};
use crate::bson::{BsonType, Value, ValueKey};
use crate::config::{AggregateConfig, ProfileConfig};
use crate::error::{ProfileError, ProfileResult};
use crate::expand::FieldObservation;
use crate::workers::{join_all, SharedReceiver};

/// Counters reported by the aggregation stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateStats {
    pub observations: u64,
    pub groups: u64,
}

/// Turns a stream of observations into per-group results.
#[derive(Debug, Clone)]
pub struct AggregateEngine {
    config: AggregateConfig,
    time_zone: FixedOffset,
    concurrency: usize,
    channel_capacity: usize,
}

impl AggregateEngine {
    pub fn new(config: AggregateConfig, time_zone: FixedOffset) -> Self {
        Self {
            config,
            time_zone,
            concurrency: num_cpus::get(),
            channel_capacity: 1024,
        }
    }

    /// Builds an engine from a validated run configuration.
    pub fn from_config(config: &ProfileConfig) -> ProfileResult<Self> {
        config.validate()?;
        Ok(Self::new(config.aggregate.clone(), config.time_zone()?)
            .with_concurrency(config.concurrency)
            .with_channel_capacity(config.channel_capacity))
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    pub fn config(&self) -> &AggregateConfig {
        &self.config
    }

    /// Starts the engine on `input`.
    ///
    /// Results are only sent once Collect and Reduce have succeeded, so a
    /// failed run emits nothing. The returned receiver closes when the run
    /// ends either way; the handle carries the outcome.
    pub fn spawn(
        &self,
        input: mpsc::Receiver<FieldObservation>,
    ) -> (
        mpsc::Receiver<GroupResult>,
        JoinHandle<ProfileResult<AggregateStats>>,
    ) {
        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let engine = Arc::new(self.clone());
        let handle = tokio::spawn(async move { engine.run(input, tx).await });
        (rx, handle)
    }

    /// Aggregates an in-memory batch of observations.
    pub async fn aggregate(
        &self,
        observations: Vec<FieldObservation>,
    ) -> ProfileResult<Vec<GroupResult>> {
        let (tx, input) = mpsc::channel(self.channel_capacity);
        tokio::spawn(async move {
            for observation in observations {
                if tx.send(observation).await.is_err() {
                    break;
                }
            }
        });
        let (mut rx, handle) = self.spawn(input);
        let mut results = Vec::new();
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        handle.await??;
        results.sort_by(|a, b| (&a.name, a.bson_type).cmp(&(&b.name, b.bson_type)));
        Ok(results)
    }

    #[instrument(skip_all, fields(concurrency = self.concurrency))]
    async fn run(
        self: Arc<Self>,
        input: mpsc::Receiver<FieldObservation>,
        tx: mpsc::Sender<GroupResult>,
    ) -> ProfileResult<AggregateStats> {
        let started = Instant::now();

        let (senders, distributions) = DistributionWorkers::spawn(self.channel_capacity);
        let input = SharedReceiver::new(input);
        let mut set = JoinSet::new();
        for worker_id in 0..self.concurrency {
            set.spawn(collect_worker(
                worker_id,
                Arc::clone(&self),
                input.clone(),
                senders.clone(),
            ));
        }
        drop(senders);

        let partials = match join_all(set, "collect").await {
            Ok(partials) => partials,
            Err(e) => {
                distributions.abort();
                return Err(e);
            }
        };
        let observations: u64 = partials.iter().map(|(_, seen)| *seen).sum();
        let maps: Vec<AccumulatorMap> = partials.into_iter().map(|(map, _)| map).collect();
        let partitions = maps.len();
        let mut tables = distributions.join().await?;

        let merged = AccumulatorMap::merge(maps)?;
        let groups = merged.len() as u64;
        debug!(partitions, groups, observations, "Reduce finished");

        let inputs: Vec<DeriveInput> = merged
            .into_inner()
            .into_iter()
            .map(|(key, acc)| DeriveInput {
                values: tables.values.remove(&key),
                lengths: tables.lengths.remove(&key),
                weekdays: tables.weekdays.remove(&key),
                hours: tables.hours.remove(&key),
                key,
                acc,
            })
            .collect();

        let chunk_size = inputs.len().div_ceil(self.concurrency).max(1);
        let mut inputs = inputs.into_iter();
        let mut set: JoinSet<ProfileResult<()>> = JoinSet::new();
        loop {
            let chunk: Vec<DeriveInput> = inputs.by_ref().take(chunk_size).collect();
            if chunk.is_empty() {
                break;
            }
            let engine = Arc::clone(&self);
            let tx = tx.clone();
            set.spawn(async move {
                for input in chunk {
                    if tx.send(engine.derive(input)).await.is_err() {
                        debug!("Group result receiver dropped, stopping derive");
                        break;
                    }
                }
                Ok(())
            });
        }
        drop(tx);
        join_all(set, "derive").await?;

        info!(
            observations,
            groups,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Aggregation finished"
        );
        Ok(AggregateStats {
            observations,
            groups,
        })
    }

    /// Computes the group key of an observation and the value it
    /// contributes, reclassifying objectIds as dates when configured.
    pub fn group_key(
        &self,
        observation: FieldObservation,
    ) -> ProfileResult<(GroupKey, Option<Value>)> {
        let FieldObservation {
            name,
            bson_type,
            value,
            ..
        } = observation;

        if bson_type == BsonType::ObjectId && self.config.reclassify_object_ids() {
            let value = match value {
                Some(Value::ObjectId(id)) => Some(Value::DateTime(id.timestamp_millis())),
                None => None,
                Some(other) => return Err(mismatch(&name, bson_type, &other)),
            };
            return Ok((GroupKey::new(name, BsonType::Date), value));
        }

        if let Some(value) = &value {
            if value.bson_type() != bson_type {
                return Err(mismatch(&name, bson_type, value));
            }
        }
        Ok((GroupKey::new(name, bson_type), value))
    }

    fn derive(&self, input: DeriveInput) -> GroupResult {
        let DeriveInput {
            key,
            acc,
            values,
            lengths,
            weekdays,
            hours,
        } = input;
        let flags = acc.flags;
        let mut result = GroupResult::new(key.name, key.bson_type, acc.count);

        if flags.min_max_value {
            result.value_stats = value_stats(&acc);
        }
        if flags.length_stats {
            result.length_stats = length_stats(&acc);
        }

        if flags.unique_count {
            result.unique_count = Some(values.as_ref().map_or(0, |t| t.len() as u64));
        }
        if flags.top_n || flags.bottom_n {
            let ranked = values.as_ref().map(rank).unwrap_or_default();
            let to_frequencies = |slice: &[(ValueKey, u64)]| {
                slice
                    .iter()
                    .map(|(key, count)| ValueFrequency {
                        value: key.to_value(),
                        count: *count,
                    })
                    .collect::<Vec<_>>()
            };
            if flags.top_n {
                result.top = Some(to_frequencies(top_n(&ranked, self.config.top_n)));
            }
            if flags.bottom_n {
                result.bottom = Some(to_frequencies(bottom_n(&ranked, self.config.bottom_n)));
            }
        }

        if flags.weekday_histogram {
            result.weekday_histogram = Some(weekdays.unwrap_or_default().0.to_vec());
        }
        if flags.hour_histogram {
            result.hour_histogram = Some(hours.unwrap_or_default().0.to_vec());
        }

        if flags.value_histogram {
            if let (Some(domain), Some(table)) = (Domain::of(key.bson_type), values.as_ref()) {
                result.value_histogram = build_histogram(
                    table
                        .iter()
                        .filter_map(|(value, count)| value.as_number().map(|x| (x, count))),
                    self.config.value_histogram_resolution,
                    domain,
                );
            }
        }
        if flags.length_histogram {
            if let Some(table) = lengths.as_ref() {
                result.length_histogram = build_histogram(
                    table.iter().map(|(length, count)| (*length as f64, count)),
                    self.config.length_histogram_resolution,
                    Domain::Integer,
                );
            }
        }
        result
    }
}

struct DeriveInput {
    key: GroupKey,
    acc: Accumulator,
    values: Option<FrequencyTable<ValueKey>>,
    lengths: Option<FrequencyTable<u64>>,
    weekdays: Option<WeekdaySlots>,
    hours: Option<HourSlots>,
}

fn mismatch(name: &str, bson_type: BsonType, value: &Value) -> ProfileError {
    ProfileError::unknown_type(format!(
        "field '{name}' declared as {bson_type} carries a {} value",
        value.bson_type()
    ))
}

fn value_stats(acc: &Accumulator) -> Option<ValueStats> {
    let min = acc.min_value.clone()?;
    let max = acc.max_value.clone()?;
    let avg = if acc.flags.average {
        acc.average_value()
    } else {
        None
    };
    Some(ValueStats { min, max, avg })
}

fn length_stats(acc: &Accumulator) -> Option<LengthStats> {
    Some(LengthStats {
        min: acc.min_length?,
        max: acc.max_length?,
        avg: acc.average_length()?,
    })
}

/// Weekday (0 = Sunday) and hour of a date in `tz`.
pub fn date_parts(millis: i64, tz: &FixedOffset) -> Option<(u8, u8)> {
    let local = DateTime::from_timestamp_millis(millis)?.with_timezone(tz);
    Some((
        local.weekday().num_days_from_sunday() as u8,
        local.hour() as u8,
    ))
}

async fn collect_worker(
    worker_id: usize,
    engine: Arc<AggregateEngine>,
    input: SharedReceiver<FieldObservation>,
    senders: DistributionSenders,
) -> ProfileResult<(AccumulatorMap, u64)> {
    let mut map = AccumulatorMap::new();
    let mut seen = 0u64;

    while let Some(observation) = input.recv().await {
        seen += 1;
        let length = observation.length;
        let (key, value) = engine.group_key(observation)?;
        let acc = map.entry(&key, &engine.config)?;
        acc.observe(value.as_ref(), length)?;
        let flags = acc.flags;

        if flags.needs_value_frequencies() {
            if let Some(value_key) = value.as_ref().and_then(ValueKey::from_value) {
                forward(&senders.values, (key.clone(), value_key), "value").await?;
            }
        }
        if flags.length_histogram {
            if let Some(length) = length {
                forward(&senders.lengths, (key.clone(), length), "length").await?;
            }
        }
        if flags.needs_date_parts() {
            let parts = value
                .as_ref()
                .and_then(Value::as_datetime_millis)
                .and_then(|ms| date_parts(ms, &engine.time_zone));
            if let Some((weekday, hour)) = parts {
                if flags.weekday_histogram {
                    forward(&senders.weekdays, (key.clone(), weekday), "weekday").await?;
                }
                if flags.hour_histogram {
                    forward(&senders.hours, (key.clone(), hour), "hour").await?;
                }
            }
        }
    }

    debug!(worker_id, groups = map.len(), seen, "Collect worker finished");
    Ok((map, seen))
}
