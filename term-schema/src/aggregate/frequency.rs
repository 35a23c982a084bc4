//! Frequency tables, the distribution workers that own them and the
//! top/bottom ranking derived from them.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use super::accumulator::{GroupKey, PartialState};
use crate::bson::ValueKey;
use crate::error::{ProfileError, ProfileResult};

/// A sink that folds items of one distribution kind.
pub trait Tally: Default + Send + 'static {
    type Item: Send + 'static;

    fn add(&mut self, item: Self::Item);

    /// Total number of items added.
    fn total(&self) -> u64;
}

/// `key -> occurrences`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTable<K: Hash + Eq> {
    counts: HashMap<K, u64>,
}

impl<K: Hash + Eq> Default for FrequencyTable<K> {
    fn default() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }
}

impl<K: Hash + Eq> FrequencyTable<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_count(&mut self, key: K, count: u64) {
        *self.counts.entry(key).or_insert(0) += count;
    }

    pub fn get(&self, key: &K) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, u64)> {
        self.counts.iter().map(|(k, c)| (k, *c))
    }
}

impl<K: Hash + Eq + Send + 'static> Tally for FrequencyTable<K> {
    type Item = K;

    fn add(&mut self, item: K) {
        self.add_count(item, 1);
    }

    fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

impl<K: Hash + Eq> PartialState for FrequencyTable<K> {
    fn merge(states: Vec<Self>) -> ProfileResult<Self> {
        let mut merged = Self::default();
        for state in states {
            for (key, count) in state.counts {
                merged.add_count(key, count);
            }
        }
        Ok(merged)
    }

    fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }
}

/// Fixed slot counts, indexed by weekday (0 = Sunday) or hour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slots<const N: usize>(pub [u64; N]);

impl<const N: usize> Default for Slots<N> {
    fn default() -> Self {
        Self([0; N])
    }
}

impl<const N: usize> Tally for Slots<N> {
    type Item = u8;

    fn add(&mut self, slot: u8) {
        if let Some(count) = self.0.get_mut(usize::from(slot)) {
            *count += 1;
        }
    }

    fn total(&self) -> u64 {
        self.0.iter().sum()
    }
}

pub type WeekdaySlots = Slots<7>;
pub type HourSlots = Slots<24>;

/// Per-group tables owned by one distribution worker.
pub type GroupTables<T> = HashMap<GroupKey, T>;

/// Spawns the single writer of one distribution kind.
///
/// The worker drains `rx` until every sender is dropped and then returns
/// its tables.
pub fn spawn_distribution_worker<T: Tally>(
    kind: &'static str,
    mut rx: mpsc::Receiver<(GroupKey, T::Item)>,
) -> JoinHandle<GroupTables<T>> {
    tokio::spawn(async move {
        let mut tables: GroupTables<T> = HashMap::new();
        let mut received = 0u64;
        while let Some((key, item)) = rx.recv().await {
            tables.entry(key).or_default().add(item);
            received += 1;
        }
        debug!(kind, groups = tables.len(), received, "Distribution worker finished");
        tables
    })
}

/// Senders feeding the four distribution workers.
#[derive(Debug, Clone)]
pub struct DistributionSenders {
    pub values: mpsc::Sender<(GroupKey, ValueKey)>,
    pub lengths: mpsc::Sender<(GroupKey, u64)>,
    pub weekdays: mpsc::Sender<(GroupKey, u8)>,
    pub hours: mpsc::Sender<(GroupKey, u8)>,
}

/// Handles of the four distribution workers.
#[derive(Debug)]
pub struct DistributionWorkers {
    values: JoinHandle<GroupTables<FrequencyTable<ValueKey>>>,
    lengths: JoinHandle<GroupTables<FrequencyTable<u64>>>,
    weekdays: JoinHandle<GroupTables<WeekdaySlots>>,
    hours: JoinHandle<GroupTables<HourSlots>>,
}

/// Everything the distribution workers collected.
#[derive(Debug, Default)]
pub struct Distributions {
    pub values: GroupTables<FrequencyTable<ValueKey>>,
    pub lengths: GroupTables<FrequencyTable<u64>>,
    pub weekdays: GroupTables<WeekdaySlots>,
    pub hours: GroupTables<HourSlots>,
}

impl DistributionWorkers {
    /// Starts all four workers with queues of `capacity`.
    pub fn spawn(capacity: usize) -> (DistributionSenders, Self) {
        let (values_tx, values_rx) = mpsc::channel(capacity);
        let (lengths_tx, lengths_rx) = mpsc::channel(capacity);
        let (weekdays_tx, weekdays_rx) = mpsc::channel(capacity);
        let (hours_tx, hours_rx) = mpsc::channel(capacity);
        let senders = DistributionSenders {
            values: values_tx,
            lengths: lengths_tx,
            weekdays: weekdays_tx,
            hours: hours_tx,
        };
        let workers = Self {
            values: spawn_distribution_worker("value", values_rx),
            lengths: spawn_distribution_worker("length", lengths_rx),
            weekdays: spawn_distribution_worker("weekday", weekdays_rx),
            hours: spawn_distribution_worker("hour", hours_rx),
        };
        (senders, workers)
    }

    /// Waits for all workers. Every sender must have been dropped.
    pub async fn join(self) -> ProfileResult<Distributions> {
        let (values, lengths, weekdays, hours) =
            tokio::join!(self.values, self.lengths, self.weekdays, self.hours);
        Ok(Distributions {
            values: values?,
            lengths: lengths?,
            weekdays: weekdays?,
            hours: hours?,
        })
    }

    pub fn abort(&self) {
        self.values.abort();
        self.lengths.abort();
        self.weekdays.abort();
        self.hours.abort();
    }
}

/// Sends to a distribution worker, failing if it is gone.
pub async fn forward<T>(tx: &mpsc::Sender<T>, item: T, kind: &str) -> ProfileResult<()> {
    tx.send(item)
        .await
        .map_err(|_| ProfileError::TaskFailed(format!("{kind} distribution worker stopped")))
}

/// Tie-break between two keys with equal counts: numerically when both
/// parse as numbers, otherwise by their rendered text.
fn tie_break(a: &ValueKey, b: &ValueKey) -> Ordering {
    let (text_a, text_b) = (a.to_string(), b.to_string());
    let number = |key: &ValueKey, text: &str| {
        key.as_number().or_else(|| text.trim().parse::<f64>().ok())
    };
    if let (Some(x), Some(y)) = (number(a, &text_a), number(b, &text_b)) {
        if let Some(ordering) = x.partial_cmp(&y) {
            return ordering;
        }
    }
    text_a.cmp(&text_b)
}

/// All keys of `table` ordered by count descending, ties ascending.
pub fn rank(table: &FrequencyTable<ValueKey>) -> Vec<(ValueKey, u64)> {
    let mut ranked: Vec<(ValueKey, u64)> = table.iter().map(|(k, c)| (k.clone(), c)).collect();
    ranked.sort_by(|(ka, ca), (kb, cb)| cb.cmp(ca).then_with(|| tie_break(ka, kb)));
    ranked
}

/// The first `n` entries of a ranking.
pub fn top_n(ranked: &[(ValueKey, u64)], n: usize) -> &[(ValueKey, u64)] {
    &ranked[..n.min(ranked.len())]
}

/// The last `n` entries of a ranking, kept in ranking order.
pub fn bottom_n(ranked: &[(ValueKey, u64)], n: usize) -> &[(ValueKey, u64)] {
    &ranked[ranked.len().saturating_sub(n)..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::BsonType;

    fn table(entries: &[(i32, u64)]) -> FrequencyTable<ValueKey> {
        let mut table = FrequencyTable::new();
        for (v, c) in entries {
            table.add_count(ValueKey::Int32(*v), *c);
        }
        table
    }

    #[test]
    fn test_rank_orders_by_count_then_value() {
        let ranked = rank(&table(&[(10, 1), (2, 3), (9, 1), (5, 3), (1, 2)]));
        let keys: Vec<_> = ranked.iter().map(|(k, c)| (k.clone(), *c)).collect();
        assert_eq!(
            keys,
            vec![
                (ValueKey::Int32(2), 3),
                (ValueKey::Int32(5), 3),
                (ValueKey::Int32(1), 2),
                (ValueKey::Int32(9), 1),
                (ValueKey::Int32(10), 1),
            ]
        );
    }

    #[test]
    fn test_numeric_tie_break_is_not_lexical() {
        let ranked = rank(&table(&[(10, 1), (9, 1)]));
        assert_eq!(ranked[0].0, ValueKey::Int32(9));
    }

    #[test]
    fn test_string_tie_break_is_lexical() {
        let mut t = FrequencyTable::new();
        for s in ["pear", "apple", "fig"] {
            t.add(ValueKey::String(s.into()));
        }
        let ranked = rank(&t);
        let names: Vec<String> = ranked.iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(names, ["apple", "fig", "pear"]);
    }

    #[test]
    fn test_numeric_strings_tie_break_numerically() {
        let mut t = FrequencyTable::new();
        for s in ["10", "9", "100"] {
            t.add(ValueKey::String(s.into()));
        }
        let names: Vec<String> = rank(&t).iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(names, ["9", "10", "100"]);

        // mixed with a non-number the pair falls back to text order
        t.add(ValueKey::String("abc".into()));
        let names: Vec<String> = rank(&t).iter().map(|(k, _)| k.to_string()).collect();
        assert_eq!(names.last().map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_top_and_bottom_slices() {
        let ranked = rank(&table(&[(1, 5), (2, 4), (3, 3), (4, 2)]));
        let top: Vec<_> = top_n(&ranked, 2).iter().map(|(_, c)| *c).collect();
        assert_eq!(top, [5, 4]);
        let bottom: Vec<_> = bottom_n(&ranked, 2).iter().map(|(_, c)| *c).collect();
        assert_eq!(bottom, [3, 2]);
        assert_eq!(top_n(&ranked, 10).len(), 4);
        assert_eq!(bottom_n(&ranked, 10).len(), 4);
        assert!(top_n(&ranked, 0).is_empty());
        assert!(bottom_n(&ranked, 0).is_empty());
    }

    #[test]
    fn test_slots_ignore_out_of_range() {
        let mut slots = WeekdaySlots::default();
        slots.add(0);
        slots.add(6);
        slots.add(7);
        assert_eq!(slots.0, [1, 0, 0, 0, 0, 0, 1]);
        assert_eq!(slots.total(), 2);
    }

    #[test]
    fn test_table_merge() {
        let merged =
            FrequencyTable::merge(vec![table(&[(1, 2)]), table(&[(1, 3), (2, 1)])]).unwrap();
        assert_eq!(merged.get(&ValueKey::Int32(1)), 5);
        assert_eq!(merged.total(), 6);
    }

    #[tokio::test]
    async fn test_distribution_workers_drain_and_finish() {
        let (senders, workers) = DistributionWorkers::spawn(2);
        let key = GroupKey::new("d", BsonType::Date);
        for hour in [1u8, 1, 23] {
            forward(&senders.hours, (key.clone(), hour), "hour").await.unwrap();
        }
        forward(&senders.values, (key.clone(), ValueKey::DateTime(0)), "value")
            .await
            .unwrap();
        drop(senders);

        let distributions = workers.join().await.unwrap();
        let hours = distributions.hours.get(&key).unwrap();
        assert_eq!(hours.0[1], 2);
        assert_eq!(hours.0[23], 1);
        assert_eq!(distributions.values.get(&key).unwrap().len(), 1);
        assert!(distributions.lengths.is_empty());
        assert!(distributions.weekdays.is_empty());
    }
}
