//! Folding of per-type group results into one record per field.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::aggregate::{GroupResult, PartialState};
use crate::error::ProfileResult;
use crate::expand::level_of;

/// All types observed under one field name.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldResult {
    pub name: String,
    pub level: u32,
    /// Sum of the counts of all types.
    pub count: u64,
    /// Most frequent type first.
    pub types: Vec<GroupResult>,
}

impl FieldResult {
    fn new(name: String) -> Self {
        Self {
            level: level_of(&name),
            name,
            count: 0,
            types: Vec::new(),
        }
    }

    fn sort_types(&mut self) {
        self.types.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.bson_type.tag().cmp(&b.bson_type.tag()))
        });
    }

    /// Share of this field's occurrences that have the given type index.
    pub fn type_ratio(&self, index: usize) -> Option<f64> {
        let group = self.types.get(index)?;
        (self.count > 0).then(|| group.count as f64 / self.count as f64)
    }
}

/// Single-reducer merge of group results.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldMerger {
    fields: BTreeMap<String, FieldResult>,
}

impl FieldMerger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, group: GroupResult) {
        let field = self
            .fields
            .entry(group.name.clone())
            .or_insert_with(|| FieldResult::new(group.name.clone()));
        field.count += group.count;
        field.types.push(group);
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Field results ordered by name.
    pub fn finish(self) -> Vec<FieldResult> {
        let fields: Vec<FieldResult> = self
            .fields
            .into_values()
            .map(|mut field| {
                field.sort_types();
                field
            })
            .collect();
        debug!(fields = fields.len(), "Merge finished");
        fields
    }
}

impl Extend<GroupResult> for FieldMerger {
    fn extend<I: IntoIterator<Item = GroupResult>>(&mut self, iter: I) {
        for group in iter {
            self.push(group);
        }
    }
}

impl FromIterator<GroupResult> for FieldMerger {
    fn from_iter<I: IntoIterator<Item = GroupResult>>(iter: I) -> Self {
        let mut merger = Self::new();
        merger.extend(iter);
        merger
    }
}

impl PartialState for FieldMerger {
    fn merge(states: Vec<Self>) -> ProfileResult<Self> {
        let mut merged = FieldMerger::new();
        for state in states {
            for (name, field) in state.fields {
                let target = merged
                    .fields
                    .entry(name)
                    .or_insert_with_key(|name| FieldResult::new(name.clone()));
                target.count += field.count;
                target.types.extend(field.types);
            }
        }
        Ok(merged)
    }

    fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Merges a batch of group results.
pub fn merge_groups(groups: impl IntoIterator<Item = GroupResult>) -> Vec<FieldResult> {
    groups.into_iter().collect::<FieldMerger>().finish()
}
