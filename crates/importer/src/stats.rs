//! Per-entity import counters.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use temba_migrate_core::EntityType;

/// What happened to one source record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Created,
    Updated,
    Skipped,
}

impl Outcome {
    #[must_use]
    pub const fn from_created(created: bool) -> Self {
        if created { Self::Created } else { Self::Updated }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub fetched: u64,
    pub created: u64,
    pub updated: u64,
    pub skipped: u64,
}

impl ImportStats {
    pub fn record(&mut self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Created => &mut self.created,
            Outcome::Updated => &mut self.updated,
            Outcome::Skipped => &mut self.skipped,
        };
        *counter = counter.saturating_add(1);
    }
}

impl fmt::Display for ImportStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fetched={} created={} updated={} skipped={}",
            self.fetched, self.created, self.updated, self.skipped
        )
    }
}

/// Counters for every entity type touched by a run, in pipeline order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RunStats(BTreeMap<EntityType, ImportStats>);

impl RunStats {
    pub fn entry(&mut self, entity: EntityType) -> &mut ImportStats {
        self.0.entry(entity).or_default()
    }

    pub fn fetched(&mut self, entity: EntityType, count: usize) {
        let stats = self.entry(entity);
        stats.fetched = stats.fetched.saturating_add(u64::try_from(count).unwrap_or(u64::MAX));
    }

    pub fn record(&mut self, entity: EntityType, outcome: Outcome) {
        self.entry(entity).record(outcome);
    }

    #[must_use]
    pub fn get(&self, entity: EntityType) -> ImportStats {
        self.0.get(&entity).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityType, ImportStats)> + '_ {
        self.0.iter().map(|(entity, stats)| (*entity, *stats))
    }
}
