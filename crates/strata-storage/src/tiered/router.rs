//! Insert routing between the two tiers.

use super::merge::merge_level0;
use super::provision::provision_level1;
use super::truncate::truncate_level0;
use super::{TierMetadata, TieredIndex};
use crate::am::UniqueCheck;
use crate::tuple::TupleId;
use strata_common::{RelationId, Result, StrataError};

/// Outcome of one attempt at the level-0 fast path.
enum Routed {
    Inserted,
    Level0Full,
}

impl TieredIndex {
    /// Inserts one row reference.
    ///
    /// Goes straight into level-0 while it has room. Once level-0 is full the
    /// caller first merges it into level-1 (creating level-1 on the first
    /// merge), empties it, and then retries.
    ///
    /// A failed insert leaves the counters as they were.
    pub fn insert(&self, key: &[u8], tuple_id: TupleId, unique: UniqueCheck) -> Result<()> {
        loop {
            match self.try_insert_level0(key, tuple_id, unique)? {
                Routed::Inserted => return Ok(()),
                Routed::Level0Full => self.merge_full_level0()?,
            }
        }
    }

    fn try_insert_level0(
        &self,
        key: &[u8],
        tuple_id: TupleId,
        unique: UniqueCheck,
    ) -> Result<Routed> {
        let capacity = self.config.level0_capacity;
        let _gate = self
            .merge_gate
            .try_read_for(self.config.lock_timeout())
            .ok_or_else(|| self.gate_timeout())?;

        // Reserve a level-0 slot, then insert without holding the latch.
        let mut guard = self.meta.acquire()?;
        let before = *guard.get();
        before.check_invariants(capacity)?;
        if before.level0_full {
            tracing::debug!(index = %self.id(), "level-0 full, merging before insert");
            return Ok(Routed::Level0Full);
        }
        let mut reserved = before;
        reserved.level0_count += 1;
        reserved.level0_full = reserved.level0_count == capacity;
        guard.set(&reserved);
        guard.release();

        let inserted = self
            .check_level1_unique(key, unique, before.level1)
            .and_then(|()| self.level0.tree().insert(key, tuple_id, unique));

        match inserted {
            Ok(()) => {
                let total = self.meta.update(|m| {
                    m.total_count += 1;
                    m.total_count
                })?;
                tracing::debug!(
                    index = %self.id(),
                    level0_count = reserved.level0_count,
                    total,
                    "inserted into level-0"
                );
                Ok(Routed::Inserted)
            }
            Err(e) => Err(self.release_reservation(e)),
        }
    }

    /// Gives back the level-0 slot reserved for a failed insert.
    ///
    /// Always returns the insert's own error; a failed rollback is only logged.
    fn release_reservation(&self, err: StrataError) -> StrataError {
        let capacity = self.config.level0_capacity;
        let rollback = self.meta.update(|m| {
            m.level0_count = m.level0_count.saturating_sub(1);
            m.level0_full = m.level0_count == capacity;
        });
        if let Err(rollback_err) = rollback {
            tracing::warn!(
                index = %self.id(),
                error = %rollback_err,
                "could not release reserved level-0 slot"
            );
        }
        tracing::debug!(index = %self.id(), error = %err, "level-0 insert failed");
        err
    }

    /// Rejects `key` if level-1 holds a live entry for it.
    fn check_level1_unique(
        &self,
        key: &[u8],
        unique: UniqueCheck,
        level1: Option<RelationId>,
    ) -> Result<()> {
        let Some(level1) = level1 else {
            return Ok(());
        };
        if unique == UniqueCheck::No {
            return Ok(());
        }
        if self.catalog.index(level1)?.tree().contains_key(key)? {
            return Err(StrataError::UniqueViolation {
                index: self.level0.name.clone(),
                key: key.to_vec(),
            });
        }
        Ok(())
    }

    /// Merges a full level-0 into level-1 and empties it.
    ///
    /// Runs with the merge gate held exclusively, so no insert is in flight
    /// and at most one merge runs per index. Returns without work if another
    /// merge already drained level-0.
    pub(super) fn merge_full_level0(&self) -> Result<()> {
        let timeout = self.config.lock_timeout();
        let _gate = self
            .merge_gate
            .try_write_for(timeout)
            .ok_or_else(|| self.gate_timeout())?;

        let mut snapshot = self.meta.snapshot()?;
        if !snapshot.level0_full {
            tracing::warn!(index = %self.id(), "level-0 already drained by a concurrent merge");
            return Ok(());
        }

        let table = self.catalog.table(snapshot.base_table)?;
        let level1 = match snapshot.level1 {
            Some(id) => self.catalog.index(id)?,
            None => {
                let level1 = provision_level1(
                    &self.catalog,
                    &snapshot,
                    &self.level0,
                    &self.config.level1_suffix,
                )?;
                // Record level-1 right away so a failed merge never leaves it orphaned.
                let with_level1 = TierMetadata {
                    level1: Some(level1.id),
                    ..snapshot
                };
                self.meta.commit(&snapshot, &with_level1)?;
                snapshot = with_level1;
                level1
            }
        };

        let stats = merge_level0(&self.level0, &table, &level1, timeout)?;
        let released = truncate_level0(&self.level0, &table, timeout)?;

        let drained = TierMetadata {
            level0_count: 0,
            level0_full: false,
            ..snapshot
        };
        self.meta.commit(&snapshot, &drained)?;

        tracing::info!(
            index = %self.id(),
            level1 = %level1.id,
            rows = stats.rows_merged,
            released,
            total = drained.total_count,
            "level-0 merged into level-1"
        );
        Ok(())
    }
}
