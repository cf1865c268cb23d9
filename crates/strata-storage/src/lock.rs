//! Relation-level locks.

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use strata_common::{RelationId, Result, StrataError};

/// Lock strength on a table or index.
///
/// | held \ requested     | AccessShare | ShareUpdateExclusive | AccessExclusive |
/// |----------------------|-------------|----------------------|-----------------|
/// | AccessShare          | ok          | ok                   | blocks          |
/// | ShareUpdateExclusive | ok          | blocks               | blocks          |
/// | AccessExclusive      | blocks      | blocks               | blocks          |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Readers.
    AccessShare,
    /// Maintenance that must not run twice at once but lets readers in.
    ShareUpdateExclusive,
    /// Destructive changes.
    AccessExclusive,
}

/// Lock attached to one catalog relation.
pub struct RelationLock {
    relation: RelationId,
    /// Serializes ShareUpdateExclusive and AccessExclusive holders.
    maintenance: Mutex<()>,
    /// Shared for everyone except AccessExclusive.
    access: RwLock<()>,
}

enum AccessGuard<'a> {
    Shared(#[allow(dead_code)] RwLockReadGuard<'a, ()>),
    Exclusive(#[allow(dead_code)] RwLockWriteGuard<'a, ()>),
}

/// A held relation lock. Released on drop.
pub struct RelationLockGuard<'a> {
    relation: RelationId,
    mode: LockMode,
    // Field order matters: access is released before maintenance.
    _access: AccessGuard<'a>,
    _maintenance: Option<MutexGuard<'a, ()>>,
}

impl RelationLockGuard<'_> {
    pub fn relation(&self) -> RelationId {
        self.relation
    }

    pub fn mode(&self) -> LockMode {
        self.mode
    }
}

impl RelationLock {
    pub fn new(relation: RelationId) -> Self {
        Self {
            relation,
            maintenance: Mutex::new(()),
            access: RwLock::new(()),
        }
    }

    pub fn relation(&self) -> RelationId {
        self.relation
    }

    fn timeout_error(&self, mode: LockMode, timeout: Duration) -> StrataError {
        StrataError::LockTimeout {
            resource: format!("{:?} lock on {}", mode, self.relation),
            timeout_ms: timeout.as_millis() as u64,
        }
    }

    /// Acquires the lock in `mode`, waiting at most `timeout`.
    pub fn acquire(&self, mode: LockMode, timeout: Duration) -> Result<RelationLockGuard<'_>> {
        let maintenance = match mode {
            LockMode::AccessShare => None,
            LockMode::ShareUpdateExclusive | LockMode::AccessExclusive => Some(
                self.maintenance
                    .try_lock_for(timeout)
                    .ok_or_else(|| self.timeout_error(mode, timeout))?,
            ),
        };

        let access = match mode {
            LockMode::AccessShare | LockMode::ShareUpdateExclusive => AccessGuard::Shared(
                self.access
                    .try_read_for(timeout)
                    .ok_or_else(|| self.timeout_error(mode, timeout))?,
            ),
            LockMode::AccessExclusive => AccessGuard::Exclusive(
                self.access
                    .try_write_for(timeout)
                    .ok_or_else(|| self.timeout_error(mode, timeout))?,
            ),
        };

        Ok(RelationLockGuard {
            relation: self.relation,
            mode,
            _access: access,
            _maintenance: maintenance,
        })
    }
}

impl std::fmt::Debug for RelationLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelationLock")
            .field("relation", &self.relation)
            .field("maintenance_held", &self.maintenance.is_locked())
            .field("exclusive_held", &self.access.is_locked_exclusive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHORT: Duration = Duration::from_millis(20);

    #[test]
    fn test_share_locks_coexist() {
        let lock = RelationLock::new(RelationId(3));
        let a = lock.acquire(LockMode::AccessShare, SHORT).unwrap();
        let b = lock.acquire(LockMode::AccessShare, SHORT).unwrap();
        let c = lock.acquire(LockMode::ShareUpdateExclusive, SHORT).unwrap();
        assert_eq!(a.mode(), LockMode::AccessShare);
        assert_eq!(c.relation(), RelationId(3));
        drop((a, b, c));
    }

    #[test]
    fn test_share_update_exclusive_conflicts_with_itself() {
        let lock = RelationLock::new(RelationId(3));
        let _held = lock.acquire(LockMode::ShareUpdateExclusive, SHORT).unwrap();
        let err = lock
            .acquire(LockMode::ShareUpdateExclusive, SHORT)
            .err()
            .unwrap();
        assert!(matches!(err, StrataError::LockTimeout { .. }));
    }

    #[test]
    fn test_access_exclusive_blocks_readers() {
        let lock = RelationLock::new(RelationId(4));
        {
            let _held = lock.acquire(LockMode::AccessExclusive, SHORT).unwrap();
            assert!(lock.acquire(LockMode::AccessShare, SHORT).is_err());
        }
        assert!(lock.acquire(LockMode::AccessShare, SHORT).is_ok());
    }

    #[test]
    fn test_access_exclusive_waits_for_readers() {
        let lock = RelationLock::new(RelationId(5));
        let reader = lock.acquire(LockMode::AccessShare, SHORT).unwrap();
        assert!(lock.acquire(LockMode::AccessExclusive, SHORT).is_err());
        drop(reader);
        // The failed attempt released the maintenance mutex again.
        assert!(lock.acquire(LockMode::ShareUpdateExclusive, SHORT).is_ok());
    }
}
