// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Concurrent id → record tables with shared-owner tracking.
//!
//! A [`ResourceTable`] is the per-kind object namespace of a sharing group.
//! Lookups take the read side of the lock, inserts and removals the write side,
//! and every lock is held only for the map operation itself: records are handed
//! out as `Arc`s, so decoding or mapping work never runs under the table lock,
//! and a record removed while a reader still holds it stays alive until that
//! reader is done.
//!
//! # Owners
//!
//! Contexts reference tables rather than copying them. The table counts its
//! referencing contexts ([`ResourceTable::attach`] / [`ResourceTable::release`])
//! and drops its storage when the count reaches zero. Any access after that
//! point is bookkeeping corruption and fails with [`Error::OrphanedTable`].
//!
//! # Generations
//!
//! Hosts reuse numeric ids after deleting objects. Each insertion is stamped
//! with a fresh generation so a [`Handle`] taken before a delete cannot resolve
//! to the object that later reuses the id.

use crate::error::{Error, ObjectKind, Result};
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A generation-checked reference to a table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    pub id: u32,
    pub generation: u64,
}

struct Slot<R> {
    generation: u64,
    record: Arc<R>,
}

pub struct ResourceTable<R> {
    kind: ObjectKind,
    slots: RwLock<HashMap<u32, Slot<R>>>,
    owners: AtomicUsize,
    next_generation: AtomicU64,
}

impl<R> Debug for ResourceTable<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceTable")
            .field("kind", &self.kind)
            .field("owners", &self.owners)
            .field("len", &self.len())
            .finish()
    }
}

impl<R> ResourceTable<R> {
    /// Creates a table with one owner, the context that allocated it.
    pub fn new(kind: ObjectKind) -> Arc<Self> {
        Arc::new(Self {
            kind,
            slots: RwLock::new(HashMap::new()),
            owners: AtomicUsize::new(1),
            next_generation: AtomicU64::new(1),
        })
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Number of contexts currently referencing this table.
    pub fn owners(&self) -> usize {
        self.owners.load(Ordering::Acquire)
    }

    /// Whether the storage has been released.
    pub fn is_released(&self) -> bool {
        self.owners() == 0
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<u32, Slot<R>>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<u32, Slot<R>>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_owned(&self) -> Result<()> {
        if self.is_released() {
            logwise::error_sync!(
                "{kind} table accessed after its last owner released it",
                kind = logwise::privacy::LogIt(&self.kind)
            );
            return Err(Error::OrphanedTable { kind: self.kind });
        }
        Ok(())
    }

    /// Adds a referencing context. Fails if the table was already released.
    pub fn attach(&self) -> Result<()> {
        self.owners
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |owners| {
                if owners == 0 { None } else { Some(owners + 1) }
            })
            .map(|_| ())
            .map_err(|_| {
                logwise::error_sync!(
                    "attempted to share a released {kind} table",
                    kind = logwise::privacy::LogIt(&self.kind)
                );
                Error::OrphanedTable { kind: self.kind }
            })
    }

    /**
    Drops one referencing context.

    Returns `true` if this was the last owner and the storage was freed.
    */
    pub fn release(&self) -> Result<bool> {
        let previous = self
            .owners
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |owners| {
                owners.checked_sub(1)
            })
            .map_err(|_| {
                logwise::error_sync!(
                    "{kind} table released more times than it was attached",
                    kind = logwise::privacy::LogIt(&self.kind)
                );
                Error::OrphanedTable { kind: self.kind }
            })?;
        if previous != 1 {
            return Ok(false);
        }
        //take the records out under the lock, drop them after it
        let drained: Vec<Slot<R>> = self.write().drain().map(|(_, slot)| slot).collect();
        logwise::trace_sync!(
            "freed {kind} table holding {count} records",
            kind = logwise::privacy::LogIt(&self.kind),
            count = drained.len()
        );
        drop(drained);
        Ok(true)
    }

    /// Looks up a record. Absence is `Ok(None)`, never an error.
    pub fn get(&self, id: u32) -> Result<Option<Arc<R>>> {
        self.ensure_owned()?;
        if id == 0 {
            return Ok(None);
        }
        Ok(self.read().get(&id).map(|slot| slot.record.clone()))
    }

    /// Like [`get`](Self::get), but a miss is [`Error::InvalidId`].
    pub fn lookup(&self, id: u32) -> Result<Arc<R>> {
        self.get(id)?
            .ok_or_else(|| Error::invalid_id(self.kind, id))
    }

    /**
    Inserts `record` under `id`, replacing any previous record.

    Returns the shared record. Id 0 is reserved and rejected.
    */
    pub fn put(&self, id: u32, record: R) -> Result<Arc<R>> {
        if id == 0 {
            self.ensure_owned()?;
            return Err(Error::invalid_id(self.kind, id));
        }
        let record = Arc::new(record);
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let replaced = {
            //owner check under the write lock, so a concurrent release drains after us
            let mut slots = self.write();
            self.ensure_owned()?;
            slots.insert(
                id,
                Slot {
                    generation,
                    record: record.clone(),
                },
            )
        };
        drop(replaced);
        Ok(record)
    }

    pub fn remove(&self, id: u32) -> Result<Option<Arc<R>>> {
        if id == 0 {
            self.ensure_owned()?;
            return Ok(None);
        }
        let removed = {
            let mut slots = self.write();
            self.ensure_owned()?;
            slots.remove(&id)
        };
        Ok(removed.map(|slot| slot.record))
    }

    pub fn handle(&self, id: u32) -> Result<Option<Handle>> {
        self.ensure_owned()?;
        Ok(self.read().get(&id).map(|slot| Handle {
            id,
            generation: slot.generation,
        }))
    }

    /// Resolves `handle` only if its id still names the same insertion.
    pub fn get_checked(&self, handle: Handle) -> Result<Option<Arc<R>>> {
        self.ensure_owned()?;
        Ok(self
            .read()
            .get(&handle.id)
            .filter(|slot| slot.generation == handle.generation)
            .map(|slot| slot.record.clone()))
    }

    /// Snapshot of the ids currently present.
    pub fn ids(&self) -> Result<Vec<u32>> {
        self.ensure_owned()?;
        let mut ids: Vec<u32> = self.read().keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_remove() {
        let table = ResourceTable::<&'static str>::new(ObjectKind::Buffer);
        table.put(3, "three").unwrap();
        assert_eq!(*table.get(3).unwrap().unwrap(), "three");
        assert!(table.get(4).unwrap().is_none());
        assert!(table.get(0).unwrap().is_none());
        assert!(matches!(
            table.lookup(4),
            Err(Error::InvalidId {
                kind: ObjectKind::Buffer,
                id: 4
            })
        ));
        assert_eq!(*table.remove(3).unwrap().unwrap(), "three");
        assert!(table.get(3).unwrap().is_none());
    }

    #[test]
    fn id_zero_is_reserved() {
        let table = ResourceTable::<u8>::new(ObjectKind::Texture);
        assert!(matches!(table.put(0, 1), Err(Error::InvalidId { .. })));
        assert!(table.is_empty());
    }

    #[test]
    fn removed_record_outlives_table_entry() {
        let table = ResourceTable::<Vec<u8>>::new(ObjectKind::Buffer);
        table.put(1, vec![1, 2, 3]).unwrap();
        let held = table.get(1).unwrap().unwrap();
        table.remove(1).unwrap();
        assert_eq!(*held, vec![1, 2, 3]);
    }

    #[test]
    fn stale_generation_rejected() {
        let table = ResourceTable::<u32>::new(ObjectKind::Texture);
        table.put(7, 1).unwrap();
        let handle = table.handle(7).unwrap().unwrap();
        assert_eq!(*table.get_checked(handle).unwrap().unwrap(), 1);
        table.remove(7).unwrap();
        table.put(7, 2).unwrap();
        assert!(table.get_checked(handle).unwrap().is_none());
        let fresh = table.handle(7).unwrap().unwrap();
        assert_ne!(fresh.generation, handle.generation);
    }

    #[test]
    fn storage_freed_with_last_owner() {
        let table = ResourceTable::<u32>::new(ObjectKind::Program);
        table.attach().unwrap();
        table.put(1, 10).unwrap();
        assert!(!table.release().unwrap());
        assert_eq!(*table.get(1).unwrap().unwrap(), 10);
        assert!(table.release().unwrap());
        assert!(table.is_released());
        assert!(matches!(
            table.get(1),
            Err(Error::OrphanedTable {
                kind: ObjectKind::Program
            })
        ));
        assert!(table.attach().is_err());
        assert!(table.release().is_err());
    }

    #[test]
    fn writes_after_release_are_refused() {
        let table = ResourceTable::<u32>::new(ObjectKind::Buffer);
        table.put(1, 1).unwrap();
        assert!(table.release().unwrap());
        assert!(matches!(table.put(2, 2), Err(Error::OrphanedTable { .. })));
        assert!(matches!(table.remove(1), Err(Error::OrphanedTable { .. })));
        assert!(table.is_empty());
    }

    #[test]
    fn put_racing_release_leaves_nothing_behind() {
        for _ in 0..50 {
            let table = ResourceTable::<u32>::new(ObjectKind::Buffer);
            let barrier = Arc::new(std::sync::Barrier::new(2));
            let writer = {
                let table = table.clone();
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    for id in 1..200 {
                        if table.put(id, id).is_err() {
                            break;
                        }
                    }
                })
            };
            barrier.wait();
            assert!(table.release().unwrap());
            writer.join().unwrap();
            //every insert either landed before the drain or was refused
            assert!(table.is_empty());
        }
    }
}
