// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Buffer records.

A buffer record mirrors the contents of one host buffer object so the overlay
can read vertex data the host uploaded. Mapping state lives next to the backing
allocation; the map/flush/unmap logic is in [`crate::mapping`].
*/

use crate::error::{Error, Result, check_range};
use crate::mapping::ActiveMapping;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug)]
pub struct BufferRecord {
    id: u32,
    storage: RwLock<Box<[u8]>>,
    //lock order: mapping, then storage
    pub(crate) mapping: Mutex<Option<ActiveMapping>>,
}

impl BufferRecord {
    /// A freshly generated buffer with no storage.
    pub fn new(id: u32) -> Self {
        Self::with_data(id, Vec::new())
    }

    pub fn with_data(id: u32, data: Vec<u8>) -> Self {
        Self {
            id,
            storage: RwLock::new(data.into_boxed_slice()),
            mapping: Mutex::new(None),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Size of the backing allocation in bytes.
    pub fn len(&self) -> usize {
        self.storage().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn storage(&self) -> RwLockReadGuard<'_, Box<[u8]>> {
        self.storage.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn storage_mut(&self) -> RwLockWriteGuard<'_, Box<[u8]>> {
        self.storage.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn mapping_state(&self) -> MutexGuard<'_, Option<ActiveMapping>> {
        self.mapping.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` over the backing bytes under the storage read lock.
    pub fn with_bytes<T>(&self, f: impl FnOnce(&[u8]) -> T) -> T {
        f(&self.storage())
    }

    /// Copies `length` bytes starting at `offset` out of the backing allocation.
    pub fn read(&self, offset: usize, length: usize) -> Result<Vec<u8>> {
        let storage = self.storage();
        let end = check_range(offset, length, storage.len())?;
        Ok(storage[offset..end].to_vec())
    }

    /**
    Reallocates the buffer (`glBufferData`).

    The new allocation is `size` bytes; `data`, if given, must be exactly that long.
    Refused while the buffer is mapped.
    */
    pub fn buffer_data(&self, size: usize, data: Option<&[u8]>) -> Result<()> {
        let mapping = self.mapping_state();
        if mapping.is_some() {
            return Err(Error::AlreadyMapped { buffer: self.id });
        }
        let contents = match data {
            Some(data) if data.len() != size => {
                return Err(Error::OutOfRange {
                    offset: 0,
                    length: data.len(),
                    limit: size,
                });
            }
            Some(data) => data.to_vec().into_boxed_slice(),
            None => vec![0u8; size].into_boxed_slice(),
        };
        *self.storage_mut() = contents;
        drop(mapping);
        Ok(())
    }

    /// Overwrites part of the allocation (`glBufferSubData`).
    pub fn buffer_sub_data(&self, offset: usize, data: &[u8]) -> Result<()> {
        let mut storage = self.storage_mut();
        let end = check_range(offset, data.len(), storage.len())?;
        storage[offset..end].copy_from_slice(data);
        Ok(())
    }

    /**
    Copies `size` bytes from `source` into this buffer (`glCopyBufferSubData`).

    `source` may be `self`; the ranges are then allowed to differ but not overlap.
    */
    pub fn copy_from(
        &self,
        source: &BufferRecord,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    ) -> Result<()> {
        if std::ptr::eq(self, source) {
            let mut storage = self.storage_mut();
            let read_end = check_range(read_offset, size, storage.len())?;
            let write_end = check_range(write_offset, size, storage.len())?;
            if read_offset < write_end && write_offset < read_end {
                return Err(Error::OutOfRange {
                    offset: write_offset,
                    length: size,
                    limit: read_offset,
                });
            }
            storage.copy_within(read_offset..read_end, write_offset);
            return Ok(());
        }
        //never hold two storage locks at once
        let bytes = source.read(read_offset, size)?;
        self.buffer_sub_data(write_offset, &bytes)
    }
}
