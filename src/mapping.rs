// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Buffer mapping emulation.
//!
//! Mapping hands the caller a staging allocation covering `offset..offset+length`
//! of the buffer. Writes through it reach the backing allocation (and therefore
//! the attribute decoder) only when they are committed:
//!
//! - without [`MapAccess::FLUSH_EXPLICIT`], a [`MapAccess::WRITE`] mapping commits
//!   its whole range on unmap;
//! - with [`MapAccess::FLUSH_EXPLICIT`], only ranges passed to
//!   [`flush_mapped_range`] are committed. Unmap never flushes on the caller's
//!   behalf, so an unflushed range keeps whatever the backing store held before.
//!
//! # State
//!
//! A buffer is either unmapped or holds exactly one [`ActiveMapping`]. The
//! "already mapped?" check and the installation of the new mapping happen under
//! one lock, so two threads racing to map the same buffer cannot both succeed.
//!
//! Whether any of this runs is a configuration decision; see
//! [`crate::config::BufferMapping`].

use crate::config::BufferMapping;
use crate::context::Context;
use crate::error::{Error, Result, check_range};
use crate::gl_enums::{GL_MAP_FLUSH_EXPLICIT_BIT, GL_MAP_READ_BIT, GL_MAP_WRITE_BIT, GLenum};
use crate::resources::buffer::BufferRecord;
use std::ops::Range;
use std::ptr::NonNull;

/// Access flags for a mapping, as passed to `glMapBufferRange`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MapAccess(u32);

impl MapAccess {
    pub const READ: MapAccess = MapAccess(GL_MAP_READ_BIT);
    pub const WRITE: MapAccess = MapAccess(GL_MAP_WRITE_BIT);
    /// Writes are committed only by explicit flushes.
    pub const FLUSH_EXPLICIT: MapAccess = MapAccess(GL_MAP_FLUSH_EXPLICIT_BIT);

    /// Keeps the recognized bits of a GL access bitfield and drops the rest.
    pub const fn from_gl(bits: GLenum) -> Self {
        MapAccess(bits & (GL_MAP_READ_BIT | GL_MAP_WRITE_BIT | GL_MAP_FLUSH_EXPLICIT_BIT))
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: MapAccess) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for MapAccess {
    type Output = MapAccess;
    fn bitor(self, rhs: MapAccess) -> MapAccess {
        MapAccess(self.0 | rhs.0)
    }
}

/// The mapping currently installed on a buffer.
#[derive(Debug)]
pub struct ActiveMapping {
    offset: usize,
    length: usize,
    access: MapAccess,
    staging: Box<[u8]>,
    flushed: Vec<Range<usize>>,
}

impl ActiveMapping {
    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn access(&self) -> MapAccess {
        self.access
    }

    /// Bytes of the mapping no flush has covered yet.
    pub fn unflushed_bytes(&self) -> usize {
        let mut ranges = self.flushed.clone();
        ranges.sort_by_key(|r| r.start);
        let mut covered = 0;
        let mut cursor = 0;
        for range in ranges {
            let start = range.start.max(cursor);
            if range.end > start {
                covered += range.end - start;
                cursor = range.end;
            }
        }
        self.length - covered
    }
}

/// Copyable summary of a buffer's mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappingInfo {
    pub offset: usize,
    pub length: usize,
    pub access: MapAccess,
}

/**
Pointer to the staging memory of an active mapping.

The memory stays valid until the buffer is unmapped or its record is dropped.
*/
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedRange {
    ptr: NonNull<u8>,
    len: usize,
}

impl MappedRange {
    /// Raw pointer for handing back across the interception boundary.
    pub fn as_ptr(&self) -> *mut u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /**
    Views the staging memory as a slice.

    # Safety

    The buffer must stay mapped for `'a`, and nothing else (including
    [`flush_mapped_range`] on another thread) may access the mapping meanwhile.
    */
    pub unsafe fn as_mut_slice<'a>(&self) -> &'a mut [u8] {
        //safety: forwarded to the caller
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl BufferRecord {
    pub fn is_mapped(&self) -> bool {
        self.mapping_state().is_some()
    }

    pub fn mapping(&self) -> Option<MappingInfo> {
        self.mapping_state().as_ref().map(|m| MappingInfo {
            offset: m.offset,
            length: m.length,
            access: m.access,
        })
    }

    /// Installs a mapping over `offset..offset+length`.
    pub fn map_range(&self, offset: usize, length: usize, access: MapAccess) -> Result<MappedRange> {
        let mut state = self.mapping_state();
        if state.is_some() {
            return Err(Error::AlreadyMapped { buffer: self.id() });
        }
        let staging = {
            let storage = self.storage();
            let end = check_range(offset, length, storage.len())?;
            //the mapping starts out showing the current contents
            storage[offset..end].to_vec().into_boxed_slice()
        };
        let mut mapping = ActiveMapping {
            offset,
            length,
            access,
            staging,
            flushed: Vec::new(),
        };
        let ptr = NonNull::new(mapping.staging.as_mut_ptr()).unwrap_or(NonNull::dangling());
        *state = Some(mapping);
        logwise::trace_sync!(
            "mapped buffer {id} range {offset}+{length}",
            id = self.id(),
            offset = offset,
            length = length
        );
        Ok(MappedRange { ptr, len: length })
    }

    /// Commits `relative_offset..relative_offset+length` of the mapping.
    pub fn flush_range(&self, relative_offset: usize, length: usize) -> Result<()> {
        let mut state = self.mapping_state();
        let mapping = state
            .as_mut()
            .ok_or(Error::NotMapped { buffer: self.id() })?;
        let end = check_range(relative_offset, length, mapping.length)?;
        if mapping.access.contains(MapAccess::WRITE) {
            let mut storage = self.storage_mut();
            let target = mapping.offset + relative_offset;
            storage[target..target + length].copy_from_slice(&mapping.staging[relative_offset..end]);
        }
        mapping.flushed.push(relative_offset..end);
        Ok(())
    }

    /// Removes the mapping, committing it only if it was not flush-explicit.
    pub fn unmap(&self) -> Result<()> {
        let mut state = self.mapping_state();
        let mapping = state.take().ok_or(Error::NotMapped { buffer: self.id() })?;
        let access = mapping.access;
        if access.contains(MapAccess::WRITE) && !access.contains(MapAccess::FLUSH_EXPLICIT) {
            let mut storage = self.storage_mut();
            storage[mapping.offset..mapping.offset + mapping.length].copy_from_slice(&mapping.staging);
        } else if access.contains(MapAccess::WRITE | MapAccess::FLUSH_EXPLICIT) {
            let unflushed = mapping.unflushed_bytes();
            if unflushed > 0 {
                logwise::trace_sync!(
                    "unmapping buffer {id} with {unflushed} unflushed bytes",
                    id = self.id(),
                    unflushed = unflushed
                );
            }
        }
        drop(state);
        Ok(())
    }

    /// Writes into the staging memory of the active mapping.
    pub fn write_mapped(&self, relative_offset: usize, data: &[u8]) -> Result<()> {
        let mut state = self.mapping_state();
        let mapping = state
            .as_mut()
            .ok_or(Error::NotMapped { buffer: self.id() })?;
        let end = check_range(relative_offset, data.len(), mapping.length)?;
        mapping.staging[relative_offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Reads from the staging memory of the active mapping.
    pub fn read_mapped(&self, relative_offset: usize, length: usize) -> Result<Vec<u8>> {
        let state = self.mapping_state();
        let mapping = state
            .as_ref()
            .ok_or(Error::NotMapped { buffer: self.id() })?;
        let end = check_range(relative_offset, length, mapping.length)?;
        Ok(mapping.staging[relative_offset..end].to_vec())
    }
}

fn ensure_emulated(context: &Context) -> Result<()> {
    match context.buffer_mapping() {
        BufferMapping::Emulated => Ok(()),
        BufferMapping::Passthrough => Err(Error::MappingNotEmulated),
    }
}

/// Maps part of `buffer_id` in `context`'s buffer table.
pub fn map_buffer(
    context: &Context,
    buffer_id: u32,
    offset: usize,
    length: usize,
    access: MapAccess,
) -> Result<MappedRange> {
    ensure_emulated(context)?;
    context.buffer(buffer_id)?.map_range(offset, length, access)
}

/// Flushes a sub-range of the mapping, relative to the mapping's start.
pub fn flush_mapped_range(
    context: &Context,
    buffer_id: u32,
    relative_offset: usize,
    length: usize,
) -> Result<()> {
    ensure_emulated(context)?;
    context.buffer(buffer_id)?.flush_range(relative_offset, length)
}

pub fn unmap_buffer(context: &Context, buffer_id: u32) -> Result<()> {
    ensure_emulated(context)?;
    context.buffer(buffer_id)?.unmap()
}
