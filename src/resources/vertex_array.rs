// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Vertex-array records.

use crate::attribute::AttributeBinding;
use crate::error::{Error, Result};
use std::sync::{PoisonError, RwLock};

/// Attribute slots per vertex array.
pub const MAX_VERTEX_ATTRIBS: usize = 16;

#[derive(Debug)]
pub struct VertexArrayRecord {
    id: u32,
    attributes: RwLock<[AttributeBinding; MAX_VERTEX_ATTRIBS]>,
}

fn check_index(index: u32) -> Result<usize> {
    let index = index as usize;
    if index >= MAX_VERTEX_ATTRIBS {
        return Err(Error::OutOfRange {
            offset: index,
            length: 1,
            limit: MAX_VERTEX_ATTRIBS,
        });
    }
    Ok(index)
}

impl VertexArrayRecord {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            attributes: RwLock::new([AttributeBinding::default(); MAX_VERTEX_ATTRIBS]),
        }
    }

    /// Id 0 is the context's default vertex array.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn binding(&self, index: u32) -> Result<AttributeBinding> {
        let index = check_index(index)?;
        Ok(self.attributes.read().unwrap_or_else(PoisonError::into_inner)[index])
    }

    /// Replaces the layout of slot `index`. The enabled flag is kept, as in GL.
    pub fn set_binding(&self, index: u32, mut binding: AttributeBinding) -> Result<()> {
        let index = check_index(index)?;
        let mut attributes = self.attributes.write().unwrap_or_else(PoisonError::into_inner);
        binding.set_enabled(attributes[index].enabled());
        attributes[index] = binding;
        Ok(())
    }

    pub fn set_enabled(&self, index: u32, enabled: bool) -> Result<()> {
        let index = check_index(index)?;
        self.attributes.write().unwrap_or_else(PoisonError::into_inner)[index].set_enabled(enabled);
        Ok(())
    }

    /// `(index, binding)` for each enabled slot.
    pub fn enabled_bindings(&self) -> Vec<(u32, AttributeBinding)> {
        self.attributes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .enumerate()
            .filter(|(_, b)| b.enabled())
            .map(|(i, b)| (i as u32, *b))
            .collect()
    }
}
