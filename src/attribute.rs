// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Vertex attribute bindings and decoding.
//!
//! An [`AttributeBinding`] records how one vertex attribute is laid out, as the
//! host described it to `glVertexAttribPointer`. The overlay later reads the
//! host's vertex data back through the binding to find out what was drawn.
//!
//! # Sources
//!
//! A binding reads either from a buffer object (the pointer argument is a byte
//! offset into the buffer) or from client memory (the pointer argument is an
//! address). Which one applies is decided when the binding is described, by
//! whether a buffer was bound, and is recorded in [`AttributeSource`].
//!
//! # Decoding
//!
//! The byte address of vertex `i` is `base + offset + i * stride`. Buffer-backed
//! reads are bounds-checked against the buffer's allocation, always. Components
//! are converted from their declared [`ComponentType`]; normalized integer
//! types map to `[-1, 1]` (signed) or `[0, 1]` (unsigned).
//!
//! ```
//! use glshare::attribute::{ComponentType, decode_component};
//!
//! assert_eq!(decode_component(ComponentType::U8, &[255], true).unwrap(), 1.0);
//! assert_eq!(decode_component(ComponentType::F16, &0x3C00u16.to_ne_bytes(), false).unwrap(), 1.0);
//! //too few bytes for the type
//! assert!(decode_component(ComponentType::F32, &[0, 0], false).is_err());
//! ```

use crate::context::Context;
use crate::error::{Error, ObjectKind, Result, check_range};
use crate::gl_enums::{
    GL_BYTE, GL_FLOAT, GL_HALF_FLOAT, GL_INT, GL_SHORT, GL_UNSIGNED_BYTE, GL_UNSIGNED_INT,
    GL_UNSIGNED_SHORT, GLenum,
};
use crate::resources::buffer::BufferRecord;
use crate::resources::table::ResourceTable;

/// Numeric type of each component in an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    F32,
    F16,
}

impl ComponentType {
    pub fn from_gl(value: GLenum) -> Result<Self> {
        Ok(match value {
            GL_BYTE => ComponentType::I8,
            GL_UNSIGNED_BYTE => ComponentType::U8,
            GL_SHORT => ComponentType::I16,
            GL_UNSIGNED_SHORT => ComponentType::U16,
            GL_INT => ComponentType::I32,
            GL_UNSIGNED_INT => ComponentType::U32,
            GL_FLOAT => ComponentType::F32,
            GL_HALF_FLOAT => ComponentType::F16,
            _ => {
                return Err(Error::UnsupportedFormat {
                    what: "component type",
                    value,
                });
            }
        })
    }

    pub const fn to_gl(self) -> GLenum {
        match self {
            ComponentType::I8 => GL_BYTE,
            ComponentType::U8 => GL_UNSIGNED_BYTE,
            ComponentType::I16 => GL_SHORT,
            ComponentType::U16 => GL_UNSIGNED_SHORT,
            ComponentType::I32 => GL_INT,
            ComponentType::U32 => GL_UNSIGNED_INT,
            ComponentType::F32 => GL_FLOAT,
            ComponentType::F16 => GL_HALF_FLOAT,
        }
    }

    /// Size of one component in bytes.
    pub const fn size(self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 | ComponentType::F16 => 2,
            ComponentType::I32 | ComponentType::U32 | ComponentType::F32 => 4,
        }
    }

    pub const fn is_integer(self) -> bool {
        !matches!(self, ComponentType::F32 | ComponentType::F16)
    }
}

/// Where an attribute's bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeSource {
    /// Byte `offset` into buffer `id`.
    Buffer { id: u32, offset: usize },
    /// Raw client-memory address.
    Client { address: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributeBinding {
    source: AttributeSource,
    stride: usize,
    components: u8,
    component_type: ComponentType,
    normalise: bool,
    enabled: bool,
}

impl Default for AttributeBinding {
    /// A disabled binding with GL's initial state: four floats, no source.
    fn default() -> Self {
        Self {
            source: AttributeSource::Client { address: 0 },
            stride: 16,
            components: 4,
            component_type: ComponentType::F32,
            normalise: false,
            enabled: false,
        }
    }
}

fn validate_layout(components: i32, stride: i32, component_type: GLenum) -> Result<(u8, usize, ComponentType)> {
    let component_type = ComponentType::from_gl(component_type)?;
    let components = match u8::try_from(components) {
        Ok(c @ 1..=4) => c,
        _ => {
            return Err(Error::UnsupportedFormat {
                what: "component count",
                value: components as u32,
            });
        }
    };
    let stride = match usize::try_from(stride) {
        Ok(0) => components as usize * component_type.size(),
        Ok(stride) => stride,
        Err(_) => {
            return Err(Error::UnsupportedFormat {
                what: "stride",
                value: stride as u32,
            });
        }
    };
    Ok((components, stride, component_type))
}

impl AttributeBinding {
    /**
    A binding reading from buffer `buffer_id` at byte `offset`.

    A `stride` of 0 means tightly packed.
    */
    pub fn buffer(
        buffer_id: u32,
        components: i32,
        offset: usize,
        stride: i32,
        component_type: GLenum,
        normalise: bool,
    ) -> Result<Self> {
        if buffer_id == 0 {
            return Err(Error::invalid_id(ObjectKind::Buffer, buffer_id));
        }
        let (components, stride, component_type) = validate_layout(components, stride, component_type)?;
        Ok(Self {
            source: AttributeSource::Buffer {
                id: buffer_id,
                offset,
            },
            stride,
            components,
            component_type,
            normalise,
            enabled: false,
        })
    }

    /**
    A binding reading from client memory at `address`.

    # Safety

    For as long as the binding is decoded, every vertex index passed to the
    decode functions must address readable memory:
    `address + index * stride .. + components * size` must be valid for reads.
    */
    pub unsafe fn client(
        address: usize,
        components: i32,
        stride: i32,
        component_type: GLenum,
        normalise: bool,
    ) -> Result<Self> {
        let (components, stride, component_type) = validate_layout(components, stride, component_type)?;
        Ok(Self {
            source: AttributeSource::Client { address },
            stride,
            components,
            component_type,
            normalise,
            enabled: false,
        })
    }

    pub fn source(&self) -> AttributeSource {
        self.source
    }

    /// Buffer id, or 0 for client memory.
    pub fn buffer_id(&self) -> u32 {
        match self.source {
            AttributeSource::Buffer { id, .. } => id,
            AttributeSource::Client { .. } => 0,
        }
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn components(&self) -> usize {
        self.components as usize
    }

    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    pub fn normalise(&self) -> bool {
        self.normalise
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Bytes one vertex's worth of this attribute occupies.
    pub fn element_len(&self) -> usize {
        self.components() * self.component_type.size()
    }

    /// Runs `f` over the bytes of vertex `vertex`, bounds-checked for buffers.
    fn with_vertex_bytes<T>(
        &self,
        buffers: &ResourceTable<BufferRecord>,
        vertex: usize,
        f: impl FnOnce(&[u8]) -> T,
    ) -> Result<T> {
        let element_len = self.element_len();
        let relative = vertex.checked_mul(self.stride).ok_or(Error::OutOfRange {
            offset: vertex,
            length: element_len,
            limit: usize::MAX,
        })?;
        match self.source {
            AttributeSource::Buffer { id, offset } => {
                let buffer = buffers.lookup(id)?;
                buffer.with_bytes(|bytes| {
                    let start = offset.checked_add(relative).ok_or(Error::OutOfRange {
                        offset,
                        length: element_len,
                        limit: bytes.len(),
                    })?;
                    let end = check_range(start, element_len, bytes.len())?;
                    Ok(f(&bytes[start..end]))
                })
            }
            AttributeSource::Client { address } => {
                if address == 0 {
                    return Err(Error::OutOfRange {
                        offset: relative,
                        length: element_len,
                        limit: 0,
                    });
                }
                let start = address.checked_add(relative).ok_or(Error::OutOfRange {
                    offset: relative,
                    length: element_len,
                    limit: usize::MAX,
                })?;
                //safety: guaranteed by the contract of `AttributeBinding::client`
                let bytes = unsafe { std::slice::from_raw_parts(start as *const u8, element_len) };
                Ok(f(bytes))
            }
        }
    }

    fn check_output(&self, out_len: usize) -> Result<()> {
        if out_len < self.components() {
            return Err(Error::OutOfRange {
                offset: 0,
                length: self.components(),
                limit: out_len,
            });
        }
        Ok(())
    }

    /// Decodes vertex `vertex` into `out` as floats.
    pub fn decode_float(
        &self,
        buffers: &ResourceTable<BufferRecord>,
        vertex: usize,
        out: &mut [f32],
    ) -> Result<()> {
        self.check_output(out.len())?;
        let size = self.component_type.size();
        self.with_vertex_bytes(buffers, vertex, |bytes| -> Result<()> {
            for (dst, src) in out.iter_mut().zip(bytes.chunks_exact(size)) {
                *dst = decode_component(self.component_type, src, self.normalise)?;
            }
            Ok(())
        })?
    }

    /// Decodes vertex `vertex` into `out` as integers, never normalized.
    pub fn decode_int(
        &self,
        buffers: &ResourceTable<BufferRecord>,
        vertex: usize,
        out: &mut [u32],
    ) -> Result<()> {
        self.check_output(out.len())?;
        let size = self.component_type.size();
        self.with_vertex_bytes(buffers, vertex, |bytes| -> Result<()> {
            for (dst, src) in out.iter_mut().zip(bytes.chunks_exact(size)) {
                *dst = decode_component_int(self.component_type, src)?;
            }
            Ok(())
        })?
    }
}

/**
Describes a binding the way `glVertexAttribPointer` does.

A non-zero `buffer_id` makes `pointer_or_offset` a byte offset into that buffer;
zero makes it a client-memory address.

# Safety

When `buffer_id` is 0 the requirements of [`AttributeBinding::client`] apply.
*/
pub unsafe fn describe_binding(
    buffer_id: u32,
    components: i32,
    pointer_or_offset: usize,
    stride: i32,
    component_type: GLenum,
    normalise: bool,
) -> Result<AttributeBinding> {
    if buffer_id != 0 {
        AttributeBinding::buffer(buffer_id, components, pointer_or_offset, stride, component_type, normalise)
    } else {
        //safety: forwarded to the caller
        unsafe { AttributeBinding::client(pointer_or_offset, components, stride, component_type, normalise) }
    }
}

/// The first `N` bytes of `bytes`.
fn component_bytes<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes
        .get(..N)
        .and_then(|head| head.try_into().ok())
        .ok_or(Error::OutOfRange {
            offset: 0,
            length: N,
            limit: bytes.len(),
        })
}

/// Converts one component to `f32`. Fails if `bytes` is shorter than `ty.size()`.
pub fn decode_component(ty: ComponentType, bytes: &[u8], normalise: bool) -> Result<f32> {
    let normalise = normalise && ty.is_integer();
    Ok(match ty {
        ComponentType::I8 => {
            let v = i8::from_ne_bytes(component_bytes(bytes)?);
            if normalise { (v as f32 / i8::MAX as f32).max(-1.0) } else { v as f32 }
        }
        ComponentType::U8 => {
            let v = u8::from_ne_bytes(component_bytes(bytes)?);
            if normalise { v as f32 / u8::MAX as f32 } else { v as f32 }
        }
        ComponentType::I16 => {
            let v = i16::from_ne_bytes(component_bytes(bytes)?);
            if normalise { (v as f32 / i16::MAX as f32).max(-1.0) } else { v as f32 }
        }
        ComponentType::U16 => {
            let v = u16::from_ne_bytes(component_bytes(bytes)?);
            if normalise { v as f32 / u16::MAX as f32 } else { v as f32 }
        }
        ComponentType::I32 => {
            let v = i32::from_ne_bytes(component_bytes(bytes)?);
            if normalise {
                (v as f64 / i32::MAX as f64).max(-1.0) as f32
            } else {
                v as f32
            }
        }
        ComponentType::U32 => {
            let v = u32::from_ne_bytes(component_bytes(bytes)?);
            if normalise { (v as f64 / u32::MAX as f64) as f32 } else { v as f32 }
        }
        ComponentType::F32 => f32::from_ne_bytes(component_bytes(bytes)?),
        ComponentType::F16 => half::f16::from_ne_bytes(component_bytes(bytes)?).to_f32(),
    })
}

/// Converts one component to `u32`: signed values sign-extend, floats truncate.
pub fn decode_component_int(ty: ComponentType, bytes: &[u8]) -> Result<u32> {
    Ok(match ty {
        ComponentType::I8 => i8::from_ne_bytes(component_bytes(bytes)?) as i32 as u32,
        ComponentType::U8 => u8::from_ne_bytes(component_bytes(bytes)?) as u32,
        ComponentType::I16 => i16::from_ne_bytes(component_bytes(bytes)?) as i32 as u32,
        ComponentType::U16 => u16::from_ne_bytes(component_bytes(bytes)?) as u32,
        ComponentType::I32 => i32::from_ne_bytes(component_bytes(bytes)?) as u32,
        ComponentType::U32 => u32::from_ne_bytes(component_bytes(bytes)?),
        ComponentType::F32 => f32::from_ne_bytes(component_bytes(bytes)?) as i32 as u32,
        ComponentType::F16 => half::f16::from_ne_bytes(component_bytes(bytes)?).to_f32() as i32 as u32,
    })
}

/**
Decodes vertex `vertex` of `binding` through `context`'s buffer table.

Returns `false`, leaving `out` unspecified, if the buffer is missing, the read
would leave its allocation, or `context` has already been destroyed.
*/
pub fn decode_attribute_float(context: &Context, binding: &AttributeBinding, vertex: usize, out: &mut [f32]) -> bool {
    match context.decode_float(binding, vertex, out) {
        Ok(()) => true,
        Err(err) => {
            report_decode_failure(context, vertex, &err);
            false
        }
    }
}

/// Integer counterpart of [`decode_attribute_float`].
pub fn decode_attribute_int(context: &Context, binding: &AttributeBinding, vertex: usize, out: &mut [u32]) -> bool {
    match context.decode_int(binding, vertex, out) {
        Ok(()) => true,
        Err(err) => {
            report_decode_failure(context, vertex, &err);
            false
        }
    }
}

fn report_decode_failure(context: &Context, vertex: usize, err: &Error) {
    logwise::trace_sync!(
        "attribute decode failed in context {context} at vertex {vertex}: {err}",
        context = context.id().get(),
        vertex = vertex,
        err = logwise::privacy::LogIt(err)
    );
}
