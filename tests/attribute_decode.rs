// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Decoding interleaved vertex data the way the overlay reads host meshes.

use glshare::attribute::{decode_attribute_float, decode_attribute_int};
use glshare::config::{BufferMapping, Config};
use glshare::context::{Context, ContextId};
use glshare::gl_enums::{
    GL_ARRAY_BUFFER, GL_FLOAT, GL_HALF_FLOAT, GL_INT_2_10_10_10_REV, GL_SHORT, GL_UNSIGNED_BYTE,
};
use glshare::registry::ContextRegistry;
use glshare::Error;

/// position: 3×f32, colour: 4×u8 normalized, uv: 2×f16, bone: 1×i16. 24 bytes.
fn interleaved() -> Vec<u8> {
    let mut bytes = Vec::new();
    for (i, position) in [[0.0f32, 1.0, 2.0], [3.0, 4.0, 5.0]].iter().enumerate() {
        for p in position {
            bytes.extend_from_slice(&p.to_ne_bytes());
        }
        bytes.extend_from_slice(&[255, 0, 51, 255]);
        bytes.extend_from_slice(&0x3C00u16.to_ne_bytes());
        bytes.extend_from_slice(&0xC000u16.to_ne_bytes());
        bytes.extend_from_slice(&(-(i as i16) - 1).to_ne_bytes());
        bytes.extend_from_slice(&[0, 0]);
    }
    bytes
}

fn context() -> Context {
    let context = Context::new_owner(ContextId::from_raw(1), &Config::new(BufferMapping::Emulated));
    let vertices = interleaved();
    context
        .create_buffer(1)
        .unwrap()
        .buffer_data(vertices.len(), Some(&vertices))
        .unwrap();
    context.bind_buffer(GL_ARRAY_BUFFER, 1).unwrap();
    //safety: a buffer is bound, so every pointer below is an offset
    unsafe {
        context.vertex_attrib_pointer(0, 3, GL_FLOAT, false, 24, 0).unwrap();
        context.vertex_attrib_pointer(1, 4, GL_UNSIGNED_BYTE, true, 24, 12).unwrap();
        context.vertex_attrib_pointer(2, 2, GL_HALF_FLOAT, false, 24, 16).unwrap();
        context.vertex_attrib_pointer(3, 1, GL_SHORT, false, 24, 20).unwrap();
    }
    context
}

#[test]
fn interleaved_floats() {
    let context = context();
    let mut out = [0.0f32; 4];
    assert!(decode_attribute_float(&context, &context.attribute(0).unwrap(), 1, &mut out));
    assert_eq!(&out[..3], &[3.0, 4.0, 5.0]);

    assert!(decode_attribute_float(&context, &context.attribute(1).unwrap(), 0, &mut out));
    assert_eq!(out, [1.0, 0.0, 0.2, 1.0]);

    assert!(decode_attribute_float(&context, &context.attribute(2).unwrap(), 1, &mut out));
    assert_eq!(&out[..2], &[1.0, -2.0]);
}

#[test]
fn signed_integers_sign_extend() {
    let context = context();
    let mut out = [0u32; 1];
    assert!(decode_attribute_int(&context, &context.attribute(3).unwrap(), 1, &mut out));
    assert_eq!(out[0] as i32, -2);
}

#[test]
fn reads_past_the_buffer_fail() {
    let context = context();
    let mut out = [0.0f32; 3];
    let position = context.attribute(0).unwrap();
    assert!(decode_attribute_float(&context, &position, 1, &mut out));
    assert!(!decode_attribute_float(&context, &position, 2, &mut out));
    assert!(matches!(
        context.decode_float(&position, 2, &mut out),
        Err(Error::OutOfRange { .. })
    ));

    //shrinking the buffer invalidates what used to fit
    context.buffer(1).unwrap().buffer_data(20, None).unwrap();
    assert!(!decode_attribute_float(&context, &position, 1, &mut out));

    //deleting it makes the binding dangle
    context.delete_buffer(1).unwrap();
    assert!(matches!(
        context.decode_float(&position, 0, &mut out),
        Err(Error::InvalidId { .. })
    ));
}

#[test]
fn destroyed_dependent_stops_decoding() {
    let registry = ContextRegistry::new(Config::new(BufferMapping::Emulated));
    let owner = registry.create_context(None).unwrap();
    let dependent = registry.create_context(Some(owner)).unwrap();
    let owner = registry.context(owner).unwrap();
    let dependent = registry.context(dependent).unwrap();
    let vertices = interleaved();
    dependent
        .create_buffer(1)
        .unwrap()
        .buffer_data(vertices.len(), Some(&vertices))
        .unwrap();
    dependent.bind_buffer(GL_ARRAY_BUFFER, 1).unwrap();
    //safety: a buffer is bound
    unsafe { dependent.vertex_attrib_pointer(0, 3, GL_FLOAT, false, 24, 0).unwrap() };
    let position = dependent.attribute(0).unwrap();
    let mut out = [0.0f32; 3];
    assert!(decode_attribute_float(&dependent, &position, 1, &mut out));

    registry.destroy_context(dependent.id()).unwrap();
    assert!(dependent.is_released());
    //the shared table is still alive through the owner
    assert!(!owner.buffers().is_released());
    assert!(decode_attribute_float(&owner, &position, 1, &mut out));
    assert!(!decode_attribute_float(&dependent, &position, 1, &mut out));
    let mut ints = [0u32; 3];
    assert!(!decode_attribute_int(&dependent, &position, 0, &mut ints));
}

#[test]
fn packed_formats_are_unsupported() {
    let context = context();
    //safety: a buffer is bound
    let result = unsafe { context.vertex_attrib_pointer(4, 4, GL_INT_2_10_10_10_REV, true, 0, 0) };
    assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
    assert!(matches!(
        unsafe { context.vertex_attrib_pointer(4, 5, GL_FLOAT, false, 0, 0) },
        Err(Error::UnsupportedFormat { .. })
    ));
}
