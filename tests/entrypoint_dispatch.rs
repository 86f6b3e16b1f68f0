// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! The shim-facing surface: failures turn into driver-shaped results.

use glshare::config::{BufferMapping, Config};
use glshare::entrypoints::Interceptor;
use glshare::gl_enums::{
    GL_ARRAY_BUFFER, GL_FLOAT, GL_MAP_FLUSH_EXPLICIT_BIT, GL_MAP_WRITE_BIT, GL_RGBA, GL_TEXTURE0,
    GL_TEXTURE_2D, GL_UNSIGNED_BYTE,
};
use glshare::resources::program::{AttributeSlot, UniformSlot};

fn interceptor(mapping: BufferMapping) -> Interceptor {
    Interceptor::new(Config::new(mapping))
}

#[test]
fn nothing_current_is_a_no_op() {
    let gl = interceptor(BufferMapping::Emulated);
    assert_eq!(gl.current_context(), 0);
    assert!(!gl.gen_buffers(&[1]));
    assert!(!gl.bind_buffer(GL_ARRAY_BUFFER, 1));
    assert!(gl.map_buffer_range(GL_ARRAY_BUFFER, 0, 4, GL_MAP_WRITE_BIT).is_null());
    assert!(gl.game_view().is_none());
}

#[test]
fn vertex_upload_through_mapping() {
    let gl = interceptor(BufferMapping::Emulated);
    let context = gl.create_context(0);
    assert_ne!(context, 0);
    assert!(gl.make_current(context));
    assert_eq!(gl.current_context(), context);

    assert!(gl.gen_buffers(&[3]));
    assert!(gl.bind_buffer(GL_ARRAY_BUFFER, 3));
    assert!(gl.buffer_data(GL_ARRAY_BUFFER, 16, None));
    let ptr = gl.map_buffer_range(
        GL_ARRAY_BUFFER,
        0,
        16,
        GL_MAP_WRITE_BIT | GL_MAP_FLUSH_EXPLICIT_BIT,
    );
    assert!(!ptr.is_null());
    //a second map is refused while the first is live
    assert!(gl.map_buffer_range(GL_ARRAY_BUFFER, 0, 4, GL_MAP_WRITE_BIT).is_null());
    let values = [1.0f32, 2.0, 3.0, 4.0];
    //safety: ptr covers 16 bytes and stays mapped until unmap_buffer
    unsafe {
        std::ptr::copy_nonoverlapping(values.as_ptr().cast::<u8>(), ptr, 16);
    }
    assert!(gl.flush_mapped_buffer_range(GL_ARRAY_BUFFER, 0, 8));
    assert!(!gl.flush_mapped_buffer_range(GL_ARRAY_BUFFER, 12, 8));
    assert!(gl.unmap_buffer(GL_ARRAY_BUFFER));
    assert!(!gl.unmap_buffer(GL_ARRAY_BUFFER));

    //safety: a buffer is bound, so the pointer is an offset
    assert!(unsafe { gl.vertex_attrib_pointer(0, 2, GL_FLOAT, false, 8, 0) });
    assert!(gl.enable_vertex_attrib_array(0));
    let mut out = [0.0f32; 2];
    assert!(gl.decode_attribute_float(0, 0, &mut out));
    assert_eq!(out, [1.0, 2.0]);
    //the second vertex was never flushed
    assert!(gl.decode_attribute_float(0, 1, &mut out));
    assert_eq!(out, [0.0, 0.0]);
    assert!(!gl.decode_attribute_float(0, 2, &mut out));
    assert!(!gl.enable_vertex_attrib_array(16));

    assert!(gl.delete_buffers(&[3, 99]));
    assert!(!gl.buffer_sub_data(GL_ARRAY_BUFFER, 0, &[1]));
    assert!(gl.make_current(0));
    assert!(gl.destroy_context(context));
    assert!(gl.registry().is_empty());
}

#[test]
fn passthrough_map_returns_null() {
    let gl = interceptor(BufferMapping::Passthrough);
    assert!(gl.make_current(gl.create_context(0)));
    gl.gen_buffers(&[1]);
    gl.bind_buffer(GL_ARRAY_BUFFER, 1);
    gl.buffer_data(GL_ARRAY_BUFFER, 4, None);
    assert!(gl.map_buffer_range(GL_ARRAY_BUFFER, 0, 4, GL_MAP_WRITE_BIT).is_null());
    assert!(gl.buffer_sub_data(GL_ARRAY_BUFFER, 0, &[1, 2, 3, 4]));
}

#[test]
fn textures_and_programs() {
    let gl = interceptor(BufferMapping::Emulated);
    assert!(gl.make_current(gl.create_context(0)));
    assert!(gl.gen_textures(&[5]));
    assert!(gl.active_texture(GL_TEXTURE0 + 1));
    assert!(gl.bind_texture(GL_TEXTURE_2D, 5));
    assert!(gl.tex_image_2d(GL_TEXTURE_2D, 2, 2, GL_RGBA, GL_UNSIGNED_BYTE, None));
    assert!(gl.tex_sub_image_2d(GL_TEXTURE_2D, 1, 0, 1, 1, GL_RGBA, GL_UNSIGNED_BYTE, &[1, 2, 3, 4]));
    assert!(!gl.tex_sub_image_2d(GL_TEXTURE_2D, 2, 0, 1, 1, GL_RGBA, GL_UNSIGNED_BYTE, &[1, 2, 3, 4]));
    //only RGBA8 is mirrored
    assert!(!gl.tex_image_2d(GL_TEXTURE_2D, 2, 2, GL_RGBA, GL_FLOAT, None));

    let context = gl.registry().require_current(glshare::ThreadHandle::current()).unwrap();
    let texture = context.bound_texture(1).unwrap();
    assert_eq!(texture.pixel(1, 0), Some([1, 2, 3, 4]));

    assert!(gl.create_program(9));
    assert!(gl.link_program(
        9,
        |name| (name == AttributeSlot::TextureUV.name()).then_some(4),
        |name| (name == UniformSlot::DiffuseMap.name()).then_some(2),
        None,
    ));
    assert!(!gl.link_program(10, |_| None, |_| None, None));
    assert!(gl.use_program(9));
    let locations = context.current_program().unwrap().locations();
    assert_eq!(locations.attribute(AttributeSlot::TextureUV), Some(4));
    assert_eq!(locations.uniform(UniformSlot::DiffuseMap), Some(2));
    assert!(gl.delete_program(9));
    assert!(context.current_program().is_none());
}

#[test]
fn texture_upload_with_huge_coordinates_fails_cleanly() {
    let gl = interceptor(BufferMapping::Emulated);
    assert!(gl.make_current(gl.create_context(0)));
    assert!(gl.gen_textures(&[3]));
    assert!(gl.bind_texture(GL_TEXTURE_2D, 3));
    assert!(gl.tex_image_2d(GL_TEXTURE_2D, 2, 2, GL_RGBA, GL_UNSIGNED_BYTE, None));
    assert!(!gl.tex_sub_image_2d(
        GL_TEXTURE_2D,
        u32::MAX,
        u32::MAX,
        1,
        1,
        GL_RGBA,
        GL_UNSIGNED_BYTE,
        &[1, 2, 3, 4]
    ));
    assert!(!gl.tex_image_2d(GL_TEXTURE_2D, u32::MAX, u32::MAX, GL_RGBA, GL_UNSIGNED_BYTE, None));
    //the previous allocation survives
    let context = gl.registry().require_current(glshare::ThreadHandle::current()).unwrap();
    assert_eq!(context.bound_texture(0).unwrap().dimensions(), (2, 2));
}

#[test]
fn game_view_round_trip() {
    let gl = interceptor(BufferMapping::Emulated);
    let owner = gl.create_context(0);
    let dependent = gl.create_context(owner);
    assert_eq!(gl.create_context(dependent), 0);
    assert!(gl.make_current(dependent));
    assert!(gl.set_game_view(4, 5));
    assert!(gl.set_game_view_rect(0, 0, 800, 600));
    let view = gl.game_view().unwrap();
    assert_eq!((view.framebuffer, view.texture, view.width, view.height), (4, 5, 800, 600));
    //binding state belongs to each context, not the group
    assert!(gl.make_current(owner));
    assert_eq!(gl.game_view().unwrap().framebuffer, 0);
}
