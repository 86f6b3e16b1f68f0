// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
Entrypoint-shaped operations for the interception shim.

Each method corresponds to one intercepted GL or context call. It resolves the
calling thread's current context, does the bookkeeping, and reduces the outcome
to what the host expects back from a driver: a flag, an id, or a pointer that is
null on failure. Errors never propagate to the host:

- [`Error::InvalidId`] and [`Error::NoCurrentContext`] are what a real driver
  tolerates silently; they are logged at warn level;
- [`Error::MappingNotEmulated`] means the shim should forward the call; it is
  logged at trace level;
- everything else is logged at error level.

```
use glshare::config::{BufferMapping, Config};
use glshare::entrypoints::Interceptor;

let gl = Interceptor::new(Config::new(BufferMapping::Emulated));
let context = gl.create_context(0);
assert!(gl.make_current(context));
gl.gen_buffers(&[1]);
assert!(gl.bind_buffer(glshare::gl_enums::GL_ARRAY_BUFFER, 1));
assert!(gl.make_current(0));
```
*/

use crate::config::Config;
use crate::context::{Context, ContextId, GameView};
use crate::error::{Error, ObjectKind, Result};
use crate::gl_enums::{
    BufferTarget, GL_RGBA, GL_TEXTURE_2D, GL_UNSIGNED_BYTE, GLenum, is_compressed_format,
};
use crate::mapping::{self, MapAccess};
use crate::registry::{ContextRegistry, ThreadHandle};
use crate::resources::buffer::BufferRecord;
use crate::resources::program::ViewTransformsBlock;
use std::sync::Arc;

#[derive(Debug)]
pub struct Interceptor {
    registry: ContextRegistry,
}

fn buffer_target(target: GLenum) -> Result<BufferTarget> {
    BufferTarget::from_gl(target).ok_or(Error::UnsupportedFormat {
        what: "buffer target",
        value: target,
    })
}

fn bound_buffer(context: &Context, target: GLenum) -> Result<Arc<BufferRecord>> {
    context.buffer(context.bound_buffer(buffer_target(target)?))
}

fn check_texture_upload(target: GLenum, format: GLenum, ty: GLenum) -> Result<()> {
    if target != GL_TEXTURE_2D {
        return Err(Error::UnsupportedFormat {
            what: "texture target",
            value: target,
        });
    }
    if is_compressed_format(format) {
        return Err(Error::UnsupportedFormat {
            what: "compressed texture format",
            value: format,
        });
    }
    if format != GL_RGBA {
        return Err(Error::UnsupportedFormat {
            what: "texture format",
            value: format,
        });
    }
    if ty != GL_UNSIGNED_BYTE {
        return Err(Error::UnsupportedFormat {
            what: "texel type",
            value: ty,
        });
    }
    Ok(())
}

impl Interceptor {
    pub fn new(config: Config) -> Self {
        Self {
            registry: ContextRegistry::new(config),
        }
    }

    pub fn registry(&self) -> &ContextRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        self.registry.config()
    }

    fn report(entrypoint: &'static str, err: &Error) {
        match err {
            Error::MappingNotEmulated => {
                logwise::trace_sync!(
                    "{entrypoint}: forwarding to the driver",
                    entrypoint = logwise::privacy::LogIt(&entrypoint)
                );
            }
            err if err.is_recoverable() => {
                logwise::warn_sync!(
                    "{entrypoint}: {err}",
                    entrypoint = logwise::privacy::LogIt(&entrypoint),
                    err = logwise::privacy::LogIt(err)
                );
            }
            err => {
                logwise::error_sync!(
                    "{entrypoint}: {err}",
                    entrypoint = logwise::privacy::LogIt(&entrypoint),
                    err = logwise::privacy::LogIt(err)
                );
            }
        }
    }

    fn settle<T>(entrypoint: &'static str, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                Self::report(entrypoint, &err);
                None
            }
        }
    }

    /// Runs `f` against the calling thread's current context.
    fn dispatch<T>(&self, entrypoint: &'static str, f: impl FnOnce(&Context) -> Result<T>) -> Option<T> {
        Self::settle(entrypoint, self.registry.with_current(ThreadHandle::current(), f))
    }

    //contexts

    /// Creates a context, sharing with `share_with` unless it is 0. Returns 0 on failure.
    pub fn create_context(&self, share_with: u64) -> u64 {
        let share_with = (share_with != 0).then_some(ContextId::from_raw(share_with));
        Self::settle("create_context", self.registry.create_context(share_with)).map_or(0, ContextId::get)
    }

    /// Makes `context` current on the calling thread; 0 detaches.
    pub fn make_current(&self, context: u64) -> bool {
        let context = (context != 0).then_some(ContextId::from_raw(context));
        Self::settle(
            "make_current",
            self.registry.make_current(context, ThreadHandle::current()),
        )
        .is_some()
    }

    pub fn destroy_context(&self, context: u64) -> bool {
        Self::settle(
            "destroy_context",
            self.registry.destroy_context(ContextId::from_raw(context)),
        )
        .is_some()
    }

    /// Id of the calling thread's current context, or 0.
    pub fn current_context(&self) -> u64 {
        self.registry
            .current_id(ThreadHandle::current())
            .map_or(0, ContextId::get)
    }

    //objects

    pub fn gen_buffers(&self, ids: &[u32]) -> bool {
        self.dispatch("gen_buffers", |c| {
            ids.iter().try_for_each(|id| c.create_buffer(*id).map(drop))
        })
        .is_some()
    }

    /// Unknown ids are skipped, as `glDeleteBuffers` does.
    pub fn delete_buffers(&self, ids: &[u32]) -> bool {
        self.dispatch("delete_buffers", |c| {
            ids.iter().try_for_each(|id| c.delete_buffer(*id).map(drop))
        })
        .is_some()
    }

    pub fn gen_textures(&self, ids: &[u32]) -> bool {
        self.dispatch("gen_textures", |c| {
            ids.iter().try_for_each(|id| c.create_texture(*id).map(drop))
        })
        .is_some()
    }

    pub fn delete_textures(&self, ids: &[u32]) -> bool {
        self.dispatch("delete_textures", |c| {
            ids.iter().try_for_each(|id| c.delete_texture(*id).map(drop))
        })
        .is_some()
    }

    pub fn gen_vertex_arrays(&self, ids: &[u32]) -> bool {
        self.dispatch("gen_vertex_arrays", |c| {
            ids.iter().try_for_each(|id| c.create_vertex_array(*id).map(drop))
        })
        .is_some()
    }

    pub fn delete_vertex_arrays(&self, ids: &[u32]) -> bool {
        self.dispatch("delete_vertex_arrays", |c| {
            ids.iter().try_for_each(|id| c.delete_vertex_array(*id).map(drop))
        })
        .is_some()
    }

    pub fn create_program(&self, id: u32) -> bool {
        self.dispatch("create_program", |c| c.create_program(id).map(drop))
            .is_some()
    }

    pub fn delete_program(&self, id: u32) -> bool {
        self.dispatch("delete_program", |c| c.delete_program(id).map(drop))
            .is_some()
    }

    /**
    Records the locations a freshly linked program exposes.

    `attribute` and `uniform` stand in for `glGetAttribLocation` and
    `glGetUniformLocation` on the real program.
    */
    pub fn link_program(
        &self,
        id: u32,
        attribute: impl FnMut(&str) -> Option<i32>,
        uniform: impl FnMut(&str) -> Option<i32>,
        view_transforms: Option<ViewTransformsBlock>,
    ) -> bool {
        self.dispatch("link_program", |c| {
            c.program(id)?.record_link(attribute, uniform, view_transforms);
            Ok(())
        })
        .is_some()
    }

    //bindings

    pub fn bind_buffer(&self, target: GLenum, id: u32) -> bool {
        self.dispatch("bind_buffer", |c| c.bind_buffer(target, id)).is_some()
    }

    pub fn bind_vertex_array(&self, id: u32) -> bool {
        self.dispatch("bind_vertex_array", |c| c.bind_vertex_array(id))
            .is_some()
    }

    pub fn use_program(&self, id: u32) -> bool {
        self.dispatch("use_program", |c| c.use_program(id)).is_some()
    }

    pub fn active_texture(&self, unit: GLenum) -> bool {
        self.dispatch("active_texture", |c| c.active_texture(unit))
            .is_some()
    }

    pub fn bind_texture(&self, target: GLenum, id: u32) -> bool {
        self.dispatch("bind_texture", |c| c.bind_texture(target, id))
            .is_some()
    }

    pub fn bind_framebuffer(&self, target: GLenum, framebuffer: u32) -> bool {
        self.dispatch("bind_framebuffer", |c| c.bind_framebuffer(target, framebuffer))
            .is_some()
    }

    //buffer contents

    /// `glBufferData` on the buffer bound to `target`.
    pub fn buffer_data(&self, target: GLenum, size: usize, data: Option<&[u8]>) -> bool {
        self.dispatch("buffer_data", |c| bound_buffer(c, target)?.buffer_data(size, data))
            .is_some()
    }

    pub fn buffer_sub_data(&self, target: GLenum, offset: usize, data: &[u8]) -> bool {
        self.dispatch("buffer_sub_data", |c| {
            bound_buffer(c, target)?.buffer_sub_data(offset, data)
        })
        .is_some()
    }

    pub fn copy_buffer_sub_data(
        &self,
        read_target: GLenum,
        write_target: GLenum,
        read_offset: usize,
        write_offset: usize,
        size: usize,
    ) -> bool {
        self.dispatch("copy_buffer_sub_data", |c| {
            let source = bound_buffer(c, read_target)?;
            let destination = bound_buffer(c, write_target)?;
            destination.copy_from(&source, read_offset, write_offset, size)
        })
        .is_some()
    }

    /**
    `glMapBufferRange` on the buffer bound to `target`.

    Null on failure, including when mapping is configured to pass through to the
    driver.
    */
    pub fn map_buffer_range(&self, target: GLenum, offset: usize, length: usize, access: GLenum) -> *mut u8 {
        self.dispatch("map_buffer_range", |c| {
            let id = c.bound_buffer(buffer_target(target)?);
            mapping::map_buffer(c, id, offset, length, MapAccess::from_gl(access))
        })
        .map_or(std::ptr::null_mut(), |range| range.as_ptr())
    }

    pub fn flush_mapped_buffer_range(&self, target: GLenum, offset: usize, length: usize) -> bool {
        self.dispatch("flush_mapped_buffer_range", |c| {
            let id = c.bound_buffer(buffer_target(target)?);
            mapping::flush_mapped_range(c, id, offset, length)
        })
        .is_some()
    }

    pub fn unmap_buffer(&self, target: GLenum) -> bool {
        self.dispatch("unmap_buffer", |c| {
            let id = c.bound_buffer(buffer_target(target)?);
            mapping::unmap_buffer(c, id)
        })
        .is_some()
    }

    //attributes

    /**
    `glVertexAttribPointer` on the bound vertex array.

    # Safety

    With no buffer bound to `GL_ARRAY_BUFFER`, `pointer` is a client-memory
    address and must stay readable for every vertex later decoded through it.
    */
    pub unsafe fn vertex_attrib_pointer(
        &self,
        index: u32,
        size: i32,
        ty: GLenum,
        normalized: bool,
        stride: i32,
        pointer: usize,
    ) -> bool {
        self.dispatch("vertex_attrib_pointer", |c| {
            //safety: forwarded to the caller
            unsafe { c.vertex_attrib_pointer(index, size, ty, normalized, stride, pointer) }
        })
        .is_some()
    }

    pub fn enable_vertex_attrib_array(&self, index: u32) -> bool {
        self.dispatch("enable_vertex_attrib_array", |c| {
            c.enable_vertex_attrib_array(index, true)
        })
        .is_some()
    }

    pub fn disable_vertex_attrib_array(&self, index: u32) -> bool {
        self.dispatch("disable_vertex_attrib_array", |c| {
            c.enable_vertex_attrib_array(index, false)
        })
        .is_some()
    }

    /// Decodes attribute `index` of the bound vertex array at `vertex`.
    pub fn decode_attribute_float(&self, index: u32, vertex: usize, out: &mut [f32]) -> bool {
        self.dispatch("decode_attribute_float", |c| {
            let binding = c.attribute(index)?;
            c.decode_float(&binding, vertex, out)
        })
        .is_some()
    }

    pub fn decode_attribute_int(&self, index: u32, vertex: usize, out: &mut [u32]) -> bool {
        self.dispatch("decode_attribute_int", |c| {
            let binding = c.attribute(index)?;
            c.decode_int(&binding, vertex, out)
        })
        .is_some()
    }

    //textures

    /// `glTexImage2D` on the texture bound to the active unit. Only RGBA8 is mirrored.
    pub fn tex_image_2d(
        &self,
        target: GLenum,
        width: u32,
        height: u32,
        format: GLenum,
        ty: GLenum,
        data: Option<&[u8]>,
    ) -> bool {
        self.dispatch("tex_image_2d", |c| {
            check_texture_upload(target, format, ty)?;
            let texture = c
                .bound_texture(c.active_texture_unit())
                .ok_or(Error::invalid_id(ObjectKind::Texture, 0u32))?;
            texture.allocate(width, height, data)
        })
        .is_some()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn tex_sub_image_2d(
        &self,
        target: GLenum,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        format: GLenum,
        ty: GLenum,
        data: &[u8],
    ) -> bool {
        self.dispatch("tex_sub_image_2d", |c| {
            check_texture_upload(target, format, ty)?;
            let texture = c
                .bound_texture(c.active_texture_unit())
                .ok_or(Error::invalid_id(ObjectKind::Texture, 0u32))?;
            texture.sub_image(x, y, width, height, data)
        })
        .is_some()
    }

    //overlay

    pub fn set_game_view(&self, framebuffer: u32, texture: u32) -> bool {
        self.dispatch("set_game_view", |c| {
            c.set_game_view(framebuffer, texture);
            Ok(())
        })
        .is_some()
    }

    pub fn set_game_view_rect(&self, x: i32, y: i32, width: i32, height: i32) -> bool {
        self.dispatch("set_game_view_rect", |c| {
            c.set_game_view_rect(x, y, width, height);
            Ok(())
        })
        .is_some()
    }

    pub fn game_view(&self) -> Option<GameView> {
        self.dispatch("game_view", |c| Ok(c.game_view()))
    }
}
