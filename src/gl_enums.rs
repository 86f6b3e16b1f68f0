/*!
GL enumerants the interception layer understands.

Values are identical to the real API so the shim can pass them through untouched.
*/

pub type GLenum = u32;

pub const GL_TEXTURE_2D: GLenum = 3553;
pub const GL_RGBA: GLenum = 6408;
pub const GL_BYTE: GLenum = 5120;
pub const GL_UNSIGNED_BYTE: GLenum = 5121;
pub const GL_SHORT: GLenum = 5122;
pub const GL_UNSIGNED_SHORT: GLenum = 5123;
pub const GL_INT: GLenum = 5124;
pub const GL_UNSIGNED_INT: GLenum = 5125;
pub const GL_FLOAT: GLenum = 5126;
pub const GL_HALF_FLOAT: GLenum = 5131;
pub const GL_INT_2_10_10_10_REV: GLenum = 0x8D9F;
pub const GL_TRIANGLES: GLenum = 4;
pub const GL_TRIANGLE_STRIP: GLenum = 5;
pub const GL_MAP_READ_BIT: GLenum = 1;
pub const GL_MAP_WRITE_BIT: GLenum = 2;
pub const GL_MAP_FLUSH_EXPLICIT_BIT: GLenum = 16;
pub const GL_COMPRESSED_SRGB_ALPHA_S3TC_DXT5_EXT: GLenum = 0x8C4F;
pub const GL_COMPRESSED_SRGB_ALPHA_S3TC_DXT1_EXT: GLenum = 0x8C4D;
pub const GL_COMPRESSED_RGBA_S3TC_DXT5_EXT: GLenum = 0x83F3;
pub const GL_FRAMEBUFFER: GLenum = 36160;
pub const GL_READ_FRAMEBUFFER: GLenum = 36008;
pub const GL_DRAW_FRAMEBUFFER: GLenum = 36009;
pub const GL_ARRAY_BUFFER: GLenum = 34962;
pub const GL_ELEMENT_ARRAY_BUFFER: GLenum = 34963;
pub const GL_UNIFORM_BUFFER: GLenum = 35345;
pub const GL_ARRAY_BUFFER_BINDING: GLenum = 34964;
pub const GL_ELEMENT_ARRAY_BUFFER_BINDING: GLenum = 34965;
pub const GL_UNIFORM_BUFFER_BINDING: GLenum = 35368;
pub const GL_UNIFORM_OFFSET: GLenum = 35387;
pub const GL_UNIFORM_BLOCK_BINDING: GLenum = 35391;
pub const GL_TEXTURE0: GLenum = 33984;
pub const GL_COLOR_ATTACHMENT0: GLenum = 36064;
pub const GL_FRAMEBUFFER_ATTACHMENT_OBJECT_NAME: GLenum = 36049;

/// Buffer binding points tracked per context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Array,
    ElementArray,
    Uniform,
}

impl BufferTarget {
    pub fn from_gl(target: GLenum) -> Option<Self> {
        match target {
            GL_ARRAY_BUFFER => Some(BufferTarget::Array),
            GL_ELEMENT_ARRAY_BUFFER => Some(BufferTarget::ElementArray),
            GL_UNIFORM_BUFFER => Some(BufferTarget::Uniform),
            _ => None,
        }
    }

    pub const fn to_gl(self) -> GLenum {
        match self {
            BufferTarget::Array => GL_ARRAY_BUFFER,
            BufferTarget::ElementArray => GL_ELEMENT_ARRAY_BUFFER,
            BufferTarget::Uniform => GL_UNIFORM_BUFFER,
        }
    }

    /// The `glGetIntegerv` query that reports this target's binding.
    pub const fn binding_query(self) -> GLenum {
        match self {
            BufferTarget::Array => GL_ARRAY_BUFFER_BINDING,
            BufferTarget::ElementArray => GL_ELEMENT_ARRAY_BUFFER_BINDING,
            BufferTarget::Uniform => GL_UNIFORM_BUFFER_BINDING,
        }
    }
}

/// Maps a buffer target to its binding query, or 0 for targets we don't track.
pub fn binding_for_buffer(target: GLenum) -> GLenum {
    BufferTarget::from_gl(target).map_or(0, BufferTarget::binding_query)
}

/// Whether a texture internal format is one of the S3TC formats the host uploads.
pub fn is_compressed_format(format: GLenum) -> bool {
    matches!(
        format,
        GL_COMPRESSED_SRGB_ALPHA_S3TC_DXT5_EXT
            | GL_COMPRESSED_SRGB_ALPHA_S3TC_DXT1_EXT
            | GL_COMPRESSED_RGBA_S3TC_DXT5_EXT
    )
}
