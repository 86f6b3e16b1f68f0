/*! Per-kind object records and the tables that hold them. */

pub mod table;
pub mod buffer;
pub mod texture;
pub mod program;
pub mod vertex_array;

pub use table::{Handle, ResourceTable};
pub use buffer::BufferRecord;
pub use texture::TextureRecord;
pub use program::ProgramRecord;
pub use vertex_array::VertexArrayRecord;
