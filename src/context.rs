// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*! Virtual GL contexts.

A [`Context`] is the bundle of state a host thread sees when it makes a GL context
current: four object tables plus the binding points (current program, vertex
array, texture units, buffer targets, framebuffers) and the overlay's game view.

# Sharing

An owner context allocates fresh tables. A dependent context, created with
`share_with`, holds references to its owner's tables instead; the tables count
their referencing contexts and outlive whichever of them is destroyed first. See
[`crate::registry`] for how contexts are created and destroyed.

Binding state is never shared; each context has its own default vertex array
(id 0) and its own texture units.
*/

use crate::attribute::{AttributeBinding, describe_binding};
use crate::config::{BufferMapping, Config};
use crate::error::{Error, ObjectKind, Result};
use crate::gl_enums::{
    BufferTarget, GL_DRAW_FRAMEBUFFER, GL_FRAMEBUFFER, GL_READ_FRAMEBUFFER, GL_TEXTURE0,
    GL_TEXTURE_2D, GLenum,
};
use crate::resources::buffer::BufferRecord;
use crate::resources::program::ProgramRecord;
use crate::resources::table::ResourceTable;
use crate::resources::texture::TextureRecord;
use crate::resources::vertex_array::VertexArrayRecord;
use std::fmt::Display;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Opaque context identifier. Never 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u64);

impl ContextId {
    /// Reconstructs an id previously obtained from [`ContextId::get`].
    pub const fn from_raw(raw: u64) -> Self {
        ContextId(raw)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl Display for ContextId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "context {}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextRole {
    /// Allocated its own tables.
    Owner,
    /// References the tables of `owner`.
    Dependent { owner: ContextId },
}

/// The four object tables of a sharing group.
#[derive(Debug, Clone)]
pub struct ContextTables {
    buffers: Arc<ResourceTable<BufferRecord>>,
    textures: Arc<ResourceTable<TextureRecord>>,
    programs: Arc<ResourceTable<ProgramRecord>>,
    vertex_arrays: Arc<ResourceTable<VertexArrayRecord>>,
}

impl ContextTables {
    pub fn new() -> Self {
        Self {
            buffers: ResourceTable::new(ObjectKind::Buffer),
            textures: ResourceTable::new(ObjectKind::Texture),
            programs: ResourceTable::new(ObjectKind::Program),
            vertex_arrays: ResourceTable::new(ObjectKind::VertexArray),
        }
    }

    /// References the same tables, counting one more owner on each.
    pub fn share(&self) -> Result<Self> {
        self.buffers.attach()?;
        if let Err(e) = self.textures.attach() {
            self.buffers.release()?;
            return Err(e);
        }
        if let Err(e) = self.programs.attach() {
            self.buffers.release()?;
            self.textures.release()?;
            return Err(e);
        }
        if let Err(e) = self.vertex_arrays.attach() {
            self.buffers.release()?;
            self.textures.release()?;
            self.programs.release()?;
            return Err(e);
        }
        Ok(self.clone())
    }

    /**
    Drops this reference from every table.

    Returns `true` if the storage was freed, that is, this was the last owner.
    */
    pub fn release(&self) -> Result<bool> {
        //release all four even if one fails, then report the first failure
        let results = [
            self.buffers.release(),
            self.textures.release(),
            self.programs.release(),
            self.vertex_arrays.release(),
        ];
        let mut freed = true;
        for result in results {
            freed &= result?;
        }
        Ok(freed)
    }

    pub fn buffers(&self) -> &ResourceTable<BufferRecord> {
        &self.buffers
    }

    pub fn textures(&self) -> &ResourceTable<TextureRecord> {
        &self.textures
    }

    pub fn programs(&self) -> &ResourceTable<ProgramRecord> {
        &self.programs
    }

    pub fn vertex_arrays(&self) -> &ResourceTable<VertexArrayRecord> {
        &self.vertex_arrays
    }

    /// Whether `other` references the same tables.
    pub fn same_group(&self, other: &ContextTables) -> bool {
        Arc::ptr_eq(&self.buffers, &other.buffers)
    }

    /// Number of contexts referencing these tables.
    pub fn owners(&self) -> usize {
        self.buffers.owners()
    }
}

impl Default for ContextTables {
    fn default() -> Self {
        Self::new()
    }
}

/// The framebuffer and texture the overlay composites the game into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GameView {
    pub framebuffer: u32,
    pub texture: u32,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// The texture the 3D pass renders into, when the overlay asks for one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Target3D {
    pub texture: Option<u32>,
    pub needed: bool,
}

#[derive(Debug)]
struct BindingState {
    program: Option<Arc<ProgramRecord>>,
    vertex_array: Arc<VertexArrayRecord>,
    default_vertex_array: Arc<VertexArrayRecord>,
    texture_units: Vec<Option<Arc<TextureRecord>>>,
    active_texture: usize,
    array_buffer: u32,
    element_array_buffer: u32,
    uniform_buffer: u32,
    draw_framebuffer: u32,
    read_framebuffer: u32,
    game_view: GameView,
    target_3d: Target3D,
}

impl BindingState {
    fn new(texture_units: usize) -> Self {
        let default_vertex_array = Arc::new(VertexArrayRecord::new(0));
        Self {
            program: None,
            vertex_array: default_vertex_array.clone(),
            default_vertex_array,
            texture_units: vec![None; texture_units],
            active_texture: 0,
            array_buffer: 0,
            element_array_buffer: 0,
            uniform_buffer: 0,
            draw_framebuffer: 0,
            read_framebuffer: 0,
            game_view: GameView::default(),
            target_3d: Target3D::default(),
        }
    }

    fn buffer_slot(&mut self, target: BufferTarget) -> &mut u32 {
        match target {
            BufferTarget::Array => &mut self.array_buffer,
            BufferTarget::ElementArray => &mut self.element_array_buffer,
            BufferTarget::Uniform => &mut self.uniform_buffer,
        }
    }
}

#[derive(Debug)]
pub struct Context {
    id: ContextId,
    role: ContextRole,
    tables: ContextTables,
    buffer_mapping: BufferMapping,
    state: Mutex<BindingState>,
    attached: AtomicBool,
    pending_destroy: AtomicBool,
    released: AtomicBool,
}

impl Context {
    /// An owner context with fresh tables.
    pub fn new_owner(id: ContextId, config: &Config) -> Self {
        Self::with_tables(id, ContextRole::Owner, ContextTables::new(), config)
    }

    /// A dependent context referencing `owner`'s tables.
    pub fn new_dependent(id: ContextId, owner: &Context, config: &Config) -> Result<Self> {
        if let ContextRole::Dependent { .. } = owner.role {
            return Err(Error::InvalidSharingDepth {
                owner: owner.id.get(),
            });
        }
        let tables = owner.tables.share()?;
        Ok(Self::with_tables(
            id,
            ContextRole::Dependent { owner: owner.id },
            tables,
            config,
        ))
    }

    fn with_tables(id: ContextId, role: ContextRole, tables: ContextTables, config: &Config) -> Self {
        Self {
            id,
            role,
            tables,
            buffer_mapping: config.buffer_mapping(),
            state: Mutex::new(BindingState::new(config.texture_units())),
            attached: AtomicBool::new(false),
            pending_destroy: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn role(&self) -> ContextRole {
        self.role
    }

    /// The owner this context shares with, if it is a dependent.
    pub fn owner(&self) -> Option<ContextId> {
        match self.role {
            ContextRole::Owner => None,
            ContextRole::Dependent { owner } => Some(owner),
        }
    }

    pub fn is_dependent(&self) -> bool {
        self.owner().is_some()
    }

    pub fn buffer_mapping(&self) -> BufferMapping {
        self.buffer_mapping
    }

    pub fn tables(&self) -> &ContextTables {
        &self.tables
    }

    pub fn buffers(&self) -> &ResourceTable<BufferRecord> {
        self.tables.buffers()
    }

    pub fn textures(&self) -> &ResourceTable<TextureRecord> {
        self.tables.textures()
    }

    pub fn programs(&self) -> &ResourceTable<ProgramRecord> {
        self.tables.programs()
    }

    pub fn vertex_arrays(&self) -> &ResourceTable<VertexArrayRecord> {
        self.tables.vertex_arrays()
    }

    /// Whether some thread has this context current.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    pub(crate) fn set_attached(&self, attached: bool) {
        self.attached.store(attached, Ordering::Release);
    }

    pub fn is_pending_destroy(&self) -> bool {
        self.pending_destroy.load(Ordering::Acquire)
    }

    pub(crate) fn mark_pending_destroy(&self) {
        self.pending_destroy.store(true, Ordering::Release);
    }

    /// Whether this context has given up its tables.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    fn state(&self) -> MutexGuard<'_, BindingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_live(&self, kind: ObjectKind) -> Result<()> {
        if self.is_released() {
            logwise::error_sync!(
                "{context} used after its tables were released",
                context = self.id.get()
            );
            return Err(Error::OrphanedTable { kind });
        }
        Ok(())
    }

    /**
    Releases this context's table references and drops its bindings.

    Returns `true` if the tables were freed. Releasing twice is a no-op.
    */
    pub(crate) fn release_tables(&self) -> Result<bool> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        {
            let mut state = self.state();
            let units = state.texture_units.len();
            *state = BindingState::new(units);
        }
        let freed = self.tables.release()?;
        logwise::info_sync!(
            "released tables of context {context}, freed: {freed}",
            context = self.id.get(),
            freed = logwise::privacy::LogIt(&freed)
        );
        Ok(freed)
    }

    //objects

    pub fn create_buffer(&self, id: u32) -> Result<Arc<BufferRecord>> {
        self.ensure_live(ObjectKind::Buffer)?;
        self.buffers().put(id, BufferRecord::new(id))
    }

    pub fn create_texture(&self, id: u32) -> Result<Arc<TextureRecord>> {
        self.ensure_live(ObjectKind::Texture)?;
        self.textures().put(id, TextureRecord::new(id))
    }

    pub fn create_program(&self, id: u32) -> Result<Arc<ProgramRecord>> {
        self.ensure_live(ObjectKind::Program)?;
        self.programs().put(id, ProgramRecord::new(id))
    }

    pub fn create_vertex_array(&self, id: u32) -> Result<Arc<VertexArrayRecord>> {
        self.ensure_live(ObjectKind::VertexArray)?;
        self.vertex_arrays().put(id, VertexArrayRecord::new(id))
    }

    /// Deletes a buffer, unbinding it from this context's targets. `false` if absent.
    pub fn delete_buffer(&self, id: u32) -> Result<bool> {
        self.ensure_live(ObjectKind::Buffer)?;
        let removed = self.buffers().remove(id)?.is_some();
        if removed {
            let mut state = self.state();
            for target in [BufferTarget::Array, BufferTarget::ElementArray, BufferTarget::Uniform] {
                let slot = state.buffer_slot(target);
                if *slot == id {
                    *slot = 0;
                }
            }
        }
        Ok(removed)
    }

    pub fn delete_texture(&self, id: u32) -> Result<bool> {
        self.ensure_live(ObjectKind::Texture)?;
        let removed = self.textures().remove(id)?.is_some();
        if removed {
            for unit in self.state().texture_units.iter_mut() {
                if unit.as_ref().is_some_and(|t| t.id() == id) {
                    *unit = None;
                }
            }
        }
        Ok(removed)
    }

    pub fn delete_program(&self, id: u32) -> Result<bool> {
        self.ensure_live(ObjectKind::Program)?;
        let removed = self.programs().remove(id)?.is_some();
        if removed {
            let mut state = self.state();
            if state.program.as_ref().is_some_and(|p| p.id() == id) {
                state.program = None;
            }
        }
        Ok(removed)
    }

    /// Deleting the bound vertex array reverts to the default one.
    pub fn delete_vertex_array(&self, id: u32) -> Result<bool> {
        self.ensure_live(ObjectKind::VertexArray)?;
        let removed = self.vertex_arrays().remove(id)?.is_some();
        if removed {
            let mut state = self.state();
            if state.vertex_array.id() == id {
                state.vertex_array = state.default_vertex_array.clone();
            }
        }
        Ok(removed)
    }

    pub fn buffer(&self, id: u32) -> Result<Arc<BufferRecord>> {
        self.ensure_live(ObjectKind::Buffer)?;
        self.buffers().lookup(id)
    }

    pub fn texture(&self, id: u32) -> Result<Arc<TextureRecord>> {
        self.ensure_live(ObjectKind::Texture)?;
        self.textures().lookup(id)
    }

    pub fn program(&self, id: u32) -> Result<Arc<ProgramRecord>> {
        self.ensure_live(ObjectKind::Program)?;
        self.programs().lookup(id)
    }

    /// Id 0 resolves to this context's default vertex array.
    pub fn vertex_array(&self, id: u32) -> Result<Arc<VertexArrayRecord>> {
        self.ensure_live(ObjectKind::VertexArray)?;
        if id == 0 {
            return Ok(self.state().default_vertex_array.clone());
        }
        self.vertex_arrays().lookup(id)
    }

    //bindings

    /// `glBindBuffer`. Id 0 unbinds.
    pub fn bind_buffer(&self, target: GLenum, id: u32) -> Result<()> {
        let target = BufferTarget::from_gl(target).ok_or(Error::UnsupportedFormat {
            what: "buffer target",
            value: target,
        })?;
        if id != 0 {
            self.buffer(id)?;
        }
        *self.state().buffer_slot(target) = id;
        Ok(())
    }

    pub fn bound_buffer(&self, target: BufferTarget) -> u32 {
        *self.state().buffer_slot(target)
    }

    /// `glUseProgram`. Id 0 unbinds.
    pub fn use_program(&self, id: u32) -> Result<()> {
        let program = if id == 0 { None } else { Some(self.program(id)?) };
        self.state().program = program;
        Ok(())
    }

    pub fn current_program(&self) -> Option<Arc<ProgramRecord>> {
        self.state().program.clone()
    }

    /// `glBindVertexArray`. Id 0 binds the default vertex array.
    pub fn bind_vertex_array(&self, id: u32) -> Result<()> {
        let vertex_array = self.vertex_array(id)?;
        self.state().vertex_array = vertex_array;
        Ok(())
    }

    pub fn bound_vertex_array(&self) -> Arc<VertexArrayRecord> {
        self.state().vertex_array.clone()
    }

    /// `glActiveTexture`, taking `GL_TEXTURE0 + n`.
    pub fn active_texture(&self, unit: GLenum) -> Result<()> {
        let mut state = self.state();
        let index = unit.wrapping_sub(GL_TEXTURE0) as usize;
        if index >= state.texture_units.len() {
            return Err(Error::OutOfRange {
                offset: index,
                length: 1,
                limit: state.texture_units.len(),
            });
        }
        state.active_texture = index;
        Ok(())
    }

    /// Zero-based index of the active texture unit.
    pub fn active_texture_unit(&self) -> usize {
        self.state().active_texture
    }

    /// `glBindTexture` on the active unit. Only `GL_TEXTURE_2D` is tracked.
    pub fn bind_texture(&self, target: GLenum, id: u32) -> Result<()> {
        if target != GL_TEXTURE_2D {
            return Err(Error::UnsupportedFormat {
                what: "texture target",
                value: target,
            });
        }
        let texture = if id == 0 { None } else { Some(self.texture(id)?) };
        let mut state = self.state();
        let unit = state.active_texture;
        state.texture_units[unit] = texture;
        Ok(())
    }

    pub fn bound_texture(&self, unit: usize) -> Option<Arc<TextureRecord>> {
        self.state().texture_units.get(unit).cloned().flatten()
    }

    /// `glBindFramebuffer`. `GL_FRAMEBUFFER` sets both draw and read bindings.
    pub fn bind_framebuffer(&self, target: GLenum, framebuffer: u32) -> Result<()> {
        let mut state = self.state();
        match target {
            GL_FRAMEBUFFER => {
                state.draw_framebuffer = framebuffer;
                state.read_framebuffer = framebuffer;
            }
            GL_DRAW_FRAMEBUFFER => state.draw_framebuffer = framebuffer,
            GL_READ_FRAMEBUFFER => state.read_framebuffer = framebuffer,
            _ => {
                return Err(Error::UnsupportedFormat {
                    what: "framebuffer target",
                    value: target,
                });
            }
        }
        Ok(())
    }

    pub fn draw_framebuffer(&self) -> u32 {
        self.state().draw_framebuffer
    }

    pub fn read_framebuffer(&self) -> u32 {
        self.state().read_framebuffer
    }

    //overlay

    pub fn set_game_view(&self, framebuffer: u32, texture: u32) {
        let mut state = self.state();
        state.game_view.framebuffer = framebuffer;
        state.game_view.texture = texture;
    }

    pub fn set_game_view_rect(&self, x: i32, y: i32, width: i32, height: i32) {
        let mut state = self.state();
        state.game_view.x = x;
        state.game_view.y = y;
        state.game_view.width = width;
        state.game_view.height = height;
    }

    pub fn game_view(&self) -> GameView {
        self.state().game_view
    }

    pub fn set_target_3d(&self, texture: Option<u32>, needed: bool) {
        self.state().target_3d = Target3D { texture, needed };
    }

    pub fn target_3d(&self) -> Target3D {
        self.state().target_3d
    }

    //attributes

    /**
    `glVertexAttribPointer` on the bound vertex array.

    The source buffer is whatever is bound to `GL_ARRAY_BUFFER`; with nothing
    bound `pointer` is a client-memory address.

    # Safety

    If no array buffer is bound, the requirements of
    [`AttributeBinding::client`] apply to `pointer`.
    */
    pub unsafe fn vertex_attrib_pointer(
        &self,
        index: u32,
        components: i32,
        component_type: GLenum,
        normalise: bool,
        stride: i32,
        pointer: usize,
    ) -> Result<()> {
        let (buffer, vertex_array) = {
            let state = self.state();
            (state.array_buffer, state.vertex_array.clone())
        };
        //safety: forwarded to the caller
        let binding = unsafe {
            describe_binding(buffer, components, pointer, stride, component_type, normalise)?
        };
        vertex_array.set_binding(index, binding)
    }

    /// `glEnableVertexAttribArray` / `glDisableVertexAttribArray`.
    pub fn enable_vertex_attrib_array(&self, index: u32, enabled: bool) -> Result<()> {
        self.bound_vertex_array().set_enabled(index, enabled)
    }

    /// Slot `index` of the bound vertex array.
    pub fn attribute(&self, index: u32) -> Result<AttributeBinding> {
        self.bound_vertex_array().binding(index)
    }

    pub fn decode_float(&self, binding: &AttributeBinding, vertex: usize, out: &mut [f32]) -> Result<()> {
        self.ensure_live(ObjectKind::Buffer)?;
        binding.decode_float(self.buffers(), vertex, out)
    }

    pub fn decode_int(&self, binding: &AttributeBinding, vertex: usize, out: &mut [u32]) -> Result<()> {
        self.ensure_live(ObjectKind::Buffer)?;
        binding.decode_int(self.buffers(), vertex, out)
    }
}
