// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
//! Program records.
//!
//! The overlay only cares about a handful of the host's shader programs, and
//! it recognizes them by the names of their inputs. When the host links a
//! program the shim resolves each known name once, and the record caches the
//! results so draw-time interception never touches the driver's reflection API.

use std::sync::{PoisonError, RwLock};

/// Vertex attributes the overlay looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttributeSlot {
    VertexPosition2D,
    VertexColour,
    TextureUV,
    TextureUVAtlasMin,
    TextureUVAtlasExtents,
    MaterialSettingsSlotXYTilePositionXZ,
    VertexPositionBoneLabel,
}

impl AttributeSlot {
    pub const ALL: [AttributeSlot; 7] = [
        AttributeSlot::VertexPosition2D,
        AttributeSlot::VertexColour,
        AttributeSlot::TextureUV,
        AttributeSlot::TextureUVAtlasMin,
        AttributeSlot::TextureUVAtlasExtents,
        AttributeSlot::MaterialSettingsSlotXYTilePositionXZ,
        AttributeSlot::VertexPositionBoneLabel,
    ];

    /// The GLSL identifier this slot is looked up by.
    pub const fn name(self) -> &'static str {
        match self {
            AttributeSlot::VertexPosition2D => "aVertexPosition2D",
            AttributeSlot::VertexColour => "aVertexColour",
            AttributeSlot::TextureUV => "aTextureUV",
            AttributeSlot::TextureUVAtlasMin => "aTextureUVAtlasMin",
            AttributeSlot::TextureUVAtlasExtents => "aTextureUVAtlasExtents",
            AttributeSlot::MaterialSettingsSlotXYTilePositionXZ => {
                "aMaterialSettingsSlotXY_TilePositionXZ"
            }
            AttributeSlot::VertexPositionBoneLabel => "aVertexPosition_BoneLabel",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Uniforms the overlay looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    ProjectionMatrix,
    DiffuseMap,
    TextureAtlas,
    TextureAtlasSettings,
    AtlasMeta,
    ModelMatrix,
    VertexScale,
    SceneHDRTex,
}

impl UniformSlot {
    pub const ALL: [UniformSlot; 8] = [
        UniformSlot::ProjectionMatrix,
        UniformSlot::DiffuseMap,
        UniformSlot::TextureAtlas,
        UniformSlot::TextureAtlasSettings,
        UniformSlot::AtlasMeta,
        UniformSlot::ModelMatrix,
        UniformSlot::VertexScale,
        UniformSlot::SceneHDRTex,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            UniformSlot::ProjectionMatrix => "uProjectionMatrix",
            UniformSlot::DiffuseMap => "uDiffuseMap",
            UniformSlot::TextureAtlas => "uTextureAtlas",
            UniformSlot::TextureAtlasSettings => "uTextureAtlasSettings",
            UniformSlot::AtlasMeta => "uAtlasMeta",
            UniformSlot::ModelMatrix => "uModelMatrix",
            UniformSlot::VertexScale => "uVertexScale",
            UniformSlot::SceneHDRTex => "sSceneHDRTex",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Name of the uniform block holding the camera transforms.
pub const VIEW_TRANSFORMS_BLOCK: &str = "ViewTransforms";
/// Members of [`VIEW_TRANSFORMS_BLOCK`] whose offsets are cached.
pub const CAMERA_POSITION_MEMBER: &str = "uCameraPosition";
pub const VIEW_PROJ_MATRIX_MEMBER: &str = "uViewProjMatrix";

/// Where the camera transforms live inside the `ViewTransforms` block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewTransformsBlock {
    pub block_index: u32,
    pub camera_position_offset: i32,
    pub view_proj_matrix_offset: i32,
}

/// Cached locations for one linked program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgramLocations {
    attributes: [Option<u32>; 7],
    uniforms: [Option<i32>; 8],
    view_transforms: Option<ViewTransformsBlock>,
}

impl ProgramLocations {
    pub fn attribute(&self, slot: AttributeSlot) -> Option<u32> {
        self.attributes[slot.index()]
    }

    pub fn uniform(&self, slot: UniformSlot) -> Option<i32> {
        self.uniforms[slot.index()]
    }

    pub fn view_transforms(&self) -> Option<ViewTransformsBlock> {
        self.view_transforms
    }

    fn has_attributes(&self, slots: &[AttributeSlot]) -> bool {
        slots.iter().all(|s| self.attribute(*s).is_some())
    }

    fn has_uniforms(&self, slots: &[UniformSlot]) -> bool {
        slots.iter().all(|s| self.uniform(*s).is_some())
    }

    /// Programs drawing the 2D interface.
    pub fn is_2d(&self) -> bool {
        self.has_attributes(&[
            AttributeSlot::VertexPosition2D,
            AttributeSlot::VertexColour,
            AttributeSlot::TextureUV,
            AttributeSlot::TextureUVAtlasMin,
            AttributeSlot::TextureUVAtlasExtents,
        ]) && self.has_uniforms(&[UniformSlot::ProjectionMatrix, UniformSlot::DiffuseMap])
    }

    /// Programs drawing skinned 3D models.
    pub fn is_3d(&self) -> bool {
        self.has_attributes(&[
            AttributeSlot::VertexPositionBoneLabel,
            AttributeSlot::TextureUV,
        ]) && self.has_uniforms(&[UniformSlot::ModelMatrix, UniformSlot::VertexScale])
            && self.view_transforms.is_some()
    }
}

#[derive(Debug)]
pub struct ProgramRecord {
    id: u32,
    locations: RwLock<ProgramLocations>,
}

impl ProgramRecord {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            locations: RwLock::new(ProgramLocations::default()),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn locations(&self) -> ProgramLocations {
        *self.locations.read().unwrap_or_else(PoisonError::into_inner)
    }

    /**
    Records the result of linking.

    `attribute` and `uniform` resolve a GLSL name the way `glGetAttribLocation`
    and `glGetUniformLocation` do, returning `None` (or a negative location) when
    the name is absent.
    */
    pub fn record_link(
        &self,
        mut attribute: impl FnMut(&str) -> Option<i32>,
        mut uniform: impl FnMut(&str) -> Option<i32>,
        view_transforms: Option<ViewTransformsBlock>,
    ) -> ProgramLocations {
        let mut locations = ProgramLocations {
            view_transforms,
            ..ProgramLocations::default()
        };
        for slot in AttributeSlot::ALL {
            locations.attributes[slot.index()] = attribute(slot.name())
                .filter(|loc| *loc >= 0)
                .map(|loc| loc as u32);
        }
        for slot in UniformSlot::ALL {
            locations.uniforms[slot.index()] = uniform(slot.name()).filter(|loc| *loc >= 0);
        }
        *self.locations.write().unwrap_or_else(PoisonError::into_inner) = locations;
        locations
    }

    pub fn is_2d(&self) -> bool {
        self.locations().is_2d()
    }

    pub fn is_3d(&self) -> bool {
        self.locations().is_3d()
    }
}
