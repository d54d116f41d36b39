//! Scene construction
//!
//! Commands received from the master are turned into [`SceneCall`]s and
//! applied to a [`Scene`]. On `luxWorldEnd` the scene is frozen into a
//! [`PreparedScene`] which the render engine samples.

mod prepared;
mod state;

pub use prepared::{
    PreparedScene, SceneCamera, DEFAULT_RESOLUTION, MAX_FILM_PIXELS, MAX_PIXEL_SAMPLES,
};
pub use state::{Entity, GraphicsState, MotionInstance, Scene, TextureDef};

use nalgebra::{Matrix4, Point3, Vector3};

use crate::{command::CommandKind, wire::ParamSet};

/// Entity commands, all take a type name and a parameter set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    PixelFilter,
    Film,
    Sampler,
    Accelerator,
    SurfaceIntegrator,
    VolumeIntegrator,
    Camera,
    Renderer,
    Material,
    /// Type name holds the material name
    MakeNamedMaterial,
    LightGroup,
    LightSource,
    AreaLightSource,
    PortalShape,
    Shape,
    Volume,
}

impl EntityKind {
    pub fn from_command(kind: CommandKind) -> Option<EntityKind> {
        let entity = match kind {
            CommandKind::PixelFilter => EntityKind::PixelFilter,
            CommandKind::Film => EntityKind::Film,
            CommandKind::Sampler => EntityKind::Sampler,
            CommandKind::Accelerator => EntityKind::Accelerator,
            CommandKind::SurfaceIntegrator => EntityKind::SurfaceIntegrator,
            CommandKind::VolumeIntegrator => EntityKind::VolumeIntegrator,
            CommandKind::Camera => EntityKind::Camera,
            CommandKind::Renderer => EntityKind::Renderer,
            CommandKind::Material => EntityKind::Material,
            CommandKind::MakeNamedMaterial => EntityKind::MakeNamedMaterial,
            CommandKind::LightGroup => EntityKind::LightGroup,
            CommandKind::LightSource => EntityKind::LightSource,
            CommandKind::AreaLightSource => EntityKind::AreaLightSource,
            CommandKind::PortalShape => EntityKind::PortalShape,
            CommandKind::Shape => EntityKind::Shape,
            CommandKind::Volume => EntityKind::Volume,
            _ => return None,
        };
        Some(entity)
    }

    pub fn command(self) -> CommandKind {
        match self {
            EntityKind::PixelFilter => CommandKind::PixelFilter,
            EntityKind::Film => CommandKind::Film,
            EntityKind::Sampler => CommandKind::Sampler,
            EntityKind::Accelerator => CommandKind::Accelerator,
            EntityKind::SurfaceIntegrator => CommandKind::SurfaceIntegrator,
            EntityKind::VolumeIntegrator => CommandKind::VolumeIntegrator,
            EntityKind::Camera => CommandKind::Camera,
            EntityKind::Renderer => CommandKind::Renderer,
            EntityKind::Material => CommandKind::Material,
            EntityKind::MakeNamedMaterial => CommandKind::MakeNamedMaterial,
            EntityKind::LightGroup => CommandKind::LightGroup,
            EntityKind::LightSource => CommandKind::LightSource,
            EntityKind::AreaLightSource => CommandKind::AreaLightSource,
            EntityKind::PortalShape => CommandKind::PortalShape,
            EntityKind::Shape => CommandKind::Shape,
            EntityKind::Volume => CommandKind::Volume,
        }
    }

    /// Render options, only valid outside the world block
    pub fn is_option(self) -> bool {
        matches!(
            self,
            EntityKind::PixelFilter
                | EntityKind::Film
                | EntityKind::Sampler
                | EntityKind::Accelerator
                | EntityKind::SurfaceIntegrator
                | EntityKind::VolumeIntegrator
                | EntityKind::Camera
                | EntityKind::Renderer
        )
    }
}

/// Commands taking a single name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamedKind {
    NamedMaterial,
    Exterior,
    Interior,
    ObjectBegin,
    ObjectInstance,
    CoordinateSystem,
    CoordSysTransform,
}

impl NamedKind {
    pub fn from_command(kind: CommandKind) -> Option<NamedKind> {
        let named = match kind {
            CommandKind::NamedMaterial => NamedKind::NamedMaterial,
            CommandKind::Exterior => NamedKind::Exterior,
            CommandKind::Interior => NamedKind::Interior,
            CommandKind::ObjectBegin => NamedKind::ObjectBegin,
            CommandKind::ObjectInstance => NamedKind::ObjectInstance,
            CommandKind::CoordinateSystem => NamedKind::CoordinateSystem,
            CommandKind::CoordSysTransform => NamedKind::CoordSysTransform,
            _ => return None,
        };
        Some(named)
    }

    pub fn command(self) -> CommandKind {
        match self {
            NamedKind::NamedMaterial => CommandKind::NamedMaterial,
            NamedKind::Exterior => CommandKind::Exterior,
            NamedKind::Interior => CommandKind::Interior,
            NamedKind::ObjectBegin => CommandKind::ObjectBegin,
            NamedKind::ObjectInstance => CommandKind::ObjectInstance,
            NamedKind::CoordinateSystem => CommandKind::CoordinateSystem,
            NamedKind::CoordSysTransform => CommandKind::CoordSysTransform,
        }
    }
}

/// Commands without arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Identity,
    WorldBegin,
    AttributeBegin,
    AttributeEnd,
    TransformBegin,
    TransformEnd,
    ReverseOrientation,
    ObjectEnd,
}

impl BlockKind {
    pub fn from_command(kind: CommandKind) -> Option<BlockKind> {
        let block = match kind {
            CommandKind::Identity => BlockKind::Identity,
            CommandKind::WorldBegin => BlockKind::WorldBegin,
            CommandKind::AttributeBegin => BlockKind::AttributeBegin,
            CommandKind::AttributeEnd => BlockKind::AttributeEnd,
            CommandKind::TransformBegin => BlockKind::TransformBegin,
            CommandKind::TransformEnd => BlockKind::TransformEnd,
            CommandKind::ReverseOrientation => BlockKind::ReverseOrientation,
            CommandKind::ObjectEnd => BlockKind::ObjectEnd,
            _ => return None,
        };
        Some(block)
    }

    pub fn command(self) -> CommandKind {
        match self {
            BlockKind::Identity => CommandKind::Identity,
            BlockKind::WorldBegin => CommandKind::WorldBegin,
            BlockKind::AttributeBegin => CommandKind::AttributeBegin,
            BlockKind::AttributeEnd => CommandKind::AttributeEnd,
            BlockKind::TransformBegin => CommandKind::TransformBegin,
            BlockKind::TransformEnd => CommandKind::TransformEnd,
            BlockKind::ReverseOrientation => CommandKind::ReverseOrientation,
            BlockKind::ObjectEnd => CommandKind::ObjectEnd,
        }
    }
}

/// One scene construction call, decoded from the wire
#[derive(Debug, Clone, PartialEq)]
pub enum SceneCall {
    Translate(Vector3<f32>),
    /// Angle in degrees
    Rotate {
        angle: f32,
        axis: Vector3<f32>,
    },
    Scale(Vector3<f32>),
    LookAt {
        eye: Point3<f32>,
        target: Point3<f32>,
        up: Vector3<f32>,
    },
    ConcatTransform(Matrix4<f32>),
    Transform(Matrix4<f32>),
    Block(BlockKind),
    Named(NamedKind, String),
    Entity {
        kind: EntityKind,
        type_name: String,
        params: ParamSet,
    },
    Texture {
        name: String,
        type_name: String,
        texture_type: String,
        params: ParamSet,
    },
    MakeNamedVolume {
        id: String,
        name: String,
        params: ParamSet,
    },
    MotionInstance {
        name: String,
        start: f32,
        end: f32,
        to_transform: String,
    },
    SetEpsilon {
        min: f32,
        max: f32,
    },
}

impl SceneCall {
    pub fn command(&self) -> CommandKind {
        match self {
            SceneCall::Translate(_) => CommandKind::Translate,
            SceneCall::Rotate { .. } => CommandKind::Rotate,
            SceneCall::Scale(_) => CommandKind::Scale,
            SceneCall::LookAt { .. } => CommandKind::LookAt,
            SceneCall::ConcatTransform(_) => CommandKind::ConcatTransform,
            SceneCall::Transform(_) => CommandKind::Transform,
            SceneCall::Block(block) => block.command(),
            SceneCall::Named(named, _) => named.command(),
            SceneCall::Entity { kind, .. } => kind.command(),
            SceneCall::Texture { .. } => CommandKind::Texture,
            SceneCall::MakeNamedVolume { .. } => CommandKind::MakeNamedVolume,
            SceneCall::MotionInstance { .. } => CommandKind::MotionInstance,
            SceneCall::SetEpsilon { .. } => CommandKind::SetEpsilon,
        }
    }

    /// Convenience constructor for entity calls
    pub fn entity(kind: EntityKind, type_name: &str, params: ParamSet) -> SceneCall {
        SceneCall::Entity {
            kind,
            type_name: type_name.to_owned(),
            params,
        }
    }
}
