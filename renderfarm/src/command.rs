//! Catalogue of protocol commands
//!
//! Every command the master may send is a variant of [`CommandKind`].
//! Names map onto kinds through a total function, so a typo or an unknown
//! command is a distinct case instead of a silently missed hash.

use std::collections::HashMap;

use crate::{
    error::{FarmError, Result},
    wire::djb_hash,
};

/// Parameters of generic entity commands that reference a local file
pub const ENTITY_FILE_PARAMS: &[&str] = &["mapname", "iesname"];
/// Parameters of `luxTexture` that reference a local file
pub const TEXTURE_FILE_PARAMS: &[&str] = &["filename"];

/// Shape of the arguments following a command name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgShape {
    /// Nothing follows
    Bare,
    /// Session id line
    SessionId,
    /// One line with this many floats
    Floats(usize),
    /// One line with a name
    Name,
    /// Type line, parameter block, file frames for listed parameters
    Entity(&'static [&'static str]),
    /// Type line, parameter block
    Film,
    /// Name, type and texture type lines, parameter block, file frames
    Texture,
    /// Id and name lines, parameter block
    NamedVolume,
    /// One line `name start end toTransform`
    Motion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Connect,
    Disconnect,
    Init,
    Translate,
    Rotate,
    Scale,
    LookAt,
    ConcatTransform,
    Transform,
    Identity,
    CoordinateSystem,
    CoordSysTransform,
    PixelFilter,
    Film,
    Sampler,
    Accelerator,
    SurfaceIntegrator,
    VolumeIntegrator,
    Camera,
    WorldBegin,
    AttributeBegin,
    AttributeEnd,
    TransformBegin,
    TransformEnd,
    Texture,
    Material,
    LightGroup,
    MakeNamedMaterial,
    NamedMaterial,
    LightSource,
    AreaLightSource,
    PortalShape,
    Shape,
    ReverseOrientation,
    MakeNamedVolume,
    Volume,
    Exterior,
    Interior,
    ObjectBegin,
    ObjectEnd,
    ObjectInstance,
    MotionInstance,
    WorldEnd,
    GetFilm,
    SetEpsilon,
    Renderer,
}

impl CommandKind {
    pub const ALL: [CommandKind; 46] = [
        CommandKind::Connect,
        CommandKind::Disconnect,
        CommandKind::Init,
        CommandKind::Translate,
        CommandKind::Rotate,
        CommandKind::Scale,
        CommandKind::LookAt,
        CommandKind::ConcatTransform,
        CommandKind::Transform,
        CommandKind::Identity,
        CommandKind::CoordinateSystem,
        CommandKind::CoordSysTransform,
        CommandKind::PixelFilter,
        CommandKind::Film,
        CommandKind::Sampler,
        CommandKind::Accelerator,
        CommandKind::SurfaceIntegrator,
        CommandKind::VolumeIntegrator,
        CommandKind::Camera,
        CommandKind::WorldBegin,
        CommandKind::AttributeBegin,
        CommandKind::AttributeEnd,
        CommandKind::TransformBegin,
        CommandKind::TransformEnd,
        CommandKind::Texture,
        CommandKind::Material,
        CommandKind::LightGroup,
        CommandKind::MakeNamedMaterial,
        CommandKind::NamedMaterial,
        CommandKind::LightSource,
        CommandKind::AreaLightSource,
        CommandKind::PortalShape,
        CommandKind::Shape,
        CommandKind::ReverseOrientation,
        CommandKind::MakeNamedVolume,
        CommandKind::Volume,
        CommandKind::Exterior,
        CommandKind::Interior,
        CommandKind::ObjectBegin,
        CommandKind::ObjectEnd,
        CommandKind::ObjectInstance,
        CommandKind::MotionInstance,
        CommandKind::WorldEnd,
        CommandKind::GetFilm,
        CommandKind::SetEpsilon,
        CommandKind::Renderer,
    ];

    /// Name on the wire
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Connect => "ServerConnect",
            CommandKind::Disconnect => "ServerDisconnect",
            CommandKind::Init => "luxInit",
            CommandKind::Translate => "luxTranslate",
            CommandKind::Rotate => "luxRotate",
            CommandKind::Scale => "luxScale",
            CommandKind::LookAt => "luxLookAt",
            CommandKind::ConcatTransform => "luxConcatTransform",
            CommandKind::Transform => "luxTransform",
            CommandKind::Identity => "luxIdentity",
            CommandKind::CoordinateSystem => "luxCoordinateSystem",
            CommandKind::CoordSysTransform => "luxCoordSysTransform",
            CommandKind::PixelFilter => "luxPixelFilter",
            CommandKind::Film => "luxFilm",
            CommandKind::Sampler => "luxSampler",
            CommandKind::Accelerator => "luxAccelerator",
            CommandKind::SurfaceIntegrator => "luxSurfaceIntegrator",
            CommandKind::VolumeIntegrator => "luxVolumeIntegrator",
            CommandKind::Camera => "luxCamera",
            CommandKind::WorldBegin => "luxWorldBegin",
            CommandKind::AttributeBegin => "luxAttributeBegin",
            CommandKind::AttributeEnd => "luxAttributeEnd",
            CommandKind::TransformBegin => "luxTransformBegin",
            CommandKind::TransformEnd => "luxTransformEnd",
            CommandKind::Texture => "luxTexture",
            CommandKind::Material => "luxMaterial",
            CommandKind::LightGroup => "luxLightGroup",
            CommandKind::MakeNamedMaterial => "luxMakeNamedMaterial",
            CommandKind::NamedMaterial => "luxNamedMaterial",
            CommandKind::LightSource => "luxLightSource",
            CommandKind::AreaLightSource => "luxAreaLightSource",
            CommandKind::PortalShape => "luxPortalShape",
            CommandKind::Shape => "luxShape",
            CommandKind::ReverseOrientation => "luxReverseOrientation",
            CommandKind::MakeNamedVolume => "luxMakeNamedVolume",
            CommandKind::Volume => "luxVolume",
            CommandKind::Exterior => "luxExterior",
            CommandKind::Interior => "luxInterior",
            CommandKind::ObjectBegin => "luxObjectBegin",
            CommandKind::ObjectEnd => "luxObjectEnd",
            CommandKind::ObjectInstance => "luxObjectInstance",
            CommandKind::MotionInstance => "luxMotionInstance",
            CommandKind::WorldEnd => "luxWorldEnd",
            CommandKind::GetFilm => "luxGetFilm",
            CommandKind::SetEpsilon => "luxSetEpsilon",
            CommandKind::Renderer => "luxRenderer",
        }
    }

    /// Total mapping from wire name, `None` for unknown names
    pub fn from_name(name: &str) -> Option<CommandKind> {
        CommandKind::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    pub fn hash(self) -> u32 {
        djb_hash(self.name())
    }

    pub fn arg_shape(self) -> ArgShape {
        use CommandKind::*;
        match self {
            Connect | Init | Identity | WorldBegin | AttributeBegin | AttributeEnd
            | TransformBegin | TransformEnd | ReverseOrientation | ObjectEnd | WorldEnd => {
                ArgShape::Bare
            }
            Disconnect | GetFilm => ArgShape::SessionId,
            Translate | Scale => ArgShape::Floats(3),
            Rotate => ArgShape::Floats(4),
            LookAt => ArgShape::Floats(9),
            ConcatTransform | Transform => ArgShape::Floats(16),
            SetEpsilon => ArgShape::Floats(2),
            CoordinateSystem | CoordSysTransform | NamedMaterial | Exterior | Interior
            | ObjectBegin | ObjectInstance => ArgShape::Name,
            PixelFilter | Sampler | Accelerator | SurfaceIntegrator | VolumeIntegrator
            | Camera | Material | LightGroup | MakeNamedMaterial | LightSource
            | AreaLightSource | PortalShape | Shape | Volume | Renderer => {
                ArgShape::Entity(ENTITY_FILE_PARAMS)
            }
            Film => ArgShape::Film,
            Texture => ArgShape::Texture,
            MakeNamedVolume => ArgShape::NamedVolume,
            MotionInstance => ArgShape::Motion,
        }
    }
}

/// Result of looking up one command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Known(CommandKind),
    /// Empty or whitespace-only line
    Blank,
    Unknown(String),
}

/// Per-worker dispatch table
///
/// Routes by hash, then confirms the name, so a hash shared with an
/// unrelated string never reaches the wrong handler.
#[derive(Debug)]
pub struct DispatchTable {
    by_hash: HashMap<u32, CommandKind>,
}

impl DispatchTable {
    /// Build table over [`CommandKind::ALL`]
    /// Fails if two command names share a hash
    pub fn new() -> Result<DispatchTable> {
        let mut by_hash = HashMap::with_capacity(CommandKind::ALL.len());
        for kind in CommandKind::ALL {
            if let Some(other) = by_hash.insert(kind.hash(), kind) {
                return Err(FarmError::HashCollision {
                    first: other.name(),
                    second: kind.name(),
                    hash: kind.hash(),
                });
            }
        }
        Ok(DispatchTable { by_hash })
    }

    pub fn lookup(&self, line: &str) -> Lookup {
        if line.trim().is_empty() {
            return Lookup::Blank;
        }
        match self.by_hash.get(&djb_hash(line)) {
            Some(&kind) if kind.name() == line => Lookup::Known(kind),
            _ => Lookup::Unknown(line.to_owned()),
        }
    }

    pub fn len(&self) -> usize {
        self.by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_hash.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn names_round_trip() {
        for kind in CommandKind::ALL {
            assert_eq!(CommandKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(CommandKind::from_name("luxFoo"), None);
        assert_eq!(CommandKind::from_name("luxfilm"), None);
    }

    #[test]
    fn no_hash_collisions() {
        let table = DispatchTable::new().unwrap();
        assert_eq!(table.len(), CommandKind::ALL.len());
    }

    #[test]
    fn hashes_match_legacy_identifiers() {
        assert_eq!(CommandKind::Connect.hash(), 332355398);
        assert_eq!(CommandKind::Disconnect.hash(), 2500584742);
        assert_eq!(CommandKind::GetFilm.hash(), 859419430);
        assert_eq!(CommandKind::Shape.hash(), 1943702863);
        assert_eq!(CommandKind::ObjectInstance.hash(), 4125664042);
    }

    #[test]
    fn lookup_cases() {
        let table = DispatchTable::new().unwrap();
        assert_eq!(table.lookup("luxShape"), Lookup::Known(CommandKind::Shape));
        assert_eq!(table.lookup(""), Lookup::Blank);
        assert_eq!(table.lookup(" "), Lookup::Blank);
        assert_eq!(
            table.lookup("luxShapes"),
            Lookup::Unknown("luxShapes".to_owned())
        );
    }

    #[test]
    fn shapes() {
        assert_eq!(CommandKind::LookAt.arg_shape(), ArgShape::Floats(9));
        assert_eq!(
            CommandKind::LightSource.arg_shape(),
            ArgShape::Entity(ENTITY_FILE_PARAMS)
        );
        assert_eq!(CommandKind::GetFilm.arg_shape(), ArgShape::SessionId);
    }
}
