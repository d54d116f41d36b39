use std::collections::HashMap;

use log::{debug, warn};
use nalgebra::{Matrix4, Rotation3, Translation3, Unit};

use super::{BlockKind, EntityKind, NamedKind, PreparedScene, SceneCall};
use crate::{error::Result, wire::ParamSet};

/// Attributes saved by `luxAttributeBegin`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphicsState {
    pub material: Option<String>,
    pub exterior: Option<String>,
    pub interior: Option<String>,
    pub reverse_orientation: bool,
    pub area_light: Option<usize>,
    pub light_group: Option<String>,
}

/// Recorded entity call
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub kind: EntityKind,
    pub type_name: String,
    pub params: ParamSet,
    /// Object to world at the time of the call
    pub transform: Matrix4<f32>,
    pub attributes: GraphicsState,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextureDef {
    pub name: String,
    pub type_name: String,
    pub texture_type: String,
    pub params: ParamSet,
}

/// Object instance moving between the CTM and a named transform
#[derive(Debug, Clone, PartialEq)]
pub struct MotionInstance {
    pub name: String,
    pub start: f32,
    pub end: f32,
    pub to_transform: String,
}

/// Scene under construction
///
/// Misuse (unbalanced blocks, unknown names) is logged and ignored,
/// the same way the master's own renderer would treat it.
#[derive(Debug, Clone)]
pub struct Scene {
    ctm: Matrix4<f32>,
    transform_stack: Vec<Matrix4<f32>>,
    attributes: GraphicsState,
    attribute_stack: Vec<(GraphicsState, Matrix4<f32>)>,
    named_coordinates: HashMap<String, Matrix4<f32>>,
    named_materials: HashMap<String, usize>,
    named_volumes: HashMap<String, (String, ParamSet)>,
    objects: HashMap<String, Vec<usize>>,
    current_object: Option<String>,
    instances: Vec<(String, Matrix4<f32>)>,
    motion_instances: Vec<MotionInstance>,
    in_world: bool,
    entities: Vec<Entity>,
    textures: Vec<TextureDef>,
    epsilon: Option<(f32, f32)>,
}

impl Scene {
    pub fn new() -> Scene {
        Scene {
            ctm: Matrix4::identity(),
            transform_stack: Vec::new(),
            attributes: GraphicsState::default(),
            attribute_stack: Vec::new(),
            named_coordinates: HashMap::new(),
            named_materials: HashMap::new(),
            named_volumes: HashMap::new(),
            objects: HashMap::new(),
            current_object: None,
            instances: Vec::new(),
            motion_instances: Vec::new(),
            in_world: false,
            entities: Vec::new(),
            textures: Vec::new(),
            epsilon: None,
        }
    }

    /// Current transformation matrix
    pub fn ctm(&self) -> &Matrix4<f32> {
        &self.ctm
    }

    pub fn attributes(&self) -> &GraphicsState {
        &self.attributes
    }

    pub fn in_world(&self) -> bool {
        self.in_world
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn entities_of(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(move |e| e.kind == kind)
    }

    /// Last recorded entity of `kind`
    pub fn last_of(&self, kind: EntityKind) -> Option<&Entity> {
        self.entities.iter().rev().find(|e| e.kind == kind)
    }

    pub fn textures(&self) -> &[TextureDef] {
        &self.textures
    }

    pub fn epsilon(&self) -> Option<(f32, f32)> {
        self.epsilon
    }

    pub fn named_volume(&self, name: &str) -> Option<&(String, ParamSet)> {
        self.named_volumes.get(name)
    }

    /// Number of object instances, plain and motion
    pub fn instance_count(&self) -> usize {
        self.instances.len() + self.motion_instances.len()
    }

    pub fn motion_instances(&self) -> &[MotionInstance] {
        &self.motion_instances
    }

    pub fn apply(&mut self, call: SceneCall) {
        match call {
            SceneCall::Translate(delta) => {
                self.ctm *= Translation3::from(delta).to_homogeneous();
            }
            SceneCall::Rotate { angle, axis } => match Unit::try_new(axis, f32::EPSILON) {
                Some(axis) => {
                    self.ctm *=
                        Rotation3::from_axis_angle(&axis, angle.to_radians()).to_homogeneous();
                }
                None => warn!("luxRotate around zero axis ignored"),
            },
            SceneCall::Scale(factors) => {
                self.ctm *= Matrix4::new_nonuniform_scaling(&factors);
            }
            SceneCall::LookAt { eye, target, up } => {
                if (target - eye).cross(&up).norm_squared() == 0.0 {
                    warn!("luxLookAt with degenerate direction ignored");
                } else {
                    self.ctm *= Matrix4::look_at_lh(&eye, &target, &up);
                }
            }
            SceneCall::ConcatTransform(m) => self.ctm *= m,
            SceneCall::Transform(m) => self.ctm = m,
            SceneCall::Block(block) => self.block(block),
            SceneCall::Named(named, name) => self.named(named, name),
            SceneCall::Entity {
                kind,
                type_name,
                params,
            } => self.entity(kind, type_name, params),
            SceneCall::Texture {
                name,
                type_name,
                texture_type,
                params,
            } => {
                debug!("Texture '{name}' ({type_name}, {texture_type})");
                self.textures.push(TextureDef {
                    name,
                    type_name,
                    texture_type,
                    params,
                });
            }
            SceneCall::MakeNamedVolume { id, name, params } => {
                debug!("Named volume '{id}' of type '{name}'");
                self.named_volumes.insert(id, (name, params));
            }
            SceneCall::MotionInstance {
                name,
                start,
                end,
                to_transform,
            } => {
                if !self.objects.contains_key(&name) {
                    warn!("Motion instance of unknown object '{name}'");
                    return;
                }
                if !self.named_coordinates.contains_key(&to_transform) {
                    warn!("Motion instance '{name}' ends in unknown transform '{to_transform}'");
                    return;
                }
                self.motion_instances.push(MotionInstance {
                    name,
                    start,
                    end,
                    to_transform,
                });
            }
            SceneCall::SetEpsilon { min, max } => self.epsilon = Some((min, max)),
        }
    }

    fn block(&mut self, block: BlockKind) {
        match block {
            BlockKind::Identity => self.ctm = Matrix4::identity(),
            BlockKind::WorldBegin => {
                if self.in_world {
                    warn!("luxWorldBegin inside world block ignored");
                    return;
                }
                self.in_world = true;
                self.named_coordinates.insert("camera".to_owned(), self.ctm);
                self.ctm = Matrix4::identity();
                self.named_coordinates.insert("world".to_owned(), self.ctm);
            }
            BlockKind::AttributeBegin => {
                self.attribute_stack.push((self.attributes.clone(), self.ctm));
            }
            BlockKind::AttributeEnd => match self.attribute_stack.pop() {
                Some((attributes, ctm)) => {
                    self.attributes = attributes;
                    self.ctm = ctm;
                }
                None => warn!("Unmatched luxAttributeEnd ignored"),
            },
            BlockKind::TransformBegin => self.transform_stack.push(self.ctm),
            BlockKind::TransformEnd => match self.transform_stack.pop() {
                Some(ctm) => self.ctm = ctm,
                None => warn!("Unmatched luxTransformEnd ignored"),
            },
            BlockKind::ReverseOrientation => {
                self.attributes.reverse_orientation = !self.attributes.reverse_orientation;
            }
            BlockKind::ObjectEnd => {
                if self.current_object.take().is_none() {
                    warn!("luxObjectEnd outside object block ignored");
                }
                // ObjectBegin opened an attribute block
                self.block(BlockKind::AttributeEnd);
            }
        }
    }

    fn named(&mut self, named: NamedKind, name: String) {
        match named {
            NamedKind::NamedMaterial => {
                if self.named_materials.contains_key(&name) {
                    self.attributes.material = Some(name);
                } else {
                    warn!("Named material '{name}' not defined");
                }
            }
            NamedKind::Exterior => self.attributes.exterior = Some(name),
            NamedKind::Interior => self.attributes.interior = Some(name),
            NamedKind::ObjectBegin => {
                self.block(BlockKind::AttributeBegin);
                if let Some(open) = &self.current_object {
                    warn!("luxObjectBegin '{name}' inside object '{open}'");
                }
                self.objects.insert(name.clone(), Vec::new());
                self.current_object = Some(name);
            }
            NamedKind::ObjectInstance => {
                if self.current_object.as_deref() == Some(name.as_str()) {
                    warn!("Object '{name}' instanced inside itself");
                } else if self.objects.contains_key(&name) {
                    self.instances.push((name, self.ctm));
                } else {
                    warn!("Instance of unknown object '{name}'");
                }
            }
            NamedKind::CoordinateSystem => {
                self.named_coordinates.insert(name, self.ctm);
            }
            NamedKind::CoordSysTransform => match self.named_coordinates.get(&name) {
                Some(m) => self.ctm = *m,
                None => warn!("Coordinate system '{name}' not defined"),
            },
        }
    }

    fn entity(&mut self, kind: EntityKind, type_name: String, params: ParamSet) {
        if kind.is_option() && self.in_world {
            warn!("{} inside world block ignored", kind.command().name());
            return;
        }
        if !kind.is_option() && !self.in_world && kind != EntityKind::MakeNamedMaterial {
            debug!("{} before luxWorldBegin", kind.command().name());
        }

        let index = self.entities.len();
        match kind {
            EntityKind::MakeNamedMaterial => {
                self.named_materials.insert(type_name.clone(), index);
            }
            EntityKind::Material => self.attributes.material = None,
            EntityKind::LightGroup => self.attributes.light_group = Some(type_name.clone()),
            _ => {}
        }

        self.entities.push(Entity {
            kind,
            type_name,
            params,
            transform: self.ctm,
            attributes: self.attributes.clone(),
        });

        match kind {
            EntityKind::AreaLightSource => self.attributes.area_light = Some(index),
            EntityKind::Shape | EntityKind::PortalShape => {
                if let Some(object) = &self.current_object {
                    if let Some(members) = self.objects.get_mut(object) {
                        members.push(index);
                    }
                }
            }
            _ => {}
        }
    }

    /// Freeze scene for rendering
    pub fn prepare(&self) -> Result<PreparedScene> {
        if !self.attribute_stack.is_empty() || !self.transform_stack.is_empty() {
            warn!("Scene finished with unbalanced attribute or transform blocks");
        }
        PreparedScene::from_scene(self)
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}
