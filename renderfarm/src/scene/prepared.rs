use log::{debug, info, warn};
use nalgebra::{point, vector, Matrix4, Point3, Vector2, Vector3};

use super::{EntityKind, Scene};
use crate::{
    error::{FarmError, Result},
    wire::ParamSet,
};

/// Film resolution used when the film does not name one
pub const DEFAULT_RESOLUTION: (u32, u32) = (800, 600);

/// Largest film a worker allocates, 16 bytes per pixel
pub const MAX_FILM_PIXELS: u64 = 1 << 26;

/// Upper bound for `pixelsamples`
pub const MAX_PIXEL_SAMPLES: u32 = 4096;

const DEFAULT_FOV: f32 = 90.0;

/// Pinhole camera
///
/// Rays start at `position`, pixel `(0, 0)` lies at `dir_00`.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneCamera {
    position: Point3<f32>,
    dir_00: Vector3<f32>, // Vector from camera point to image corner [0,0]
    du: Vector3<f32>,     // Image plane width
    dv: Vector3<f32>,     // Image plane height
}

impl SceneCamera {
    /// Camera at `position` looking along `direction`, `fov` in degrees
    pub fn new(
        position: Point3<f32>,
        direction: Vector3<f32>,
        up: Vector3<f32>,
        fov: f32,
        aspect: f32,
    ) -> SceneCamera {
        let direction = direction.normalize();
        let height = 2.0 * f32::tan(f32::to_radians(0.5 * fov));
        let img_plane_size = Vector2::new(height * aspect, height);

        let right = match direction.cross(&up).try_normalize(f32::EPSILON) {
            Some(right) => right,
            None => direction.cross(&vector![1.0, 0.0, 0.0]).normalize(),
        };
        let du = right * img_plane_size.x;
        let dv = right.cross(&direction) * img_plane_size.y;
        let dir_00 = direction - 0.5 * du - 0.5 * dv;
        SceneCamera {
            position,
            dir_00,
            du,
            dv,
        }
    }

    /// Camera from the world-to-camera transform recorded with `luxCamera`
    fn from_transform(world_to_camera: &Matrix4<f32>, fov: f32, aspect: f32) -> SceneCamera {
        let camera_to_world = world_to_camera
            .try_inverse()
            .unwrap_or_else(Matrix4::identity);
        let position = camera_to_world.transform_point(&point![0.0, 0.0, 0.0]);
        let direction = camera_to_world.transform_vector(&vector![0.0, 0.0, 1.0]);
        let up = camera_to_world.transform_vector(&vector![0.0, 1.0, 0.0]);
        SceneCamera::new(position, direction, up, fov, aspect)
    }

    pub fn position(&self) -> &Point3<f32> {
        &self.position
    }

    /// Normalized direction through image coordinates `u, v` in `[0, 1]`
    pub fn direction(&self, u: f32, v: f32) -> Vector3<f32> {
        (self.dir_00 + self.du * u + self.dv * v).normalize()
    }
}

/// Scene frozen for rendering
#[derive(Debug, Clone)]
pub struct PreparedScene {
    pub width: u32,
    pub height: u32,
    pub film_type: String,
    pub film_params: ParamSet,
    pub camera: SceneCamera,
    /// Samples per pixel and pass, from the sampler
    pub pixel_samples: u32,
    /// Emitted color of every light, area lights included
    pub lights: Vec<[f32; 3]>,
    pub shape_count: usize,
    pub epsilon: Option<(f32, f32)>,
}

impl PreparedScene {
    pub(super) fn from_scene(scene: &Scene) -> Result<PreparedScene> {
        let film = scene.last_of(EntityKind::Film);
        let (film_type, film_params) = match film {
            Some(film) => (film.type_name.clone(), film.params.clone()),
            None => ("fleximage".to_owned(), ParamSet::new()),
        };

        let width = film_params.find_one_int("xresolution", DEFAULT_RESOLUTION.0 as i32);
        let height = film_params.find_one_int("yresolution", DEFAULT_RESOLUTION.1 as i32);
        if width <= 0 || height <= 0 {
            return Err(FarmError::EngineFailed(format!(
                "film resolution {width}x{height}"
            )));
        }
        match (width as u64).checked_mul(height as u64) {
            Some(pixels) if pixels <= MAX_FILM_PIXELS => {}
            _ => {
                return Err(FarmError::EngineFailed(format!(
                    "film resolution {width}x{height} above {MAX_FILM_PIXELS} pixels"
                )))
            }
        }
        let aspect = width as f32 / height as f32;

        let camera = match scene.last_of(EntityKind::Camera) {
            Some(camera) => {
                let fov = camera.params.find_one_float("fov", DEFAULT_FOV);
                SceneCamera::from_transform(&camera.transform, fov, aspect)
            }
            None => SceneCamera::new(
                point![0.0, 0.0, 0.0],
                vector![0.0, 0.0, 1.0],
                vector![0.0, 1.0, 0.0],
                DEFAULT_FOV,
                aspect,
            ),
        };

        let requested = scene
            .last_of(EntityKind::Sampler)
            .map(|sampler| sampler.params.find_one_int("pixelsamples", 4))
            .unwrap_or(4)
            .max(1) as u32;
        let pixel_samples = requested.min(MAX_PIXEL_SAMPLES);
        if pixel_samples < requested {
            warn!("pixelsamples {requested} clamped to {MAX_PIXEL_SAMPLES}");
        }

        let lights: Vec<[f32; 3]> = scene
            .entities()
            .iter()
            .filter(|e| matches!(e.kind, EntityKind::LightSource | EntityKind::AreaLightSource))
            .map(|light| {
                let color = light.params.find_one_color("L", [1.0, 1.0, 1.0]);
                let gain = light.params.find_one_float("gain", 1.0);
                [color[0] * gain, color[1] * gain, color[2] * gain]
            })
            .collect();

        let shape_count = scene.entities_of(EntityKind::Shape).count();

        info!(
            "Scene prepared: {width}x{height} {film_type}, {} lights, {shape_count} shapes",
            lights.len()
        );
        debug!("{} textures, {} instances", scene.textures().len(), scene.instance_count());

        Ok(PreparedScene {
            width: width as u32,
            height: height as u32,
            film_type,
            film_params,
            camera,
            pixel_samples,
            lights,
            shape_count,
            epsilon: scene.epsilon(),
        })
    }
}
