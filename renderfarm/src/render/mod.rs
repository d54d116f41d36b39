//! Local rendering
//!
//! [`RenderSession`] owns the engine thread and the sampling threads of one
//! session, [`Heartbeat`] reports progress for the lifetime of the worker.
//! The actual light transport is behind the [`Integrator`] trait.

mod heartbeat;
mod session;
mod stats;

pub use heartbeat::{format_elapsed, progress_line, Heartbeat, HEARTBEAT_INTERVAL};
pub use session::RenderSession;
pub use stats::{RenderStatistics, StatsSnapshot};

use std::fmt;

use crate::scene::PreparedScene;

/// Estimates radiance arriving through one image point
///
/// Called concurrently from every sampling thread.
pub trait Integrator: Send + Sync + fmt::Debug {
    /// `u`, `v` are image coordinates in `[0, 1)`
    fn radiance(&self, scene: &PreparedScene, u: f32, v: f32, rng: &mut fastrand::Rng) -> [f32; 3];
}

/// Sky gradient lit by the scene lights
///
/// Cheap stand-in producing a plausible, deterministic-on-average image.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreviewIntegrator;

impl Integrator for PreviewIntegrator {
    fn radiance(&self, scene: &PreparedScene, u: f32, v: f32, rng: &mut fastrand::Rng) -> [f32; 3] {
        let dir = scene.camera.direction(u, v);
        let t = 0.5 * (1.0 - dir.y);

        let mut light = [0.0f32; 3];
        for l in &scene.lights {
            for i in 0..3 {
                light[i] += l[i];
            }
        }
        if scene.lights.is_empty() {
            light = [1.0; 3];
        }

        let sky = [0.5 + 0.5 * t, 0.7 + 0.3 * t, 1.0];
        let noise = 0.95 + 0.1 * rng.f32();
        [
            sky[0] * light[0] * noise,
            sky[1] * light[1] * noise,
            sky[2] * light[2] * noise,
        ]
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scene::Scene;

    #[test]
    fn preview_is_positive() {
        let scene = Scene::new().prepare().unwrap();
        let mut rng = fastrand::Rng::with_seed(3);
        for (u, v) in [(0.0, 0.0), (0.5, 0.5), (0.99, 0.99)] {
            let rgb = PreviewIntegrator.radiance(&scene, u, v, &mut rng);
            assert!(rgb.iter().all(|c| *c > 0.0 && c.is_finite()));
        }
    }
}
