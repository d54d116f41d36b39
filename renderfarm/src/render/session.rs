use std::{
    sync::{
        atomic::{AtomicBool, AtomicU32, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use crossbeam::channel;
use log::{debug, error, info, warn};
use parking_lot::Mutex;

use super::{Integrator, RenderStatistics};
use crate::{
    error::{FarmError, Result},
    film::{FilmBuffer, Pixel},
    scene::{PreparedScene, Scene},
};

/// Everything a sampling thread needs
///
/// Cloned into every thread, the clones share film, counters and stop flag.
#[derive(Debug, Clone)]
struct SampleWorker {
    scene: Arc<PreparedScene>,
    film: Arc<Mutex<FilmBuffer>>,
    integrator: Arc<dyn Integrator>,
    stats: Arc<RenderStatistics>,
    stop: Arc<AtomicBool>,
    /// Next row to render, wraps around the image
    next_row: Arc<AtomicU32>,
}

impl SampleWorker {
    /// Render rows until stopped
    fn run(&self, seed: u64) {
        let mut rng = fastrand::Rng::with_seed(seed);
        let width = self.scene.width;
        let height = self.scene.height;
        let spp = self.scene.pixel_samples;
        let mut row = vec![Pixel::default(); width as usize];

        while !self.stop.load(Ordering::Relaxed) {
            let y = self.next_row.fetch_add(1, Ordering::Relaxed) % height;
            row.fill(Pixel::default());

            for (x, pixel) in row.iter_mut().enumerate() {
                if self.stop.load(Ordering::Relaxed) {
                    return;
                }
                // Stratified along x inside the pixel, jittered in both axes
                for s in 0..spp {
                    let u = (x as f32 + (s as f32 + rng.f32()) / spp as f32) / width as f32;
                    let v = (y as f32 + rng.f32()) / height as f32;
                    let rgb = self.integrator.radiance(&self.scene, u, v, &mut rng);
                    pixel.add(rgb, 1.0);
                }
            }

            let samples = width as u64 * spp as u64;
            self.film.lock().splat_row(y, &row, samples);
            self.stats.add_samples(samples);
        }
    }
}

/// Rendering of one session
///
/// Stopping (or dropping) joins every thread it started.
pub struct RenderSession {
    worker: SampleWorker,
    handles: Vec<JoinHandle<()>>,
}

impl RenderSession {
    /// Hand `scene` to a new engine thread and wait until it is ready
    ///
    /// The engine prepares the scene, allocates the film, signals once,
    /// then samples on its own thread.
    pub fn start(
        scene: Scene,
        integrator: Arc<dyn Integrator>,
        stats: Arc<RenderStatistics>,
    ) -> Result<RenderSession> {
        let (ready_send, ready_rec) = channel::bounded::<SampleWorker>(1);
        let stop = Arc::new(AtomicBool::new(false));

        let engine_stop = stop.clone();
        let engine = thread::Builder::new()
            .name("render-engine".into())
            .spawn(move || {
                let prepared = match scene.prepare() {
                    Ok(prepared) => prepared,
                    Err(e) => {
                        error!("Cannot prepare scene: {e}");
                        // ready_send dropped here, dispatcher wakes up with an error
                        return;
                    }
                };

                let film = FilmBuffer::new(prepared.width, prepared.height);
                stats.begin(prepared.width as u64 * prepared.height as u64);
                let worker = SampleWorker {
                    scene: Arc::new(prepared),
                    film: Arc::new(Mutex::new(film)),
                    integrator,
                    stats,
                    stop: engine_stop,
                    next_row: Arc::new(AtomicU32::new(0)),
                };

                if ready_send.send(worker.clone()).is_err() {
                    return;
                }
                drop(ready_send);
                worker.run(0);
            })?;

        match ready_rec.recv() {
            Ok(worker) => {
                info!(
                    "Rendering {}x{} started",
                    worker.scene.width, worker.scene.height
                );
                Ok(RenderSession {
                    worker,
                    handles: vec![engine],
                })
            }
            Err(_) => {
                stop.store(true, Ordering::Relaxed);
                if engine.join().is_err() {
                    warn!("Render engine panicked");
                }
                Err(FarmError::EngineFailed("scene preparation failed".into()))
            }
        }
    }

    /// Start `count` more sampling threads
    pub fn add_threads(&mut self, count: usize) {
        for _ in 0..count {
            let worker = self.worker.clone();
            let seed = self.handles.len() as u64;
            let spawned = thread::Builder::new()
                .name(format!("render-{seed}"))
                .spawn(move || worker.run(seed));
            match spawned {
                Ok(handle) => self.handles.push(handle),
                Err(e) => {
                    warn!("Cannot start render thread ({e})");
                    break;
                }
            }
        }
        debug!("{} render threads running", self.handles.len());
    }

    pub fn thread_count(&self) -> usize {
        self.handles.len()
    }

    pub fn film(&self) -> &Arc<Mutex<FilmBuffer>> {
        &self.worker.film
    }

    pub fn scene(&self) -> &PreparedScene {
        &self.worker.scene
    }

    /// Stop and join all threads, idempotent
    pub fn stop(&mut self) {
        self.worker.stop.store(true, Ordering::Relaxed);
        let count = self.handles.len();
        for handle in self.handles.drain(..) {
            if handle.join().is_err() {
                warn!("Render thread panicked");
            }
        }
        if count > 0 {
            self.worker.stats.end();
            info!("Rendering stopped, {count} threads joined");
        }
    }
}

impl Drop for RenderSession {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        render::{Integrator, PreviewIntegrator},
        scene::{EntityKind, PreparedScene, SceneCall},
        wire::ParamSet,
    };
    use std::time::{Duration, Instant};

    fn small_scene(width: i32, height: i32) -> Scene {
        let mut film = ParamSet::new();
        film.add_int("xresolution", width);
        film.add_int("yresolution", height);
        let mut scene = Scene::new();
        scene.apply(SceneCall::entity(EntityKind::Film, "fleximage", film));
        scene
    }

    fn wait_for_samples(film: &Mutex<FilmBuffer>) {
        let start = Instant::now();
        while film.lock().total_samples() == 0 {
            assert!(start.elapsed() < Duration::from_secs(10), "no samples");
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn renders_and_stops() {
        let stats = Arc::new(RenderStatistics::new());
        let mut session =
            RenderSession::start(small_scene(8, 4), Arc::new(PreviewIntegrator), stats.clone())
                .unwrap();
        assert_eq!(session.scene().width, 8);
        assert!(stats.scene_ready());

        session.add_threads(2);
        assert_eq!(session.thread_count(), 3);

        let film = session.film().clone();
        wait_for_samples(&film);

        session.stop();
        assert_eq!(session.thread_count(), 0);
        assert!(!stats.scene_ready());

        // nothing is added after stop
        let samples = film.lock().total_samples();
        thread::sleep(Duration::from_millis(10));
        assert_eq!(film.lock().total_samples(), samples);
        assert_eq!(stats.snapshot().total_samples, samples);
    }

    #[derive(Debug)]
    struct SlowIntegrator;

    impl Integrator for SlowIntegrator {
        fn radiance(&self, _: &PreparedScene, _: f32, _: f32, _: &mut fastrand::Rng) -> [f32; 3] {
            thread::sleep(Duration::from_millis(1));
            [1.0, 1.0, 1.0]
        }
    }

    #[test]
    fn stops_inside_long_row() {
        // 256 pixels * 64 samples, a row takes seconds
        let mut scene = small_scene(256, 1);
        let mut sampler = ParamSet::new();
        sampler.add_int("pixelsamples", 64);
        scene.apply(SceneCall::entity(EntityKind::Sampler, "random", sampler));

        let mut session = RenderSession::start(
            scene,
            Arc::new(SlowIntegrator),
            Arc::new(RenderStatistics::new()),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(20));

        let start = Instant::now();
        session.stop();
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(session.film().lock().total_samples(), 0);
    }

    #[test]
    fn failed_preparation_reported() {
        let res = RenderSession::start(
            small_scene(-1, 4),
            Arc::new(PreviewIntegrator),
            Arc::new(RenderStatistics::new()),
        );
        assert!(matches!(res, Err(FarmError::EngineFailed(_))));
    }
}
