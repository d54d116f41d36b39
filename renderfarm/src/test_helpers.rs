//! Module with helper functions
//! Saves repetition in unit and integration tests

use std::{net::SocketAddr, path::Path, time::Duration};

use crate::{
    config::WorkerConfig,
    scene::{EntityKind, SceneCall},
    server::Worker,
    wire::ParamSet,
};

/// Film parameters of a tiny image
pub fn small_film_params(width: i32, height: i32) -> ParamSet {
    let mut params = ParamSet::new();
    params.add_int("xresolution", width);
    params.add_int("yresolution", height);
    params
}

/// `luxFilm "fleximage"` of a tiny image
pub fn small_film(width: i32, height: i32) -> SceneCall {
    SceneCall::entity(EntityKind::Film, "fleximage", small_film_params(width, height))
}

/// Config for a worker on a free port, files under `work_dir`
pub fn test_config(work_dir: &Path) -> WorkerConfig {
    WorkerConfig::builder()
        .port(0)
        .threads(2)
        .work_dir(work_dir)
        .heartbeat_interval(Duration::from_millis(50))
        .build_unchecked()
}

/// Started worker and its localhost address
pub fn started_worker(config: WorkerConfig) -> (Worker, SocketAddr) {
    let mut worker = Worker::new(config);
    worker.start().unwrap();
    let port = worker.local_addr().unwrap().port();
    (worker, SocketAddr::from(([127, 0, 0, 1], port)))
}
