use std::{
    fs,
    path::{Path, PathBuf},
    thread,
    time::{Duration, Instant},
};

use renderfarm::{
    film::FilmSnapshot,
    master::MasterConnection,
    scene::{BlockKind, EntityKind, SceneCall},
    session::WorkerState,
    test_helpers,
    wire::ParamSet,
    FarmError, RenderFarm, Worker, WorkerConfig,
};

const WRONG_SID: &str = "0000_0000_0000_0000";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Connected master with a small scene rendering
fn rendering_session(addr: std::net::SocketAddr) -> MasterConnection {
    let mut master = MasterConnection::connect(addr).unwrap();
    master.send(&test_helpers::small_film(16, 8)).unwrap();
    master.send(&SceneCall::Block(BlockKind::WorldBegin)).unwrap();
    master
        .send(&SceneCall::entity(EntityKind::LightSource, "point", ParamSet::new()))
        .unwrap();
    master.world_end().unwrap();
    master
}

/// Poll until the film holds samples
fn wait_for_film(master: &mut MasterConnection) -> FilmSnapshot {
    let start = Instant::now();
    loop {
        if let Some(film) = master.get_film().unwrap() {
            if film.total_samples > 0 {
                return film;
            }
        }
        assert!(start.elapsed() < Duration::from_secs(20), "film stays empty");
        thread::sleep(Duration::from_millis(20));
    }
}

/// Temporary file directories the worker created in `work_dir`
fn arena_dirs(work_dir: &Path) -> Vec<PathBuf> {
    fs::read_dir(work_dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .map_or(false, |n| n.starts_with("renderfarm_"))
        })
        .collect()
}

#[test]
fn end_to_end_session() {
    init_logging();
    let work = tempfile::tempdir().unwrap();
    let (mut worker, addr) = test_helpers::started_worker(test_helpers::test_config(work.path()));
    assert_eq!(worker.state(), WorkerState::Ready);

    let mut master = rendering_session(addr);
    let sid = master.session_id().unwrap().to_owned();
    assert_eq!(sid.len(), 19);
    assert_eq!(worker.state(), WorkerState::Busy);
    assert_eq!(worker.session_id().as_deref(), Some(sid.as_str()));

    let film = wait_for_film(&mut master);
    assert_eq!((film.width, film.height), (16, 8));
    assert!(film.to_rgb8().iter().any(|c| *c > 0));

    master.disconnect().unwrap();
    // processed in order, so the session is gone already
    assert!(master.request_film(&sid).unwrap().is_none());
    assert_eq!(worker.state(), WorkerState::Ready);

    worker.stop();
    assert_eq!(worker.state(), WorkerState::Stopped);
}

#[test]
fn second_master_gets_busy() {
    init_logging();
    let work = tempfile::tempdir().unwrap();
    let (worker, addr) = test_helpers::started_worker(test_helpers::test_config(work.path()));

    let first = MasterConnection::connect(addr).unwrap();
    let sid = first.session_id().unwrap().to_owned();
    drop(first);

    let res = MasterConnection::connect(addr);
    assert!(matches!(res, Err(FarmError::Busy)));
    assert_eq!(worker.session_id().as_deref(), Some(sid.as_str()));

    // the session outlives its connection
    let mut again = MasterConnection::with_session(addr, &sid).unwrap();
    again.disconnect().unwrap();
    // one connection at a time, the next one is served after this closes
    drop(again);
    let mut third = MasterConnection::connect(addr).unwrap();
    assert_ne!(third.session_id(), Some(sid.as_str()));
    third.disconnect().unwrap();
}

#[test]
fn wrong_session_id_changes_nothing() {
    init_logging();
    let work = tempfile::tempdir().unwrap();
    let (worker, addr) = test_helpers::started_worker(test_helpers::test_config(work.path()));

    let mut master = rendering_session(addr);
    wait_for_film(&mut master);

    assert!(master.request_film(WRONG_SID).unwrap().is_none());
    master.disconnect_as(WRONG_SID).unwrap();

    assert_eq!(worker.state(), WorkerState::Busy);
    assert!(master.get_film().unwrap().is_some());
    master.disconnect().unwrap();
}

#[test]
fn second_disconnect_is_noop() {
    init_logging();
    let work = tempfile::tempdir().unwrap();
    let (worker, addr) = test_helpers::started_worker(test_helpers::test_config(work.path()));

    let mut master = MasterConnection::connect(addr).unwrap();
    let sid = master.session_id().unwrap().to_owned();
    master.disconnect().unwrap();
    master.disconnect_as(&sid).unwrap();
    // round trip so both disconnects were processed
    assert!(master.request_film(&sid).unwrap().is_none());
    assert_eq!(worker.state(), WorkerState::Ready);

    master.connect_session().unwrap();
    assert_eq!(worker.state(), WorkerState::Busy);
}

#[test]
fn files_relayed_and_removed() {
    init_logging();
    let work = tempfile::tempdir().unwrap();
    let assets = tempfile::tempdir().unwrap();
    let texture = assets.path().join("wood.png");
    fs::write(&texture, b"not really a png").unwrap();

    let (_worker, addr) = test_helpers::started_worker(test_helpers::test_config(work.path()));
    let mut master = MasterConnection::connect(addr).unwrap();
    let sid = master.session_id().unwrap().to_owned();

    let mut params = ParamSet::new();
    params.add_string("filename", &texture.to_string_lossy());
    master
        .send(&SceneCall::Texture {
            name: "wood".into(),
            type_name: "color".into(),
            texture_type: "imagemap".into(),
            params,
        })
        .unwrap();

    // missing file travels as an empty frame and creates nothing
    let mut params = ParamSet::new();
    params.add_string("mapname", "/nowhere/sky.exr");
    master
        .send(&SceneCall::entity(EntityKind::LightSource, "infinite", params))
        .unwrap();
    // any answered request orders the worker after the sends
    assert!(master.get_film().unwrap().is_none());

    let dirs = arena_dirs(work.path());
    assert_eq!(dirs.len(), 1);
    let files: Vec<PathBuf> = fs::read_dir(&dirs[0])
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(files.len(), 1);
    let port = addr.port();
    assert_eq!(
        files[0].file_name().unwrap().to_str().unwrap(),
        format!("{port:05}_00000001.png")
    );
    assert_eq!(fs::read(&files[0]).unwrap(), b"not really a png");

    master.disconnect().unwrap();
    assert!(master.request_film(&sid).unwrap().is_none());
    assert!(arena_dirs(work.path()).is_empty());
}

#[test]
fn film_written_to_resume_file() {
    init_logging();
    let work = tempfile::tempdir().unwrap();
    let mut config = test_helpers::test_config(work.path());
    config.write_film = true;
    let (_worker, addr) = test_helpers::started_worker(config);

    let mut master = rendering_session(addr);
    let film = wait_for_film(&mut master);

    let resume = work
        .path()
        .join(format!("server_resume_{:05}.flm", addr.port()));
    let on_disk = FilmSnapshot::decode(&fs::read(resume).unwrap()).unwrap();
    assert_eq!(on_disk, film);
    master.disconnect().unwrap();
}

#[test]
fn farm_merges_workers() {
    init_logging();
    let work = tempfile::tempdir().unwrap();
    let (_a, addr_a) = test_helpers::started_worker(test_helpers::test_config(work.path()));
    let (_b, addr_b) = test_helpers::started_worker(test_helpers::test_config(work.path()));

    let mut farm = RenderFarm::new();
    assert!(farm.add_worker(addr_a).unwrap());
    assert!(farm.add_worker(addr_b).unwrap());
    assert_eq!(farm.worker_count(), 2);

    farm.broadcast(&test_helpers::small_film(8, 8)).unwrap();
    farm.broadcast(&SceneCall::Block(BlockKind::WorldBegin)).unwrap();
    farm.world_end().unwrap();

    let start = Instant::now();
    loop {
        thread::sleep(Duration::from_millis(20));
        let film = farm.update_film().unwrap();
        if let Some(film) = film {
            if film.total_samples > 0 {
                assert_eq!((film.width, film.height), (8, 8));
                break;
            }
        }
        assert!(start.elapsed() < Duration::from_secs(20), "no merged film");
    }
    farm.disconnect_all();
    assert_eq!(farm.worker_count(), 0);
}

#[test]
fn stop_interrupts_connection() {
    init_logging();
    let work = tempfile::tempdir().unwrap();
    let config = WorkerConfig::builder()
        .port(0)
        .threads(1)
        .work_dir(work.path())
        .build()
        .unwrap();
    let mut worker = Worker::new(config);
    worker.start().unwrap();
    // second start is ignored
    worker.start().unwrap();
    let addr = ([127, 0, 0, 1], worker.local_addr().unwrap().port());

    let mut master = rendering_session(addr.into());
    wait_for_film(&mut master);

    worker.stop();
    assert_eq!(worker.state(), WorkerState::Stopped);
    assert!(arena_dirs(work.path()).is_empty());
    assert!(master.get_film().is_err());

    // stopping twice is harmless
    worker.stop();
}
