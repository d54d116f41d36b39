use std::{
    io::{BufRead, Write},
    mem,
    sync::{atomic::Ordering, Arc},
};

use log::{debug, error, info, warn};

use super::Shared;
use crate::{
    command::{DispatchTable, Lookup},
    config::WorkerConfig,
    error::{FarmError, Result},
    film::{send_empty, FilmTransmitter},
    protocol::Request,
    relay::TempArena,
    render::{Heartbeat, RenderSession, RenderStatistics},
    scene::{EntityKind, Scene, SceneCall},
    session::ConnectReply,
    wire::{read_line, ParamSet},
};

/// Film types a worker can render
pub const SERVER_FILM_TYPES: [&str; 2] = ["fleximage", "multiimage"];

/// Film outputs a worker never writes itself
pub const FORCED_OFF_FILM_PARAMS: [&str; 7] = [
    "write_exr",
    "write_exr_ZBuf",
    "write_png",
    "write_png_ZBuf",
    "write_tga",
    "write_tga_ZBuf",
    "write_resume_flm",
];

/// Film parameters as used on a worker
///
/// Image outputs are switched off, the master writes the merged image.
pub fn server_film_params(type_name: &str, mut params: ParamSet) -> Result<ParamSet> {
    if !SERVER_FILM_TYPES.contains(&type_name) {
        return Err(FarmError::UnsupportedFilm(type_name.to_owned()));
    }
    for name in FORCED_OFF_FILM_PARAMS {
        params.add_bool(name, false);
    }
    Ok(params)
}

/// Per connection command loop and everything a session owns
///
/// Lives on the dispatch thread only.
pub(super) struct Dispatcher {
    shared: Arc<Shared>,
    config: WorkerConfig,
    port: u16,
    table: DispatchTable,
    scene: Scene,
    render: Option<RenderSession>,
    heartbeat: Option<Heartbeat>,
    stats: Arc<RenderStatistics>,
    arena: Option<TempArena>,
    transmitter: FilmTransmitter,
}

impl Dispatcher {
    pub(super) fn new(shared: Arc<Shared>, config: WorkerConfig, port: u16) -> Result<Dispatcher> {
        let table = DispatchTable::new()?;
        let transmitter =
            FilmTransmitter::new(config.write_film, &config.work_dir, &format!("{port:05}"));
        Ok(Dispatcher {
            shared,
            config,
            port,
            table,
            scene: Scene::new(),
            render: None,
            heartbeat: None,
            stats: Arc::new(RenderStatistics::new()),
            arena: None,
            transmitter,
        })
    }

    /// Process commands until the peer closes or the worker stops
    ///
    /// Only errors that leave the stream unusable are returned.
    pub(super) fn handle_connection<R: BufRead, W: Write>(
        &mut self,
        reader: &mut R,
        writer: &mut W,
    ) -> Result<()> {
        loop {
            let line = match read_line(reader) {
                Ok(line) => line,
                Err(FarmError::ConnectionClosed) => return Ok(()),
                Err(e) if e.is_fatal_for_connection() => return Err(e),
                Err(e) => {
                    error!("SEVERE: Unreadable command ({e}), ignoring");
                    continue;
                }
            };
            if self.shared.stopping.load(Ordering::Acquire) {
                return Ok(());
            }

            let kind = match self.table.lookup(&line) {
                Lookup::Known(kind) => kind,
                Lookup::Blank => continue,
                Lookup::Unknown(name) => {
                    error!("SEVERE: Unknown command '{name}', ignoring");
                    continue;
                }
            };
            debug!("Command {}", kind.name());

            let result = match Request::read(kind, reader, self.arena.as_mut()) {
                Ok(request) => self.execute(request, writer),
                Err(e) => Err(e),
            };
            writer.flush()?;

            if let Err(e) = result {
                if e.is_fatal_for_connection() {
                    return Err(e);
                }
                error!("{}: {e}", kind.name());
            }
        }
    }

    fn execute<W: Write>(&mut self, request: Request, writer: &mut W) -> Result<()> {
        match request {
            Request::Connect => self.connect(writer),
            Request::Disconnect(sid) => {
                self.disconnect(&sid);
                Ok(())
            }
            Request::GetFilm(sid) => self.get_film(&sid, writer),
            Request::Init => {
                info!("luxInit: worker is already initialized");
                Ok(())
            }
            Request::WorldEnd => self.world_end(),
            Request::Scene(call) => self.scene_call(call),
        }
    }

    fn connect<W: Write>(&mut self, writer: &mut W) -> Result<()> {
        let reply = self.shared.table.lock().connect();
        match reply {
            ConnectReply::Accepted(sid) => {
                // Leftovers of a session that never disconnected
                self.teardown_session();
                self.arena = match TempArena::new(&self.config.work_dir, self.port) {
                    Ok(arena) => Some(arena),
                    Err(e) => {
                        warn!("Cannot create temporary file directory ({e}), files will be dropped");
                        None
                    }
                };
                write!(writer, "OK\n{sid}\n")?;
            }
            ConnectReply::Busy => writer.write_all(b"BUSY\n")?,
        }
        Ok(())
    }

    fn disconnect(&mut self, sid: &str) {
        if !self.shared.table.lock().validate(sid) {
            warn!("Refused disconnect for session '{sid}'");
            return;
        }
        self.teardown_session();
        self.shared.table.lock().release(sid);
    }

    fn get_film<W: Write>(&mut self, sid: &str, writer: &mut W) -> Result<()> {
        if !self.shared.table.lock().validate(sid) {
            warn!("Refused film request for session '{sid}'");
            return send_empty(writer);
        }
        match &self.render {
            Some(render) => self.transmitter.transmit(writer, render.film()),
            None => {
                warn!("Film requested before luxWorldEnd");
                send_empty(writer)
            }
        }
    }

    fn world_end(&mut self) -> Result<()> {
        if let Some(mut previous) = self.render.take() {
            warn!("luxWorldEnd while rendering, restarting");
            previous.stop();
        }

        let scene = mem::take(&mut self.scene);
        let mut render =
            RenderSession::start(scene, self.config.integrator.clone(), self.stats.clone())?;

        if self.heartbeat.is_none() {
            self.heartbeat = Some(Heartbeat::start(
                self.stats.clone(),
                self.config.heartbeat_interval,
            ));
        }
        render.add_threads(self.config.threads.saturating_sub(1));
        self.render = Some(render);
        Ok(())
    }

    fn scene_call(&mut self, call: SceneCall) -> Result<()> {
        let call = match call {
            SceneCall::Entity {
                kind: EntityKind::Film,
                type_name,
                params,
            } => {
                let params = server_film_params(&type_name, params)?;
                SceneCall::Entity {
                    kind: EntityKind::Film,
                    type_name,
                    params,
                }
            }
            call => call,
        };

        if self.shared.table.lock().current().is_none() {
            debug!("{} outside of a session", call.command().name());
        }
        self.scene.apply(call);
        Ok(())
    }

    /// Stop rendering, remove received files, forget the scene
    fn teardown_session(&mut self) {
        if let Some(mut render) = self.render.take() {
            render.stop();
        }
        if let Some(arena) = self.arena.take() {
            if let Err(e) = arena.close() {
                warn!("Cannot remove temporary files ({e})");
            }
        }
        self.scene = Scene::new();
    }

    /// Scene built so far
    #[cfg(test)]
    pub(super) fn scene(&self) -> &Scene {
        &self.scene
    }

    pub(super) fn shutdown(&mut self) {
        self.teardown_session();
        if let Some(mut heartbeat) = self.heartbeat.take() {
            heartbeat.stop();
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{session::SessionTable, wire::ParamKind};
    use std::io::BufReader;

    fn dispatcher(work_dir: &std::path::Path) -> Dispatcher {
        let mut table = SessionTable::new();
        table.start();
        let shared = Arc::new(Shared::new(table));
        let config = WorkerConfig::builder()
            .threads(1)
            .work_dir(work_dir)
            .build()
            .unwrap();
        Dispatcher::new(shared, config, 18018).unwrap()
    }

    fn run(dispatcher: &mut Dispatcher, input: &[u8]) -> Vec<u8> {
        let mut reader = BufReader::new(input);
        let mut out = Vec::new();
        dispatcher.handle_connection(&mut reader, &mut out).unwrap();
        out
    }

    fn film_command(type_name: &str, params: &ParamSet) -> Vec<u8> {
        let mut input = format!("luxFilm\n{type_name}\n").into_bytes();
        params.write_to(&mut input).unwrap();
        input
    }

    #[test]
    fn film_override() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = dispatcher(dir.path());

        let mut params = ParamSet::new();
        params.add_bool("write_png", true);
        params.add_bool("write_exr", true);
        params.add_int("xresolution", 16);
        run(&mut dispatcher, &film_command("fleximage", &params));

        let film = dispatcher.scene().last_of(EntityKind::Film).unwrap();
        for name in FORCED_OFF_FILM_PARAMS {
            assert!(!film.params.find_one_bool(name, true), "{name}");
        }
        assert_eq!(film.params.find_one_int("xresolution", 0), 16);
    }

    #[test]
    fn unsupported_film_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = dispatcher(dir.path());
        run(&mut dispatcher, &film_command("hdrfilm", &ParamSet::new()));
        assert!(dispatcher.scene().last_of(EntityKind::Film).is_none());
    }

    #[test]
    fn unknown_and_blank_lines_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = dispatcher(dir.path());
        let out = run(&mut dispatcher, b"\n  \nluxFoo\nluxTranslate\n1 2 3\n");
        assert!(out.is_empty());
        assert_eq!(dispatcher.scene().ctm()[(0, 3)], 1.0);
    }

    #[test]
    fn malformed_arguments_keep_connection() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = dispatcher(dir.path());
        run(&mut dispatcher, b"luxScale\n1 2\nluxTranslate\n0 0 7\n");
        assert_eq!(dispatcher.scene().ctm()[(2, 3)], 7.0);
    }

    #[test]
    fn non_utf8_argument_keeps_connection() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = dispatcher(dir.path());
        run(
            &mut dispatcher,
            b"luxCoordinateSystem\ncam\xe9ra\nluxTranslate\n0 0 7\n",
        );
        assert_eq!(dispatcher.scene().ctm()[(2, 3)], 7.0);
    }

    #[test]
    fn non_utf8_command_and_type_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = dispatcher(dir.path());

        let mut input = b"lux\xffShape\nluxShape\nsph\xe8re\n".to_vec();
        ParamSet::new().write_to(&mut input).unwrap();
        input.extend_from_slice(b"luxTranslate\n0 0 3\n");
        run(&mut dispatcher, &input);

        assert_eq!(dispatcher.scene().ctm()[(2, 3)], 3.0);
        assert_eq!(dispatcher.scene().entities_of(EntityKind::Shape).count(), 0);
    }

    #[test]
    fn overlong_line_ends_connection() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = dispatcher(dir.path());
        let input = vec![b'x'; crate::wire::MAX_LINE_LEN + 1];
        let mut reader = BufReader::new(&input[..]);
        let res = dispatcher.handle_connection(&mut reader, &mut Vec::new());
        assert!(matches!(res, Err(FarmError::LineTooLong(_))));
    }

    #[test]
    fn connect_then_busy() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = dispatcher(dir.path());
        let out = run(&mut dispatcher, b"ServerConnect\nServerConnect\n");
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "OK");
        assert_eq!(lines[1].len(), 19);
        assert_eq!(lines[2], "BUSY");
        assert!(dispatcher.arena.is_some());
    }

    #[test]
    fn film_refused_without_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = dispatcher(dir.path());
        let out = run(&mut dispatcher, b"luxGetFilm\n0000_0000_0000_0000\n");
        assert_eq!(out, [0, 0, 0, 0]);
    }

    #[test]
    fn film_types() {
        assert!(server_film_params("multiimage", ParamSet::new()).is_ok());
        let params = server_film_params("fleximage", ParamSet::new()).unwrap();
        assert_eq!(params.len(), FORCED_OFF_FILM_PARAMS.len());
        assert!(params
            .iter()
            .all(|item| item.value.kind() == ParamKind::Bool));
        assert!(matches!(
            server_film_params("image", ParamSet::new()),
            Err(FarmError::UnsupportedFilm(_))
        ));
    }

    #[test]
    fn world_end_renders() {
        let dir = tempfile::tempdir().unwrap();
        let mut dispatcher = dispatcher(dir.path());
        let mut params = ParamSet::new();
        params.add_int("xresolution", 4);
        params.add_int("yresolution", 4);
        let mut input = film_command("fleximage", &params);
        input.extend_from_slice(b"luxWorldBegin\nluxWorldEnd\n");
        run(&mut dispatcher, &input);

        assert!(dispatcher.render.is_some());
        assert!(dispatcher.heartbeat.is_some());
        dispatcher.shutdown();
        assert!(dispatcher.render.is_none());
    }
}
