//! Master side of the protocol
//!
//! [`MasterConnection`] drives one worker, [`RenderFarm`] broadcasts a scene
//! to several workers and merges their films.

use std::{
    io::{BufReader, BufWriter, Write},
    net::{TcpStream, ToSocketAddrs},
};

use log::{debug, info, warn};

use crate::{
    error::{FarmError, Result},
    film::FilmSnapshot,
    protocol::write_call,
    scene::SceneCall,
    wire::{read_block, read_line},
};

/// Connection to one worker
pub struct MasterConnection {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    session: Option<String>,
    peer: String,
}

impl MasterConnection {
    /// Open TCP connection, no session yet
    pub fn open<A: ToSocketAddrs>(addr: A) -> Result<MasterConnection> {
        let stream = TcpStream::connect(addr)?;
        stream.set_nodelay(true)?;
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "worker".into());
        Ok(MasterConnection {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
            session: None,
            peer,
        })
    }

    /// Open connection and start a session
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<MasterConnection> {
        let mut conn = MasterConnection::open(addr)?;
        conn.connect_session()?;
        Ok(conn)
    }

    /// Reuse a session opened by an earlier connection
    pub fn with_session<A: ToSocketAddrs>(addr: A, session: &str) -> Result<MasterConnection> {
        let mut conn = MasterConnection::open(addr)?;
        conn.session = Some(session.to_owned());
        Ok(conn)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session.as_deref()
    }

    /// `ServerConnect` handshake
    pub fn connect_session(&mut self) -> Result<&str> {
        self.send_raw_line("ServerConnect")?;
        let reply = read_line(&mut self.reader)?;
        match reply.as_str() {
            "OK" => {
                let sid = read_line(&mut self.reader)?;
                info!("Session {sid} on {}", self.peer);
                Ok(self.session.insert(sid).as_str())
            }
            "BUSY" => Err(FarmError::Busy),
            _ => Err(FarmError::Handshake(reply)),
        }
    }

    /// Send one scene call, attached files included
    pub fn send(&mut self, call: &SceneCall) -> Result<()> {
        debug!("Sending {} to {}", call.command().name(), self.peer);
        write_call(&mut self.writer, call)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Send a bare line, for commands without a [`SceneCall`]
    pub fn send_raw_line(&mut self, line: &str) -> Result<()> {
        writeln!(self.writer, "{line}")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Start rendering on the worker
    pub fn world_end(&mut self) -> Result<()> {
        self.send_raw_line("luxWorldEnd")
    }

    /// Film of the own session, `None` when the worker refused
    pub fn get_film(&mut self) -> Result<Option<FilmSnapshot>> {
        let sid = self.session.clone().ok_or(FarmError::NoSession)?;
        self.request_film(&sid)
    }

    /// Film of session `sid`
    pub fn request_film(&mut self, sid: &str) -> Result<Option<FilmSnapshot>> {
        writeln!(self.writer, "luxGetFilm\n{sid}")?;
        self.writer.flush()?;
        let payload = read_block(&mut self.reader)?;
        if payload.is_empty() {
            return Ok(None);
        }
        FilmSnapshot::decode(&payload).map(Some)
    }

    /// End the own session
    pub fn disconnect(&mut self) -> Result<()> {
        let sid = self.session.take().ok_or(FarmError::NoSession)?;
        self.disconnect_as(&sid)
    }

    /// `ServerDisconnect` with any session id
    pub fn disconnect_as(&mut self, sid: &str) -> Result<()> {
        writeln!(self.writer, "ServerDisconnect\n{sid}")?;
        self.writer.flush()?;
        Ok(())
    }
}

/// Several workers rendering the same scene
pub struct RenderFarm {
    workers: Vec<MasterConnection>,
    film: Option<FilmSnapshot>,
}

impl RenderFarm {
    pub fn new() -> RenderFarm {
        RenderFarm {
            workers: Vec::new(),
            film: None,
        }
    }

    /// Connect to a worker, busy workers are skipped with a warning
    pub fn add_worker<A: ToSocketAddrs>(&mut self, addr: A) -> Result<bool> {
        match MasterConnection::connect(addr) {
            Ok(conn) => {
                self.workers.push(conn);
                Ok(true)
            }
            Err(FarmError::Busy) => {
                warn!("Worker busy, skipped");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Send `call` to every worker
    pub fn broadcast(&mut self, call: &SceneCall) -> Result<()> {
        for worker in &mut self.workers {
            worker.send(call)?;
        }
        Ok(())
    }

    pub fn world_end(&mut self) -> Result<()> {
        for worker in &mut self.workers {
            worker.world_end()?;
        }
        Ok(())
    }

    /// Pull films from all workers and merge them
    ///
    /// Each pull replaces the previous result, worker films are cumulative.
    pub fn update_film(&mut self) -> Result<Option<&FilmSnapshot>> {
        let mut merged: Option<FilmSnapshot> = None;
        for worker in &mut self.workers {
            let film = match worker.get_film()? {
                Some(film) => film,
                None => {
                    warn!("No film from {}", worker.peer);
                    continue;
                }
            };
            match merged.as_mut() {
                Some(acc) => acc.merge(&film)?,
                None => merged = Some(film),
            }
        }
        if merged.is_some() {
            self.film = merged;
        }
        Ok(self.film.as_ref())
    }

    pub fn film(&self) -> Option<&FilmSnapshot> {
        self.film.as_ref()
    }

    /// End every session, continue on errors
    pub fn disconnect_all(&mut self) {
        for mut worker in self.workers.drain(..) {
            if let Err(e) = worker.disconnect() {
                warn!("Cannot disconnect {}: {e}", worker.peer);
            }
        }
    }
}

impl Default for RenderFarm {
    fn default() -> Self {
        Self::new()
    }
}
