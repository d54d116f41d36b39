//! Worker process side
//!
//! A [`Worker`] listens on one TCP port and serves one connection at a
//! time on its dispatch thread. Session state is shared with the handle,
//! everything else (scene, render threads, received files) belongs to the
//! dispatch thread.

mod dispatch;

pub use dispatch::{server_film_params, FORCED_OFF_FILM_PARAMS, SERVER_FILM_TYPES};

use std::{
    io::{BufReader, BufWriter},
    net::{Ipv4Addr, Shutdown, SocketAddr, TcpListener, TcpStream},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
};

use log::{error, info, warn};
use parking_lot::Mutex;

use crate::{
    config::WorkerConfig,
    error::Result,
    session::{SessionTable, WorkerState},
};
use dispatch::Dispatcher;

/// State shared between the [`Worker`] handle and its dispatch thread
struct Shared {
    table: Mutex<SessionTable>,
    stopping: AtomicBool,
    /// Connection being served, kept to interrupt it on stop
    active: Mutex<Option<TcpStream>>,
}

impl Shared {
    fn new(table: SessionTable) -> Shared {
        Shared {
            table: Mutex::new(table),
            stopping: AtomicBool::new(false),
            active: Mutex::new(None),
        }
    }
}

/// Render worker
pub struct Worker {
    config: WorkerConfig,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
    local_addr: Option<SocketAddr>,
}

impl Worker {
    pub fn new(config: WorkerConfig) -> Worker {
        Worker {
            config,
            shared: Arc::new(Shared::new(SessionTable::new())),
            handle: None,
            local_addr: None,
        }
    }

    /// Bind the port and start serving
    ///
    /// Starting a worker twice is logged and ignored.
    pub fn start(&mut self) -> Result<()> {
        if self.state() != WorkerState::Unstarted {
            error!("Worker already started");
            return Ok(());
        }

        let listener = TcpListener::bind((Ipv4Addr::UNSPECIFIED, self.config.port))?;
        let local_addr = listener.local_addr()?;
        let mut dispatcher =
            Dispatcher::new(self.shared.clone(), self.config.clone(), local_addr.port())?;

        if !self.shared.table.lock().start() {
            return Ok(());
        }

        let shared = self.shared.clone();
        let spawned = thread::Builder::new()
            .name("dispatch".into())
            .spawn(move || {
                accept_loop(&listener, &shared, &mut dispatcher);
                dispatcher.shutdown();
                info!("Worker stopped");
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                self.shared.table.lock().stop();
                return Err(e.into());
            }
        };

        info!(
            "Worker listening on port {} with {} threads",
            local_addr.port(),
            self.config.threads
        );
        self.handle = Some(handle);
        self.local_addr = Some(local_addr);
        Ok(())
    }

    /// Bound address, `None` before start
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    pub fn state(&self) -> WorkerState {
        self.shared.table.lock().state()
    }

    /// Id of the active session
    pub fn session_id(&self) -> Option<String> {
        self.shared
            .table
            .lock()
            .current()
            .map(|sid| sid.as_str().to_owned())
    }

    /// Block until the dispatch thread ends
    pub fn join(&mut self) {
        match self.state() {
            WorkerState::Ready | WorkerState::Busy => {}
            state => {
                error!("Cannot join worker in state {state}");
                return;
            }
        }
        self.join_thread();
    }

    /// Stop serving, end the session and join every thread
    pub fn stop(&mut self) {
        if !self.shared.table.lock().stop() {
            return;
        }
        info!("Stopping worker");
        self.shared.stopping.store(true, Ordering::Release);

        if let Some(stream) = self.shared.active.lock().take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        // Wake the accept loop
        if let Some(addr) = self.local_addr {
            let wake = SocketAddr::from((Ipv4Addr::LOCALHOST, addr.port()));
            if let Err(e) = TcpStream::connect(wake) {
                warn!("Cannot wake accept loop ({e})");
            }
        }
        self.join_thread();
    }

    fn join_thread(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Dispatch thread panicked");
            }
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.stop();
        }
    }
}

fn accept_loop(listener: &TcpListener, shared: &Shared, dispatcher: &mut Dispatcher) {
    for stream in listener.incoming() {
        if shared.stopping.load(Ordering::Acquire) {
            break;
        }
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("Cannot accept connection ({e})");
                continue;
            }
        };
        if let Ok(peer) = stream.peer_addr() {
            info!("Connection from {peer}");
        }
        serve(stream, shared, dispatcher);
    }
}

fn serve(stream: TcpStream, shared: &Shared, dispatcher: &mut Dispatcher) {
    let (read_half, write_half) = match (stream.try_clone(), stream.try_clone()) {
        (Ok(r), Ok(w)) => (r, w),
        (Err(e), _) | (_, Err(e)) => {
            error!("Cannot use connection ({e})");
            return;
        }
    };
    *shared.active.lock() = Some(stream);
    // Stop may have run before the connection was registered
    if shared.stopping.load(Ordering::Acquire) {
        return;
    }

    let mut reader = BufReader::new(read_half);
    let mut writer = BufWriter::new(write_half);
    if let Err(e) = dispatcher.handle_connection(&mut reader, &mut writer) {
        warn!("Connection lost: {e}");
    }
    shared.active.lock().take();
}
